//! Tick feeds
//!
//! The pipeline pulls raw ticks from a `Feed`. Whatever owns the gateway
//! session (login, subscriptions, callbacks) lives outside this crate
//! and pushes copies of each tick into a `ChannelFeed`; recorded
//! sessions can be replayed with `JsonLinesFeed`.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use tick_types::record::RawTick;

/// Result of one pull.
#[derive(Debug, Clone, PartialEq)]
pub enum Pull {
    Record(RawTick),
    /// Nothing arrived for a while; the pipeline pulls again.
    Idle,
    /// No more ticks will ever arrive.
    Exhausted,
}

/// Source of raw ticks.
///
/// `pull` must be cancel-safe: the pipeline drops an in-flight pull when
/// shutdown is requested, and no tick may be lost by that.
#[async_trait]
pub trait Feed: Send {
    async fn pull(&mut self) -> Pull;
}

// ── Channel feed ────────────────────────────────────────────────────

/// Feed backed by an unbounded channel.
pub struct ChannelFeed {
    rx: mpsc::UnboundedReceiver<RawTick>,
    idle_timeout: Option<Duration>,
    exhaust_when_idle: bool,
}

impl ChannelFeed {
    pub fn new(rx: mpsc::UnboundedReceiver<RawTick>) -> Self {
        Self {
            rx,
            idle_timeout: None,
            exhaust_when_idle: false,
        }
    }

    /// Create a feed together with the sender the gateway side pushes into.
    pub fn channel() -> (mpsc::UnboundedSender<RawTick>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    /// Report `Pull::Idle` after `timeout` without a tick.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Treat an idle period as the end of the feed.
    pub fn exhaust_when_idle(mut self) -> Self {
        self.exhaust_when_idle = true;
        self
    }
}

#[async_trait]
impl Feed for ChannelFeed {
    async fn pull(&mut self) -> Pull {
        let Some(timeout) = self.idle_timeout else {
            return self.rx.recv().await.map(Pull::Record).unwrap_or(Pull::Exhausted);
        };

        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(raw)) => Pull::Record(raw),
            Ok(None) => Pull::Exhausted,
            Err(_) if self.exhaust_when_idle => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Feed quiet, treating as exhausted");
                Pull::Exhausted
            }
            Err(_) => Pull::Idle,
        }
    }
}

// ── Recorded sessions ───────────────────────────────────────────────

/// Feed replaying newline-delimited JSON `RawTick`s.
pub struct JsonLinesFeed<R> {
    lines: Lines<R>,
    line_no: u64,
    skipped: u64,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesFeed<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Lines that could not be parsed so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Feed for JsonLinesFeed<R> {
    async fn pull(&mut self) -> Pull {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Pull::Exhausted,
                Err(e) => {
                    error!(line = self.line_no + 1, error = %e, "Recorded feed unreadable, stopping");
                    return Pull::Exhausted;
                }
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RawTick>(&line) {
                Ok(raw) => return Pull::Record(raw),
                Err(e) => {
                    self.skipped += 1;
                    warn!(line = self.line_no, error = %e, "Skipping malformed recorded tick");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_channel_feed_exhausts_when_closed() {
        let (tx, mut feed) = ChannelFeed::channel();
        tx.send(RawTick::new("rb1705", "20170105", "20170105", "09:30:00", 0))
            .unwrap();
        drop(tx);

        assert!(matches!(feed.pull().await, Pull::Record(_)));
        assert_eq!(feed.pull().await, Pull::Exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_feed_idle_timeout() {
        let (tx, feed) = ChannelFeed::channel();
        let mut feed = feed.idle_timeout(Duration::from_secs(1));

        assert_eq!(feed.pull().await, Pull::Idle);
        tx.send(RawTick::new("rb1705", "20170105", "20170105", "09:30:00", 0))
            .unwrap();
        assert!(matches!(feed.pull().await, Pull::Record(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_feed_quiet_period_ends_feed() {
        let (_tx, feed) = ChannelFeed::channel();
        let mut feed = feed.idle_timeout(Duration::from_secs(1)).exhaust_when_idle();
        assert_eq!(feed.pull().await, Pull::Exhausted);
    }

    #[tokio::test]
    async fn test_json_lines_skips_malformed() {
        let input = concat!(
            r#"{"instrument_id":"rb1705","trading_day":"20170105","action_day":"20170105","update_time":"09:30:00","update_millisec":0,"last_price":3512.0}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"instrument_id":[99,117,255],"trading_day":"20170105","action_day":"20170105","update_time":"09:30:01","update_millisec":500}"#,
            "\n",
        );
        let mut feed = JsonLinesFeed::new(BufReader::new(Cursor::new(input.as_bytes().to_vec())));

        match feed.pull().await {
            Pull::Record(raw) => assert_eq!(raw.fields.last_price, 3512.0),
            other => panic!("unexpected pull: {other:?}"),
        }
        match feed.pull().await {
            Pull::Record(raw) => assert_eq!(raw.instrument_id.as_bytes(), &[99, 117, 255]),
            other => panic!("unexpected pull: {other:?}"),
        }
        assert_eq!(feed.pull().await, Pull::Exhausted);
        assert_eq!(feed.skipped(), 1);
    }
}
