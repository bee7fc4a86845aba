//! Continuous-query ladder
//!
//! Raw ticks land in `<measurement>`. Each rung aggregates the rung
//! below it into `<measurement>_<interval>`:
//!
//! ```text
//! ctp -> ctp_1m -> ctp_5m -> ctp_15m -> ctp_30m -> ctp_1h -> ctp_1d
//! ```
//!
//! Every rung keeps min/max/mean/first/last of all fields, grouped by
//! time bucket and instrument.

use crate::point::INSTRUMENT_TAG;

/// Aggregation intervals, finest first.
pub const INTERVALS: [&str; 6] = ["1m", "5m", "15m", "30m", "1h", "1d"];

/// One continuous query of the ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuousQuery {
    pub name: String,
    pub interval: &'static str,
    pub source: String,
    pub target: String,
    pub statement: String,
}

/// Name of the continuous query producing `interval` for `database`.
pub fn query_name(database: &str, measurement: &str, interval: &str) -> String {
    format!("{database}_{measurement}_{interval}")
}

/// Build the full ladder for a database, finest rung first.
pub fn ladder(database: &str, measurement: &str) -> Vec<ContinuousQuery> {
    let mut source = measurement.to_string();
    INTERVALS
        .iter()
        .map(|interval| {
            let target = format!("{measurement}_{interval}");
            let name = query_name(database, measurement, interval);
            let statement = format!(
                "CREATE CONTINUOUS QUERY {name_q} ON {db_q} BEGIN \
                 SELECT min(*), max(*), mean(*), first(*), last(*) \
                 INTO {target_q} FROM {source_q} \
                 GROUP BY time({interval}), {tag_q} END",
                name_q = quote_ident(&name),
                db_q = quote_ident(database),
                target_q = quote_ident(&target),
                source_q = quote_ident(&source),
                tag_q = quote_ident(INSTRUMENT_TAG),
            );
            ContinuousQuery {
                name,
                interval,
                source: std::mem::replace(&mut source, target.clone()),
                target,
                statement,
            }
        })
        .collect()
}

/// Double-quote an InfluxQL identifier.
pub fn quote_ident(ident: &str) -> String {
    let mut quoted = String::with_capacity(ident.len() + 2);
    quoted.push('"');
    for c in ident.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_chains_each_rung_to_the_previous() {
        let queries = ladder("ticks", "ctp");
        assert_eq!(queries.len(), INTERVALS.len());

        let sources: Vec<&str> = queries.iter().map(|q| q.source.as_str()).collect();
        assert_eq!(
            sources,
            vec!["ctp", "ctp_1m", "ctp_5m", "ctp_15m", "ctp_30m", "ctp_1h"]
        );
        assert_eq!(queries.last().unwrap().target, "ctp_1d");
    }

    #[test]
    fn test_statement_text() {
        let queries = ladder("ticks", "ctp");
        assert_eq!(queries[1].name, "ticks_ctp_5m");
        assert_eq!(
            queries[1].statement,
            "CREATE CONTINUOUS QUERY \"ticks_ctp_5m\" ON \"ticks\" BEGIN \
             SELECT min(*), max(*), mean(*), first(*), last(*) \
             INTO \"ctp_5m\" FROM \"ctp_1m\" \
             GROUP BY time(5m), \"instrument_id\" END"
        );
    }

    #[test]
    fn test_names_are_unique_per_database() {
        let a = ladder("ticks", "ctp");
        let b = ladder("replay", "ctp");
        for (x, y) in a.iter().zip(b.iter()) {
            assert_ne!(x.name, y.name);
            assert_eq!(x.target, y.target);
        }
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident("tick\"db"), "\"tick\\\"db\"");
        assert_eq!(quote_ident("plain"), "\"plain\"");
    }
}
