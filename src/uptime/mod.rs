//! Parser for `uptime` / `w` header lines.
//!
//! Turns a line such as
//! `14:32:10 up 3 days,  4:05,  2 users,  load average: 0.10, 0.25, 0.30`
//! into its four fields. Malformed input never fails: each field falls back
//! to an empty or zero value on its own.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref UP_REGEX: Regex = Regex::new(r"\bup\b").unwrap();

    /// User count field, e.g. `2 users` (also accepts `1 user`)
    static ref USERS_REGEX: Regex = Regex::new(r"(\d+)\s+users?\b").unwrap();

    /// Linux prints `load average: a, b, c`; BSD prints `load averages: a b c`
    static ref LOAD_REGEX: Regex = Regex::new(
        r"load averages?:\s*([0-9][0-9.]*),?\s+([0-9][0-9.]*),?\s+([0-9][0-9.]*)"
    ).unwrap();
}

pub const LOAD_AVERAGE_LABELS: [&str; 3] = ["1 min", "5 min", "15 min"];

/// Trailing count that leaks into the uptime segment on some hosts
const STRAY_ZERO_SUFFIX: &str = ", 0";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UptimeRecord {
    pub server_time: String,
    /// Uptime as printed, e.g. `3 days,  4:05`
    pub uptime: String,
    pub active_users: u32,
    /// 1, 5 and 15 minute load averages
    pub load_averages: Vec<f64>,
}

pub fn parse_uptime(raw: Option<&str>) -> UptimeRecord {
    let line = raw.map(str::trim).unwrap_or_default();
    if line.is_empty() {
        return UptimeRecord::default();
    }

    let up = UP_REGEX.find(line);
    let users = USERS_REGEX.captures(line);
    let load = LOAD_REGEX.captures(line);

    let server_time = up
        .map(|m| line[..m.start()].trim().to_string())
        .unwrap_or_default();

    let uptime = up
        .and_then(|m| {
            let end = users
                .as_ref()
                .and_then(|c| c.get(0))
                .or_else(|| load.as_ref().and_then(|c| c.get(0)))
                .map(|field| field.start())
                .unwrap_or(line.len());
            line.get(m.end()..end)
        })
        .map(clean_uptime_segment)
        .unwrap_or_default();

    let active_users = users
        .as_ref()
        .and_then(|c| c.get(1))
        .and_then(|count| count.as_str().parse().ok())
        .unwrap_or(0);

    UptimeRecord {
        server_time,
        uptime,
        active_users,
        load_averages: parse_load_averages(load.as_ref()),
    }
}

fn clean_uptime_segment(segment: &str) -> String {
    let segment = segment.trim().trim_end_matches(',').trim_end();
    let segment = match segment.strip_suffix(STRAY_ZERO_SUFFIX) {
        Some(stripped) => stripped.trim_end(),
        None => segment,
    };
    segment.to_string()
}

fn parse_load_averages(captures: Option<&regex::Captures<'_>>) -> Vec<f64> {
    let parsed: Option<Vec<f64>> = captures.and_then(|c| {
        (1..=3)
            .map(|i| c.get(i).and_then(|m| m.as_str().parse::<f64>().ok()))
            .collect()
    });

    parsed.unwrap_or_else(|| vec![0.0; 3])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_line() {
        let record = parse_uptime(Some(
            "14:32:10 up 3 days, 2 users, load average: 0.10, 0.25, 0.30",
        ));

        assert_eq!(record.server_time, "14:32:10");
        assert_eq!(record.uptime, "3 days");
        assert_eq!(record.active_users, 2);
        assert_eq!(record.load_averages, vec![0.10, 0.25, 0.30]);
    }

    #[test]
    fn test_linux_uptime_output() {
        let record = parse_uptime(Some(
            " 14:32:10 up 3 days,  4:05,  12 users,  load average: 1.52, 0.98, 0.47\n",
        ));

        assert_eq!(record.server_time, "14:32:10");
        assert_eq!(record.uptime, "3 days,  4:05");
        assert_eq!(record.active_users, 12);
        assert_eq!(record.load_averages, vec![1.52, 0.98, 0.47]);
    }

    #[test]
    fn test_single_user() {
        let record = parse_uptime(Some(
            "08:01:44 up 35 min,  1 user,  load average: 0.00, 0.01, 0.05",
        ));

        assert_eq!(record.uptime, "35 min");
        assert_eq!(record.active_users, 1);
    }

    #[test]
    fn test_bsd_load_averages() {
        let record = parse_uptime(Some(
            "10:15  up 6 days, 22:11, 3 users, load averages: 2.17 2.45 2.38",
        ));

        assert_eq!(record.server_time, "10:15");
        assert_eq!(record.active_users, 3);
        assert_eq!(record.load_averages, vec![2.17, 2.45, 2.38]);
    }

    #[test]
    fn test_stray_zero_is_stripped() {
        let record = parse_uptime(Some(
            "09:15:01 up 12 min, 0, 1 users, load average: 0.00, 0.01, 0.05",
        ));
        assert_eq!(record.uptime, "12 min");
    }

    #[test]
    fn test_empty_and_missing_input() {
        for input in [None, Some(""), Some("   \n")] {
            let record = parse_uptime(input);
            assert_eq!(record.server_time, "");
            assert_eq!(record.uptime, "");
            assert_eq!(record.active_users, 0);
            assert!(record.load_averages.is_empty());
        }
    }

    #[test]
    fn test_missing_anchors_degrade_independently() {
        let record = parse_uptime(Some("garbage without anchors"));
        assert_eq!(record.server_time, "");
        assert_eq!(record.uptime, "");
        assert_eq!(record.active_users, 0);
        assert_eq!(record.load_averages, vec![0.0, 0.0, 0.0]);

        let record = parse_uptime(Some("14:32:10 up 3 days, load average: 0.10, 0.25, 0.30"));
        assert_eq!(record.server_time, "14:32:10");
        assert_eq!(record.uptime, "3 days");
        assert_eq!(record.active_users, 0);
        assert_eq!(record.load_averages, vec![0.10, 0.25, 0.30]);

        let record = parse_uptime(Some("14:32:10 up 3 days, 2 users"));
        assert_eq!(record.uptime, "3 days");
        assert_eq!(record.active_users, 2);
        assert_eq!(record.load_averages, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_malformed_load_average() {
        let record = parse_uptime(Some(
            "14:32:10 up 3 days, 2 users, load average: 0.1.0, 0.25, 0.30",
        ));
        assert_eq!(record.load_averages, vec![0.0, 0.0, 0.0]);

        let record = parse_uptime(Some("14:32:10 up 3 days, 2 users, load average: 0.10"));
        assert_eq!(record.load_averages, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_users_before_up_does_not_panic() {
        let record = parse_uptime(Some("2 users, then up"));
        assert_eq!(record.server_time, "2 users, then");
        assert_eq!(record.uptime, "");
        assert_eq!(record.active_users, 2);
    }
}
