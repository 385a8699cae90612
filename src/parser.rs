//! Line parser for flattened hierarchical feeds.
//!
//! Each line carries a slash-delimited path and a value, e.g.
//! `/schedule/route/direction/trip/@id=4711`. A path whose last segment
//! starts with `@` is an attribute leaf; a bare path closes the object it
//! names.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// One `path value` line of a flattened feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathValuePair<'a> {
    pub path: &'a str,
    pub value: &'a str,
}

impl<'a> PathValuePair<'a> {
    /// Splits an attribute path into `(object_path, attribute_name)`.
    ///
    /// Returns `None` for closing markers.
    pub fn attribute(&self) -> Option<(&'a str, &'a str)> {
        let (parent, leaf) = self.path.rsplit_once('/')?;
        leaf.strip_prefix('@').map(|name| (parent, name))
    }

    pub fn is_close_marker(&self) -> bool {
        self.attribute().is_none()
    }
}

/// Lazy, single-pass iterator over the pairs of one feed body.
pub struct PathValueStream<'a> {
    lines: std::str::Lines<'a>,
}

impl<'a> Iterator for PathValueStream<'a> {
    type Item = PathValuePair<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next().map(split_line)
    }
}

/// Streams the pairs of `text` in document order.
pub fn path_values(text: &str) -> PathValueStream<'_> {
    PathValueStream {
        lines: text.lines(),
    }
}

fn split_line(line: &str) -> PathValuePair<'_> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    match line.find(|c: char| c == '=' || c.is_whitespace()) {
        Some(idx) => {
            let sep_len = line[idx..].chars().next().map_or(1, char::len_utf8);
            PathValuePair {
                path: &line[..idx],
                value: line[idx + sep_len..].trim_start(),
            }
        }
        None => PathValuePair {
            path: line,
            value: "",
        },
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses an arrival time into epoch seconds.
///
/// Accepts integer epoch seconds, RFC 3339 timestamps, and naive datetimes
/// in local time. Anything else is absent.
pub fn parse_epoch(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(epoch) = value.parse::<i64>() {
        return Some(epoch);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp());
    }
    NAIVE_FORMATS.iter().find_map(|fmt| {
        let naive = NaiveDateTime::parse_from_str(value, fmt).ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp())
    })
}

/// Parses a whole number of seconds; fractional values are truncated.
pub fn parse_seconds(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .map(f64::trunc)
            .filter(|s| (i64::MIN as f64..i64::MAX as f64).contains(s))
            .map(|s| s as i64)
    })
}
