//! Orders merged arrivals and renders them as display lines.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use crate::merge::{ArrivalEntry, ArrivalMap};

/// Sentinel line for a stop with nothing to show.
pub const NO_ARRIVALS: &str = "none";

/// Rendered output for one stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopBoard {
    pub label: String,
    pub lines: Vec<String>,
    /// Entries dropped because they had no usable arrival time.
    pub skipped: usize,
}

impl StopBoard {
    pub fn has_arrivals(&self) -> bool {
        self.lines.first().is_some_and(|l| l != NO_ARRIVALS)
    }
}

/// Converts seconds to whole minutes, rounding halves away from zero.
///
/// `None` when the value is too close to the `i64` limits to round.
pub fn round_minutes(seconds: i64) -> Option<i64> {
    if seconds >= 0 {
        Some(seconds.checked_add(30)? / 60)
    } else {
        Some(-(seconds.checked_neg()?.checked_add(30)? / 60))
    }
}

/// 12-hour wall-clock label such as `3:05pm`.
pub fn time_label<Tz>(epoch: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match DateTime::from_timestamp(epoch, 0) {
        Some(utc) => utc.with_timezone(tz).format("%-I:%M%P").to_string(),
        None => epoch.to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArrivalOrderer {
    now_epoch: i64,
    show_lateness: bool,
}

impl ArrivalOrderer {
    pub fn new(now_epoch: i64, show_lateness: bool) -> Self {
        Self {
            now_epoch,
            show_lateness,
        }
    }

    /// Sorts entries by arrival time, keeping insertion order on ties.
    ///
    /// Returns the ordered entries and how many were dropped for lacking an
    /// arrival time.
    pub fn order<'m>(&self, map: &'m ArrivalMap) -> (Vec<&'m ArrivalEntry>, usize) {
        let mut timed: Vec<(i64, &ArrivalEntry)> = map
            .iter()
            .filter_map(|e| e.arrival_epoch.map(|t| (t, e)))
            .collect();
        let skipped = map.len() - timed.len();
        timed.sort_by_key(|(t, _)| *t);
        (timed.into_iter().map(|(_, e)| e).collect(), skipped)
    }

    /// `in N min` from the feed's countdown, else `in N min (sched)` from
    /// the arrival time. `None` if neither yields a representable value.
    pub fn away_label(&self, entry: &ArrivalEntry) -> Option<String> {
        if let Some(minutes) = entry.seconds_to_arrival.and_then(round_minutes) {
            return Some(format!("in {minutes} min"));
        }
        let minutes = entry
            .arrival_epoch?
            .checked_sub(self.now_epoch)
            .and_then(round_minutes)?;
        Some(format!("in {minutes} min (sched)"))
    }

    /// `(late D)` / `(early D)`; `None` when on time, disabled, or when
    /// either side of the comparison is missing or out of range.
    pub fn late_label(&self, entry: &ArrivalEntry) -> Option<String> {
        if !self.show_lateness || !entry.predicted {
            return None;
        }
        let delta = entry
            .arrival_epoch?
            .checked_sub(entry.scheduled_arrival_epoch?)
            .and_then(round_minutes)?;
        match delta {
            d if d > 0 => Some(format!("(late {d})")),
            d if d < 0 => Some(format!("(early {})", -d)),
            _ => None,
        }
    }

    /// One display line, or `None` when the entry has no usable time.
    pub fn render_line<Tz>(&self, entry: &ArrivalEntry, tz: &Tz) -> Option<String>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let time = time_label(entry.arrival_epoch?, tz);
        let mut line = format!("{time} {} {}", entry.route_name, self.away_label(entry)?);
        if let Some(late) = self.late_label(entry) {
            line.push(' ');
            line.push_str(&late);
        }
        Some(line)
    }

    pub fn render<Tz>(&self, label: impl Into<String>, map: &ArrivalMap, tz: &Tz) -> StopBoard
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let (ordered, untimed) = self.order(map);
        let timed = ordered.len();
        let mut lines: Vec<String> = ordered
            .into_iter()
            .filter_map(|entry| self.render_line(entry, tz))
            .collect();
        let skipped = untimed + (timed - lines.len());
        if lines.is_empty() {
            lines.push(NO_ARRIVALS.to_string());
        }
        StopBoard {
            label: label.into(),
            lines,
            skipped,
        }
    }
}
