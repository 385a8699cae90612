//! Domain types shared by the parsing, merging and ordering stages.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Travel direction of a trip as named by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "Inbound",
            Direction::Outbound => "Outbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    /// Parses a feed direction name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("inbound") {
            Ok(Direction::Inbound)
        } else if s.eq_ignore_ascii_case("outbound") {
            Ok(Direction::Outbound)
        } else {
            Err(anyhow::anyhow!("unknown direction '{s}'"))
        }
    }
}

/// Which of the two per-stop fetches a feed came from.
///
/// The pass name is also the root segment of every path in that feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    Schedule,
    Predictions,
}

impl Pass {
    pub fn root(&self) -> &'static str {
        match self {
            Pass::Schedule => "schedule",
            Pass::Predictions => "predictions",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root())
    }
}

/// A trip closed by the feed, snapshotted from the parse context.
///
/// Only ever built with a non-empty `trip_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripRecord {
    pub pass: Pass,
    pub route_id: String,
    pub route_name: String,
    /// `None` when the feed's direction name is not one we recognise.
    pub direction: Option<Direction>,
    pub trip_id: String,
    pub trip_name: String,
    pub head_sign: String,
    pub scheduled_arrival_epoch: Option<i64>,
    /// Working display time: scheduled in the schedule pass, predicted once
    /// a prediction has been seen.
    pub arrival_epoch: Option<i64>,
    /// Set only for predictions-pass records.
    pub predicted_arrival_epoch: Option<i64>,
    /// Set only for predictions-pass records.
    pub seconds_to_arrival: Option<i64>,
}

/// One stop query as requested by the caller.
#[derive(Debug, Clone)]
pub struct StopRequest {
    pub stop_id: String,
    pub label: Option<String>,
    pub direction: Direction,
    pub interest_routes: HashSet<String>,
    pub now_epoch: i64,
    pub show_lateness: bool,
    pub schedule_only: bool,
    /// Overrides `now_epoch`; a fixed time always means schedule-only.
    pub fixed_time: Option<i64>,
}

impl StopRequest {
    pub fn new(
        stop_id: impl Into<String>,
        direction: Direction,
        interest_routes: impl IntoIterator<Item = impl Into<String>>,
        now_epoch: i64,
    ) -> Self {
        Self {
            stop_id: stop_id.into(),
            label: None,
            direction,
            interest_routes: interest_routes.into_iter().map(Into::into).collect(),
            now_epoch,
            show_lateness: false,
            schedule_only: false,
            fixed_time: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_lateness(mut self, show: bool) -> Self {
        self.show_lateness = show;
        self
    }

    pub fn with_schedule_only(mut self, schedule_only: bool) -> Self {
        self.schedule_only = schedule_only;
        self
    }

    pub fn with_fixed_time(mut self, fixed_time: Option<i64>) -> Self {
        self.fixed_time = fixed_time;
        self
    }

    /// Whether a predictions pass should be run for this stop at all.
    pub fn wants_predictions(&self) -> bool {
        !self.schedule_only && self.fixed_time.is_none()
    }

    /// The reference time for away labels.
    pub fn effective_now(&self) -> i64 {
        self.fixed_time.unwrap_or(self.now_epoch)
    }

    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) => format!("{label} ({})", self.direction),
            None => format!("Stop {} ({})", self.stop_id, self.direction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse_ignores_case() {
        assert_eq!("inbound".parse::<Direction>().unwrap(), Direction::Inbound);
        assert_eq!(" OUTBOUND ".parse::<Direction>().unwrap(), Direction::Outbound);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_fixed_time_disables_predictions() {
        let req = StopRequest::new("51", Direction::Inbound, ["78"], 500);
        assert!(req.wants_predictions());
        assert_eq!(req.effective_now(), 500);

        let req = req.with_fixed_time(Some(900));
        assert!(!req.wants_predictions());
        assert_eq!(req.effective_now(), 900);
    }

    #[test]
    fn test_schedule_only_disables_predictions() {
        let req = StopRequest::new("51", Direction::Inbound, ["78"], 500).with_schedule_only(true);
        assert!(!req.wants_predictions());
    }

    #[test]
    fn test_display_label() {
        let req = StopRequest::new("51", Direction::Outbound, ["78"], 0);
        assert_eq!(req.display_label(), "Stop 51 (Outbound)");
        let req = req.with_label("Main & 5th");
        assert_eq!(req.display_label(), "Main & 5th (Outbound)");
    }
}
