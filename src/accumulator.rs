//! Rebuilds trip records from a flattened feed.
//!
//! The feed nests `route > direction > trip` under a root named after the
//! pass. Attribute leaves fill a [`ParseContext`]; closing markers flush the
//! open trip and unwind the route/direction scopes.

use tracing::trace;

use crate::model::{Pass, TripRecord};
use crate::parser::{PathValuePair, parse_epoch, parse_seconds};

/// The three object levels a feed may open and close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Route,
    Direction,
    Trip,
}

/// Recognised attribute leaves, keyed by level and `@name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    RouteId,
    RouteName,
    DirectionName,
    TripId,
    TripName,
    HeadSign,
    ScheduledArrival,
    PredictedArrival,
    SecondsToArrival,
}

impl Attribute {
    pub fn lookup(level: Level, name: &str) -> Option<Self> {
        let attr = match (level, name) {
            (Level::Route, "id") => Attribute::RouteId,
            (Level::Route, "name") => Attribute::RouteName,
            (Level::Direction, "name") => Attribute::DirectionName,
            (Level::Trip, "id") => Attribute::TripId,
            (Level::Trip, "name") => Attribute::TripName,
            (Level::Trip, "headsign") => Attribute::HeadSign,
            (Level::Trip, "scheduledArrival") => Attribute::ScheduledArrival,
            (Level::Trip, "predictedArrival") => Attribute::PredictedArrival,
            (Level::Trip, "secondsToArrival") => Attribute::SecondsToArrival,
            _ => return None,
        };
        Some(attr)
    }
}

/// Object paths for one pass, e.g. `/schedule/route/direction`.
#[derive(Debug, Clone)]
pub struct PathTemplates {
    route: String,
    direction: String,
    trip: String,
}

impl PathTemplates {
    pub fn for_pass(pass: Pass) -> Self {
        let route = format!("/{}/route", pass.root());
        let direction = format!("{route}/direction");
        let trip = format!("{direction}/trip");
        Self {
            route,
            direction,
            trip,
        }
    }

    /// Maps an object path to its level; `None` for anything unknown.
    pub fn level_of(&self, path: &str) -> Option<Level> {
        if path == self.trip {
            Some(Level::Trip)
        } else if path == self.direction {
            Some(Level::Direction)
        } else if path == self.route {
            Some(Level::Route)
        } else {
            None
        }
    }
}

/// Mutable state of one traversal.
#[derive(Debug, Default, Clone)]
pub struct ParseContext {
    pub route_id: Option<String>,
    pub route_name: Option<String>,
    pub direction_name: Option<String>,
    pub trip_id: Option<String>,
    pub trip_name: Option<String>,
    pub head_sign: Option<String>,
    pub scheduled_arrival_epoch: Option<i64>,
    pub arrival_epoch: Option<i64>,
    pub seconds_to_arrival: Option<i64>,
}

impl ParseContext {
    fn assign(&mut self, pass: Pass, attr: Attribute, value: &str) {
        let text = || Some(value.to_string());
        match attr {
            Attribute::RouteId => self.route_id = text(),
            Attribute::RouteName => self.route_name = text(),
            Attribute::DirectionName => self.direction_name = text(),
            Attribute::TripId => self.trip_id = text(),
            Attribute::TripName => self.trip_name = text(),
            Attribute::HeadSign => self.head_sign = text(),
            Attribute::ScheduledArrival => {
                let epoch = parse_epoch(value);
                self.scheduled_arrival_epoch = epoch;
                if pass == Pass::Schedule {
                    self.arrival_epoch = epoch;
                }
            }
            Attribute::PredictedArrival => self.arrival_epoch = parse_epoch(value),
            Attribute::SecondsToArrival => self.seconds_to_arrival = parse_seconds(value),
        }
    }

    /// Emits the open trip, if any, and clears every trip-scoped field.
    fn flush(&mut self, pass: Pass) -> Option<TripRecord> {
        let trip_id = self.trip_id.take().filter(|id| !id.is_empty());
        let trip_name = self.trip_name.take();
        let head_sign = self.head_sign.take();
        let scheduled = self.scheduled_arrival_epoch.take();
        let arrival = self.arrival_epoch.take();
        let seconds = self.seconds_to_arrival.take();

        let trip_id = trip_id?;
        let predicted = pass == Pass::Predictions;
        Some(TripRecord {
            pass,
            route_id: self.route_id.clone().unwrap_or_default(),
            route_name: self.route_name.clone().unwrap_or_default(),
            direction: self
                .direction_name
                .as_deref()
                .and_then(|name| name.parse().ok()),
            trip_id,
            trip_name: trip_name.unwrap_or_default(),
            head_sign: head_sign.unwrap_or_default(),
            scheduled_arrival_epoch: scheduled,
            arrival_epoch: arrival,
            predicted_arrival_epoch: if predicted { arrival } else { None },
            seconds_to_arrival: if predicted { seconds } else { None },
        })
    }

    /// Applies one pair under `templates`, returning a record if it closed a trip.
    fn apply(
        &mut self,
        pass: Pass,
        templates: &PathTemplates,
        pair: PathValuePair<'_>,
    ) -> Option<TripRecord> {
        if let Some((object, name)) = pair.attribute() {
            let attr = templates
                .level_of(object)
                .and_then(|level| Attribute::lookup(level, name));
            match attr {
                Some(attr) => self.assign(pass, attr, pair.value),
                None => trace!(path = pair.path, "Ignoring unrecognised attribute"),
            }
            return None;
        }

        let level = templates.level_of(pair.path)?;
        let record = self.flush(pass);
        self.close(level);
        record
    }

    fn close(&mut self, level: Level) {
        match level {
            Level::Trip => {}
            Level::Direction => self.direction_name = None,
            Level::Route => {
                self.route_id = None;
                self.route_name = None;
                self.direction_name = None;
            }
        }
    }
}

/// Iterator adapter turning path/value pairs into [`TripRecord`]s.
///
/// Every call builds its own [`ParseContext`]; nothing is shared between
/// passes or stops.
pub struct TripAccumulator<I> {
    pass: Pass,
    templates: PathTemplates,
    context: ParseContext,
    pairs: I,
}

impl<'a, I> TripAccumulator<I>
where
    I: Iterator<Item = PathValuePair<'a>>,
{
    pub fn new(pass: Pass, pairs: I) -> Self {
        Self {
            pass,
            templates: PathTemplates::for_pass(pass),
            context: ParseContext::default(),
            pairs,
        }
    }

    pub fn context(&self) -> &ParseContext {
        &self.context
    }

    /// Applies one pair, returning a record if it closed a trip.
    pub fn step(&mut self, pair: PathValuePair<'_>) -> Option<TripRecord> {
        self.context.apply(self.pass, &self.templates, pair)
    }
}

impl<'a, I> Iterator for TripAccumulator<I>
where
    I: Iterator<Item = PathValuePair<'a>>,
{
    type Item = TripRecord;

    fn next(&mut self) -> Option<TripRecord> {
        for pair in self.pairs.by_ref() {
            if let Some(record) = self.context.apply(self.pass, &self.templates, pair) {
                return Some(record);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Direction;
    use crate::parser::path_values;

    fn records(pass: Pass, text: &str) -> Vec<TripRecord> {
        TripAccumulator::new(pass, path_values(text)).collect()
    }

    const SCHEDULE: &str = "\
/schedule/route/@id=78
/schedule/route/@name=78 Crosstown
/schedule/route/direction/@name=Inbound
/schedule/route/direction/trip/@id=T1
/schedule/route/direction/trip/@name=Run 12
/schedule/route/direction/trip/@headsign=Downtown
/schedule/route/direction/trip/@scheduledArrival=1000
/schedule/route/direction/trip
/schedule/route/direction/trip/@id=T2
/schedule/route/direction/trip/@scheduledArrival=1600
/schedule/route/direction/trip
/schedule/route/direction
/schedule/route
";

    #[test]
    fn test_schedule_pass_emits_each_trip() {
        let recs = records(Pass::Schedule, SCHEDULE);
        assert_eq!(recs.len(), 2);

        let first = &recs[0];
        assert_eq!(first.route_id, "78");
        assert_eq!(first.route_name, "78 Crosstown");
        assert_eq!(first.direction, Some(Direction::Inbound));
        assert_eq!(first.trip_id, "T1");
        assert_eq!(first.trip_name, "Run 12");
        assert_eq!(first.head_sign, "Downtown");
        assert_eq!(first.scheduled_arrival_epoch, Some(1000));
        assert_eq!(first.arrival_epoch, Some(1000));
        assert_eq!(first.predicted_arrival_epoch, None);
        assert_eq!(first.seconds_to_arrival, None);

        // trip-scoped fields must not leak into the next trip
        let second = &recs[1];
        assert_eq!(second.trip_id, "T2");
        assert_eq!(second.trip_name, "");
        assert_eq!(second.head_sign, "");
        assert_eq!(second.route_id, "78");
    }

    #[test]
    fn test_predictions_pass_keeps_scheduled_separate() {
        let text = "\
/predictions/route/@id=78
/predictions/route/direction/@name=Inbound
/predictions/route/direction/trip/@id=T1
/predictions/route/direction/trip/@predictedArrival=1100
/predictions/route/direction/trip/@scheduledArrival=1000
/predictions/route/direction/trip/@secondsToArrival=300
/predictions/route/direction/trip
";
        let recs = records(Pass::Predictions, text);
        assert_eq!(recs.len(), 1);
        let rec = &recs[0];
        assert_eq!(rec.arrival_epoch, Some(1100));
        assert_eq!(rec.predicted_arrival_epoch, Some(1100));
        assert_eq!(rec.scheduled_arrival_epoch, Some(1000));
        assert_eq!(rec.seconds_to_arrival, Some(300));
    }

    #[test]
    fn test_schedule_pass_working_time_follows_last_time_attribute() {
        let text = "\
/schedule/route/direction/trip/@id=T1
/schedule/route/direction/trip/@predictedArrival=1100
/schedule/route/direction/trip/@scheduledArrival=1000
/schedule/route/direction/trip
";
        let recs = records(Pass::Schedule, text);
        // scheduled arrives later and overwrites the working time in the schedule pass
        assert_eq!(recs[0].arrival_epoch, Some(1000));
        assert_eq!(recs[0].predicted_arrival_epoch, None);
    }

    #[test]
    fn test_close_without_trip_id_is_noop() {
        let text = "\
/schedule/route/@id=78
/schedule/route/direction/trip/@scheduledArrival=1000
/schedule/route/direction/trip
/schedule/route/direction/trip/@id=
/schedule/route/direction/trip
/schedule/route
";
        assert!(records(Pass::Schedule, text).is_empty());
    }

    #[test]
    fn test_direction_close_flushes_open_trip() {
        let text = "\
/schedule/route/@id=78
/schedule/route/direction/@name=Outbound
/schedule/route/direction/trip/@id=T9
/schedule/route/direction
";
        let recs = records(Pass::Schedule, text);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].direction, Some(Direction::Outbound));
    }

    #[test]
    fn test_route_close_clears_route_scope() {
        let text = "\
/schedule/route/@id=78
/schedule/route/@name=Crosstown
/schedule/route/direction/@name=Inbound
/schedule/route
/schedule/route/direction/trip/@id=T1
/schedule/route/direction/trip
";
        let recs = records(Pass::Schedule, text);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].route_id, "");
        assert_eq!(recs[0].route_name, "");
        assert_eq!(recs[0].direction, None);
    }

    #[test]
    fn test_step_matches_iteration() {
        let mut acc = TripAccumulator::new(Pass::Schedule, path_values(""));
        let stepped: Vec<TripRecord> = path_values(SCHEDULE)
            .filter_map(|pair| acc.step(pair))
            .collect();
        assert_eq!(stepped, records(Pass::Schedule, SCHEDULE));
        assert_eq!(stepped.len(), 2);
    }

    #[test]
    fn test_direction_close_keeps_route() {
        let mut acc = TripAccumulator::new(Pass::Schedule, path_values(""));
        for line in [
            "/schedule/route/@id=78",
            "/schedule/route/direction/@name=Inbound",
            "/schedule/route/direction",
        ] {
            let pair = path_values(line).next().unwrap();
            assert!(acc.step(pair).is_none());
        }
        assert_eq!(acc.context().route_id.as_deref(), Some("78"));
        assert_eq!(acc.context().direction_name, None);
    }

    #[test]
    fn test_unknown_paths_are_ignored() {
        let text = "\
/schedule/route/@id=78
/schedule/alerts/alert/@text=Detour
/schedule/route/direction/trip/vehicle/@lat=37.8
/schedule/route/direction/trip/@id=T1
/schedule/route/direction/trip/@color=red
/schedule/alerts/alert
/schedule/route/direction/trip/vehicle
/schedule/route/direction/trip/@scheduledArrival=1000
/schedule/route/direction/trip
";
        let recs = records(Pass::Schedule, text);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].scheduled_arrival_epoch, Some(1000));
    }

    #[test]
    fn test_other_pass_root_is_ignored() {
        let recs = records(Pass::Predictions, SCHEDULE);
        assert!(recs.is_empty());
    }

    #[test]
    fn test_non_numeric_times_become_absent() {
        let text = "\
/predictions/route/direction/trip/@id=T1
/predictions/route/direction/trip/@predictedArrival=later
/predictions/route/direction/trip/@secondsToArrival=n/a
/predictions/route/direction/trip
";
        let recs = records(Pass::Predictions, text);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].arrival_epoch, None);
        assert_eq!(recs[0].seconds_to_arrival, None);
    }

    #[test]
    fn test_unrecognised_direction_name() {
        let text = "\
/schedule/route/direction/@name=Northbound
/schedule/route/direction/trip/@id=T1
/schedule/route/direction/trip
";
        assert_eq!(records(Pass::Schedule, text)[0].direction, None);
    }

    #[test]
    fn test_every_record_has_trip_id() {
        let text = format!("{SCHEDULE}/schedule/route/direction/trip\n/schedule/route\n");
        assert!(
            records(Pass::Schedule, &text)
                .iter()
                .all(|r| !r.trip_id.is_empty())
        );
    }

    #[test]
    fn test_level_of() {
        let t = PathTemplates::for_pass(Pass::Predictions);
        assert_eq!(t.level_of("/predictions/route"), Some(Level::Route));
        assert_eq!(
            t.level_of("/predictions/route/direction"),
            Some(Level::Direction)
        );
        assert_eq!(
            t.level_of("/predictions/route/direction/trip"),
            Some(Level::Trip)
        );
        assert_eq!(t.level_of("/schedule/route"), None);
        assert_eq!(t.level_of("/predictions"), None);
    }

    #[test]
    fn test_attribute_lookup_is_scoped() {
        assert_eq!(
            Attribute::lookup(Level::Trip, "id"),
            Some(Attribute::TripId)
        );
        assert_eq!(
            Attribute::lookup(Level::Route, "id"),
            Some(Attribute::RouteId)
        );
        assert_eq!(Attribute::lookup(Level::Direction, "id"), None);
        assert_eq!(Attribute::lookup(Level::Route, "headsign"), None);
    }
}
