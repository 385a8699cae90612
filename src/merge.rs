//! Merges the schedule and predictions passes of one stop by trip id.

use std::collections::HashMap;

use crate::model::TripRecord;

/// Merged per-trip state for one stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalEntry {
    pub trip_id: String,
    pub route_name: String,
    pub head_sign: String,
    /// Predicted time when a prediction was merged, else scheduled.
    pub arrival_epoch: Option<i64>,
    /// Scheduled time as reported by the schedule pass only.
    pub scheduled_arrival_epoch: Option<i64>,
    pub seconds_to_arrival: Option<i64>,
    /// Set once a valid predicted arrival has replaced the scheduled one.
    pub predicted: bool,
}

impl ArrivalEntry {
    fn from_record(record: &TripRecord) -> Self {
        Self {
            trip_id: record.trip_id.clone(),
            route_name: route_label(record),
            head_sign: record.head_sign.clone(),
            arrival_epoch: None,
            scheduled_arrival_epoch: None,
            seconds_to_arrival: None,
            predicted: false,
        }
    }
}

fn route_label(record: &TripRecord) -> String {
    if record.route_name.is_empty() {
        record.route_id.clone()
    } else {
        record.route_name.clone()
    }
}

/// Insertion-ordered `trip_id -> ArrivalEntry` mapping.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArrivalMap {
    entries: Vec<ArrivalEntry>,
    index: HashMap<String, usize>,
}

impl ArrivalMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, trip_id: &str) -> Option<&ArrivalEntry> {
        self.index.get(trip_id).map(|&i| &self.entries[i])
    }

    /// Entries in the order their trip ids were first seen.
    pub fn iter(&self) -> impl Iterator<Item = &ArrivalEntry> {
        self.entries.iter()
    }

    fn entry(&mut self, record: &TripRecord) -> &mut ArrivalEntry {
        let existing = self.index.get(&record.trip_id).copied();
        let idx = match existing {
            Some(idx) => idx,
            None => {
                self.entries.push(ArrivalEntry::from_record(record));
                let idx = self.entries.len() - 1;
                self.index.insert(record.trip_id.clone(), idx);
                idx
            }
        };
        &mut self.entries[idx]
    }

    /// Records a schedule-pass trip. A repeated trip id refreshes the entry
    /// in place without changing its position.
    pub fn apply_schedule(&mut self, record: &TripRecord) {
        let entry = self.entry(record);
        entry.route_name = route_label(record);
        entry.head_sign = record.head_sign.clone();
        entry.scheduled_arrival_epoch = record.scheduled_arrival_epoch;
        entry.arrival_epoch = record.scheduled_arrival_epoch;
        entry.seconds_to_arrival = None;
        entry.predicted = false;
    }

    /// Overlays a predictions-pass trip onto its schedule entry, creating
    /// one if the schedule pass never saw this trip.
    pub fn apply_prediction(&mut self, record: &TripRecord) {
        let entry = self.entry(record);
        if entry.route_name.is_empty() {
            entry.route_name = route_label(record);
        }
        if entry.head_sign.is_empty() {
            entry.head_sign = record.head_sign.clone();
        }
        if let Some(predicted) = record.predicted_arrival_epoch {
            entry.arrival_epoch = Some(predicted);
            entry.predicted = true;
        }
        entry.seconds_to_arrival = record.seconds_to_arrival;
    }
}

/// Builds a fresh [`ArrivalMap`] from the admitted records of both passes.
pub struct PassMerger;

impl PassMerger {
    /// Schedule records are applied first, then predictions if the pass ran.
    pub fn merge<S, P>(schedule: S, predictions: Option<P>) -> ArrivalMap
    where
        S: IntoIterator<Item = TripRecord>,
        P: IntoIterator<Item = TripRecord>,
    {
        let mut map = ArrivalMap::default();
        for record in schedule {
            map.apply_schedule(&record);
        }
        for record in predictions.into_iter().flatten() {
            map.apply_prediction(&record);
        }
        map
    }
}
