//! End-to-end processing of one stop: both passes, merge, order.

use std::fmt::Display;

use chrono::TimeZone;
use tracing::{debug, warn};

use crate::accumulator::TripAccumulator;
use crate::filter::RouteDirectionFilter;
use crate::merge::{ArrivalMap, PassMerger};
use crate::model::{Pass, StopRequest, TripRecord};
use crate::orderer::{ArrivalOrderer, StopBoard};
use crate::parser::path_values;

/// Runs one pass over `text` and keeps the trips the request asked for.
pub fn admitted_trips(request: &StopRequest, pass: Pass, text: &str) -> Vec<TripRecord> {
    let filter = RouteDirectionFilter::for_request(request);
    let mut emitted = 0usize;
    let admitted: Vec<TripRecord> = TripAccumulator::new(pass, path_values(text))
        .inspect(|_| emitted += 1)
        .filter(|record| filter.admit(record))
        .collect();
    debug!(
        stop_id = %request.stop_id,
        %pass,
        emitted,
        admitted = admitted.len(),
        "Pass accumulated"
    );
    admitted
}

/// Builds the merged mapping for a stop.
///
/// `predictions` is `None` when the predictions feed was unavailable; it is
/// also ignored when the request is schedule-only or pinned to a fixed time.
pub fn merge_stop(request: &StopRequest, schedule: &str, predictions: Option<&str>) -> ArrivalMap {
    let schedule = admitted_trips(request, Pass::Schedule, schedule);
    let predictions = predictions
        .filter(|_| request.wants_predictions())
        .map(|text| admitted_trips(request, Pass::Predictions, text));
    PassMerger::merge(schedule, predictions)
}

/// Produces the rendered board for a stop.
pub fn process_stop<Tz>(
    request: &StopRequest,
    schedule: &str,
    predictions: Option<&str>,
    tz: &Tz,
) -> StopBoard
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let map = merge_stop(request, schedule, predictions);
    let orderer = ArrivalOrderer::new(request.effective_now(), request.show_lateness);
    let board = orderer.render(request.display_label(), &map, tz);
    if board.skipped > 0 {
        warn!(
            stop_id = %request.stop_id,
            skipped = board.skipped,
            "Skipped arrivals without a usable time"
        );
    }
    board
}
