use std::collections::HashSet;

use tracing::debug;

use crate::model::{Direction, StopRequest, TripRecord};

/// Admits trips on one of the caller's routes heading in the wanted direction.
#[derive(Debug, Clone)]
pub struct RouteDirectionFilter<'a> {
    interest_routes: &'a HashSet<String>,
    wanted: Direction,
}

impl<'a> RouteDirectionFilter<'a> {
    pub fn new(interest_routes: &'a HashSet<String>, wanted: Direction) -> Self {
        Self {
            interest_routes,
            wanted,
        }
    }

    pub fn for_request(request: &'a StopRequest) -> Self {
        Self::new(&request.interest_routes, request.direction)
    }

    pub fn admit(&self, record: &TripRecord) -> bool {
        let admitted = self.interest_routes.contains(&record.route_id)
            && record.direction == Some(self.wanted);
        if !admitted {
            debug!(
                trip_id = %record.trip_id,
                route_id = %record.route_id,
                direction = ?record.direction,
                "Dropping trip outside interest set"
            );
        }
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Pass;

    fn record(trip_id: &str, route_id: &str, direction: Option<Direction>) -> TripRecord {
        TripRecord {
            pass: Pass::Schedule,
            route_id: route_id.to_string(),
            route_name: route_id.to_string(),
            direction,
            trip_id: trip_id.to_string(),
            trip_name: String::new(),
            head_sign: String::new(),
            scheduled_arrival_epoch: Some(1000),
            arrival_epoch: Some(1000),
            predicted_arrival_epoch: None,
            seconds_to_arrival: None,
        }
    }

    fn routes(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_admits_matching_route_and_direction() {
        let interest = routes(&["78", "62"]);
        let filter = RouteDirectionFilter::new(&interest, Direction::Inbound);
        assert!(filter.admit(&record("T1", "78", Some(Direction::Inbound))));
        assert!(filter.admit(&record("T2", "62", Some(Direction::Inbound))));
    }

    #[test]
    fn test_rejects_other_route() {
        let interest = routes(&["78"]);
        let filter = RouteDirectionFilter::new(&interest, Direction::Inbound);
        assert!(!filter.admit(&record("T1", "62", Some(Direction::Inbound))));
    }

    #[test]
    fn test_rejects_other_or_unknown_direction() {
        let interest = routes(&["78"]);
        let filter = RouteDirectionFilter::new(&interest, Direction::Inbound);
        assert!(!filter.admit(&record("T1", "78", Some(Direction::Outbound))));
        assert!(!filter.admit(&record("T1", "78", None)));
    }

    #[test]
    fn test_admission_ignores_input_order() {
        let interest = routes(&["78"]);
        let filter = RouteDirectionFilter::new(&interest, Direction::Outbound);
        let mut recs = vec![
            record("T1", "78", Some(Direction::Outbound)),
            record("T2", "62", Some(Direction::Outbound)),
            record("T3", "78", Some(Direction::Inbound)),
            record("T4", "78", Some(Direction::Outbound)),
        ];
        let forward: HashSet<_> = recs
            .iter()
            .filter(|r| filter.admit(r))
            .map(|r| r.trip_id.clone())
            .collect();
        recs.reverse();
        let backward: HashSet<_> = recs
            .iter()
            .filter(|r| filter.admit(r))
            .map(|r| r.trip_id.clone())
            .collect();
        assert_eq!(forward, backward);
        assert_eq!(forward, routes(&["T1", "T4"]));
    }
}
