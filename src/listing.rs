//! Route and stop catalogues, delivered in the same flattened format as
//! arrivals (`/routes/route/@id`, `/stops/stop/@name`, ...).

use serde::Serialize;

use crate::parser::path_values;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub id: String,
    pub name: String,
}

/// Collects the `@id`/`@name` objects found at `object_path`.
///
/// Objects close on a bare `object_path` line; objects without an id are
/// dropped.
pub fn parse_listing(text: &str, object_path: &str) -> Vec<Listing> {
    let mut listings = Vec::new();
    let mut id: Option<String> = None;
    let mut name: Option<String> = None;

    for pair in path_values(text) {
        match pair.attribute() {
            Some((object, "id")) if object == object_path => id = Some(pair.value.to_string()),
            Some((object, "name")) if object == object_path => {
                name = Some(pair.value.to_string())
            }
            Some(_) => {}
            None if pair.path == object_path => {
                let name = name.take();
                if let Some(id) = id.take().filter(|id| !id.is_empty()) {
                    listings.push(Listing {
                        name: name.unwrap_or_else(|| id.clone()),
                        id,
                    });
                }
            }
            None => {}
        }
    }

    listings
}

pub fn parse_routes(text: &str) -> Vec<Listing> {
    parse_listing(text, "/routes/route")
}

pub fn parse_stops(text: &str) -> Vec<Listing> {
    parse_listing(text, "/stops/stop")
}
