//! Trait for the upstream transit feed service.

use anyhow::Result;
use bus_arrivals::Direction;
use bus_arrivals::listing::Listing;

/// Abstraction over the upstream service that serves flattened feeds.
///
/// Every method returns raw feed text except the catalogue listings, which
/// are parsed since nothing downstream needs the raw form.
#[async_trait::async_trait]
pub trait TransitApi: Send + Sync {
    /// Scheduled arrivals at `stop_id`.
    async fn schedule(&self, stop_id: &str) -> Result<String>;

    /// Real-time predictions at `stop_id`.
    async fn predictions(&self, stop_id: &str) -> Result<String>;

    async fn list_routes(&self) -> Result<Vec<Listing>>;

    async fn list_stops(&self, route_id: &str, direction: Direction) -> Result<Vec<Listing>>;
}
