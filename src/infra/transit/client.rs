use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bus_arrivals::Direction;
use bus_arrivals::fetch::{HttpClient, RetryPolicy, fetch_text_with_retry};
use bus_arrivals::listing::{Listing, parse_routes, parse_stops};
use reqwest::Url;
use tracing::info;

use crate::services::transit_api::TransitApi;

/// HTTP client for a flattened-feed transit service rooted at `base_url`.
///
/// Endpoints: `schedule?stop=`, `predictions?stop=`, `routes`,
/// `stops?route=&direction=`.
pub struct TransitFeedClient {
    base_url: Url,
    http: Arc<dyn HttpClient>,
    retry: RetryPolicy,
}

impl TransitFeedClient {
    pub fn new(base_url: &str, http: Arc<dyn HttpClient>) -> Result<Self> {
        let mut base_url: Url = base_url
            .parse()
            .with_context(|| format!("invalid base URL '{base_url}'"))?;
        // `Url::join` replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            http,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let url = self.endpoint(path, query)?;
        fetch_text_with_retry(self.http.as_ref(), url.as_str(), self.retry).await
    }
}

#[async_trait]
impl TransitApi for TransitFeedClient {
    async fn schedule(&self, stop_id: &str) -> Result<String> {
        self.get("schedule", &[("stop", stop_id)]).await
    }

    async fn predictions(&self, stop_id: &str) -> Result<String> {
        self.get("predictions", &[("stop", stop_id)]).await
    }

    async fn list_routes(&self) -> Result<Vec<Listing>> {
        let text = self.get("routes", &[]).await?;
        let routes = parse_routes(&text);
        info!(total = routes.len(), "Route list fetched");
        Ok(routes)
    }

    async fn list_stops(&self, route_id: &str, direction: Direction) -> Result<Vec<Listing>> {
        let text = self
            .get(
                "stops",
                &[("route", route_id), ("direction", direction.as_str())],
            )
            .await?;
        let stops = parse_stops(&text);
        info!(total = stops.len(), route_id, %direction, "Stop list fetched");
        Ok(stops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records requested URLs and answers every request with `body`.
    struct Echo {
        body: &'static str,
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpClient for Echo {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.urls.lock().unwrap().push(req.url().to_string());
            let resp = http::Response::builder().status(200).body(self.body).unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    fn client(base: &str, body: &'static str) -> (TransitFeedClient, Arc<Echo>) {
        let echo = Arc::new(Echo {
            body,
            urls: Mutex::new(Vec::new()),
        });
        let client = TransitFeedClient::new(base, echo.clone()).unwrap();
        (client, echo)
    }

    #[tokio::test]
    async fn test_schedule_url_keeps_base_path() {
        let (client, echo) = client("https://feeds.test/v1", "");
        client.schedule("51").await.unwrap();
        client.predictions("51 A").await.unwrap();
        let urls = echo.urls.lock().unwrap().clone();
        assert_eq!(
            urls,
            vec![
                "https://feeds.test/v1/schedule?stop=51".to_string(),
                "https://feeds.test/v1/predictions?stop=51+A".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_routes_parses_catalogue() {
        let (client, echo) = client(
            "https://feeds.test/",
            "/routes/route/@id=78\n/routes/route/@name=Crosstown\n/routes/route\n",
        );
        let routes = client.list_routes().await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].name, "Crosstown");
        assert_eq!(echo.urls.lock().unwrap()[0], "https://feeds.test/routes");
    }

    #[tokio::test]
    async fn test_list_stops_query() {
        let (client, echo) = client("https://feeds.test/", "");
        let stops = client.list_stops("78", Direction::Outbound).await.unwrap();
        assert!(stops.is_empty());
        assert_eq!(
            echo.urls.lock().unwrap()[0],
            "https://feeds.test/stops?route=78&direction=Outbound"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let echo: Arc<dyn HttpClient> = Arc::new(Echo {
            body: "",
            urls: Mutex::new(Vec::new()),
        });
        assert!(TransitFeedClient::new("feeds without scheme", echo).is_err());
    }
}
