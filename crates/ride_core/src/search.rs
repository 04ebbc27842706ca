//! Address search and reverse geocoding collaborators.
//!
//! Both are traits so the ranker and the UI can run against a canned
//! provider in tests; [`NominatimClient`] is the HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::geo::{BoundingBox, Coord};

pub const DEFAULT_NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(6);
const USER_AGENT: &str = concat!("ride_core/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request timed out")]
    Timeout,
    #[error("search transport error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("search provider answered HTTP {0}")]
    Status(u16),
    #[error("failed to build search request: {0}")]
    Request(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout
        } else {
            SearchError::Http(err)
        }
    }
}

/// One geocoding hit from the external search API.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub coord: Coord,
}

#[async_trait]
pub trait AddressSearchProvider: Send + Sync {
    /// Search `query` inside `region`, best hits first.
    async fn search(&self, query: &str, region: BoundingBox) -> Result<Vec<SearchHit>, SearchError>;
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Short place name for a coordinate, if the provider knows one.
    async fn place_name(&self, coord: Coord) -> Result<Option<String>, SearchError>;
}

/// Nominatim-compatible search and reverse geocoding client.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: Client,
    endpoint: String,
    limit: usize,
}

impl NominatimClient {
    pub fn new(endpoint: &str, limit: usize) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| SearchError::Request(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            limit: limit.max(1),
        })
    }

    fn search_url(&self, query: &str, region: BoundingBox) -> Result<Url, SearchError> {
        let mut url = Url::parse(&format!("{}/search", self.endpoint))
            .map_err(|err| SearchError::Request(err.to_string()))?;
        // viewbox is x1,y1,x2,y2 = left,top,right,bottom
        let viewbox = format!(
            "{},{},{},{}",
            region.min_lng, region.max_lat, region.max_lng, region.min_lat
        );
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("format", "jsonv2")
            .append_pair("limit", &self.limit.to_string())
            .append_pair("viewbox", &viewbox)
            .append_pair("bounded", "1");
        Ok(url)
    }

    fn reverse_url(&self, coord: Coord) -> Result<Url, SearchError> {
        let mut url = Url::parse(&format!("{}/reverse", self.endpoint))
            .map_err(|err| SearchError::Request(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("lat", &format!("{:.6}", coord.lat))
            .append_pair("lon", &format!("{:.6}", coord.lng))
            .append_pair("format", "jsonv2")
            .append_pair("zoom", "17");
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NominatimPlace {
    pub(crate) place_id: u64,
    pub(crate) lat: String,
    pub(crate) lon: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) display_name: String,
}

impl NominatimPlace {
    /// Title is the place name (or first display segment); subtitle is the rest.
    pub(crate) fn into_hit(self) -> Option<SearchHit> {
        let coord = Coord::new(self.lat.parse().ok()?, self.lon.parse().ok()?);
        if !coord.is_valid() {
            return None;
        }
        let mut segments = self.display_name.split(',').map(str::trim);
        let first = segments.next().unwrap_or_default().to_string();
        let title = self
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| first.clone());
        let rest: Vec<&str> = if first == title {
            segments.collect()
        } else {
            self.display_name.split(',').map(str::trim).collect()
        };
        Some(SearchHit {
            id: format!("osm-{}", self.place_id),
            title,
            subtitle: rest.join(", "),
            coord,
        })
    }
}

#[async_trait]
impl AddressSearchProvider for NominatimClient {
    async fn search(&self, query: &str, region: BoundingBox) -> Result<Vec<SearchHit>, SearchError> {
        let url = self.search_url(query, region)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }
        let places: Vec<NominatimPlace> = response.json().await?;
        Ok(places.into_iter().filter_map(NominatimPlace::into_hit).collect())
    }
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn place_name(&self, coord: Coord) -> Result<Option<String>, SearchError> {
        let url = self.reverse_url(coord)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }
        let place: NominatimReverse = response.json().await?;
        let name = place
            .name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                place
                    .display_name
                    .and_then(|d| d.split(',').next().map(|s| s.trim().to_string()))
            })
            .filter(|name| !name.is_empty());
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guayaquil() -> BoundingBox {
        BoundingBox {
            min_lat: -2.30,
            min_lng: -80.05,
            max_lat: -2.05,
            max_lng: -79.80,
        }
    }

    #[test]
    fn search_url_scopes_to_region() {
        let client = NominatimClient::new("http://localhost:8080/", 5).expect("client");
        let url = client.search_url("mall del sol", guayaquil()).expect("url");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("viewbox".to_string(), "-80.05,-2.05,-79.8,-2.3".to_string())));
        assert!(query.contains(&("bounded".to_string(), "1".to_string())));
        assert!(query.contains(&("q".to_string(), "mall del sol".to_string())));
        assert_eq!(url.path(), "/search");
    }

    #[test]
    fn place_splits_title_and_subtitle() {
        let place: NominatimPlace = serde_json::from_str(
            r#"{"place_id":42,"lat":"-2.1552","lon":"-79.8946","name":"Mall del Sol",
                "display_name":"Mall del Sol, Avenida Juan Tanca Marengo, Guayaquil"}"#,
        )
        .expect("place");
        let hit = place.into_hit().expect("hit");
        assert_eq!(hit.id, "osm-42");
        assert_eq!(hit.title, "Mall del Sol");
        assert_eq!(hit.subtitle, "Avenida Juan Tanca Marengo, Guayaquil");
        assert_eq!(hit.coord, Coord::new(-2.1552, -79.8946));
    }

    #[test]
    fn place_with_bad_coordinates_is_dropped() {
        let place: NominatimPlace = serde_json::from_str(
            r#"{"place_id":1,"lat":"north","lon":"-79.8","display_name":"Somewhere"}"#,
        )
        .expect("place");
        assert!(place.into_hit().is_none());
    }
}
