//! Address relevance ranking for the destination search box.
//!
//! Candidates come from saved places, trip history and the external search
//! API, merged in that order and scored with
//!
//! ```text
//! score = 1000 - 10 * distance_km_from_user
//!       + 500 if title/subtitle contains a high-value keyword
//!       + 200 if title starts with the query (case-insensitive)
//! ```
//!
//! then sorted by descending score. The sort is stable, so equal scores keep
//! merge order.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::geo::{haversine_km, parse_coordinate_pair, BoundingBox, Coord};
use crate::search::{AddressSearchProvider, ReverseGeocoder};

pub const BASE_SCORE: f64 = 1000.0;
pub const DISTANCE_PENALTY_PER_KM: f64 = 10.0;
pub const KEYWORD_BONUS: f64 = 500.0;
pub const PREFIX_BONUS: f64 = 200.0;

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceKind {
    Api,
    History,
    Saved,
    Coord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressCandidate {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub lat: f64,
    pub lng: f64,
    pub source_kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl AddressCandidate {
    pub fn coord(&self) -> Coord {
        Coord::new(self.lat, self.lng)
    }
}

/// A rider's saved place ("Home", "Work", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPlace {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    /// Extra names the place answers to ("casa", "office").
    #[serde(default)]
    pub aliases: Vec<String>,
    pub coord: Coord,
}

/// A destination from the rider's past trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub coord: Coord,
}

/// Rider-specific inputs for one ranking call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingContext<'a> {
    pub user_location: Option<Coord>,
    pub saved_places: &'a [SavedPlace],
    pub history: &'a [HistoryEntry],
}

#[derive(Debug, Clone)]
pub struct RankerConfig {
    /// Queries shorter than this (in chars, after trimming) return nothing.
    pub min_query_len: usize,
    /// Region the external search is scoped to.
    pub search_region: BoundingBox,
    pub high_value_keywords: Vec<String>,
    pub search_timeout: Duration,
    pub reverse_geocode_timeout: Duration,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            min_query_len: 3,
            // Greater Guayaquil
            search_region: BoundingBox {
                min_lat: -2.35,
                min_lng: -80.10,
                max_lat: -1.95,
                max_lng: -79.75,
            },
            high_value_keywords: ["aeropuerto", "airport", "terminal", "mall", "hospital", "universidad"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            search_timeout: Duration::from_secs(6),
            reverse_geocode_timeout: Duration::from_secs(3),
        }
    }
}

/// Score one candidate for `query`. `query_lower` must already be lowercased;
/// keywords match case-insensitively.
pub fn score_candidate(candidate: &AddressCandidate, query_lower: &str, keywords: &[String]) -> f64 {
    let title = candidate.title.to_lowercase();
    let subtitle = candidate.subtitle.to_lowercase();
    let mut score = BASE_SCORE - DISTANCE_PENALTY_PER_KM * candidate.distance_km.unwrap_or(0.0);
    if keywords.iter().any(|k| {
        let k = k.to_lowercase();
        title.contains(&k) || subtitle.contains(&k)
    }) {
        score += KEYWORD_BONUS;
    }
    if !query_lower.is_empty() && title.starts_with(query_lower) {
        score += PREFIX_BONUS;
    }
    score
}

/// Attach distance and score to each candidate, then sort best first.
pub fn rank_candidates(
    mut candidates: Vec<AddressCandidate>,
    query: &str,
    user_location: Option<Coord>,
    keywords: &[String],
) -> Vec<AddressCandidate> {
    let query_lower = query.trim().to_lowercase();
    for candidate in &mut candidates {
        candidate.distance_km = user_location.map(|user| haversine_km(user, candidate.coord()));
        candidate.score = Some(score_candidate(candidate, &query_lower, keywords));
    }
    candidates.sort_by(|a, b| {
        let a = a.score.unwrap_or(f64::MIN);
        let b = b.score.unwrap_or(f64::MIN);
        b.total_cmp(&a)
    });
    candidates
}

fn matches_text(query_lower: &str, fields: &[&str]) -> bool {
    fields
        .iter()
        .any(|field| field.to_lowercase().contains(query_lower))
}

pub struct AddressRanker {
    search: Arc<dyn AddressSearchProvider>,
    reverse: Option<Arc<dyn ReverseGeocoder>>,
    config: RankerConfig,
}

impl AddressRanker {
    pub fn new(search: Arc<dyn AddressSearchProvider>, config: RankerConfig) -> Self {
        Self {
            search,
            reverse: None,
            config,
        }
    }

    /// Use `reverse` to title literal-coordinate candidates.
    pub fn with_reverse_geocoder(mut self, reverse: Arc<dyn ReverseGeocoder>) -> Self {
        self.reverse = Some(reverse);
        self
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Build the ranked candidate list for the current search-box text.
    ///
    /// Search-provider failures and timeouts degrade to local candidates only.
    pub async fn rank(&self, input: &str, ctx: RankingContext<'_>) -> Vec<AddressCandidate> {
        let query = input.trim();

        if let Some(coord) = parse_coordinate_pair(query) {
            return vec![self.coordinate_candidate(coord, ctx.user_location).await];
        }
        if query.chars().count() < self.config.min_query_len {
            return Vec::new();
        }

        let query_lower = query.to_lowercase();
        let mut candidates = Vec::new();

        for place in ctx.saved_places {
            let mut fields: Vec<&str> = vec![&place.title, &place.subtitle];
            fields.extend(place.aliases.iter().map(String::as_str));
            if matches_text(&query_lower, &fields) {
                candidates.push(AddressCandidate {
                    id: format!("saved-{}", place.id),
                    title: place.title.clone(),
                    subtitle: place.subtitle.clone(),
                    lat: place.coord.lat,
                    lng: place.coord.lng,
                    source_kind: SourceKind::Saved,
                    distance_km: None,
                    score: None,
                });
            }
        }

        for entry in ctx.history {
            if matches_text(&query_lower, &[&entry.title, &entry.subtitle]) {
                candidates.push(AddressCandidate {
                    id: format!("history-{}", entry.id),
                    title: entry.title.clone(),
                    subtitle: entry.subtitle.clone(),
                    lat: entry.coord.lat,
                    lng: entry.coord.lng,
                    source_kind: SourceKind::History,
                    distance_km: None,
                    score: None,
                });
            }
        }

        let search = tokio::time::timeout(
            self.config.search_timeout,
            self.search.search(query, self.config.search_region),
        )
        .await;
        match search {
            Ok(Ok(hits)) => {
                debug!(query, hits = hits.len(), "address search returned");
                candidates.extend(hits.into_iter().map(|hit| AddressCandidate {
                    id: hit.id,
                    title: hit.title,
                    subtitle: hit.subtitle,
                    lat: hit.coord.lat,
                    lng: hit.coord.lng,
                    source_kind: SourceKind::Api,
                    distance_km: None,
                    score: None,
                }));
            }
            Ok(Err(err)) => warn!(query, error = %err, "address search failed; using local candidates"),
            Err(_) => warn!(query, "address search timed out; using local candidates"),
        }

        rank_candidates(candidates, query, ctx.user_location, &self.config.high_value_keywords)
    }

    async fn coordinate_candidate(&self, coord: Coord, user_location: Option<Coord>) -> AddressCandidate {
        let formatted = format!("{:.5}, {:.5}", coord.lat, coord.lng);
        let mut title = formatted.clone();
        if let Some(reverse) = &self.reverse {
            match tokio::time::timeout(self.config.reverse_geocode_timeout, reverse.place_name(coord)).await {
                Ok(Ok(Some(name))) => title = name,
                Ok(Ok(None)) => {}
                Ok(Err(err)) => debug!(error = %err, "reverse geocode failed"),
                Err(_) => debug!("reverse geocode timed out"),
            }
        }
        AddressCandidate {
            id: "coord".to_string(),
            title,
            subtitle: formatted,
            lat: coord.lat,
            lng: coord.lng,
            source_kind: SourceKind::Coord,
            distance_km: user_location.map(|user| haversine_km(user, coord)),
            score: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, subtitle: &str, coord: Coord) -> AddressCandidate {
        AddressCandidate {
            id: title.to_lowercase(),
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            lat: coord.lat,
            lng: coord.lng,
            source_kind: SourceKind::Api,
            distance_km: None,
            score: None,
        }
    }

    fn keywords() -> Vec<String> {
        RankerConfig::default().high_value_keywords
    }

    #[test]
    fn score_applies_each_weight_exactly() {
        let mut c = candidate("Mall del Sol", "Guayaquil", Coord::new(0.0, 0.0));
        c.distance_km = Some(2.5);
        // 1000 - 25 + 500 (mall) + 200 (prefix "mal")
        assert_eq!(score_candidate(&c, "mal", &keywords()), 1675.0);
        assert_eq!(score_candidate(&c, "sol", &keywords()), 1475.0);

        let plain = candidate("Calle 10", "Centro", Coord::new(0.0, 0.0));
        assert_eq!(score_candidate(&plain, "xyz", &keywords()), 1000.0);
    }

    #[test]
    fn keyword_in_subtitle_counts() {
        let c = candidate("Puerta 3", "Aeropuerto José Joaquín de Olmedo", Coord::new(0.0, 0.0));
        assert_eq!(score_candidate(&c, "pue", &keywords()), 1700.0);
    }

    #[test]
    fn mixed_case_keywords_still_earn_the_bonus() {
        let ranked = rank_candidates(
            vec![candidate("Aeropuerto JJO", "Guayaquil", Coord::new(0.0, 0.0))],
            "jjo",
            None,
            &["Aeropuerto".to_string()],
        );
        assert_eq!(ranked[0].score, Some(1500.0));
    }

    #[test]
    fn rank_sorts_descending_and_keeps_merge_order_on_ties() {
        let user = Coord::new(-2.17, -79.90);
        let ranked = rank_candidates(
            vec![
                candidate("Farmacia Uno", "Centro", user),
                candidate("Farmacia Dos", "Centro", user),
                candidate("Hospital Luis Vernaza", "Centro", user.offset(0.05, 0.0)),
            ],
            "zzz",
            Some(user),
            &keywords(),
        );
        assert_eq!(ranked[0].title, "Hospital Luis Vernaza");
        assert_eq!(ranked[1].title, "Farmacia Uno");
        assert_eq!(ranked[2].title, "Farmacia Dos");
        assert_eq!(ranked[1].distance_km, Some(0.0));
    }

    #[test]
    fn unknown_user_location_skips_distance_penalty() {
        let ranked = rank_candidates(
            vec![candidate("Parque", "Centro", Coord::new(10.0, 10.0))],
            "par",
            None,
            &keywords(),
        );
        assert_eq!(ranked[0].distance_km, None);
        assert_eq!(ranked[0].score, Some(1200.0));
    }
}
