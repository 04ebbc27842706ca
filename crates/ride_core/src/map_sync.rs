//! Map synchronization: keeps markers, the route line and the camera
//! consistent with the trip.
//!
//! [`MapSync`] is fed a [`MapFrame`] snapshot and answers with the
//! [`MapCommand`]s a renderer must apply. Route drawing tries the routing
//! provider first and falls back to a dashed straight line labelled with the
//! great-circle distance; the fallback path never fails.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::QuantizedLeg;
use crate::ecs::TripStatus;
use crate::geo::{haversine_km, BoundingBox, Coord};
use crate::routing::RouteProvider;

/// One driver as the map should show it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverMarker {
    pub id: String,
    pub coord: Coord,
    pub assigned: bool,
}

/// What the map needs to know about the trip at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapFrame {
    pub status: TripStatus,
    pub pickup: Coord,
    pub destination: Option<Coord>,
    pub drivers: Vec<DriverMarker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStyle {
    Candidate,
    /// Drawn above and larger than candidates.
    Assigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    Solid,
    Dashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Provider,
    StraightLine,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLine {
    pub points: Vec<Coord>,
    pub style: LineStyle,
    pub label: Option<String>,
    pub distance_km: f64,
    pub source: RouteSource,
}

/// Renderer instruction. `DrawRoute` replaces any route already on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MapCommand {
    UpsertMarker {
        id: String,
        coord: Coord,
        style: MarkerStyle,
    },
    RemoveMarker {
        id: String,
    },
    DrawRoute(RouteLine),
    ClearRoute,
    FitBounds(BoundingBox),
}

#[derive(Debug, Clone, Copy)]
pub struct MapSyncConfig {
    /// Bound on one routing-provider call before the straight-line fallback.
    pub route_timeout: Duration,
    /// Degrees added around the fitted points.
    pub camera_padding_deg: f64,
    /// Decimal places used to decide whether the route endpoints moved.
    pub route_key_precision: u32,
}

impl Default for MapSyncConfig {
    fn default() -> Self {
        Self {
            route_timeout: Duration::from_secs(4),
            camera_padding_deg: 0.005,
            route_key_precision: 4,
        }
    }
}

/// The two points the route and camera should frame for the current phase:
/// driver and pickup while en route, driver and destination while in
/// progress, pickup and destination while planning.
pub fn relevant_pair(frame: &MapFrame) -> Option<(Coord, Coord)> {
    let assigned = frame.drivers.iter().find(|d| d.assigned).map(|d| d.coord);
    match frame.status {
        TripStatus::DriverAssigned => Some((assigned?, frame.pickup)),
        TripStatus::InProgress => Some((assigned?, frame.destination?)),
        TripStatus::Idle | TripStatus::Estimating | TripStatus::Choosing | TripStatus::Searching => {
            Some((frame.pickup, frame.destination?))
        }
        TripStatus::Completed | TripStatus::Cancelled => None,
    }
}

/// Dashed straight line labelled with the great-circle distance.
pub fn straight_line(from: Coord, to: Coord) -> RouteLine {
    let distance_km = haversine_km(from, to);
    RouteLine {
        points: vec![from, to],
        style: LineStyle::Dashed,
        label: Some(format!("{distance_km:.1} km")),
        distance_km,
        source: RouteSource::StraightLine,
    }
}

pub struct MapSync {
    routes: Arc<dyn RouteProvider>,
    config: MapSyncConfig,
    markers: BTreeMap<String, (Coord, MarkerStyle)>,
    route: Option<(QuantizedLeg, RouteSource)>,
}

impl MapSync {
    pub fn new(routes: Arc<dyn RouteProvider>, config: MapSyncConfig) -> Self {
        Self {
            routes,
            config,
            markers: BTreeMap::new(),
            route: None,
        }
    }

    /// Diff driver markers against what is on screen.
    ///
    /// Once a driver is assigned only that driver is shown. Stale ids are
    /// removed first, then new or moved markers are upserted.
    pub fn sync_markers(&mut self, frame: &MapFrame) -> Vec<MapCommand> {
        let has_assigned = frame.drivers.iter().any(|d| d.assigned);
        let wanted: Vec<(&DriverMarker, MarkerStyle)> = frame
            .drivers
            .iter()
            .filter(|d| !has_assigned || d.assigned)
            .map(|d| {
                let style = if d.assigned {
                    MarkerStyle::Assigned
                } else {
                    MarkerStyle::Candidate
                };
                (d, style)
            })
            .collect();

        let mut commands = Vec::new();
        let stale: Vec<String> = self
            .markers
            .keys()
            .filter(|id| !wanted.iter().any(|(d, _)| &d.id == *id))
            .cloned()
            .collect();
        for id in stale {
            self.markers.remove(&id);
            commands.push(MapCommand::RemoveMarker { id });
        }

        for (driver, style) in wanted {
            let current = (driver.coord, style);
            if self.markers.get(&driver.id) == Some(&current) {
                continue;
            }
            self.markers.insert(driver.id.clone(), current);
            commands.push(MapCommand::UpsertMarker {
                id: driver.id.clone(),
                coord: driver.coord,
                style,
            });
        }
        commands
    }

    /// Camera bounds for the current phase, or `None` when nothing is relevant.
    pub fn fit_camera(&self, frame: &MapFrame) -> Option<MapCommand> {
        let (a, b) = relevant_pair(frame)?;
        let bounds = BoundingBox::from_points(&[a, b])?;
        Some(MapCommand::FitBounds(bounds.padded(self.config.camera_padding_deg)))
    }

    /// Redraw the route when the relevant endpoints changed.
    ///
    /// Returns no command when the quantized endpoints match a provider route
    /// already on screen, `ClearRoute` when no pair is relevant any more. A
    /// straight-line fallback is retried against the provider on every call.
    pub async fn sync_route(&mut self, frame: &MapFrame) -> Option<MapCommand> {
        let Some((from, to)) = relevant_pair(frame) else {
            return self.route.take().map(|_| MapCommand::ClearRoute);
        };
        let key = QuantizedLeg::with_precision(from, to, self.config.route_key_precision);
        if self.route == Some((key, RouteSource::Provider)) {
            return None;
        }
        let line = self.draw_route(from, to).await;
        self.route = Some((key, line.source));
        Some(MapCommand::DrawRoute(line))
    }

    /// Route line between two points; never fails.
    pub async fn draw_route(&self, from: Coord, to: Coord) -> RouteLine {
        match tokio::time::timeout(self.config.route_timeout, self.routes.route(from, to)).await {
            Ok(Ok(route)) if route.geometry.len() >= 2 => RouteLine {
                points: route.geometry,
                style: LineStyle::Solid,
                label: None,
                distance_km: route.distance_km,
                source: RouteSource::Provider,
            },
            Ok(Ok(_)) => {
                debug!("route provider returned no geometry; drawing straight line");
                straight_line(from, to)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "route provider failed; drawing straight line");
                straight_line(from, to)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.route_timeout.as_millis() as u64,
                    "route provider timed out; drawing straight line"
                );
                straight_line(from, to)
            }
        }
    }

    /// Markers, then route, then camera.
    pub async fn sync(&mut self, frame: &MapFrame) -> Vec<MapCommand> {
        let mut commands = self.sync_markers(frame);
        commands.extend(self.sync_route(frame).await);
        commands.extend(self.fit_camera(frame));
        commands
    }
}
