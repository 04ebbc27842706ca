//! Wire contract for `POST /eta`.
//!
//! Body: `{startLat, startLng, endLat, endLng, mode?}`. Coordinates may be
//! JSON numbers or numeric strings; anything else is a validation error.
//! `mode` defaults to `car`.

use ride_core::eta::EtaRequest;
use ride_core::geo::Coord;
use ride_core::speed::VehicleMode;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Body of every non-2xx JSON response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthBody {
    pub ok: bool,
    /// `"up"` or `"down"`.
    pub osrm: &'static str,
}

fn numeric_field(body: &Map<String, Value>, name: &str) -> Result<f64, ValidationError> {
    let value = match body.get(name) {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(Value::Null) | None => {
            return Err(ValidationError::new(format!("{name} is required")));
        }
        Some(_) => None,
    };
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::new(format!("{name} must be numeric")))
}

fn coordinate(body: &Map<String, Value>, lat: &str, lng: &str) -> Result<Coord, ValidationError> {
    let coord = Coord::new(numeric_field(body, lat)?, numeric_field(body, lng)?);
    if coord.is_valid() {
        Ok(coord)
    } else {
        Err(ValidationError::new(format!(
            "{lat}/{lng} out of range (lat -90..90, lng -180..180)"
        )))
    }
}

/// Validate a decoded JSON body into an [`EtaRequest`].
pub fn parse_eta_request(body: &Value) -> Result<EtaRequest, ValidationError> {
    let Some(object) = body.as_object() else {
        return Err(ValidationError::new("request body must be a JSON object"));
    };

    let start = coordinate(object, "startLat", "startLng")?;
    let end = coordinate(object, "endLat", "endLng")?;
    let mode = match object.get("mode") {
        None | Some(Value::Null) => VehicleMode::default(),
        Some(Value::String(mode)) => mode.parse::<VehicleMode>().map_err(ValidationError::new)?,
        Some(_) => return Err(ValidationError::new("mode must be a string")),
    };

    Ok(EtaRequest { start, end, mode })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_numbers_and_defaults_mode() {
        let request = parse_eta_request(&json!({
            "startLat": -2.1552,
            "startLng": -79.8946,
            "endLat": -2.1815,
            "endLng": -79.8765
        }))
        .expect("valid");
        assert_eq!(request.start, Coord::new(-2.1552, -79.8946));
        assert_eq!(request.end, Coord::new(-2.1815, -79.8765));
        assert_eq!(request.mode, VehicleMode::Car);
    }

    #[test]
    fn accepts_numeric_strings() {
        let request = parse_eta_request(&json!({
            "startLat": "-2.1552",
            "startLng": " -79.8946 ",
            "endLat": -2.1815,
            "endLng": -79.8765,
            "mode": "Moto"
        }))
        .expect("valid");
        assert_eq!(request.start.lng, -79.8946);
        assert_eq!(request.mode, VehicleMode::Moto);
    }

    #[test]
    fn rejects_non_numeric_coordinates() {
        let err = parse_eta_request(&json!({
            "startLat": "north",
            "startLng": -79.8946,
            "endLat": -2.1815,
            "endLng": -79.8765
        }))
        .expect_err("invalid");
        assert_eq!(err.message(), "startLat must be numeric");

        let err = parse_eta_request(&json!({
            "startLat": -2.1552,
            "startLng": [1, 2],
            "endLat": -2.1815,
            "endLng": -79.8765
        }))
        .expect_err("invalid");
        assert_eq!(err.message(), "startLng must be numeric");
    }

    #[test]
    fn rejects_missing_and_out_of_range_fields() {
        let err = parse_eta_request(&json!({
            "startLat": -2.1552,
            "startLng": -79.8946,
            "endLat": -2.1815
        }))
        .expect_err("missing");
        assert_eq!(err.message(), "endLng is required");

        let err = parse_eta_request(&json!({
            "startLat": 95.0,
            "startLng": -79.8946,
            "endLat": -2.1815,
            "endLng": -79.8765
        }))
        .expect_err("range");
        assert!(err.message().contains("out of range"));
    }

    #[test]
    fn rejects_unknown_mode_and_non_objects() {
        let err = parse_eta_request(&json!({
            "startLat": -2.1552,
            "startLng": -79.8946,
            "endLat": -2.1815,
            "endLng": -79.8765,
            "mode": "bike"
        }))
        .expect_err("mode");
        assert!(err.message().contains("unknown mode"));

        assert!(parse_eta_request(&json!([1, 2, 3])).is_err());
    }
}
