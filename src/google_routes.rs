//! Google Routes API adapter (`distanceMatrix/v2:computeRouteMatrix`).
//!
//! The API answers with one element per origin/destination pair. An element
//! whose `status.code` is non-zero, or whose `condition` is
//! `ROUTE_NOT_FOUND`, becomes a failed [`MatrixEntry`].

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::matrix::{MatrixEntry, MatrixError};
use crate::traits::DistanceMatrixProvider;
use crate::waypoint::Location;

pub const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

const DEFAULT_ENDPOINT: &str =
    "https://routes.googleapis.com/distanceMatrix/v2:computeRouteMatrix";
const FIELD_MASK: &str = "originIndex,destinationIndex,status,condition,distanceMeters,duration";

#[derive(Debug, Clone)]
pub struct GoogleRoutesConfig {
    pub api_key: String,
    pub endpoint: String,
    pub travel_mode: String,
    pub timeout_secs: u64,
}

impl GoogleRoutesConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            travel_mode: "DRIVE".to_string(),
            timeout_secs: 15,
        }
    }

    /// Reads the API key from `GOOGLE_MAPS_API_KEY`.
    pub fn from_env() -> Result<Self, MatrixError> {
        match env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(MatrixError::MissingApiKey),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleRoutesClient {
    config: GoogleRoutesConfig,
    client: reqwest::blocking::Client,
}

impl GoogleRoutesClient {
    pub fn new(config: GoogleRoutesConfig) -> Result<Self, MatrixError> {
        if config.api_key.trim().is_empty() {
            return Err(MatrixError::MissingApiKey);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

impl DistanceMatrixProvider for GoogleRoutesClient {
    fn compute_matrix(&self, points: &[Location]) -> Result<Vec<MatrixEntry>, MatrixError> {
        if points.is_empty() {
            return Err(MatrixError::EmptyInput);
        }

        let request = RouteMatrixRequest::new(points, &self.config.travel_mode);
        debug!(points = points.len(), "requesting Google route matrix");

        let elements = self
            .client
            .post(&self.config.endpoint)
            .header("X-Goog-Api-Key", &self.config.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&request)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<Vec<RouteMatrixElement>>())?;

        entries_from_elements(elements, points.len())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteMatrixRequest {
    origins: Vec<MatrixWaypoint>,
    destinations: Vec<MatrixWaypoint>,
    travel_mode: String,
}

impl RouteMatrixRequest {
    fn new(points: &[Location], travel_mode: &str) -> Self {
        let waypoints: Vec<MatrixWaypoint> = points.iter().map(MatrixWaypoint::from).collect();
        Self {
            origins: waypoints.clone(),
            destinations: waypoints,
            travel_mode: travel_mode.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct MatrixWaypoint {
    waypoint: WaypointLocation,
}

#[derive(Debug, Clone, Serialize)]
struct WaypointLocation {
    location: LatLngWrapper,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LatLngWrapper {
    lat_lng: LatLng,
}

#[derive(Debug, Clone, Serialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

impl From<&Location> for MatrixWaypoint {
    fn from(location: &Location) -> Self {
        Self {
            waypoint: WaypointLocation {
                location: LatLngWrapper {
                    lat_lng: LatLng {
                        latitude: location.lat,
                        longitude: location.lng,
                    },
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMatrixElement {
    #[serde(default)]
    origin_index: usize,
    #[serde(default)]
    destination_index: usize,
    status: Option<ElementStatus>,
    condition: Option<String>,
    distance_meters: Option<f64>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ElementStatus {
    #[serde(default)]
    code: i32,
    message: Option<String>,
}

/// Converts API elements into entries. Pairs the API omitted entirely come
/// back as failed entries so the matrix is always complete.
pub fn entries_from_elements(
    elements: Vec<RouteMatrixElement>,
    len: usize,
) -> Result<Vec<MatrixEntry>, MatrixError> {
    if elements.is_empty() {
        return Err(MatrixError::Malformed("empty route matrix response".to_string()));
    }

    let mut slots: Vec<Option<MatrixEntry>> = vec![None; len * len];
    for element in elements {
        let (i, j) = (element.origin_index, element.destination_index);
        if i >= len || j >= len {
            return Err(MatrixError::Malformed(format!(
                "element ({i}, {j}) is outside a {len}x{len} matrix"
            )));
        }
        slots[i * len + j] = Some(entry_from_element(element)?);
    }

    let missing = slots.iter().filter(|slot| slot.is_none()).count();
    if missing > 0 {
        warn!(missing, "route matrix response omitted pairs");
    }

    Ok(slots
        .into_iter()
        .enumerate()
        .map(|(k, slot)| slot.unwrap_or_else(|| MatrixEntry::failed(k / len, k % len, "pair missing from response")))
        .collect())
}

fn entry_from_element(element: RouteMatrixElement) -> Result<MatrixEntry, MatrixError> {
    let (i, j) = (element.origin_index, element.destination_index);

    if let Some(status) = element.status.as_ref().filter(|s| s.code != 0) {
        let message = status
            .message
            .clone()
            .unwrap_or_else(|| format!("status code {}", status.code));
        return Ok(MatrixEntry::failed(i, j, message));
    }
    if element.condition.as_deref() == Some("ROUTE_NOT_FOUND") {
        return Ok(MatrixEntry::failed(i, j, "ROUTE_NOT_FOUND"));
    }

    let duration_seconds = match element.duration.as_deref() {
        Some(raw) => parse_duration(raw)?,
        None => 0.0,
    };

    Ok(MatrixEntry {
        origin_index: i,
        destination_index: j,
        distance_meters: Some(element.distance_meters.unwrap_or(0.0)),
        duration_seconds: Some(duration_seconds),
        failed: false,
        error_message: None,
    })
}

/// Parses the protobuf JSON duration form, e.g. `"344s"` or `"12.5s"`.
fn parse_duration(raw: &str) -> Result<f64, MatrixError> {
    raw.strip_suffix('s')
        .and_then(|secs| secs.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .ok_or_else(|| MatrixError::Malformed(format!("invalid duration {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(json: &str) -> Vec<RouteMatrixElement> {
        serde_json::from_str(json).unwrap()
    }

    #[rstest]
    #[case("344s", 344.0)]
    #[case("12.5s", 12.5)]
    #[case("0s", 0.0)]
    fn parses_durations(#[case] raw: &str, #[case] expected: f64) {
        assert_eq!(parse_duration(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("344")]
    #[case("-1s")]
    #[case("abcs")]
    fn rejects_bad_durations(#[case] raw: &str) {
        assert!(parse_duration(raw).is_err());
    }

    #[test]
    fn request_body_matches_api_shape() {
        let request = RouteMatrixRequest::new(&[Location::new(-23.2, -51.0)], "DRIVE");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json["origins"][0]["waypoint"]["location"]["latLng"]["latitude"],
            serde_json::json!(-23.2)
        );
        assert_eq!(json["travelMode"], "DRIVE");
        assert_eq!(json["destinations"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn elements_map_to_entries_with_failures() {
        let elements = parse(
            r#"[
                {"originIndex":0,"destinationIndex":1,"status":{},"condition":"ROUTE_EXISTS","distanceMeters":2687,"duration":"344s"},
                {"originIndex":1,"destinationIndex":0,"status":{"code":5,"message":"not found"}},
                {"originIndex":1,"destinationIndex":1,"condition":"ROUTE_NOT_FOUND"},
                {"destinationIndex":0,"status":{},"duration":"0s","distanceMeters":0}
            ]"#,
        );
        let entries = entries_from_elements(elements, 2).unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].duration_seconds, Some(0.0));
        assert_eq!(entries[1].duration_seconds, Some(344.0));
        assert_eq!(entries[1].distance_meters, Some(2687.0));
        assert!(entries[2].failed);
        assert_eq!(entries[2].error_message.as_deref(), Some("not found"));
        assert!(entries[3].failed);
    }

    #[test]
    fn omitted_pairs_are_failed() {
        let elements = parse(r#"[{"originIndex":0,"destinationIndex":1,"duration":"10s"}]"#);
        let entries = entries_from_elements(elements, 2).unwrap();
        assert!(entries[1].is_usable());
        assert!(entries[0].failed);
        assert!(entries[3].failed);
    }

    #[test]
    fn empty_response_is_malformed() {
        assert!(matches!(entries_from_elements(Vec::new(), 2), Err(MatrixError::Malformed(_))));
    }

    #[test]
    fn out_of_range_element_is_malformed() {
        let elements = parse(r#"[{"originIndex":3,"destinationIndex":0,"duration":"1s"}]"#);
        assert!(matches!(entries_from_elements(elements, 2), Err(MatrixError::Malformed(_))));
    }

    #[test]
    fn client_requires_api_key() {
        let err = GoogleRoutesClient::new(GoogleRoutesConfig::new("  ")).unwrap_err();
        assert!(matches!(err, MatrixError::MissingApiKey));
    }
}
