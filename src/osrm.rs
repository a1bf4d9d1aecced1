//! OSRM HTTP adapter for distance matrices.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::matrix::{MatrixEntry, MatrixError};
use crate::traits::DistanceMatrixProvider;
use crate::waypoint::Location;

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, points: &[Location]) -> String {
        let coords = points
            .iter()
            .map(|p| format!("{:.6},{:.6}", p.lng, p.lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=duration,distance",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coords
        )
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn compute_matrix(&self, points: &[Location]) -> Result<Vec<MatrixEntry>, MatrixError> {
        if points.is_empty() {
            return Err(MatrixError::EmptyInput);
        }

        debug!(points = points.len(), "requesting OSRM table");
        let body = self
            .client
            .get(self.table_url(points))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())?;

        entries_from_table(body, points.len())
    }
}

#[derive(Debug, Deserialize)]
pub struct OsrmTableResponse {
    code: String,
    message: Option<String>,
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

/// Flattens an OSRM table into row-major entries.
///
/// `null` durations become failed entries. A missing distance annotation is
/// tolerated: the edge stays usable with no distance.
pub fn entries_from_table(
    body: OsrmTableResponse,
    len: usize,
) -> Result<Vec<MatrixEntry>, MatrixError> {
    if body.code != "Ok" {
        return Err(MatrixError::Status {
            code: body.code,
            message: body.message.unwrap_or_default(),
        });
    }

    let durations = body
        .durations
        .ok_or_else(|| MatrixError::Malformed("table has no durations".to_string()))?;
    if durations.len() != len || durations.iter().any(|row| row.len() != len) {
        return Err(MatrixError::Malformed(format!(
            "expected a {len}x{len} duration table"
        )));
    }
    let distances = body.distances.unwrap_or_default();
    if distances.is_empty() {
        warn!("OSRM table has no distance annotation");
    }

    let mut entries = Vec::with_capacity(len * len);
    for (i, row) in durations.into_iter().enumerate() {
        for (j, duration) in row.into_iter().enumerate() {
            let distance = distances.get(i).and_then(|r| r.get(j)).copied().flatten();
            let entry = match duration {
                Some(duration_seconds) => MatrixEntry {
                    origin_index: i,
                    destination_index: j,
                    distance_meters: distance,
                    duration_seconds: Some(duration_seconds),
                    failed: false,
                    error_message: None,
                },
                None => MatrixEntry::failed(i, j, "no route found"),
            };
            entries.push(entry);
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> OsrmTableResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn url_uses_lng_lat_order() {
        let client = OsrmClient::new(OsrmConfig {
            base_url: "http://osrm:5000/".to_string(),
            ..OsrmConfig::default()
        })
        .unwrap();
        let url = client.table_url(&[Location::new(-23.1, -51.2), Location::new(1.0, 2.0)]);
        assert_eq!(
            url,
            "http://osrm:5000/table/v1/car/-51.200000,-23.100000;2.000000,1.000000?annotations=duration,distance"
        );
    }

    #[test]
    fn table_becomes_row_major_entries() {
        let body = parse(
            r#"{"code":"Ok","durations":[[0,120.5],[null,0]],"distances":[[0,900.1],[null,0]]}"#,
        );
        let entries = entries_from_table(body, 2).unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1].duration_seconds, Some(120.5));
        assert_eq!(entries[1].distance_meters, Some(900.1));
        assert!(entries[2].failed);
        assert!(!entries[2].is_usable());
        assert_eq!((entries[2].origin_index, entries[2].destination_index), (1, 0));
    }

    #[test]
    fn missing_distances_keep_edges_usable() {
        let body = parse(r#"{"code":"Ok","durations":[[0,10],[10,0]]}"#);
        let entries = entries_from_table(body, 2).unwrap();
        assert!(entries.iter().all(MatrixEntry::is_usable));
        assert_eq!(entries[1].distance_meters, None);
    }

    #[test]
    fn error_code_is_fatal() {
        let body = parse(r#"{"code":"InvalidQuery","message":"Query string malformed"}"#);
        let err = entries_from_table(body, 2).unwrap_err();
        assert!(matches!(err, MatrixError::Status { ref code, .. } if code == "InvalidQuery"));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let body = parse(r#"{"code":"Ok","durations":[[0]]}"#);
        assert!(matches!(entries_from_table(body, 2), Err(MatrixError::Malformed(_))));
    }
}
