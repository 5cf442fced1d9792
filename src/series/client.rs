//! BLS public API client.

use super::types::{series_id, Observation, SeriesError, SeriesPair, YearWindow};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

pub const BLS_V1_ENDPOINT: &str = "https://api.bls.gov/publicAPI/v1/timeseries/data/";
pub const BLS_V2_ENDPOINT: &str = "https://api.bls.gov/publicAPI/v2/timeseries/data/";

const REQUEST_SUCCEEDED: &str = "REQUEST_SUCCEEDED";

const USER_AGENT: &str = "CpiCompass/0.3 (cost-of-living comparison)";

/// Anything that can fetch two area series in one batched call.
pub trait SeriesSource: Send + Sync {
    /// Fetch the series of `code_a` and `code_b` over `window`.
    /// An empty series is a successful "no data collected" answer.
    fn fetch_series(
        &self,
        code_a: &str,
        code_b: &str,
        window: YearWindow,
    ) -> Result<SeriesPair, SeriesError>;
}

// ─── Wire format ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct BlsResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Vec<String>,
    #[serde(rename = "Results", default)]
    results: Option<BlsResults>,
}

#[derive(Deserialize, Debug)]
struct BlsResults {
    #[serde(default)]
    series: Vec<BlsSeries>,
}

#[derive(Deserialize, Debug)]
struct BlsSeries {
    #[serde(rename = "seriesID", alias = "seriesId")]
    series_id: String,
    #[serde(default)]
    data: Vec<BlsObservation>,
}

#[derive(Deserialize, Debug)]
struct BlsObservation {
    #[serde(default)]
    year: String,
    period: String,
    value: String,
}

// ─── Client ──────────────────────────────────────────────────────

/// Blocking client for the BLS timeseries endpoint.
pub struct BlsClient {
    agent: ureq::Agent,
    endpoint: String,
    api_key: Option<String>,
}

impl BlsClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

impl SeriesSource for BlsClient {
    fn fetch_series(
        &self,
        code_a: &str,
        code_b: &str,
        window: YearWindow,
    ) -> Result<SeriesPair, SeriesError> {
        let ids = [series_id(code_a), series_id(code_b)];
        let mut payload = serde_json::json!({
            "seriesid": ids,
            "startyear": window.start.to_string(),
            "endyear": window.end.to_string(),
        });
        if let Some(key) = &self.api_key {
            payload["registrationkey"] = serde_json::Value::String(key.clone());
        }

        info!("Fetching {} and {} for {}", ids[0], ids[1], window);

        let response = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_json(payload)
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => {
                    SeriesError::RemoteUnavailable(format!("HTTP status {}", code))
                }
                ureq::Error::Transport(t) => SeriesError::RemoteUnavailable(t.to_string()),
            })?;

        if response.status() != 200 {
            return Err(SeriesError::RemoteUnavailable(format!(
                "HTTP status {}",
                response.status()
            )));
        }

        let body: BlsResponse = response
            .into_json()
            .map_err(|e| SeriesError::InvalidResponse(e.to_string()))?;

        pair_from_response(body, &ids)
    }
}

/// Match response series back to the requested ids.
fn pair_from_response(body: BlsResponse, ids: &[String; 2]) -> Result<SeriesPair, SeriesError> {
    // Throttled or rejected requests still come back as HTTP 200, sometimes
    // with an empty `Results` object.
    let succeeded = body.status.as_deref() == Some(REQUEST_SUCCEEDED);
    let results = match body.results {
        Some(results) if succeeded => results,
        _ => {
            let status = body.status.unwrap_or_else(|| "no status".into());
            return Err(SeriesError::RemoteUnavailable(format!(
                "{}: {}",
                status,
                body.message.join("; ")
            )));
        }
    };

    let mut pair = SeriesPair::default();
    for series in results.series {
        let slot = if series.series_id.eq_ignore_ascii_case(&ids[0]) {
            &mut pair.a
        } else if series.series_id.eq_ignore_ascii_case(&ids[1]) {
            &mut pair.b
        } else {
            debug!("Ignoring unrequested series {}", series.series_id);
            continue;
        };
        *slot = parse_observations(&series.series_id, series.data)?;
    }

    debug!(
        "{}: {} observations, {}: {} observations",
        ids[0],
        pair.a.len(),
        ids[1],
        pair.b.len()
    );
    Ok(pair)
}

fn parse_observations(id: &str, data: Vec<BlsObservation>) -> Result<Vec<Observation>, SeriesError> {
    let mut out = Vec::with_capacity(data.len());
    for obs in data {
        // "-" marks a month the BLS did not publish.
        if obs.value.trim() == "-" {
            continue;
        }
        let value: f64 = obs.value.trim().parse().map_err(|_| {
            SeriesError::InvalidResponse(format!("{} {} {}: value '{}'", id, obs.year, obs.period, obs.value))
        })?;
        let year: i32 = obs.year.trim().parse().map_err(|_| {
            SeriesError::InvalidResponse(format!("{} {}: year '{}'", id, obs.period, obs.year))
        })?;
        out.push(Observation {
            year,
            period: obs.period,
            value,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> [String; 2] {
        [series_id("A104"), series_id("S49D")]
    }

    fn parse(json: &str) -> Result<SeriesPair, SeriesError> {
        let body: BlsResponse = serde_json::from_str(json).unwrap();
        pair_from_response(body, &ids())
    }

    #[test]
    fn test_pairs_follow_request_order() {
        // Response lists B before A.
        let pair = parse(
            r#"{
                "status": "REQUEST_SUCCEEDED",
                "Results": {"series": [
                    {"seriesID": "CUURS49DSA0", "data": [
                        {"year": "2026", "period": "M08", "value": "270.0"}
                    ]},
                    {"seriesID": "CUURA104SA0", "data": [
                        {"year": "2026", "period": "M08", "value": "300.5"},
                        {"year": "2026", "period": "M07", "value": "299.1"}
                    ]}
                ]}
            }"#,
        )
        .unwrap();
        assert_eq!(pair.a.len(), 2);
        assert_eq!(pair.latest_a().unwrap().value, 300.5);
        assert_eq!(pair.latest_b().unwrap().period, "M08");
        assert_eq!(pair.latest_b().unwrap().year, 2026);
    }

    #[test]
    fn test_empty_data_is_not_an_error() {
        let pair = parse(
            r#"{
                "status": "REQUEST_SUCCEEDED",
                "message": ["No Data Available for Series CUURA104SA0 Year: 2026"],
                "Results": {"series": [
                    {"seriesID": "CUURA104SA0", "data": []},
                    {"seriesID": "CUURS49DSA0", "data": [
                        {"year": "2026", "period": "M08", "value": "270.0"}
                    ]}
                ]}
            }"#,
        )
        .unwrap();
        assert!(pair.a.is_empty());
        assert_eq!(pair.b.len(), 1);
    }

    #[test]
    fn test_missing_series_is_empty() {
        let pair = parse(
            r#"{"status": "REQUEST_SUCCEEDED", "Results": {"series": [
                {"seriesId": "CUURS49DSA0", "data": [{"year": "2025", "period": "M12", "value": "268.2"}]}
            ]}}"#,
        )
        .unwrap();
        assert!(pair.a.is_empty());
        assert_eq!(pair.b[0].year, 2025);
    }

    #[test]
    fn test_unprocessed_request_is_unavailable() {
        let err = parse(
            r#"{"status": "REQUEST_NOT_PROCESSED",
                "message": ["Request could not be serviced, as the daily threshold for total number of requests allocated to the user has been reached."]}"#,
        )
        .unwrap_err();
        match err {
            SeriesError::RemoteUnavailable(msg) => {
                assert!(msg.starts_with("REQUEST_NOT_PROCESSED"));
                assert!(msg.contains("daily threshold"));
            }
            other => panic!("expected RemoteUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_throttled_request_with_empty_results_is_unavailable() {
        let err = parse(
            r#"{"status": "REQUEST_NOT_PROCESSED",
                "message": ["Request could not be serviced, as the daily threshold for total number of requests allocated to the user has been reached."],
                "Results": {}}"#,
        )
        .unwrap_err();
        match err {
            SeriesError::RemoteUnavailable(msg) => assert!(msg.starts_with("REQUEST_NOT_PROCESSED")),
            other => panic!("expected RemoteUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_status_is_unavailable() {
        let err = parse(r#"{"Results": {"series": []}}"#).unwrap_err();
        assert!(matches!(err, SeriesError::RemoteUnavailable(_)));
    }

    #[test]
    fn test_unpublished_month_skipped() {
        let pair = parse(
            r#"{"status": "REQUEST_SUCCEEDED", "Results": {"series": [
                {"seriesID": "CUURA104SA0", "data": [
                    {"year": "2026", "period": "M09", "value": "-"},
                    {"year": "2026", "period": "M08", "value": "301.0"}
                ]}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(pair.a.len(), 1);
        assert_eq!(pair.a[0].period, "M08");
    }

    #[test]
    fn test_garbage_value_is_invalid() {
        let err = parse(
            r#"{"status": "REQUEST_SUCCEEDED", "Results": {"series": [
                {"seriesID": "CUURA104SA0", "data": [{"year": "2026", "period": "M08", "value": "n/a"}]}
            ]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SeriesError::InvalidResponse(_)));
    }

    #[test]
    fn test_unreachable_endpoint_is_unavailable() {
        let client = BlsClient::new("http://127.0.0.1:9/", None, Duration::from_millis(500));
        let err = client
            .fetch_series("A104", "S49D", YearWindow::trailing(2026))
            .unwrap_err();
        assert!(matches!(err, SeriesError::RemoteUnavailable(_)));
    }
}
