use iss_config::shared::ApiConfig;
use serde::Deserialize;
use tracing::debug;

use crate::api::PositionApi;
use crate::bail;
use crate::error::{ErrorKind, IssResult};
use crate::iss_error;
use crate::types::Position;

/// Value of the `message` field in a successful API response.
const SUCCESS_MESSAGE: &str = "success";

#[derive(Debug, Deserialize)]
struct PositionResponse {
    #[serde(default)]
    message: Option<String>,
    timestamp: i64,
    iss_position: Coordinates,
}

#[derive(Debug, Deserialize)]
struct Coordinates {
    latitude: Coordinate,
    longitude: Coordinate,
}

/// The API sends coordinates as strings, but plain numbers are accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Number(f64),
    Text(String),
}

impl Coordinate {
    fn to_degrees(&self, field: &'static str) -> IssResult<f64> {
        match self {
            Coordinate::Number(value) => Ok(*value),
            Coordinate::Text(text) => text.trim().parse::<f64>().map_err(|err| {
                iss_error!(
                    ErrorKind::ApiResponseInvalid,
                    "Position API returned a non-numeric coordinate",
                    format!("{field} = {text:?}"),
                    source: err
                )
            }),
        }
    }
}

/// HTTP client for the ISS position endpoint.
#[derive(Debug, Clone)]
pub struct IssApiClient {
    client: reqwest::Client,
    url: String,
}

impl IssApiClient {
    /// Builds a client with the configured per-request timeout.
    pub fn new(config: &ApiConfig) -> IssResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl PositionApi for IssApiClient {
    async fn fetch_position(&self) -> IssResult<Position> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                ErrorKind::ApiRequestFailed,
                "Position API returned an error status",
                format!("HTTP {status} from {}", self.url)
            );
        }

        let body = response.bytes().await?;
        let position = parse_position(&body)?;

        debug!(
            latitude = position.latitude,
            longitude = position.longitude,
            timestamp = position.unix_timestamp(),
            "fetched position"
        );

        Ok(position)
    }
}

/// Parses the JSON body of a position response.
///
/// Every malformed body maps to [`ErrorKind::ApiResponseInvalid`] so that it is retried
/// like a transport failure.
pub fn parse_position(body: &[u8]) -> IssResult<Position> {
    let response: PositionResponse = serde_json::from_slice(body).map_err(|err| {
        iss_error!(
            ErrorKind::ApiResponseInvalid,
            "Position API returned a malformed body",
            err,
            source: err
        )
    })?;

    if let Some(message) = &response.message
        && message != SUCCESS_MESSAGE
    {
        bail!(
            ErrorKind::ApiResponseInvalid,
            "Position API did not report success",
            format!("message = {message:?}")
        );
    }

    let latitude = response.iss_position.latitude.to_degrees("latitude")?;
    let longitude = response.iss_position.longitude.to_degrees("longitude")?;

    Position::from_unix(latitude, longitude, response.timestamp).map_err(|err| {
        iss_error!(
            ErrorKind::ApiResponseInvalid,
            "Position API returned an impossible position",
            err.detail().unwrap_or_default().to_owned(),
            source: err
        )
    })
}

#[cfg(test)]
mod tests {
    use iss_config::shared::RetryConfig;

    use super::*;
    use crate::error::ErrorCategory;
    use crate::test_utils::http::LocalHttpServer;

    fn client_for(server: &LocalHttpServer, timeout_ms: u64) -> IssApiClient {
        let config = ApiConfig {
            url: server.url().to_owned(),
            timeout_ms,
            retry: RetryConfig::default(),
        };

        IssApiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn positions_are_fetched_from_the_endpoint() {
        let server = LocalHttpServer::respond_with(
            "200 OK",
            r#"{"message": "success", "timestamp": 1700000000, "iss_position": {"latitude": "-51.2033", "longitude": "12.7500"}}"#,
        )
        .await;
        let client = client_for(&server, 1_000);

        let position = client.fetch_position().await.unwrap();

        assert_eq!(client.url(), server.url());
        assert_eq!(position.latitude, -51.2033);
        assert_eq!(position.unix_timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn error_statuses_are_request_failures() {
        let server = LocalHttpServer::respond_with("503 Service Unavailable", "{}").await;
        let client = client_for(&server, 1_000);

        let err = client.fetch_position().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ApiRequestFailed);
        assert_eq!(err.category(), ErrorCategory::Transient);
        assert_eq!(
            err.detail(),
            Some(format!("HTTP 503 Service Unavailable from {}", client.url()).as_str())
        );
    }

    #[tokio::test]
    async fn unanswered_requests_time_out() {
        let server = LocalHttpServer::unresponsive().await;
        let client = client_for(&server, 50);

        let err = client.fetch_position().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ApiTimeout);
        assert_eq!(err.category(), ErrorCategory::Transient);
    }

    #[test]
    fn string_coordinates_are_parsed() {
        let body = br#"{"message": "success", "timestamp": 1700000000, "iss_position": {"latitude": "-51.2033", "longitude": "12.7500"}}"#;

        let position = parse_position(body).unwrap();

        assert_eq!(position.latitude, -51.2033);
        assert_eq!(position.longitude, 12.75);
        assert_eq!(position.unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn numeric_coordinates_are_parsed() {
        let body = br#"{"timestamp": 1700000000, "iss_position": {"latitude": 10.5, "longitude": -20}}"#;

        let position = parse_position(body).unwrap();

        assert_eq!(position.latitude, 10.5);
        assert_eq!(position.longitude, -20.0);
    }

    #[test]
    fn malformed_bodies_are_invalid_responses() {
        let cases: [&[u8]; 4] = [
            b"<html>busy</html>",
            br#"{"message": "success", "timestamp": 1}"#,
            br#"{"message": "success", "timestamp": 1, "iss_position": {"latitude": "north", "longitude": "0"}}"#,
            br#"{"message": "failure", "timestamp": 1, "iss_position": {"latitude": "0", "longitude": "0"}}"#,
        ];

        for body in cases {
            let err = parse_position(body).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ApiResponseInvalid);
        }
    }

    #[test]
    fn out_of_range_positions_are_invalid_responses() {
        let body = br#"{"timestamp": 1, "iss_position": {"latitude": "95", "longitude": "0"}}"#;

        let err = parse_position(body).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ApiResponseInvalid);
        assert_eq!(err.detail(), Some("latitude 95 is not within [-90, 90]"));
    }
}
