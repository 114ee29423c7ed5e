use super::error::ApiError;
use crate::core::config::ApiConfig;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Envelope every endpoint of the dashboard API wraps its payload in.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default)]
    pub count: Option<u64>,
}

impl<T> ApiResponse<T> {
    pub fn into_data(self) -> T {
        self.data
    }
}

/// Thin adapter over `reqwest::Client` that applies the base URL and timeout
/// and turns every failure into an [`ApiError`]. It never retries.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent("stockdash/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Unknown(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one request and decodes the response envelope.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let result = self.send(method.clone(), path, params, body).await;
        if let Err(err) = &result {
            error!(%method, path, kind = err.kind(), error = %err, "API request failed");
        }
        result
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.request::<T, ()>(Method::GET, path, params, None)
            .await
            .map(ApiResponse::into_data)
    }

    pub async fn post<T, B>(&self, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, &[], body)
            .await
            .map(ApiResponse::into_data)
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PATCH, path, &[], Some(body))
            .await
            .map(ApiResponse::into_data)
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<T, ()>(Method::DELETE, path, &[], None)
            .await
            .map(ApiResponse::into_data)
    }

    async fn send<T, B>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path, params)?;
        debug!("Requesting {} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&text)
            .map_err(|e| ApiError::Unknown(format!("failed to parse response for {path}: {e}")))?;
        if !envelope.success {
            return Err(ApiError::Unknown(format!(
                "API reported an unsuccessful response for {path}"
            )));
        }
        Ok(envelope)
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ApiError::Unknown(format!("invalid URL for {path}: {e}")))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, timeout_ms: u64) -> ApiClient {
        ApiClient::new(&server.uri(), Duration::from_millis(timeout_ms)).unwrap()
    }

    #[tokio::test]
    async fn test_get_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stocks/AAPL/prices"))
            .and(query_param("days", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [1, 2, 3],
                "count": 3
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, 1000);
        let envelope: ApiResponse<Vec<u32>> = client
            .request::<_, ()>(
                Method::GET,
                "/stocks/AAPL/prices",
                &[("days", "2".to_string())],
                None,
            )
            .await
            .unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.count, Some(3));
        assert_eq!(envelope.into_data(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trading/accounts"))
            .and(body_json(json!({"name": "A"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"id": 7}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 1000);
        let data: serde_json::Value = client
            .post("/trading/accounts", Some(&json!({"name": "A"})))
            .await
            .unwrap();
        assert_eq!(data["id"], 7);
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stocks/NOPE"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let client = client_for(&server, 1000);
        let err = client
            .get::<serde_json::Value>("/stocks/NOPE", &[])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Http {
                status: 404,
                body: "missing".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_slow_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stocks/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "data": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, 50);
        let err = client
            .get::<Vec<serde_json::Value>>("/stocks/", &[])
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Timeout);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind and immediately release a port so nothing is listening on it.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let client = ApiClient::new(&format!("http://{addr}"), Duration::from_secs(1)).unwrap();

        let err = client
            .get::<serde_json::Value>("/stocks/", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_malformed_body_and_unsuccessful_envelope_are_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/refused"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": false, "data": null})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, 1000);
        let err = client
            .get::<serde_json::Value>("/broken", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to parse response for /broken"));

        let err = client
            .get::<serde_json::Value>("/refused", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unknown(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:8000/", Duration::from_secs(10)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        let url = client
            .url(
                "/stocks/AAPL/indicators",
                &[("days", "30".to_string()), ("indicator_type", "RSI".to_string())],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/stocks/AAPL/indicators?days=30&indicator_type=RSI"
        );
    }
}
