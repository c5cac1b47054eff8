//! HTTP client for the monitoring REST API.
//!
//! Every endpoint wraps its payload in an envelope
//! `{ status, message, data, pagination? }`. [`ApiClient`] unwraps it,
//! attaches the bearer token when one is configured, and maps failures into
//! [`Error`].
//!
//! # Example
//!
//! ```no_run
//! use tirta_core::{ApiClient, ClientConfig, NodeApi};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("https://monitoring.example.org/api").token("secret");
//! let client = ApiClient::from_config(&config)?;
//!
//! for node in client.list_nodes().await? {
//!     println!("{} at {:?}", node.node, node.coordinates());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use tirta_types::{
    ApiResponse, CommandRecord, DispatchRequest, HistoryQuery, NodeForm, NodeSeries, NodeSummary,
    RecordData,
};

use crate::error::{Error, Result};
use crate::traits::{CommandApi, NodeApi};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL including any path prefix, e.g. `https://host/api`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Per-request timeout. Bounds the calibration `Submitting` state.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Settings for a base URL with no token and the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        normalize_base_url(&self.base_url)?;
        if self.timeout.is_zero() {
            return Err(Error::invalid_config("request timeout must be greater than 0"));
        }
        if self.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Error::invalid_config("token must not be blank"));
        }
        Ok(())
    }
}

/// HTTP client for the monitoring API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

fn normalize_base_url(base_url: &str) -> Result<String> {
    let base_url = base_url.trim().trim_end_matches('/').to_string();

    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(Error::InvalidUrl(format!(
            "URL must start with http:// or https://, got: {}",
            base_url
        )));
    }

    Ok(base_url)
}

impl ApiClient {
    /// Create a client for a base URL with default settings.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::from_config(&ClientConfig::new(base_url))
    }

    /// Create a client from validated settings.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&config.base_url)?,
            token: config.token.clone(),
        })
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
            token: None,
        })
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// URL of `path` followed by `id` as a single escaped path segment.
    fn url_with_id(&self, path: &str, id: &str) -> Result<String> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(format!("cannot append to {}", self.base_url)))?
            .pop_if_empty()
            .push(id);
        Ok(url.into())
    }

    // ======================================================================
    // Internal HTTP helpers
    // ======================================================================

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, url: &str) -> Result<Response> {
        debug!(url, "Sending request");
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Http(e)
            } else {
                Error::NotReachable {
                    url: url.to_string(),
                    source: e,
                }
            }
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>> {
        self.get_url(&self.url(path)).await
    }

    async fn get_url<T: DeserializeOwned>(&self, url: &str) -> Result<ApiResponse<T>> {
        let response = self.send(self.request(Method::GET, url), url).await?;
        self.handle_response(response, url).await
    }

    async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<ApiResponse<T>> {
        let url = self.url(path);
        let builder = self.request(Method::GET, &url).query(query);
        let response = self.send(builder, &url).await?;
        self.handle_response(response, &url).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>> {
        self.send_json_url(method, &self.url(path), body).await
    }

    async fn send_json_url<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> Result<ApiResponse<T>> {
        let builder = self.request(method, url).json(body);
        let response = self.send(builder, url).await?;
        self.handle_response(response, url).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        url: &str,
    ) -> Result<ApiResponse<T>> {
        let status = response.status();
        let text = response.text().await.map_err(Error::Http)?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), status.to_string(), &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            error!(
                url,
                error = %e,
                body_preview = %text.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            Error::Decode {
                url: url.to_string(),
                message: e.to_string(),
            }
        })
    }
}

/// Build an [`Error::Api`] from a non-success body.
///
/// The backend puts a human message in `message` (or `error`) and, for
/// validation failures, a field map in `data`. Field values may be a string,
/// a list of strings, or an object with an `_errors` list.
fn api_error(status: u16, status_text: String, body: &str) -> Error {
    let value = serde_json::from_str::<serde_json::Value>(body).ok();

    let message = value
        .as_ref()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
        })
        .filter(|m| !m.trim().is_empty())
        .map(String::from)
        .unwrap_or(status_text);

    let mut fields = BTreeMap::new();
    if let Some(map) = value
        .as_ref()
        .and_then(|v| v.get("data"))
        .and_then(|d| d.as_object())
    {
        for (field, entry) in map {
            let messages = field_messages(entry);
            if !messages.is_empty() {
                fields.insert(field.clone(), messages);
            }
        }
    }

    Error::Api {
        status,
        message,
        fields,
    }
}

fn field_messages(entry: &serde_json::Value) -> Vec<String> {
    use serde_json::Value;

    match entry {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|i| i.as_str().map(String::from))
            .collect(),
        Value::Object(obj) => obj.get("_errors").map(field_messages).unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl CommandApi for ApiClient {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<CommandRecord> {
        let response: ApiResponse<Option<CommandRecord>> = self
            .send_json(Method::POST, "commands/send-command", request)
            .await?;
        match response.data {
            Some(record) if !record.id.is_empty() => Ok(record),
            _ => Err(Error::Decode {
                url: self.url("commands/send-command"),
                message: "response has no command id".to_string(),
            }),
        }
    }

    async fn command_status(&self, command_id: &str) -> Result<Option<CommandRecord>> {
        let url = self.url_with_id("commands/get-one", command_id)?;
        let response: ApiResponse<Option<CommandRecord>> = self.get_url(&url).await?;
        Ok(response.data)
    }
}

#[async_trait]
impl NodeApi for ApiClient {
    async fn list_nodes(&self) -> Result<Vec<NodeSummary>> {
        let response: ApiResponse<Option<Vec<NodeSummary>>> = self.get("nodes/get-all").await?;
        Ok(response.data.unwrap_or_default())
    }

    async fn node_positions(&self) -> Result<Vec<NodeSummary>> {
        let response: ApiResponse<Option<Vec<NodeSummary>>> =
            self.get("nodes/get-long-lat").await?;
        Ok(response.data.unwrap_or_default())
    }

    async fn node(&self, node_id: &str) -> Result<NodeSummary> {
        let url = self.url_with_id("nodes/get", node_id)?;
        let response: ApiResponse<Option<NodeSummary>> = self.get_url(&url).await?;
        response
            .data
            .ok_or_else(|| Error::api(404, format!("Node '{node_id}' not found")))
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<NodeSeries>> {
        query.validate()?;
        let response: ApiResponse<Option<Vec<NodeSeries>>> =
            self.get_with_query("datas/graph", &query.pairs()).await?;
        Ok(response.data.unwrap_or_default())
    }

    async fn records(&self, node_id: &str) -> Result<Vec<RecordData>> {
        let url = self.url_with_id("datas/per-day", node_id)?;
        let response: ApiResponse<Option<Vec<RecordData>>> = self.get_url(&url).await?;
        Ok(response.data.unwrap_or_default())
    }

    async fn register_node(&self, form: &NodeForm) -> Result<()> {
        form.validate()?;
        let _: ApiResponse<Option<serde_json::Value>> =
            self.send_json(Method::POST, "nodes/send-data", form).await?;
        Ok(())
    }

    async fn update_node(&self, node_id: &str, form: &NodeForm) -> Result<()> {
        form.validate()?;
        let url = self.url_with_id("nodes/send-data", node_id)?;
        let _: ApiResponse<Option<serde_json::Value>> =
            self.send_json_url(Method::PUT, &url, form).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use tirta_types::{CommandStatus, NodeTarget, SensorKind};

    #[test]
    fn test_client_creation() {
        let client = ApiClient::new("http://localhost:8000/api");
        assert!(client.is_ok());

        let client = client.unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
    }

    #[test]
    fn test_client_normalizes_url() {
        let client = ApiClient::new("http://localhost:8000/api/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(
            client.url("/commands/get-one/7"),
            "http://localhost:8000/api/commands/get-one/7"
        );
    }

    #[test]
    fn test_url_with_id_escapes_segment() {
        let client = ApiClient::new("http://localhost:8000/api/").unwrap();
        assert_eq!(
            client.url_with_id("commands/get-one", "cmd-7").unwrap(),
            "http://localhost:8000/api/commands/get-one/cmd-7"
        );
        assert_eq!(
            client.url_with_id("commands/get-one", "a/b?c#d e").unwrap(),
            "http://localhost:8000/api/commands/get-one/a%2Fb%3Fc%23d%20e"
        );
    }

    #[test]
    fn test_client_invalid_url() {
        let result = ApiClient::new("localhost:8000");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_config_validation() {
        assert!(ClientConfig::new("https://x.test").validate().is_ok());
        assert!(matches!(
            ClientConfig::new("https://x.test")
                .timeout(Duration::ZERO)
                .validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            ClientConfig::new("https://x.test").token("  ").validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_api_error_with_field_map() {
        let body = r#"{
            "status": 422,
            "message": "Validation error",
            "data": {
                "nodeID": ["has already been taken"],
                "lat": "is required",
                "long": { "_errors": ["must be a number"] },
                "ph": null
            }
        }"#;
        let err = api_error(422, "422 Unprocessable Entity".into(), body);
        match &err {
            Error::Api {
                status,
                message,
                fields,
            } => {
                assert_eq!(*status, 422);
                assert_eq!(message, "Validation error");
                assert_eq!(fields.len(), 3);
                assert_eq!(fields["long"], vec!["must be a number".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.field_messages().as_deref(),
            Some("• Lat: is required\n• Long: must be a number\n• Node ID: has already been taken")
        );
    }

    #[test]
    fn test_api_error_without_json_body() {
        let err = api_error(502, "502 Bad Gateway".into(), "<html>bad gateway</html>");
        assert!(matches!(
            err,
            Error::Api { status: 502, ref message, ref fields } if message == "502 Bad Gateway" && fields.is_empty()
        ));
    }

    #[test]
    fn test_api_error_uses_error_key() {
        let err = api_error(401, "401 Unauthorized".into(), r#"{"error":"token expired"}"#);
        assert_eq!(err.to_string(), "API error (401): token expired");
    }

    // --- Wire exchanges against a local mock server ---

    fn client_for(server: &ServerGuard) -> ApiClient {
        let config = ClientConfig::new(format!("{}/api", server.url())).token("secret");
        ApiClient::from_config(&config).unwrap()
    }

    fn ph_request() -> DispatchRequest {
        DispatchRequest::calibration(&NodeTarget::new("5", "Hulu"), SensorKind::Ph)
    }

    #[tokio::test]
    async fn test_dispatch_sends_bearer_and_reads_numeric_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/commands/send-command")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(json!({
                "nodeID": "5",
                "node": "Hulu",
                "command": "kalibrasi_ph"
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":201,"message":"sent","data":{"id":42,"status":"pending"}}"#)
            .create_async()
            .await;

        let record = client_for(&server).dispatch(&ph_request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(record.id, "42");
        assert_eq!(record.status(), CommandStatus::Pending);
    }

    #[tokio::test]
    async fn test_dispatch_without_command_id_fails() {
        for body in [
            r#"{"message":"sent","data":{"id":""}}"#,
            r#"{"message":"sent","data":{"status":"pending"}}"#,
            r#"{"message":"sent","data":null}"#,
            r#"{"message":"sent"}"#,
        ] {
            let mut server = Server::new_async().await;
            let _mock = server
                .mock("POST", "/api/commands/send-command")
                .with_status(200)
                .with_body(body)
                .create_async()
                .await;
            let err = client_for(&server).dispatch(&ph_request()).await.unwrap_err();
            assert!(
                matches!(&err, Error::Decode { message, .. } if message.contains("no command id")),
                "body {body}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_dispatch_rejected_by_backend() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/commands/send-command")
            .with_status(500)
            .with_body(r#"{"status":500,"message":"node offline"}"#)
            .create_async()
            .await;

        let err = client_for(&server).dispatch(&ph_request()).await.unwrap_err();

        assert!(matches!(
            &err,
            Error::Api { status: 500, message, .. } if message == "node offline"
        ));
        assert_eq!(err.to_string(), "API error (500): node offline");
    }

    #[tokio::test]
    async fn test_command_status_decodes_record() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/commands/get-one/17")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_body(r#"{"message":"ok","data":{"id":17,"status":"DONE","command":"kalibrasi_ph"}}"#)
            .create_async()
            .await;

        let record = client_for(&server).command_status("17").await.unwrap().unwrap();

        mock.assert_async().await;
        assert_eq!(record.id, "17");
        assert_eq!(record.status(), CommandStatus::Done);
    }

    #[tokio::test]
    async fn test_command_status_null_data_is_pending() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/commands/get-one/17")
            .with_status(200)
            .with_body(r#"{"message":"not yet","data":null}"#)
            .create_async()
            .await;

        let record = client_for(&server).command_status("17").await.unwrap();

        assert!(record.is_none());
        assert_eq!(
            record.map_or(CommandStatus::Pending, |r| r.status()),
            CommandStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_command_status_escapes_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/commands/get-one/a%2Fb%3Fc%23d")
            .with_status(200)
            .with_body(r#"{"message":"ok","data":{"id":"a/b?c#d","status":"failed"}}"#)
            .create_async()
            .await;

        let record = client_for(&server)
            .command_status("a/b?c#d")
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(record.status(), CommandStatus::Failed);
    }
}
