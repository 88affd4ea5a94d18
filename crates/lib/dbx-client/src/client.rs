use dbx_core::ToolError;
use dbx_models::ApiErrorBody;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::settings::ClientSettings;

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Authenticated JSON client for one workspace.
#[derive(Clone)]
pub struct DatabricksClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for DatabricksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabricksClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DatabricksClient {
    /// Builds a client without touching the network.
    ///
    /// # Errors
    /// `Configuration` when the host or token is missing.
    pub fn connect(settings: &ClientSettings) -> Result<Self, ToolError> {
        let base_url = settings.base_url()?;
        let token = settings.token()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| ToolError::configuration(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ToolError> {
        let request = self.request(Method::GET, path).query(query);
        self.send(request, path).await
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ToolError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path).json(body);
        self.send(request, path).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<T, ToolError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        debug!(path, status = status.as_u16(), "remote api responded");

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
        serde_json::from_str(body).map_err(|err| {
            ToolError::data_shape(format!("unexpected response from {path}: {err}"))
        })
    }
}

fn transport_error(err: reqwest::Error) -> ToolError {
    let err = err.without_url();
    if err.is_timeout() {
        ToolError::transport(format!("request timed out: {err}"))
    } else {
        ToolError::transport(format!("request failed: {err}"))
    }
}

/// Maps a non-success response to a remote error classified by status.
pub(crate) fn status_error(status: StatusCode, body: &str) -> ToolError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let message = match parsed {
        Some(ApiErrorBody {
            error_code: Some(code),
            message: Some(message),
        }) => format!("{code}: {message}"),
        Some(ApiErrorBody {
            message: Some(message),
            ..
        }) => message,
        Some(ApiErrorBody {
            error_code: Some(code),
            ..
        }) => code,
        _ => {
            let text = body.trim();
            if text.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                text.chars().take(MAX_ERROR_BODY_CHARS).collect()
            }
        }
    };
    ToolError::remote_status(status.as_u16(), message)
}
