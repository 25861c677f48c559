//! HTTP client for the housing API server.

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Success envelope returned by the server.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: T,
}

/// Error envelope returned by the server.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message} ({code}, HTTP {status})")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("unexpected response (HTTP {status}): {body}")]
    Unexpected { status: StatusCode, body: String },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    /// The server's error code, when the server answered with one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// HTTP client for the housing API.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.request::<(), T>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: Option<&B>) -> ClientResult<T> {
        self.request(Method::PUT, path, body).await
    }

    /// Send a request and unwrap the `data` field of the success envelope.
    async fn request<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ClientResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let transport = |source| ClientError::Transport {
            url: url.clone(),
            source,
        };
        let resp = request.send().await.map_err(transport)?;
        let status = resp.status();
        let text = resp.text().await.map_err(transport)?;

        if status.is_success() {
            return serde_json::from_str::<ApiResponse<T>>(&text)
                .map(|envelope| envelope.data)
                .map_err(|_| ClientError::Unexpected { status, body: text });
        }

        Err(match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(ErrorResponse { error }) => ClientError::Api {
                status,
                code: error.code,
                message: error.message,
            },
            Err(_) => ClientError::Unexpected { status, body: text },
        })
    }

    /// GET a path and return the raw JSON body, whatever the status.
    pub async fn get_raw(&self, path: &str) -> ClientResult<(StatusCode, serde_json::Value)> {
        let url = format!("{}{}", self.base_url, path);
        let transport = |source| ClientError::Transport {
            url: url.clone(),
            source,
        };
        let resp = self.client.get(&url).send().await.map_err(transport)?;
        let status = resp.status();
        let text = resp.text().await.map_err(transport)?;
        let value = serde_json::from_str(&text)
            .map_err(|_| ClientError::Unexpected { status, body: text })?;
        Ok((status, value))
    }
}
