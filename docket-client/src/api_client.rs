//! API client layer for the REST endpoints and the push socket.

use crate::config::{AuthConfig, ClientConfig, ReconnectConfig};
use async_trait::async_trait;
use docket_core::{
    DocumentId, DocumentRecord, DocumentSource, FetchError, FolderNode, FolderPathKey,
    PathNormalizer, Timestamp,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue as WsHeaderValue;
use tokio_tungstenite::WebSocketStream;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ApiClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl ApiClientError {
    /// Convert into the engine's fetch error, tagging the operation.
    pub fn into_fetch_error(self, context: &str) -> FetchError {
        match self {
            Self::Http(err) if err.is_decode() => FetchError::Decode {
                reason: err.to_string(),
            },
            Self::Http(err) => FetchError::transient(context, err.to_string()),
            Self::Status { status, message } if status >= 500 => {
                FetchError::transient(context, format!("HTTP {}: {}", status, message))
            }
            Self::Status { status, message } => FetchError::Rejected { status, message },
            Self::Serde(err) => FetchError::Decode {
                reason: err.to_string(),
            },
            Self::InvalidResponse(reason) => FetchError::Decode { reason },
            Self::WebSocket(err) => FetchError::transient(context, err.to_string()),
            Self::Config(reason) => FetchError::transient(context, reason),
        }
    }
}

// ============================================================================
// WIRE TYPES
// ============================================================================

/// Document as the REST API lists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDto {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub folder_path: Option<String>,
    #[serde(rename = "type", default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub upload_date: Option<Timestamp>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl DocumentDto {
    /// Convert to a record, placing it in `folder` unless the payload names
    /// its own folder.
    pub fn into_record(self, folder: &FolderPathKey, normalizer: &PathNormalizer) -> DocumentRecord {
        let folder = self
            .folder_path
            .as_deref()
            .map(|path| normalizer.normalize_folder(path))
            .unwrap_or_else(|| folder.clone());
        let mut record = DocumentRecord::new(DocumentId::new(self.id), self.name, folder)
            .with_tags(self.tags)
            .with_keywords(self.keywords);
        record.doc_type = self.doc_type;
        record.uploaded_at = self.upload_date;
        record.size_bytes = self.size;
        record
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDto {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MoveDocumentRequest<'a> {
    source_path: &'a str,
    target_folder: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MoveFolderRequest<'a> {
    source_path: &'a str,
    target_path: &'a str,
}

#[derive(Debug, Serialize)]
struct PathRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest<'a> {
    path: &'a str,
    new_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RestoreRequest<'a> {
    target_folder: &'a str,
}

#[derive(Debug, Serialize)]
struct ThumbnailRequest<'a> {
    folder: &'a str,
    ids: Vec<i64>,
}

/// Server path of a document inside a folder.
fn wire_path(folder: &FolderPathKey, name: &str) -> String {
    if folder.is_root() {
        name.to_string()
    } else {
        format!("{}/{}", folder.as_str(), name)
    }
}

// ============================================================================
// CLIENTS
// ============================================================================

#[derive(Clone)]
pub struct ApiClient {
    rest: RestClient,
    ws: WsClient,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        let rest = RestClient::new(config)?;
        let ws = WsClient::new(config)?;
        Ok(Self { rest, ws })
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn ws(&self) -> &WsClient {
        &self.ws
    }
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
    normalizer: PathNormalizer,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let auth_header = build_auth_headers(&config.auth)?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_header,
            normalizer: config.engine_config().normalizer(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_folders(&self) -> Result<Vec<FolderNode>, ApiClientError> {
        let folders: Vec<FolderDto> = self
            .get_json("/api/folders/tree", None::<&()>)
            .await?;
        Ok(folders
            .into_iter()
            .map(|f| FolderNode::new(self.normalizer.normalize_folder(&f.path), f.name))
            .collect())
    }

    pub async fn list_documents(
        &self,
        folder: &FolderPathKey,
    ) -> Result<Vec<DocumentRecord>, ApiClientError> {
        let documents: Vec<DocumentDto> = self
            .get_json("/api/documents", Some(&[("folder", folder.as_str())]))
            .await?;
        Ok(documents
            .into_iter()
            .map(|dto| dto.into_record(folder, &self.normalizer))
            .collect())
    }

    /// Move one document. Returns the moved record when the server sends it.
    pub async fn move_document(
        &self,
        source: &FolderPathKey,
        name: &str,
        target: &FolderPathKey,
    ) -> Result<Option<DocumentRecord>, ApiClientError> {
        let body = MoveDocumentRequest {
            source_path: &wire_path(source, name),
            target_folder: target.as_str(),
        };
        let dto: Option<DocumentDto> = self.post_optional("/api/documents/move", &body).await?;
        Ok(dto.map(|dto| dto.into_record(target, &self.normalizer)))
    }

    pub async fn move_folder(
        &self,
        from: &FolderPathKey,
        to: &FolderPathKey,
    ) -> Result<(), ApiClientError> {
        let body = MoveFolderRequest {
            source_path: from.as_str(),
            target_path: to.as_str(),
        };
        self.post_optional::<serde_json::Value, _>("/api/folders/move", &body)
            .await?;
        Ok(())
    }

    /// Move a document to the recycle bin.
    pub async fn delete_document(
        &self,
        folder: &FolderPathKey,
        name: &str,
    ) -> Result<(), ApiClientError> {
        let path = wire_path(folder, name);
        self.post_optional::<serde_json::Value, _>(
            "/api/documents/delete",
            &PathRequest { path: &path },
        )
        .await?;
        Ok(())
    }

    /// Restore a recycle-bin item into `target`.
    pub async fn restore_item(
        &self,
        id: DocumentId,
        target: &FolderPathKey,
    ) -> Result<Option<DocumentRecord>, ApiClientError> {
        let path = format!("/api/recycle-bin/{}/restore", id);
        let body = RestoreRequest {
            target_folder: target.as_str(),
        };
        let dto: Option<DocumentDto> = self.post_optional(&path, &body).await?;
        Ok(dto.map(|dto| dto.into_record(target, &self.normalizer)))
    }

    pub async fn rename_document(
        &self,
        folder: &FolderPathKey,
        name: &str,
        new_name: &str,
    ) -> Result<Option<DocumentRecord>, ApiClientError> {
        let path = wire_path(folder, name);
        let body = RenameRequest {
            path: &path,
            new_name,
        };
        let dto: Option<DocumentDto> = self.post_optional("/api/documents/rename", &body).await?;
        Ok(dto.map(|dto| dto.into_record(folder, &self.normalizer)))
    }

    pub async fn upload(
        &self,
        folder: &FolderPathKey,
        name: &str,
        contents: Vec<u8>,
    ) -> Result<Option<DocumentRecord>, ApiClientError> {
        let form = Form::new()
            .text("folder", folder.as_str().to_string())
            .part("file", Part::bytes(contents).file_name(name.to_string()));
        let url = format!("{}/api/documents/upload", self.base_url);
        let response = self
            .client
            .post(url)
            .headers(self.auth_header.clone())
            .multipart(form)
            .send()
            .await?;
        let dto: Option<DocumentDto> = self.parse_optional(response).await?;
        Ok(dto.map(|dto| dto.into_record(folder, &self.normalizer)))
    }

    pub async fn create_folder(&self, folder: &FolderPathKey) -> Result<(), ApiClientError> {
        self.post_optional::<serde_json::Value, _>(
            "/api/folders",
            &PathRequest {
                path: folder.as_str(),
            },
        )
        .await?;
        Ok(())
    }

    pub async fn remove_folder(&self, folder: &FolderPathKey) -> Result<(), ApiClientError> {
        self.post_optional::<serde_json::Value, _>(
            "/api/folders/delete",
            &PathRequest {
                path: folder.as_str(),
            },
        )
        .await?;
        Ok(())
    }

    pub async fn request_thumbnails(
        &self,
        folder: &FolderPathKey,
        documents: &[DocumentId],
    ) -> Result<(), ApiClientError> {
        let body = ThumbnailRequest {
            folder: folder.as_str(),
            ids: documents.iter().map(DocumentId::as_i64).collect(),
        };
        self.post_optional::<serde_json::Value, _>("/api/thumbnails/refresh", &body)
            .await?;
        Ok(())
    }

    async fn get_json<T, Q>(&self, path: &str, query: Option<&Q>) -> Result<T, ApiClientError>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(url).headers(self.auth_header.clone());
        if let Some(query) = query {
            request = request.query(query);
        }
        let response = request.send().await?;
        self.parse_response(response).await
    }

    async fn post_optional<T, B>(&self, path: &str, body: &B) -> Result<Option<T>, ApiClientError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(url)
            .headers(self.auth_header.clone())
            .json(body)
            .send()
            .await?;
        self.parse_optional(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiClientError> {
        self.parse_optional(response)
            .await?
            .ok_or_else(|| ApiClientError::InvalidResponse("empty response body".to_string()))
    }

    /// Success with no body (204 or empty) yields `None`.
    async fn parse_optional<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<Option<T>, ApiClientError> {
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
                return Ok(None);
            }
            return Ok(Some(serde_json::from_str(&text)?));
        }
        Err(ApiClientError::Status {
            status: status.as_u16(),
            message: error_message(&text),
        })
    }
}

/// Pull `message` out of a JSON error body, or fall back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl DocumentSource for RestClient {
    async fn fetch_folder_tree(&self) -> Result<Vec<FolderNode>, FetchError> {
        self.list_folders()
            .await
            .map_err(|e| e.into_fetch_error("fetch_folder_tree"))
    }

    async fn fetch_documents(
        &self,
        folder: &FolderPathKey,
    ) -> Result<Vec<DocumentRecord>, FetchError> {
        self.list_documents(folder)
            .await
            .map_err(|e| e.into_fetch_error("fetch_documents"))
    }

    async fn refresh_thumbnails(
        &self,
        folder: &FolderPathKey,
        documents: &[DocumentId],
    ) -> Result<(), FetchError> {
        self.request_thumbnails(folder, documents)
            .await
            .map_err(|e| e.into_fetch_error("refresh_thumbnails"))
    }
}

pub type WsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Clone)]
pub struct WsClient {
    endpoint: String,
    auth: AuthConfig,
    reconnect: ReconnectConfig,
}

impl WsClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        Ok(Self {
            endpoint: config.ws_endpoint.clone(),
            auth: config.auth.clone(),
            reconnect: config.reconnect.clone(),
        })
    }

    pub async fn connect(&self) -> Result<WsStream, ApiClientError> {
        let mut request = self.endpoint.as_str().into_client_request()?;
        let headers = request.headers_mut();
        for (name, value) in auth_pairs(&self.auth) {
            let value: WsHeaderValue = value
                .parse()
                .map_err(|_| ApiClientError::Config(format!("invalid {} header", name)))?;
            headers.insert(name, value);
        }
        let (stream, _) = tokio_tungstenite::connect_async(request).await?;
        Ok(stream)
    }

    pub fn reconnect_config(&self) -> &ReconnectConfig {
        &self.reconnect
    }
}

fn auth_pairs(auth: &AuthConfig) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(api_key) = &auth.api_key {
        pairs.push(("x-api-key", api_key.clone()));
    }
    if let Some(jwt) = &auth.jwt {
        pairs.push(("authorization", format!("Bearer {}", jwt)));
    }
    pairs
}

fn build_auth_headers(auth: &AuthConfig) -> Result<HeaderMap, ApiClientError> {
    let mut headers = HeaderMap::new();
    for (name, value) in auth_pairs(auth) {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(&value).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    }
    Ok(headers)
}
