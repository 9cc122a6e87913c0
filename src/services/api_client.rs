//! HTTP boundary to the Volt auth and file services
//!
//! The rest of the crate only sees the [`AuthApi`], [`FileApi`] and
//! [`UploadApi`] traits, so tests can swap the network out.

use crate::model::error::{ApiError, ApiResult};
use crate::model::file_record::{FileRecord, StorageStats};
use crate::model::transfer_event::UploadReply;
use crate::model::user::{AuthResponse, LoginRequest, RegisterRequest, User};
use crate::settings::session::SessionStore;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::io::ReaderStream;
use url::Url;

/// Called with `(bytes sent, total bytes)` while a body is streamed
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: LoginRequest) -> ApiResult<AuthResponse>;

    async fn register(&self, request: RegisterRequest) -> ApiResult<AuthResponse>;

    async fn profile(&self) -> ApiResult<User>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileApi: Send + Sync {
    /// Every file reference owned by `user_id`, newest first
    async fn list_files(&self, user_id: u64) -> ApiResult<Vec<FileRecord>>;

    async fn delete_file(&self, id: u64) -> ApiResult<()>;

    async fn storage_stats(&self) -> ApiResult<StorageStats>;
}

#[async_trait]
pub trait UploadApi: Send + Sync {
    /// Upload one file. Any 2xx answer is returned raw, anything else is an error.
    async fn upload_file(
        &self,
        path: PathBuf,
        is_private: bool,
        on_progress: ProgressFn,
    ) -> ApiResult<UploadReply>;
}

/// Counts the bytes handed to the HTTP body
#[pin_project::pin_project]
struct ProgressStream<S> {
    #[pin]
    inner: S,
    sent: u64,
    total: u64,
    on_progress: ProgressFn,
}

impl<S> ProgressStream<S> {
    fn new(inner: S, total: u64, on_progress: ProgressFn) -> Self {
        ProgressStream {
            inner,
            sent: 0,
            total,
            on_progress,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                *this.sent += chunk.len() as u64;
                (this.on_progress)(*this.sent, *this.total);
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// reqwest implementation of every Volt API trait
#[derive(Clone)]
pub struct VoltClient {
    http: Client,
    base_url: Url,
    session: Arc<dyn SessionStore>,
}

impl VoltClient {
    pub fn new(base_url: &str, session: Arc<dyn SessionStore>) -> ApiResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Network(format!("invalid API url {}: {}", base_url, e)))?;
        // keep any path prefix when joining relative endpoints
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(VoltClient {
            http,
            base_url,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Network(format!("invalid endpoint {}: {}", path, e)))
    }

    /// Attach the bearer token, or fail before any I/O happens
    fn authorized(&self, request: RequestBuilder) -> ApiResult<RequestBuilder> {
        let token = self.session.token().ok_or(ApiError::MissingCredential)?;
        Ok(request.bearer_auth(token))
    }

    async fn read_body(response: Response) -> ApiResult<(u16, String)> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(ApiError::from_status(status, &body));
        }
        Ok((status, body))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let (_, body) = Self::read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl AuthApi for VoltClient {
    async fn login(&self, request: LoginRequest) -> ApiResult<AuthResponse> {
        tracing::info!("logging in as {}", request.email);
        let response = self
            .http
            .post(self.endpoint("api/v1/auth/login")?)
            .json(&request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn register(&self, request: RegisterRequest) -> ApiResult<AuthResponse> {
        tracing::info!("registering {}", request.username);
        let response = self
            .http
            .post(self.endpoint("api/v1/auth/register")?)
            .json(&request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn profile(&self) -> ApiResult<User> {
        let request = self.authorized(self.http.get(self.endpoint("api/v1/auth/profile")?))?;
        Self::read_json(request.send().await?).await
    }
}

#[async_trait]
impl FileApi for VoltClient {
    async fn list_files(&self, user_id: u64) -> ApiResult<Vec<FileRecord>> {
        let url = self.endpoint(&format!("api/v1/files/{}", user_id))?;
        let request = self.authorized(self.http.get(url))?;
        let files: Option<Vec<FileRecord>> = Self::read_json(request.send().await?).await?;
        // an empty listing is encoded as `null`
        Ok(files.unwrap_or_default())
    }

    async fn delete_file(&self, id: u64) -> ApiResult<()> {
        let url = self.endpoint(&format!("api/v1/files/{}", id))?;
        let request = self.authorized(self.http.delete(url))?;
        Self::read_body(request.send().await?).await?;
        tracing::info!("deleted file reference {}", id);
        Ok(())
    }

    async fn storage_stats(&self) -> ApiResult<StorageStats> {
        let request = self.authorized(self.http.get(self.endpoint("api/v1/users/storage-stats")?))?;
        Self::read_json(request.send().await?).await
    }
}

#[async_trait]
impl UploadApi for VoltClient {
    async fn upload_file(
        &self,
        path: PathBuf,
        is_private: bool,
        on_progress: ProgressFn,
    ) -> ApiResult<UploadReply> {
        let request = self.authorized(self.http.post(self.endpoint("api/v1/files/upload")?))?;

        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| ApiError::Network(format!("cannot open {}: {}", path.display(), e)))?;
        let total = file
            .metadata()
            .await
            .map_err(|e| ApiError::Network(format!("cannot stat {}: {}", path.display(), e)))?
            .len();

        let body = ProgressStream::new(ReaderStream::new(file), total, on_progress);
        let part = Part::stream_with_length(reqwest::Body::wrap_stream(body), total)
            .file_name(file_name(&path))
            .mime_str(mime_guess::from_path(&path).first_or_octet_stream().essence_str())?;
        let form = Form::new()
            .part("file", part)
            .text("is_private", is_private.to_string());

        tracing::debug!("uploading {:?} ({} bytes)", path, total);
        let (status, body) = Self::read_body(request.multipart(form).send().await?).await?;
        Ok(UploadReply::new(status, body))
    }
}

/// Name sent with the multipart part and shown in the UI
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
