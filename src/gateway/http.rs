//! HTTP implementation of the persistence gateway over reqwest

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::{multipart, Body, Client, Response, StatusCode};
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;
use url::Url;

use crate::errors::{GatewayError, GatewayResult};
use crate::fields::MasterCollection;

use super::{AttachmentUpload, MasterEntry, PersistenceGateway};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Stateless reqwest client for the backend's REST surface
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(mut base_url: Url, timeout: Duration) -> GatewayResult<Self> {
        // Url::join drops the last path segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::unavailable(err.to_string()))?;

        Ok(HttpGateway { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> GatewayResult<Url> {
        let path = format!("{}/", segments.join("/"));
        self.base_url
            .join(&path)
            .map_err(|err| GatewayError::unavailable(format!("invalid endpoint path: {err}")))
    }

    /// Map the backend's status classes onto the gateway error taxonomy
    async fn classify(response: Response) -> GatewayResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::BAD_REQUEST => {
                let body = response.json::<Value>().await.unwrap_or(Value::Null);
                Err(GatewayError::rejection_from_body(&body))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GatewayError::Unauthorized),
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound),
            other => Err(GatewayError::unavailable(format!(
                "backend returned {other}"
            ))),
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> GatewayResult<T> {
        Self::classify(response)
            .await?
            .json::<T>()
            .await
            .map_err(|err| GatewayError::unavailable(format!("unreadable response body: {err}")))
    }
}

#[async_trait]
impl PersistenceGateway for HttpGateway {
    async fn patch_record(
        &self,
        resource: &str,
        id: &str,
        changes: &serde_json::Map<String, Value>,
    ) -> GatewayResult<Value> {
        let url = self.endpoint(&[resource, id])?;
        debug!("PATCH {} ({} fields)", url, changes.len());

        let response = self
            .client
            .patch(url)
            .json(changes)
            .send()
            .await
            .map_err(|err| GatewayError::unavailable(err.to_string()))?;

        Self::read_json(response).await
    }

    async fn upload_attachment(
        &self,
        resource: &str,
        id: &str,
        field: &str,
        upload: &AttachmentUpload,
        progress: watch::Sender<u8>,
    ) -> GatewayResult<Value> {
        let url = self.endpoint(&[resource, id])?;
        debug!("PATCH {} (multipart {}={})", url, field, upload.file_name);

        let total = upload.bytes.len().max(1);
        let chunks: Vec<Vec<u8>> = upload
            .bytes
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(|chunk| chunk.to_vec())
            .collect();

        let _ = progress.send(0);
        let mut sent = 0usize;
        let counted = stream::iter(chunks).map(move |chunk| {
            sent += chunk.len();
            let _ = progress.send(((sent * 100) / total) as u8);
            Ok::<_, std::io::Error>(chunk)
        });

        let part = multipart::Part::stream_with_length(
            Body::wrap_stream(counted),
            upload.bytes.len() as u64,
        )
        .file_name(upload.file_name.clone())
        .mime_str(&upload.content_type)
        .map_err(|err| GatewayError::rejected(format!("invalid content type: {err}")))?;

        let form = multipart::Form::new().part(field.to_string(), part);

        let response = self
            .client
            .patch(url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| GatewayError::unavailable(err.to_string()))?;

        Self::read_json(response).await
    }

    async fn list_records(&self, resource: &str) -> GatewayResult<Vec<Value>> {
        let url = self.endpoint(&[resource])?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| GatewayError::unavailable(err.to_string()))?;

        Self::read_json(response).await
    }

    async fn list_master(&self, collection: MasterCollection) -> GatewayResult<Vec<MasterEntry>> {
        let url = self.endpoint(&["masters", collection.endpoint()])?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| GatewayError::unavailable(err.to_string()))?;

        Self::read_json(response).await
    }
}
