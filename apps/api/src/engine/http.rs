//! HTTP client for the remote analysis engine.
//!
//! No call is retried: a failed request is reported once and the caller
//! decides what to do with it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::engine::wire::{
    error_message, subject_json, CreateAnalysisResponse, ProgressResponse, RefreshResponse,
    UpdateProgressRequest,
};
use crate::engine::{
    AnalysisEngine, CreatedAnalysis, EngineCall, EngineError, ProgressReport, RefreshedRoadmap,
};
use crate::models::document::{ResumeDocument, PDF_CONTENT_TYPE};
use crate::models::profile::SubjectId;
use crate::models::roadmap::TaskAddress;

#[derive(Clone)]
pub struct HttpEngine {
    client: Client,
    base_url: Url,
}

impl HttpEngine {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| EngineError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(EngineError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url,
        })
    }

    /// Appends `segments` to the base path, percent-encoding each one, so an
    /// identity can never change which resource is addressed.
    fn url(&self, segments: &[&str]) -> Result<Url, EngineError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EngineError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends the request and turns any non-success status into an `EngineError`.
    async fn send(
        &self,
        call: EngineCall,
        request: RequestBuilder,
        identity: Option<&SubjectId>,
    ) -> Result<Response, EngineError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        warn!("Engine {call} returned {status}: {message}");

        Err(match (status, identity) {
            (StatusCode::NOT_FOUND, Some(identity)) => EngineError::UnknownIdentity(identity.clone()),
            (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _)
                if call == EngineCall::MarkTaskComplete =>
            {
                EngineError::InvalidAddress(message)
            }
            (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => {
                EngineError::Rejected(message)
            }
            _ => EngineError::Status {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, EngineError> {
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| EngineError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AnalysisEngine for HttpEngine {
    async fn create_analysis(
        &self,
        document: &ResumeDocument,
        target_role: &str,
    ) -> Result<CreatedAnalysis, EngineError> {
        let file = Part::bytes(document.bytes.to_vec())
            .file_name(document.file_name.clone())
            .mime_str(PDF_CONTENT_TYPE)?;
        let form = Form::new()
            .part("file", file)
            .text("target_role", target_role.to_string());

        debug!(
            "Uploading {} ({} bytes) for role '{target_role}'",
            document.file_name,
            document.len()
        );
        let request = self.client.post(self.url(&["upload-resume"])?).multipart(form);
        let response = self.send(EngineCall::CreateAnalysis, request, None).await?;
        let payload: CreateAnalysisResponse = Self::decode(response).await?;
        payload.into_created(target_role)
    }

    async fn mark_task_complete(
        &self,
        identity: &SubjectId,
        address: TaskAddress,
    ) -> Result<(), EngineError> {
        let body = UpdateProgressRequest {
            user_id: subject_json(identity),
            period: address.horizon.key(),
            task_index: address.index,
        };
        let request = self.client.post(self.url(&["update-progress"])?).json(&body);
        self.send(EngineCall::MarkTaskComplete, request, Some(identity))
            .await?;
        Ok(())
    }

    async fn fetch_progress(&self, identity: &SubjectId) -> Result<ProgressReport, EngineError> {
        let request = self
            .client
            .get(self.url(&["progress", identity.as_str()])?);
        let response = self
            .send(EngineCall::FetchProgress, request, Some(identity))
            .await?;
        let payload: ProgressResponse = Self::decode(response).await?;
        Ok(payload.into())
    }

    async fn refresh_roadmap(&self, identity: &SubjectId) -> Result<RefreshedRoadmap, EngineError> {
        let request = self
            .client
            .get(self.url(&["adaptive-roadmap", identity.as_str()])?);
        let response = self
            .send(EngineCall::RefreshRoadmap, request, Some(identity))
            .await?;
        let payload: RefreshResponse = Self::decode(response).await?;
        payload.into_refreshed()
    }
}
