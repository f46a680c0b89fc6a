use std::future::Future;

use reqwest::{Client, Response, multipart};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::ApiError;
use crate::model::{FileId, PendingFile, SummaryMode, UploadedDocument};
use crate::rest_types::{
    ErrorResponse, MessageResponse, SummarizeQuery, SummarizeResponse, UploadResponse,
};

const UPLOAD_ROUTE: &str = "upload";
const SUMMARIZE_ROUTE: &str = "summarize";
const FILES_ROUTE: &str = "files/";

/// The two remote calls the workflow depends on.
pub trait SummaryService {
    fn upload(&self, file: &PendingFile)
    -> impl Future<Output = Result<UploadedDocument, ApiError>>;

    fn summarize(
        &self,
        file_id: &FileId,
        mode: SummaryMode,
    ) -> impl Future<Output = Result<String, ApiError>>;
}

pub struct SummaryClient {
    client: Client,
    base_url: Url,
}

impl SummaryClient {
    /// Fails for URLs that routes cannot be appended to, such as `mailto:`.
    pub fn new(api_base_url: Url) -> Result<Self, ApiError> {
        if api_base_url.cannot_be_a_base() {
            return Err(ApiError::BaseUrl { url: api_base_url });
        }
        Ok(Self {
            client: Client::new(),
            base_url: with_trailing_slash(api_base_url),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn route(&self, route: &str) -> Result<Url, ApiError> {
        self.base_url.join(route).map_err(|_| self.base_url_error())
    }

    fn base_url_error(&self) -> ApiError {
        ApiError::BaseUrl {
            url: self.base_url.clone(),
        }
    }

    /// Ask the service to forget an uploaded document.
    #[instrument(skip_all, fields(file_id = %file_id))]
    pub async fn delete_file(&self, file_id: &FileId) -> Result<String, ApiError> {
        let mut url = self.route(FILES_ROUTE)?;
        url.path_segments_mut()
            .map_err(|_| self.base_url_error())?
            .pop_if_empty()
            .push(file_id.as_str());

        let response = self.client.delete(url).send().await?;
        let body: MessageResponse = parse_response(response).await?;
        Ok(body.message)
    }
}

impl SummaryService for SummaryClient {
    #[instrument(skip_all, fields(name = %file.name(), size = file.size()))]
    async fn upload(&self, file: &PendingFile) -> Result<UploadedDocument, ApiError> {
        let part = multipart::Part::file(file.path())
            .await
            .map_err(|source| ApiError::File {
                path: file.path().to_path_buf(),
                source,
            })?
            .file_name(file.name().to_string())
            .mime_str(file.media_type())?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.route(UPLOAD_ROUTE)?)
            .multipart(form)
            .send()
            .await?;

        let body: UploadResponse = parse_response(response).await?;
        if let Some(message) = &body.message {
            debug!(file_id = %body.file_id, %message, "upload accepted");
        }

        Ok(UploadedDocument {
            file_id: FileId::new(body.file_id),
            file_name: body.filename,
            page_count: body.page_count,
        })
    }

    #[instrument(skip_all, fields(file_id = %file_id, mode = %mode))]
    async fn summarize(&self, file_id: &FileId, mode: SummaryMode) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.route(SUMMARIZE_ROUTE)?)
            .query(&SummarizeQuery {
                file_id: file_id.as_str(),
                mode,
            })
            .send()
            .await?;

        let body: SummarizeResponse = parse_response(response).await?;
        Ok(body.summary)
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&text)
            .unwrap_or_default()
            .detail;
        warn!(%status, detail = detail.as_deref().unwrap_or(""), "service returned an error");
        return Err(ApiError::Status { status, detail });
    }

    Ok(response.json().await?)
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
