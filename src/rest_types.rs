use serde::{Deserialize, Serialize};

use crate::model::SummaryMode;
use crate::serde_utils;

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarizeQuery<'a> {
    pub file_id: &'a str,
    pub mode: SummaryMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, deserialize_with = "serde_utils::deserialize_detail")]
    pub detail: Option<String>,
}
