//! Wire types shared by the server and the remote codec.

use serde::{Deserialize, Serialize};

/// Response body of `POST /api/convert`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub results: Vec<ConvertedImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedImage {
    /// Output file name, e.g. `IMG_0001.jpg`
    pub name: String,
    /// `data:image/jpeg;base64,...`
    pub data_url: String,
}

/// Query of `POST /api/convert-all`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvertAllQuery {
    pub concurrency: Option<usize>,
}

/// Response body of `DELETE /api/items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub removed: usize,
}
