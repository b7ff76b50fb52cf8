//! Wire types for the upload relay endpoint.

use serde::{Deserialize, Serialize};

/// Successful relay result: the resolved image URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}
