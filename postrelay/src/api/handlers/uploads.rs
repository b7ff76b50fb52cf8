//! Handler for the upload relay endpoint.
//!
//! One request runs the whole relay: spool the incoming file, forward it to the image host's
//! upload form, scrape the reply for a URL, optionally dereference a page link, clean up the
//! spool, respond. A single attempt end to end; nothing is retried.

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use std::path::Path;

use crate::{
    api::models::uploads::UploadResponse,
    errors::{Error, Result},
    extract::{extract_image_url, ImageUrl},
    storage::TempUpload,
    upstream::Upstream,
    AppState,
};

/// Form field under which clients attach the file.
pub const FILE_FIELD: &str = "image";

struct IncomingUpload {
    filename: String,
    bytes: Bytes,
}

/// `POST /upload` - forward one uploaded image to the external host and answer with the
/// resolved URL.
#[tracing::instrument(skip_all)]
pub async fn relay_upload<U: Upstream>(
    State(state): State<AppState<U>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let Some(upload) = read_upload(&mut multipart).await? else {
        return Err(Error::MissingFile);
    };

    let mut temp = TempUpload::spool(&state.config.storage.temp_dir, &upload.bytes).await?;

    // Run the relay while the spool is alive, then release it on every path before the
    // response leaves the handler.
    let outcome = forward_and_resolve(&state, temp.path(), &upload.filename).await;
    temp.remove().await;
    let url = outcome?;

    tracing::info!(url = %url, "Upload relayed");
    Ok(Json(UploadResponse { url }))
}

/// Pull the file field out of the inbound multipart stream.
///
/// Other fields are skipped; the first field named [`FILE_FIELD`] wins.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<IncomingUpload>> {
    while let Some(field) = multipart.next_field().await.map_err(|err| Error::BadRequest {
        message: format!("Invalid multipart payload: {err}"),
    })? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(|err| Error::BadRequest {
            message: format!("Failed to read uploaded file: {err}"),
        })?;

        return Ok(Some(IncomingUpload { filename, bytes }));
    }

    Ok(None)
}

/// Forward the spooled file upstream and resolve a URL from the reply.
async fn forward_and_resolve<U: Upstream>(state: &AppState<U>, file: &Path, filename: &str) -> Result<String> {
    let body = state.upstream.submit_upload(file, filename).await?;

    let Some(found) = extract_image_url(&body) else {
        return Err(Error::extraction_failed(&body, state.config.expose_debug_sample));
    };

    let url = match found {
        ImageUrl::Direct(url) => url,
        ImageUrl::PageLink(url) => dereference_page_link(&state.upstream, url).await,
    };

    Ok(url)
}

/// A page link points at HTML rather than image bytes; one extra GET usually recovers the
/// direct URL from that page. Fetch or extraction failure keeps the page link as the result.
async fn dereference_page_link<U: Upstream>(upstream: &U, url: String) -> String {
    match upstream.fetch_page(&url).await {
        Ok(page) => match extract_image_url(&page) {
            Some(found) => found.into_value(),
            None => url,
        },
        Err(err) => {
            tracing::warn!(url = %url, error = %err, "Could not fetch page link, keeping it as the result");
            url
        }
    }
}
