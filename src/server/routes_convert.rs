//! One-shot conversion endpoint.
//!
//! `POST /api/convert` converts every uploaded `images` field in place and
//! answers with base64 data URLs. Nothing is added to the working set.

use crate::codec::{Codec, ProgressReporter, SourceRef};
use crate::server::dto::{ConvertResponse, ConvertedImage};
use crate::server::AppContext;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};

/// Multipart field carrying the files to convert.
pub const IMAGES_FIELD: &str = "images";

pub fn convert_routes() -> Router<AppContext> {
    Router::new().route("/convert", post(convert_images))
}

async fn convert_images(State(ctx): State<AppContext>, mut multipart: Multipart) -> Response {
    let mut uploads: Vec<(String, Bytes)> = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return (e.status(), e.body_text()).into_response(),
        };
        if field.name() != Some(IMAGES_FIELD) {
            continue;
        }

        let name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("image-{}", uploads.len() + 1));
        match field.bytes().await {
            Ok(data) => uploads.push((name, data)),
            Err(e) => return (e.status(), e.body_text()).into_response(),
        }
    }

    if uploads.is_empty() {
        return (StatusCode::BAD_REQUEST, "No images uploaded").into_response();
    }

    tracing::debug!("Converting {} uploaded images", uploads.len());

    let naming = ctx.batch.naming();
    let local = ctx.local.as_ref();
    let results: anyhow::Result<Vec<ConvertedImage>> = futures::stream::iter(uploads)
        .map(|(name, data)| async move {
            let artifact = local
                .convert(&SourceRef::Memory(data), &ProgressReporter::noop())
                .await?;
            Ok::<_, anyhow::Error>(ConvertedImage {
                name: naming.output_name(&name),
                data_url: format!("data:image/jpeg;base64,{}", STANDARD.encode(artifact.as_bytes())),
            })
        })
        .buffered(ctx.config.batch.concurrency.max(1))
        .try_collect()
        .await;

    match results {
        Ok(results) => Json(ConvertResponse { results }).into_response(),
        Err(e) => {
            tracing::error!("Conversion error: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Conversion error").into_response()
        }
    }
}
