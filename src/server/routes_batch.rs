//! Working-set API.

use crate::batch::{BatchSummary, Item, ItemStatus};
use crate::codec::SourceRef;
use crate::server::dto::{ConvertAllQuery, ResetResponse};
use crate::server::error::AppError;
use crate::server::routes_convert::IMAGES_FIELD;
use crate::server::AppContext;
use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use heicforge_common::ItemId;

pub fn batch_routes() -> Router<AppContext> {
    Router::new()
        .route("/items", get(list_items).post(upload_items).delete(reset_items))
        .route("/items/:id", get(get_item).delete(remove_item))
        .route("/items/:id/convert", post(convert_item))
        .route("/items/:id/download", get(download_item))
        .route("/convert-all", post(convert_all))
}

fn parse_id(raw: &str) -> Result<ItemId, AppError> {
    raw.parse()
        .map_err(|e: heicforge_common::Error| AppError::bad_request(e.to_string()))
}

async fn list_items(State(ctx): State<AppContext>) -> Json<Vec<Item>> {
    Json(ctx.batch.items())
}

async fn get_item(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Item>, AppError> {
    let id = parse_id(&id)?;
    ctx.batch
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Item not found: {}", id)))
}

/// Enqueue every uploaded `images` file as an in-memory source.
async fn upload_items(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<Item>>), AppError> {
    let mut queued = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGES_FIELD) {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("image-{}", queued.len() + 1));
        let data = field.bytes().await?;
        queued.push(ctx.batch.enqueue(name, SourceRef::Memory(data))?);
    }

    if queued.is_empty() {
        return Err(AppError::bad_request("No images uploaded"));
    }

    Ok((StatusCode::CREATED, Json(queued)))
}

async fn convert_item(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Item>, AppError> {
    let id = parse_id(&id)?;
    let item = ctx.batch.convert_one(id, ctx.codec.as_ref()).await?;
    Ok(Json(item))
}

async fn convert_all(
    State(ctx): State<AppContext>,
    Query(query): Query<ConvertAllQuery>,
) -> Result<Json<BatchSummary>, AppError> {
    let concurrency = query.concurrency.unwrap_or(ctx.config.batch.concurrency);
    let summary = ctx.batch.convert_all(ctx.codec.as_ref(), concurrency).await?;
    Ok(Json(summary))
}

async fn reset_items(State(ctx): State<AppContext>) -> Json<ResetResponse> {
    Json(ResetResponse {
        removed: ctx.batch.reset(),
    })
}

async fn remove_item(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    ctx.batch.remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Serve the converted bytes of a `Done` item as an attachment.
async fn download_item(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let item = ctx
        .batch
        .get(id)
        .ok_or_else(|| AppError::not_found(format!("Item not found: {}", id)))?;

    let result = match (item.status, item.result) {
        (ItemStatus::Done, Some(result)) => result,
        _ => return Err(AppError::not_found(format!("Item {} is not converted", id))),
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type(&result.output_name).to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&result.output_name)),
        ],
        Body::from(result.artifact.into_bytes()),
    )
        .into_response())
}

fn content_type(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

/// `attachment` disposition with an ASCII fallback name and, when needed,
/// the RFC 5987 encoded full name.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if name.is_ascii() {
        return format!("attachment; filename=\"{}\"", fallback);
    }

    let encoded: String = name
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'_' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}
