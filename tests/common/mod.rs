//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which wires a [`BatchConverter`], default config
//! and a codec into a full [`AppContext`]. The [`TestHarness::with_server`]
//! constructor starts Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use heicforge::batch::BatchConverter;
use heicforge::codec::{Artifact, Codec, ProgressReporter, SourceRef};
use heicforge::config::Config;
use heicforge::server::{create_router, AppContext};
use http_body_util::BodyExt;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

pub const BOUNDARY: &str = "heicforge-test-boundary";

/// Codec that echoes the source bytes back, optionally failing for sources
/// whose contents start with `fail`.
pub struct EchoCodec;

#[async_trait]
impl Codec for EchoCodec {
    fn name(&self) -> &str {
        "echo"
    }

    async fn convert(&self, source: &SourceRef, progress: &ProgressReporter) -> anyhow::Result<Artifact> {
        let data = source.read().await?;
        if data.starts_with(b"fail") {
            anyhow::bail!("refusing to convert");
        }
        progress.report(50);
        Ok(Artifact::new(data))
    }
}

pub struct TestHarness {
    pub ctx: AppContext,
}

impl TestHarness {
    /// Harness whose batch codec is [`EchoCodec`].
    pub fn new() -> Self {
        Self::with_codec(Config::default(), Arc::new(EchoCodec))
    }

    pub fn with_codec(config: Config, codec: Arc<dyn Codec>) -> Self {
        let batch = Arc::new(BatchConverter::from_config(&config));
        Self {
            ctx: AppContext::with_codec(config, batch, codec),
        }
    }

    pub fn router(&self) -> axum::Router {
        create_router(self.ctx.clone())
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server(self) -> (Self, SocketAddr) {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }
}

/// A small PNG with a half-transparent red fill.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 128]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .expect("failed to encode PNG");
    buf.into_inner()
}

/// Build a `multipart/form-data` body from `(field, file name, bytes)` parts.
pub fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Body {
    let mut body = Vec::new();
    for (field, file_name, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    Body::from(body)
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

pub async fn body_bytes(body: Body) -> Bytes {
    body.collect().await.unwrap().to_bytes()
}

pub async fn body_to_string(body: Body) -> String {
    String::from_utf8(body_bytes(body).await.to_vec()).unwrap()
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(body).await).unwrap()
}
