//! Remote codec: delegate conversion to a heicforge server.

use super::{Artifact, Codec, ProgressReporter, SourceRef};
use crate::server::dto::ConvertResponse;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::multipart::{Form, Part};

/// Codec that posts each file to `POST {base_url}/api/convert`.
#[derive(Debug, Clone)]
pub struct RemoteCodec {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteCodec {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            anyhow::bail!("Remote codec URL must be http(s): {}", base_url);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("heicforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/convert", base),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Codec for RemoteCodec {
    fn name(&self) -> &str {
        "remote"
    }

    async fn convert(&self, source: &SourceRef, progress: &ProgressReporter) -> Result<Artifact> {
        let data = source.read().await?;
        let file_name = source.file_name().unwrap_or_else(|| "upload.heic".to_string());

        let form = Form::new().part("images", Part::bytes(data.to_vec()).file_name(file_name));

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Conversion server returned {}: {}", status, body.trim());
        }
        progress.report(35);

        let body: ConvertResponse = response
            .json()
            .await
            .context("Invalid response from conversion server")?;
        progress.report(60);

        let converted = body
            .results
            .into_iter()
            .next()
            .context("Conversion server returned no results")?;
        let jpeg = decode_data_url(&converted.data_url)?;
        progress.report(85);

        Ok(Artifact::new(jpeg))
    }
}

/// Decode a base64 `data:` URL into its payload.
pub(crate) fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let (header, payload) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .context("Not a data URL")?;

    if !header.ends_with(";base64") {
        anyhow::bail!("Data URL is not base64 encoded");
    }

    STANDARD
        .decode(payload)
        .context("Data URL payload is not valid base64")
}
