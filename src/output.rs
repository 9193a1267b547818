//! Writing converted artifacts to disk.

use crate::batch::ConversionResult;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Write `result` into `dir` under its output name.
///
/// Existing files are never overwritten: `IMG_0001.jpg` becomes
/// `IMG_0001 (1).jpg`, `IMG_0001 (2).jpg`, and so on.
pub async fn write_artifact(dir: &Path, result: &ConversionResult) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let path = unique_path(dir, &result.output_name);
    tokio::fs::write(&path, result.artifact.as_bytes())
        .await
        .with_context(|| format!("Failed to write {:?}", path))?;

    tracing::debug!("Wrote {} bytes to {:?}", result.size_bytes, path);
    Ok(path)
}

fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Artifact;
    use bytes::Bytes;

    fn result(name: &str, data: &'static [u8]) -> ConversionResult {
        ConversionResult::new(name.to_string(), Artifact::new(Bytes::from_static(data)))
    }

    #[tokio::test]
    async fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("Converted Images");

        let path = write_artifact(&out, &result("IMG_0001.jpg", b"jpeg")).await.unwrap();

        assert_eq!(path, out.join("IMG_0001.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn test_write_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();

        let first = write_artifact(dir.path(), &result("a.jpg", b"1")).await.unwrap();
        let second = write_artifact(dir.path(), &result("a.jpg", b"2")).await.unwrap();
        let third = write_artifact(dir.path(), &result("a.jpg", b"3")).await.unwrap();

        assert_eq!(first.file_name().unwrap(), "a.jpg");
        assert_eq!(second.file_name().unwrap(), "a (1).jpg");
        assert_eq!(third.file_name().unwrap(), "a (2).jpg");
        assert_eq!(std::fs::read(&first).unwrap(), b"1");
    }

    #[test]
    fn test_unique_path_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README"), b"").unwrap();
        assert_eq!(unique_path(dir.path(), "README"), dir.path().join("README (1)"));
    }
}
