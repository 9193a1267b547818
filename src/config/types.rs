use crate::batch::{DEFAULT_CAPACITY, DEFAULT_CONCURRENCY};
use heicforge_common::paths::{default_source_extensions, heif_extensions, DEFAULT_TARGET_EXTENSION};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding a built web front-end to serve at `/`
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Maximum number of items in the working set
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Number of conversions run at once by convert-all
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Fail conversions that take longer than this (unset = wait forever)
    #[serde(default)]
    pub codec_timeout_secs: Option<u64>,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            concurrency: default_concurrency(),
            codec_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Where converted files are written (`~` is expanded)
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Extension of converted files
    #[serde(default = "default_extension")]
    pub extension: String,

    /// JPEG quality, 1-100
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Source extensions replaced when naming output files
    #[serde(default = "default_source_exts")]
    pub source_extensions: Vec<String>,

    /// Inputs larger than this are rejected
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("~/Pictures/Converted Images")
}
fn default_extension() -> String {
    DEFAULT_TARGET_EXTENSION.to_string()
}
fn default_quality() -> u8 {
    90
}
fn default_source_exts() -> Vec<String> {
    default_source_extensions()
        .iter()
        .map(|e| e.to_string())
        .collect()
}
fn default_max_input_bytes() -> u64 {
    64 * 1024 * 1024
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            extension: default_extension(),
            quality: default_quality(),
            source_extensions: default_source_exts(),
            max_input_bytes: default_max_input_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_watch_paths")]
    pub paths: Vec<PathBuf>,

    /// Seconds a file must stay unchanged before it is picked up
    #[serde(default = "default_settle_time")]
    pub settle_time_secs: u64,

    #[serde(default = "default_watch_extensions")]
    pub extensions: Vec<String>,

    /// Convert detected files right away instead of only queuing them
    #[serde(default = "default_auto_convert")]
    pub auto_convert: bool,
}

fn default_watch_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("~/Downloads")]
}
fn default_settle_time() -> u64 {
    2
}
fn default_watch_extensions() -> Vec<String> {
    heif_extensions().iter().map(|e| e.to_string()).collect()
}
fn default_auto_convert() -> bool {
    true
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            paths: default_watch_paths(),
            settle_time_secs: default_settle_time(),
            extensions: default_watch_extensions(),
            auto_convert: default_auto_convert(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// Base URL of a heicforge server; when set, conversions are delegated to it
    #[serde(default)]
    pub url: Option<String>,
}
