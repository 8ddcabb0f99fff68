//! Configuration management for Quarry services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Blob storage configuration
    pub storage: StorageConfig,

    /// Upload size ceilings
    pub limits: LimitsConfig,

    /// Extraction pipeline configuration
    pub extraction: ExtractionConfig,

    /// OCR engine configuration
    pub ocr: OcrConfig,

    /// Video frame sampling configuration
    pub video: VideoConfig,

    /// Knowledge extraction configuration
    pub knowledge: KnowledgeConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for stored uploads and extracted frames
    #[serde(default = "default_storage_root")]
    pub root: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Maximum size for document uploads (pdf/docx/txt), in bytes
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,

    /// Maximum size for image uploads, in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// Maximum size for video uploads, in bytes
    #[serde(default = "default_max_video_bytes")]
    pub max_video_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    /// Number of concurrent extraction workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Bounded depth of the extraction job queue
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Wall-clock budget per extraction job, in seconds
    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,

    /// Maximum extracted content length in characters; longer documents
    /// are truncated and the truncation recorded in metadata
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Total time budget for retrying result persistence, in seconds
    #[serde(default = "default_persist_retry")]
    pub persist_retry_secs: u64,

    /// Chunk size for plain-text structural chunking, in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OcrConfig {
    /// Path to the tesseract binary
    #[serde(default = "default_ocr_binary")]
    pub binary: String,

    /// OCR language
    #[serde(default = "default_ocr_language")]
    pub language: String,

    /// How long an image upload waits for inline OCR results, in seconds
    #[serde(default = "default_inline_wait")]
    pub inline_wait_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoConfig {
    /// Path to the ffmpeg binary
    #[serde(default = "default_ffmpeg_binary")]
    pub ffmpeg_binary: String,

    /// Path to the ffprobe binary
    #[serde(default = "default_ffprobe_binary")]
    pub ffprobe_binary: String,

    /// Sample one frame every N seconds
    #[serde(default = "default_frame_interval")]
    pub frame_interval_secs: u64,

    /// Maximum number of frames extracted per video
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,

    /// Number of frames returned inline (base64) with the upload response
    #[serde(default = "default_preview_count")]
    pub preview_count: usize,

    /// How long a video upload waits for inline frame results, in seconds
    #[serde(default = "default_inline_wait")]
    pub inline_wait_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KnowledgeConfig {
    /// Entities below this confidence are discarded
    #[serde(default = "default_entity_threshold")]
    pub entity_threshold: f64,

    /// Categories below this confidence are discarded
    #[serde(default = "default_category_threshold")]
    pub category_threshold: f64,

    /// Top-K key phrases retained per document
    #[serde(default = "default_max_key_phrases")]
    pub max_key_phrases: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 50 }
fn default_min_connections() -> u32 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_storage_root() -> String { "data/uploads".to_string() }
fn default_max_document_bytes() -> usize { 100 * 1024 * 1024 }
fn default_max_image_bytes() -> usize { 20 * 1024 * 1024 }
fn default_max_video_bytes() -> usize { 500 * 1024 * 1024 }
fn default_workers() -> usize { 4 }
fn default_queue_depth() -> usize { 256 }
fn default_extraction_timeout() -> u64 { 300 }
fn default_max_content_length() -> usize { 2_000_000 }
fn default_persist_retry() -> u64 { 10 }
fn default_chunk_size() -> usize { 1000 }
fn default_ocr_binary() -> String { "tesseract".to_string() }
fn default_ocr_language() -> String { "eng".to_string() }
fn default_inline_wait() -> u64 { 25 }
fn default_ffmpeg_binary() -> String { "ffmpeg".to_string() }
fn default_ffprobe_binary() -> String { "ffprobe".to_string() }
fn default_frame_interval() -> u64 { 5 }
fn default_max_frames() -> usize { 50 }
fn default_preview_count() -> usize { 3 }
fn default_entity_threshold() -> f64 { 0.5 }
fn default_category_threshold() -> f64 { 0.3 }
fn default_max_key_phrases() -> usize { 10 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "quarry".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the extraction wall-clock budget as Duration
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction.timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/quarry".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            storage: StorageConfig {
                root: default_storage_root(),
            },
            limits: LimitsConfig {
                max_document_bytes: default_max_document_bytes(),
                max_image_bytes: default_max_image_bytes(),
                max_video_bytes: default_max_video_bytes(),
            },
            extraction: ExtractionConfig {
                workers: default_workers(),
                queue_depth: default_queue_depth(),
                timeout_secs: default_extraction_timeout(),
                max_content_length: default_max_content_length(),
                persist_retry_secs: default_persist_retry(),
                chunk_size: default_chunk_size(),
            },
            ocr: OcrConfig {
                binary: default_ocr_binary(),
                language: default_ocr_language(),
                inline_wait_secs: default_inline_wait(),
            },
            video: VideoConfig {
                ffmpeg_binary: default_ffmpeg_binary(),
                ffprobe_binary: default_ffprobe_binary(),
                frame_interval_secs: default_frame_interval(),
                max_frames: default_max_frames(),
                preview_count: default_preview_count(),
                inline_wait_secs: default_inline_wait(),
            },
            knowledge: KnowledgeConfig {
                entity_threshold: default_entity_threshold(),
                category_threshold: default_category_threshold(),
                max_key_phrases: default_max_key_phrases(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
            rate_limit: RateLimitConfig {
                requests_per_second: default_rate_limit(),
                burst: default_burst(),
                enabled: default_enabled(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.video.frame_interval_secs, 5);
        assert_eq!(config.limits.max_document_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/quarry");
    }
}
