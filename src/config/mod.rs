//! Application Configuration
//!
//! Recognition-service credentials, poll timing, and preprocessing
//! tunables, stored in TOML format. Credentials can also come from the
//! `AZURE_CV_ENDPOINT` / `AZURE_CV_KEY` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Environment variable naming the recognition endpoint.
pub const ENDPOINT_ENV: &str = "AZURE_CV_ENDPOINT";
/// Environment variable holding the recognition access key.
pub const KEY_ENV: &str = "AZURE_CV_KEY";

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Recognition service settings
    pub ocr: OcrConfig,
    /// Image preprocessing settings
    pub preprocess: PreprocessSettings,
}

/// Recognition service connection and poll timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Service base endpoint, e.g. "https://myresource.cognitiveservices.azure.com"
    pub endpoint: String,
    /// Access key sent with every request
    pub key: String,
    /// Read API version path segment
    pub api_version: String,
    /// Delay between poll requests
    pub poll_interval_ms: u64,
    /// Total poll budget before the operation is abandoned
    pub max_poll_ms: u64,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            key: String::new(),
            api_version: "v3.2".to_string(),
            poll_interval_ms: 1_000,
            max_poll_ms: 30_000,
            request_timeout_secs: 30,
        }
    }
}

impl OcrConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_duration(&self) -> Duration {
        Duration::from_millis(self.max_poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.key.is_empty()
    }

    /// Apply explicit overrides (CLI flags, environment) on top of the
    /// file-based settings.
    pub fn apply_overrides(&mut self, endpoint: Option<String>, key: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) {
            self.endpoint = endpoint;
        }
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            self.key = key;
        }
    }
}

/// Tunables for the detection/rectification/binarization stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Longest image side used for boundary detection; larger photos are
    /// downscaled before edge detection for stability
    pub max_detect_dim: u32,
    /// Gaussian blur sigma applied before edge detection
    pub blur_sigma: f32,
    /// Canny hysteresis low threshold
    pub canny_low: f32,
    /// Canny hysteresis high threshold
    pub canny_high: f32,
    /// Minimum contour area as a fraction of the image area
    pub min_area_fraction: f64,
    /// Adaptive threshold block radius (block is 2r+1 pixels square)
    pub block_radius: u32,
    /// Constant subtracted from the local mean before comparison
    pub threshold_offset: i32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            max_detect_dim: 1_000,
            blur_sigma: 1.1,
            canny_low: 50.0,
            canny_high: 150.0,
            min_area_fraction: 0.20,
            block_radius: 15,
            threshold_offset: 10,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "cashea", "TripTally")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert!(config.ocr.endpoint.is_empty());
        assert!(config.ocr.key.is_empty());
        assert_eq!(config.ocr.api_version, "v3.2");
        assert_eq!(config.ocr.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.ocr.max_poll_duration(), Duration::from_secs(30));
        assert!(!config.ocr.is_configured());

        assert_eq!(config.preprocess.max_detect_dim, 1_000);
        assert_eq!(config.preprocess.block_radius, 15);
        assert_eq!(config.preprocess.threshold_offset, 10);
        assert!((config.preprocess.min_area_fraction - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.ocr.endpoint = "https://example.cognitiveservices.azure.com".to_string();
        config.ocr.key = "secret".to_string();
        config.preprocess.canny_low = 40.0;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.ocr.endpoint, config.ocr.endpoint);
        assert_eq!(parsed.ocr.key, config.ocr.key);
        assert!((parsed.preprocess.canny_low - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: AppConfig = toml::from_str("[ocr]\nendpoint = \"https://x\"\n").unwrap();
        assert_eq!(parsed.ocr.endpoint, "https://x");
        assert_eq!(parsed.ocr.poll_interval_ms, 1_000);
        assert_eq!(parsed.preprocess.max_detect_dim, 1_000);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.ocr.endpoint = "https://example".to_string();

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.ocr.endpoint, "https://example");
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = OcrConfig {
            endpoint: "https://from-file".to_string(),
            key: "file-key".to_string(),
            ..OcrConfig::default()
        };

        config.apply_overrides(Some("https://from-env".to_string()), None);
        assert_eq!(config.endpoint, "https://from-env");
        assert_eq!(config.key, "file-key");

        config.apply_overrides(None, Some(String::new()));
        assert_eq!(config.key, "file-key");
    }
}
