//! Session configuration supplied by the host.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::license::{LicenseTier, PresetCatalog};
use crate::persist::DEFAULT_RECOVERY_KEY;
use crate::{CanvasError, CanvasResult};

/// Default canvas width in pixels.
pub const DEFAULT_WIDTH: u32 = 800;

/// Default canvas height in pixels.
pub const DEFAULT_HEIGHT: u32 = 600;

/// Encoding of the flattened export image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// PNG image.
    #[default]
    Png,
    /// JPEG image, alpha composited onto white.
    Jpeg,
}

impl ExportFormat {
    /// MIME type for `data:` URLs.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(CanvasError::Config(format!("unsupported export format '{other}'"))),
        }
    }
}

/// Limits of the decoded bitmap cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheLimits {
    /// Maximum number of cached bitmaps.
    pub max_entries: usize,
    /// Maximum total decoded size in bytes.
    pub max_bytes: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_entries: 128,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Construction input for a canvas session. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasConfig {
    /// Initial surface width in pixels.
    pub width: u32,
    /// Initial surface height in pixels.
    pub height: u32,
    /// Initial license tier.
    pub license_tier: LicenseTier,
    /// Directory that relative image paths resolve against.
    pub asset_root: PathBuf,
    /// Directory of the advisory recovery slot; `None` disables it.
    pub recovery_dir: Option<PathBuf>,
    /// Key of the recovery record.
    pub recovery_key: String,
    /// Background presets per tier.
    pub presets: PresetCatalog,
    /// Bitmap cache limits.
    pub cache: CacheLimits,
    /// Export image encoding.
    pub export_format: ExportFormat,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            license_tier: LicenseTier::Free,
            asset_root: PathBuf::from("."),
            recovery_dir: None,
            recovery_key: DEFAULT_RECOVERY_KEY.to_string(),
            presets: PresetCatalog::default(),
            cache: CacheLimits::default(),
            export_format: ExportFormat::Png,
            jpeg_quality: 85,
        }
    }
}

impl CanvasConfig {
    /// Parse host JSON. Unknown fields are ignored and missing fields default.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Config`] if the JSON is malformed or a field has the
    /// wrong type, or if the dimensions are zero.
    pub fn from_json(json: &str) -> CanvasResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CanvasError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Config`] describing the first invalid field.
    pub fn validate(&self) -> CanvasResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CanvasError::Config(format!(
                "canvas size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(CanvasError::Config(format!(
                "jpegQuality must be 1-100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CanvasConfig::default();
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.license_tier, LicenseTier::Free);
        assert_eq!(config.recovery_key, "oralCanvasData");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sparse_json_defaults_and_ignores_unknown() {
        let config =
            CanvasConfig::from_json(r#"{"licenseTier":"premium","width":1024,"debugPanel":true}"#)
                .unwrap();
        assert_eq!(config.license_tier, LicenseTier::Premium);
        assert_eq!(config.width, 1024);
        assert_eq!(config.height, DEFAULT_HEIGHT);
        assert_eq!(config.presets, PresetCatalog::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(CanvasConfig::from_json(r#"{"width":0}"#).is_err());
        assert!(CanvasConfig::from_json(r#"{"jpegQuality":0}"#).is_err());
        assert!(CanvasConfig::from_json("[").is_err());
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("JPG".parse::<ExportFormat>().unwrap(), ExportFormat::Jpeg);
        assert_eq!(ExportFormat::Png.mime_type(), "image/png");
        assert!("gif".parse::<ExportFormat>().is_err());
    }
}
