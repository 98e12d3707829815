//! License tiers and the background preset catalog.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CanvasError, CanvasResult};

/// The built-in default background.
pub const DEFAULT_BACKGROUND: &str = "Tool/DefaultBack.svg";

/// License tier supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseTier {
    /// Restricted tier: free presets only.
    #[default]
    Free,
    /// Full tier: premium presets, custom paths, and inline images.
    Premium,
}

impl FromStr for LicenseTier {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            other => Err(CanvasError::Config(format!("unknown license tier '{other}'"))),
        }
    }
}

impl std::fmt::Display for LicenseTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => f.write_str("free"),
            Self::Premium => f.write_str("premium"),
        }
    }
}

/// A selectable background preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundPreset {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Asset path, as passed to `set_background`.
    pub path: String,
}

impl BackgroundPreset {
    fn new(id: &str, name: &str, path: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            path: path.to_string(),
        }
    }
}

/// Presets available per tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetCatalog {
    /// Presets every tier may use.
    #[serde(default)]
    pub free: Vec<BackgroundPreset>,
    /// Presets reserved for the premium tier.
    #[serde(default)]
    pub premium: Vec<BackgroundPreset>,
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self {
            free: vec![
                BackgroundPreset::new("default", "Default", DEFAULT_BACKGROUND),
                BackgroundPreset::new("white", "Blank", "Tool/WhiteBack.svg"),
            ],
            premium: vec![
                BackgroundPreset::new(
                    "adult_teeth",
                    "Adult dentition",
                    "Tool/Backgrounds/adult_teeth.svg",
                ),
                BackgroundPreset::new(
                    "child_teeth",
                    "Primary dentition",
                    "Tool/Backgrounds/child_teeth.svg",
                ),
                BackgroundPreset::new(
                    "perio_chart",
                    "Periodontal chart",
                    "Tool/Backgrounds/perio_chart.svg",
                ),
            ],
        }
    }
}

impl PresetCatalog {
    /// Presets the given tier may select.
    #[must_use]
    pub fn available(&self, tier: LicenseTier) -> Vec<&BackgroundPreset> {
        match tier {
            LicenseTier::Free => self.free.iter().collect(),
            LicenseTier::Premium => self.free.iter().chain(&self.premium).collect(),
        }
    }

    /// Whether `src` is one of the free preset paths.
    #[must_use]
    pub fn is_free_preset(&self, src: &str) -> bool {
        self.free.iter().any(|p| p.path == src)
    }
}

/// Whether `src` is an inline image payload rather than a path.
#[must_use]
pub fn is_inline_source(src: &str) -> bool {
    src.starts_with("data:")
}

/// Check whether `tier` may use `src` as a background.
///
/// The free tier is limited to the free presets; premium presets, arbitrary
/// paths, and inline payloads require the premium tier.
///
/// # Errors
///
/// Returns [`CanvasError::PermissionDenied`] if the tier does not allow `src`.
pub fn check_background_access(
    tier: LicenseTier,
    catalog: &PresetCatalog,
    src: &str,
) -> CanvasResult<()> {
    match tier {
        LicenseTier::Premium => Ok(()),
        LicenseTier::Free if catalog.is_free_preset(src) => Ok(()),
        LicenseTier::Free => {
            let what = if is_inline_source(src) {
                "custom background images"
            } else {
                "this background"
            };
            Err(CanvasError::PermissionDenied(format!(
                "{what} require the premium tier"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOM: &str = "data:image/png;base64,AAAA";

    #[test]
    fn test_free_tier_rejects_custom_data_uri() {
        let catalog = PresetCatalog::default();
        let result = check_background_access(LicenseTier::Free, &catalog, CUSTOM);
        assert!(matches!(result, Err(CanvasError::PermissionDenied(_))));
    }

    #[test]
    fn test_premium_tier_accepts_custom_data_uri() {
        let catalog = PresetCatalog::default();
        assert!(check_background_access(LicenseTier::Premium, &catalog, CUSTOM).is_ok());
    }

    #[test]
    fn test_free_tier_gates_premium_presets() {
        let catalog = PresetCatalog::default();
        assert!(check_background_access(LicenseTier::Free, &catalog, DEFAULT_BACKGROUND).is_ok());
        assert!(check_background_access(
            LicenseTier::Free,
            &catalog,
            "Tool/Backgrounds/perio_chart.svg"
        )
        .is_err());
    }

    #[test]
    fn test_available_presets_per_tier() {
        let catalog = PresetCatalog::default();
        assert_eq!(catalog.available(LicenseTier::Free).len(), 2);
        assert_eq!(catalog.available(LicenseTier::Premium).len(), 5);
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("Premium".parse::<LicenseTier>().unwrap(), LicenseTier::Premium);
        assert!("gold".parse::<LicenseTier>().is_err());
    }
}
