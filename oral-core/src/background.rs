//! Background configuration.

use serde::{Deserialize, Serialize};

use crate::geometry::{FitMethod, FitPolicy};
use crate::license::DEFAULT_BACKGROUND;

/// The single active background: an image reference plus its fit policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Preset path or inline `data:` URI.
    #[serde(default = "BackgroundConfig::default_src")]
    pub src: String,
    /// Fit policy.
    #[serde(default)]
    pub options: FitPolicy,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            src: DEFAULT_BACKGROUND.to_string(),
            options: FitPolicy::default(),
        }
    }
}

impl BackgroundConfig {
    fn default_src() -> String {
        DEFAULT_BACKGROUND.to_string()
    }

    /// Configuration for `src` with `options` merged onto the default policy.
    #[must_use]
    pub fn new(src: impl Into<String>, options: BackgroundOptions) -> Self {
        Self {
            src: src.into(),
            options: options.merged_onto(FitPolicy::default()),
        }
    }
}

/// Partial fit policy; unset fields keep their current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackgroundOptions {
    /// Override for `maintainAspectRatio`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintain_aspect_ratio: Option<bool>,
    /// Override for `fitMethod`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_method: Option<FitMethod>,
}

impl BackgroundOptions {
    /// Options that only set the fit method.
    #[must_use]
    pub const fn fit(fit_method: FitMethod) -> Self {
        Self {
            maintain_aspect_ratio: None,
            fit_method: Some(fit_method),
        }
    }

    /// Parse host JSON options; malformed input yields empty options.
    #[must_use]
    pub fn from_json_lenient(json: &str) -> Self {
        if json.trim().is_empty() {
            return Self::default();
        }
        serde_json::from_str(json).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unparsable background options: {e}");
            Self::default()
        })
    }

    /// Apply these overrides to `base`.
    #[must_use]
    pub fn merged_onto(self, base: FitPolicy) -> FitPolicy {
        FitPolicy {
            maintain_aspect_ratio: self
                .maintain_aspect_ratio
                .unwrap_or(base.maintain_aspect_ratio),
            fit_method: self.fit_method.unwrap_or(base.fit_method),
        }
    }
}

impl From<FitPolicy> for BackgroundOptions {
    fn from(policy: FitPolicy) -> Self {
        Self {
            maintain_aspect_ratio: Some(policy.maintain_aspect_ratio),
            fit_method: Some(policy.fit_method),
        }
    }
}
