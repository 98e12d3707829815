//! # OralCanvas Core
//!
//! Pixel-free data model for the OralCanvas dental charting canvas.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               oral-canvas-core              │
//! ├─────────────────────────────────────────────┤
//! │  Element Store   │  Background Config       │
//! │  - Strokes       │  - Source (path / data)  │
//! │  - Stamps        │  - Fit policy            │
//! │  - Labels        │  - License gate          │
//! ├─────────────────────────────────────────────┤
//! │  Snapshots       │  Observers               │
//! │  - Export/import │  - Advisory persistence  │
//! │  - Legacy layout │  - Recovery slots        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Layer pixels are derived state; everything needed to regenerate them
//! lives in the [`ElementStore`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod background;
pub mod config;
pub mod element;
pub mod error;
pub mod geometry;
pub mod license;
pub mod patch;
pub mod persist;
pub mod snapshot;
pub mod store;

pub use background::{BackgroundConfig, BackgroundOptions};
pub use config::{CacheLimits, CanvasConfig, ExportFormat};
pub use element::{
    Element, ElementId, ElementKind, FreehandStroke, PathPoint, PointKind, Stamp, TextLabel,
};
pub use error::{CanvasError, CanvasResult};
pub use geometry::{
    fit_rect, CoordinateMapper, DrawRect, FitMethod, FitPolicy, IdentityMapper, ViewportMapper,
};
pub use license::{
    check_background_access, is_inline_source, BackgroundPreset, LicenseTier, PresetCatalog,
    DEFAULT_BACKGROUND,
};
pub use patch::{ElementPatch, LabelPatch, StampPatch, StrokePatch};
pub use persist::{
    AdvisoryPersistence, FileRecoverySlot, MemoryRecoverySlot, RecoverySlot, DEFAULT_RECOVERY_KEY,
};
pub use snapshot::{Snapshot, FORMAT_VERSION};
pub use store::{current_timestamp_ms, ElementStore, StoreChange, StoreObserver};

/// Canvas core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
