//! # OralCanvas Renderer
//!
//! Raster side of the OralCanvas dental charting canvas, on tiny-skia.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  overlay     (interaction chrome, never     │
//! │               exported)                     │
//! ├─────────────────────────────────────────────┤
//! │  text        ┐                              │
//! │  stamp       ├─ Redraw Pipeline  ◄── Store  │
//! │  freedraw    ┘                              │
//! ├─────────────────────────────────────────────┤
//! │  background  ◄── Background Renderer        │
//! │                  (license gate, fit math)   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Image loads are the only asynchronous step. Completions are applied by
//! [`LayerCompositor::pump`] or [`LayerCompositor::settle`]; stamp paints
//! that arrive after their layer was cleared are dropped.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod background;
pub mod bitmap;
pub mod cache;
pub mod compositor;
pub mod error;
pub mod export;
pub mod fonts;
pub mod host;
pub mod loader;
pub mod paint;
pub mod pipeline;
mod queue;
pub mod session;
pub mod surface;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use background::{
    BackgroundOutcome, BackgroundRenderer, BackgroundRequest, BackgroundState,
};
pub use bitmap::{Bitmap, ImageFormat};
pub use cache::{BitmapCache, CacheStats};
pub use compositor::LayerCompositor;
pub use error::{RenderError, RenderResult};
pub use export::{ExportConfig, ExportFormat};
pub use fonts::{register_font, LABEL_FAMILY};
pub use host::CanvasHost;
pub use loader::{AssetLoader, ImageLoader, LoadFuture, MemoryLoader};
pub use pipeline::{LoadFailure, PaintReport};
pub use queue::ImageResolver;
pub use session::CanvasSession;
pub use surface::{LayerName, LayerSurface, LayerSurfaceSet};

/// Renderer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
