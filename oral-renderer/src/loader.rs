//! Image sources.
//!
//! Resolution is the only suspension point of the canvas: a loader hands back
//! a future and the compositor applies the decoded bitmap once it is ready.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt};

use crate::bitmap::{decode_bitmap, load_image_from_data_uri, Bitmap};
use crate::error::{RenderError, RenderResult};

/// Future resolving to a decoded image.
pub type LoadFuture = BoxFuture<'static, RenderResult<Arc<Bitmap>>>;

/// Resolves image references (preset paths or `data:` URIs) to bitmaps.
pub trait ImageLoader: Send + Sync {
    /// Start resolving `src`.
    fn load(&self, src: &str) -> LoadFuture;
}

fn decode_inline(src: &str) -> LoadFuture {
    future::ready(load_image_from_data_uri(src).map(Arc::new)).boxed()
}

/// Loads `data:` URIs inline and paths relative to an asset root.
///
/// Files are read and decoded synchronously on the first poll of the returned
/// future, on the thread driving the compositor. The loader needs no runtime,
/// so it works under [`LayerCompositor::pump`](crate::LayerCompositor::pump)
/// as well as inside an async executor. Asset files are small presets; hosts
/// serving large or remote images should supply their own [`ImageLoader`].
#[derive(Debug, Clone)]
pub struct AssetLoader {
    root: PathBuf,
}

impl AssetLoader {
    /// Resolve relative paths against `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Asset root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an image reference to a file below the asset root.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ResourceLoad`] for remote URLs, absolute paths, and
    /// paths that climb out of the root.
    pub fn resolve(&self, src: &str) -> RenderResult<PathBuf> {
        if src.contains("://") {
            return Err(RenderError::ResourceLoad(format!(
                "remote images are not supported: {src}"
            )));
        }
        let relative = Path::new(src);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || src.is_empty() {
            return Err(RenderError::ResourceLoad(format!(
                "image path must stay inside the asset root: {src}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl ImageLoader for AssetLoader {
    fn load(&self, src: &str) -> LoadFuture {
        if src.starts_with("data:") {
            return decode_inline(src);
        }
        let path = match self.resolve(src) {
            Ok(path) => path,
            Err(e) => return future::ready(Err(e)).boxed(),
        };
        async move {
            let bytes = std::fs::read(&path).map_err(|e| {
                RenderError::ResourceLoad(format!("{}: {e}", path.display()))
            })?;
            tracing::trace!("Read {} bytes from {}", bytes.len(), path.display());
            decode_bitmap(&bytes).map(Arc::new)
        }
        .boxed()
    }
}

#[derive(Default)]
struct MemoryAssets {
    assets: HashMap<String, Vec<u8>>,
    held: HashSet<String>,
    waiters: HashMap<String, Vec<oneshot::Sender<()>>>,
    loads: HashMap<String, usize>,
}

/// In-memory image source.
///
/// Assets can be *held*: loads of a held source stay pending until it is
/// released, which makes completion order controllable.
#[derive(Clone, Default)]
pub struct MemoryLoader {
    inner: Arc<Mutex<MemoryAssets>>,
}

impl std::fmt::Debug for MemoryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryLoader")
            .field("assets", &inner.assets.len())
            .field("held", &inner.held)
            .finish()
    }
}

impl MemoryLoader {
    /// Create an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryAssets> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register encoded image bytes under `src`.
    pub fn insert(&self, src: impl Into<String>, bytes: Vec<u8>) {
        self.lock().assets.insert(src.into(), bytes);
    }

    /// Keep future loads of `src` pending until [`MemoryLoader::release`].
    pub fn hold(&self, src: impl Into<String>) {
        self.lock().held.insert(src.into());
    }

    /// Let pending and future loads of `src` complete.
    pub fn release(&self, src: &str) {
        let waiters = {
            let mut inner = self.lock();
            inner.held.remove(src);
            inner.waiters.remove(src).unwrap_or_default()
        };
        for waiter in waiters {
            // A dropped receiver means the load was abandoned.
            let _ = waiter.send(());
        }
    }

    /// How many times `src` has been requested.
    #[must_use]
    pub fn load_count(&self, src: &str) -> usize {
        self.lock().loads.get(src).copied().unwrap_or(0)
    }
}

impl ImageLoader for MemoryLoader {
    fn load(&self, src: &str) -> LoadFuture {
        let mut inner = self.lock();
        *inner.loads.entry(src.to_string()).or_insert(0) += 1;

        if src.starts_with("data:") {
            return decode_inline(src);
        }

        let bytes = inner.assets.get(src).cloned();
        let name = src.to_string();
        let gate = if inner.held.contains(src) {
            let (tx, rx) = oneshot::channel();
            inner.waiters.entry(name.clone()).or_default().push(tx);
            Some(rx)
        } else {
            None
        };
        drop(inner);

        async move {
            if let Some(rx) = gate {
                rx.await
                    .map_err(|_| RenderError::ResourceLoad(format!("load of {name} abandoned")))?;
            }
            let bytes =
                bytes.ok_or_else(|| RenderError::ResourceLoad(format!("no such asset: {name}")))?;
            decode_bitmap(&bytes).map(Arc::new)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;

    use super::*;

    const SQUARE_SVG: &[u8] =
        br#"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="4"><rect width="4" height="4"/></svg>"#;

    #[test]
    fn test_asset_paths_stay_inside_root() {
        let loader = AssetLoader::new("/srv/assets");
        assert_eq!(
            loader.resolve("Tool/DefaultBack.svg").unwrap(),
            PathBuf::from("/srv/assets/Tool/DefaultBack.svg")
        );
        assert!(loader.resolve("../secret.png").is_err());
        assert!(loader.resolve("/etc/passwd").is_err());
        assert!(loader.resolve("https://example.com/a.png").is_err());
        assert!(loader.resolve("").is_err());
    }

    #[test]
    fn test_asset_loader_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Tool")).unwrap();
        std::fs::write(dir.path().join("Tool/square.svg"), SQUARE_SVG).unwrap();

        let loader = AssetLoader::new(dir.path());
        let bitmap = loader.load("Tool/square.svg").now_or_never().unwrap().unwrap();
        assert_eq!(bitmap.width(), 4);

        let missing = loader.load("Tool/missing.svg").now_or_never().unwrap();
        assert!(matches!(missing, Err(RenderError::ResourceLoad(_))));
    }

    #[test]
    fn test_memory_loader_hold_and_release() {
        let loader = MemoryLoader::new();
        loader.insert("a.svg", SQUARE_SVG.to_vec());
        loader.hold("a.svg");

        let mut pending = loader.load("a.svg");
        assert!((&mut pending).now_or_never().is_none());

        loader.release("a.svg");
        assert!(pending.now_or_never().unwrap().is_ok());
        assert!(loader.load("a.svg").now_or_never().unwrap().is_ok());
        assert_eq!(loader.load_count("a.svg"), 2);
    }

    #[test]
    fn test_memory_loader_missing_asset() {
        let loader = MemoryLoader::new();
        let result = loader.load("nope.png").now_or_never().unwrap();
        assert!(result.is_err());
    }
}
