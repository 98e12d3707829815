//! In-flight image resolution.
//!
//! Each request pairs a load future with the paint it is waiting for. Results
//! come back in completion order, which is not request order.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use oral_canvas_core::{BackgroundConfig, Stamp};

use crate::bitmap::Bitmap;
use crate::cache::{BitmapCache, CacheStats};
use crate::error::RenderResult;
use crate::loader::ImageLoader;

/// The paint a load is waiting for.
#[derive(Debug, Clone)]
pub(crate) enum Pending {
    /// A stamp bound to the stamp layer generation it was requested for.
    Stamp { stamp: Stamp, generation: u64 },
    /// A background request, identified by its request number.
    Background { request: u64, config: BackgroundConfig },
}

/// A finished load.
pub(crate) struct Resolved {
    pub(crate) pending: Pending,
    pub(crate) src: String,
    pub(crate) result: RenderResult<Arc<Bitmap>>,
}

/// Resolves image sources through a loader, caching decoded bitmaps.
pub struct ImageResolver {
    loader: Arc<dyn ImageLoader>,
    cache: BitmapCache,
    in_flight: FuturesUnordered<BoxFuture<'static, Resolved>>,
}

impl std::fmt::Debug for ImageResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageResolver")
            .field("cache", &self.cache)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl ImageResolver {
    /// Create a resolver over `loader` with an empty cache.
    #[must_use]
    pub fn new(loader: Arc<dyn ImageLoader>, cache: BitmapCache) -> Self {
        Self {
            loader,
            cache,
            in_flight: FuturesUnordered::new(),
        }
    }

    /// A cached bitmap for `src`, if it has been resolved before.
    pub fn cached(&mut self, src: &str) -> Option<Arc<Bitmap>> {
        self.cache.get(src)
    }

    /// Start loading `src` on behalf of `pending`.
    pub(crate) fn request(&mut self, src: &str, pending: Pending) {
        let load = self.loader.load(src);
        let src = src.to_string();
        self.in_flight.push(
            async move {
                let result = load.await;
                Resolved {
                    pending,
                    src,
                    result,
                }
            }
            .boxed(),
        );
    }

    fn absorb(&mut self, resolved: &Resolved) {
        if let Ok(bitmap) = &resolved.result {
            self.cache.insert(resolved.src.clone(), Arc::clone(bitmap));
        }
    }

    /// Take every completion that is ready right now, without waiting.
    pub(crate) fn poll_ready(&mut self) -> Vec<Resolved> {
        let mut ready = Vec::new();
        while let Some(Some(resolved)) = self.in_flight.next().now_or_never() {
            self.absorb(&resolved);
            ready.push(resolved);
        }
        ready
    }

    /// Wait for the next completion. `None` when nothing is in flight.
    pub(crate) async fn next(&mut self) -> Option<Resolved> {
        let resolved = self.in_flight.next().await?;
        self.absorb(&resolved);
        Some(resolved)
    }

    /// Number of loads still pending.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Bitmap cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> &CacheStats {
        self.cache.stats()
    }
}
