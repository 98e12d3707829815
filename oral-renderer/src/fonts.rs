//! Fonts for label text and SVG documents.
//!
//! DejaVu Sans is compiled in and every generic family (`sans-serif`,
//! `serif`, ...) resolves to it, so labels render identically whether or not
//! the host has system fonts. On wasm32 there are none, so the bundled face
//! is all there is unless the page registers more with [`register_font`].

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use usvg::fontdb::{Database, ID};

use crate::error::{RenderError, RenderResult};

/// Family of the bundled face. Label text is set in it.
pub const LABEL_FAMILY: &str = "DejaVu Sans";

static BUNDLED_FACE: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

fn shared() -> &'static RwLock<Arc<Database>> {
    static FONTS: OnceLock<RwLock<Arc<Database>>> = OnceLock::new();
    FONTS.get_or_init(|| RwLock::new(Arc::new(base_database())))
}

fn base_database() -> Database {
    let mut db = Database::new();
    db.load_font_data(BUNDLED_FACE.to_vec());
    #[cfg(not(target_arch = "wasm32"))]
    db.load_system_fonts();

    db.set_sans_serif_family(LABEL_FAMILY);
    db.set_serif_family(LABEL_FAMILY);
    db.set_monospace_family(LABEL_FAMILY);
    db.set_cursive_family(LABEL_FAMILY);
    db.set_fantasy_family(LABEL_FAMILY);
    tracing::debug!("Loaded {} font faces", db.len());
    db
}

/// Snapshot of the shared font database.
pub(crate) fn font_database() -> Arc<Database> {
    Arc::clone(&shared().read().unwrap_or_else(PoisonError::into_inner))
}

/// Add the faces in `data` (TTF, OTF or a collection) to the shared database.
///
/// Returns the family names of the new faces. Later labels and SVG documents
/// can use them by name.
///
/// # Errors
///
/// Returns [`RenderError::ResourceLoad`] if `data` holds no usable face.
pub fn register_font(data: Vec<u8>) -> RenderResult<Vec<String>> {
    let mut guard = shared().write().unwrap_or_else(PoisonError::into_inner);
    let db = Arc::make_mut(&mut guard);

    let known: Vec<ID> = db.faces().map(|face| face.id).collect();
    db.load_font_data(data);

    let mut families: Vec<String> = db
        .faces()
        .filter(|face| !known.contains(&face.id))
        .filter_map(|face| face.families.first().map(|(name, _)| name.clone()))
        .collect();
    families.dedup();

    if families.is_empty() {
        return Err(RenderError::ResourceLoad(
            "font data contains no usable face".to_string(),
        ));
    }
    tracing::info!("Registered font families {families:?}");
    Ok(families)
}
