//! Shared types for the basemap tile cache.
//!
//! # Invariants
//! - A `CellKey` is an immutable quadtree path; its length is the zoom depth.
//! - For any ancestor `a` of `k`: `a.join(&k.sub_key(&a)?) == k`.

mod cell_key;
mod geometry;
mod types;

pub use cell_key::{CellKey, CellKeyError, MAX_ZOOM, Quadrant, TileXyz};
pub use geometry::MapRect;
pub use types::{BasemapLayerKind, EntityId};

/// Parse a comma or whitespace separated list of cell keys.
pub fn parse_cell_keys(input: &str) -> Result<Vec<CellKey>, CellKeyError> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

pub fn crate_info() -> &'static str {
    "basemap-common v0.1.0"
}
