//! Tile payloads and donor tile composition.
//!
//! # Invariants
//! - `Tile` is a closed sum type; renderers match it exhaustively.
//! - Donor computation is pure: same tile map, same requested key, same tile.

mod donor;
mod tile;

pub use donor::{DonorTileCalculator, covering_set};
pub use tile::{BitmapHandle, DrawOp, Tile};

pub fn crate_info() -> &'static str {
    "basemap-tile v0.1.0"
}
