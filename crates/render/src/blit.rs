use basemap_common::{CellKey, MapRect};
use basemap_tile::{BitmapHandle, Tile};

/// Copy of a bitmap region into a destination rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blit {
    pub bitmap: BitmapHandle,
    /// Region of the bitmap in normalized coordinates, the full bitmap being
    /// the unit square.
    pub source: MapRect,
    pub destination: MapRect,
}

/// Resolve a tile drawn into `cell_rect` into blits, back to front.
pub fn blits(tile: &Tile, cell_rect: MapRect) -> Vec<Blit> {
    let unit = MapRect::square(1.0);
    tile.resolve()
        .into_iter()
        .map(|op| Blit {
            bitmap: op.bitmap,
            source: op.source.tile_rect(unit),
            destination: op.destination.tile_rect(cell_rect),
        })
        .collect()
}

/// Blits for a cell of the pyramid spanning `world`.
pub fn cell_blits(tile: &Tile, key: &CellKey, world: MapRect) -> Vec<Blit> {
    blits(tile, key.tile_rect(world))
}
