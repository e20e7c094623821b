use basemap_common::CellKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque reference to a decoded bitmap owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BitmapHandle(pub u64);

/// What to draw for one cell.
///
/// Paths inside `SubTile` and `Composite` are relative quadtree paths: a
/// `SubTile` path selects a crop of the wrapped tile, a `Composite` path
/// selects where inside the destination cell a member is placed. The root
/// path means "the full area".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Tile {
    #[default]
    Empty,
    /// A fully rendered image for exactly one cell.
    Snapshot(BitmapHandle),
    /// Crop of a tile that covers a larger ancestor area.
    SubTile(Arc<Tile>, CellKey),
    /// Members drawn in order, each placed at its own path.
    Composite(Vec<(Arc<Tile>, CellKey)>),
}

/// One bitmap blit produced by resolving a tile.
///
/// `source` is the crop of the bitmap to read, `destination` the part of the
/// destination cell to write, both as quadtree paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawOp {
    pub bitmap: BitmapHandle,
    pub source: CellKey,
    pub destination: CellKey,
}

impl Tile {
    pub fn sub_tile(tile: impl Into<Arc<Tile>>, path: CellKey) -> Self {
        Tile::SubTile(tile.into(), path)
    }

    pub fn composite(members: impl IntoIterator<Item = (Arc<Tile>, CellKey)>) -> Self {
        Tile::Composite(members.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Tile::Empty)
    }

    /// Flatten the tile into draw operations, back to front.
    ///
    /// `SubTile` appends its path to the source crop, `Composite` appends each
    /// member's path to the destination placement, `Snapshot` emits one op.
    pub fn resolve(&self) -> Vec<DrawOp> {
        let mut ops = Vec::new();
        self.resolve_into(&CellKey::root(), &CellKey::root(), &mut ops);
        ops
    }

    fn resolve_into(&self, source: &CellKey, destination: &CellKey, ops: &mut Vec<DrawOp>) {
        match self {
            Tile::Empty => {}
            Tile::Snapshot(bitmap) => ops.push(DrawOp {
                bitmap: *bitmap,
                source: source.clone(),
                destination: destination.clone(),
            }),
            Tile::SubTile(tile, path) => {
                tile.resolve_into(&source.join(path), destination, ops);
            }
            Tile::Composite(members) => {
                for (tile, path) in members {
                    tile.resolve_into(source, &destination.join(path), ops);
                }
            }
        }
    }

    /// Every bitmap referenced anywhere in the tile.
    pub fn bitmaps(&self) -> Vec<BitmapHandle> {
        let mut out = Vec::new();
        self.collect_bitmaps(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_bitmaps(&self, out: &mut Vec<BitmapHandle>) {
        match self {
            Tile::Empty => {}
            Tile::Snapshot(bitmap) => out.push(*bitmap),
            Tile::SubTile(tile, _) => tile.collect_bitmaps(out),
            Tile::Composite(members) => {
                for (tile, _) in members {
                    tile.collect_bitmaps(out);
                }
            }
        }
    }
}
