use basemap_common::{CellKey, MAX_ZOOM};
use std::collections::BTreeSet;

/// Cells the viewport asks for this frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellState {
    /// Cells that must be backed by an entity in every layer.
    pub required_cells: BTreeSet<CellKey>,
    /// Cells on screen. Never eviction candidates.
    pub visible_cells: BTreeSet<CellKey>,
    /// Cells that left the viewport this frame.
    pub cells_to_remove: BTreeSet<CellKey>,
}

impl CellState {
    /// True when `key` left the viewport this frame and is not on screen.
    pub fn is_leaving(&self, key: &CellKey) -> bool {
        self.cells_to_remove.contains(key) && !self.visible_cells.contains(key)
    }

    /// Cells to hide and queue for eviction, excluding anything still visible.
    pub fn leaving_cells(&self) -> impl Iterator<Item = &CellKey> + '_ {
        self.cells_to_remove
            .iter()
            .filter(|key| !self.visible_cells.contains(*key))
    }
}

/// Derives per-frame `CellState` from successive visible sets.
#[derive(Debug, Clone, Default)]
pub struct CellStateTracker {
    previous_visible: BTreeSet<CellKey>,
}

impl CellStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells that were visible on the previous frame.
    pub fn previous_visible(&self) -> &BTreeSet<CellKey> {
        &self.previous_visible
    }

    pub fn update(&mut self, visible: BTreeSet<CellKey>) -> CellState {
        let cells_to_remove = self
            .previous_visible
            .difference(&visible)
            .cloned()
            .collect();
        self.previous_visible = visible.clone();
        CellState {
            required_cells: visible.clone(),
            visible_cells: visible,
            cells_to_remove,
        }
    }
}

/// All cells of zoom level `zoom` within a square radius of a center column/row.
///
/// Columns wrap around the antimeridian; rows are clamped to the grid.
pub fn cells_around(center_x: i64, center_y: i64, radius: i64, zoom: usize) -> BTreeSet<CellKey> {
    let side = 1i64 << zoom.min(MAX_ZOOM);
    // A wider window would only revisit wrapped columns.
    let radius = radius.clamp(0, side);
    let mut result = BTreeSet::new();
    for dy in -radius..=radius {
        let y = center_y.saturating_add(dy);
        if !(0..side).contains(&y) {
            continue;
        }
        for dx in -radius..=radius {
            let x = center_x.saturating_add(dx).rem_euclid(side);
            if let Ok(key) = CellKey::from_xyz(x as u64, y as u64, zoom) {
                result.insert(key);
            }
        }
    }
    result
}
