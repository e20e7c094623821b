use basemap_common::CellKey;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::tile::Tile;

/// Builds placeholder tiles for cells that are still loading.
///
/// Built from the cacheable tiles of one layer and never mutated afterwards,
/// so every call against the same calculator returns the same tile.
#[derive(Debug, Clone, Default)]
pub struct DonorTileCalculator {
    tiles: BTreeMap<CellKey, Arc<Tile>>,
}

impl DonorTileCalculator {
    pub fn new(tiles: BTreeMap<CellKey, Arc<Tile>>) -> Self {
        Self { tiles }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Best substitute for `requested` from the known tiles.
    ///
    /// The closest ancestor gives a cropped background, the broadest
    /// descendants are patched on top. Either part may be missing; with
    /// neither the result is `Tile::Empty`.
    pub fn create_donor_tile(&self, requested: &CellKey) -> Tile {
        let up = self.up_donor(requested);
        let down = self.down_donor(requested);

        match (up.is_empty(), down.is_empty()) {
            (false, false) => Tile::composite([
                (Arc::new(up), CellKey::root()),
                (Arc::new(down), CellKey::root()),
            ]),
            (false, true) => up,
            (true, false) => down,
            (true, true) => Tile::Empty,
        }
    }

    /// Crop of the longest known prefix of `requested`.
    fn up_donor(&self, requested: &CellKey) -> Tile {
        let path = requested.quadrants();
        (0..=path.len())
            .rev()
            .find_map(|len| {
                let ancestor = CellKey::from_quadrants(path[..len].iter().copied());
                let tile = self.tiles.get(&ancestor)?;
                let crop = requested.sub_key(&ancestor)?;
                Some(Tile::SubTile(tile.clone(), crop))
            })
            .unwrap_or(Tile::Empty)
    }

    /// Broadest known descendants of `requested`, placed at their offsets.
    fn down_donor(&self, requested: &CellKey) -> Tile {
        // Descendants of a key are contiguous right after it in key order.
        let descendants = self
            .tiles
            .range(requested.clone()..)
            .take_while(|(key, _)| key.starts_with(requested))
            .filter(|(key, _)| key.zoom() > requested.zoom());

        let cover = covering_set(descendants.clone().map(|(key, _)| key));
        if cover.is_empty() {
            return Tile::Empty;
        }

        Tile::composite(descendants.filter_map(|(key, tile)| {
            if cover.binary_search(&key).is_err() {
                return None;
            }
            key.sub_key(requested).map(|offset| (tile.clone(), offset))
        }))
    }
}

impl FromIterator<(CellKey, Tile)> for DonorTileCalculator {
    fn from_iter<I: IntoIterator<Item = (CellKey, Tile)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(key, tile)| (key, Arc::new(tile)))
                .collect(),
        )
    }
}

/// Minimal set of keys covering every candidate.
///
/// A candidate already covered by an accepted, broader key is skipped; an
/// accepted candidate supersedes previously accepted keys nested under it.
/// The result does not depend on the order of `candidates` and is sorted.
pub fn covering_set<'a>(candidates: impl IntoIterator<Item = &'a CellKey>) -> Vec<&'a CellKey> {
    let mut accepted: Vec<&CellKey> = Vec::new();
    for candidate in candidates {
        if accepted.iter().any(|a| candidate.starts_with(a)) {
            continue;
        }
        accepted.retain(|a| !a.starts_with(candidate));
        accepted.push(candidate);
    }
    accepted.sort();
    accepted
}
