use basemap_common::{BasemapLayerKind, CellKey};
use basemap_ecs::{ComponentStore, DebugCellComponent};
use basemap_tile::{DonorTileCalculator, Tile};
use std::collections::BTreeMap;

use crate::fetch::{MissingCells, TileFetcher};
use crate::viewport::CellState;

/// Result of one loading pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadingReport {
    pub cells_created: usize,
    pub requests_forwarded: usize,
}

/// Creates placeholder entities for required cells that have none yet.
///
/// Each placeholder starts with a donor tile built from the cacheable tiles
/// present at the start of the pass; cells created during the pass never
/// donate to each other.
#[derive(Debug, Clone, Default)]
pub struct CellLoadingSystem {
    frame: u64,
}

impl CellLoadingSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn update(
        &mut self,
        store: &mut ComponentStore,
        state: &CellState,
        fetcher: &mut dyn TileFetcher,
    ) -> LoadingReport {
        self.frame += 1;
        let _span = tracing::info_span!("cell_loading", frame = self.frame).entered();

        let layers: Vec<BasemapLayerKind> = store.layers().collect();

        let existing: &ComponentStore = store;
        let missing: Vec<(BasemapLayerKind, CellKey)> = layers
            .iter()
            .flat_map(|&layer| {
                state
                    .required_cells
                    .iter()
                    .filter(move |key| existing.find(layer, key).is_none())
                    .map(move |key| (layer, key.clone()))
            })
            .collect();

        if missing.is_empty() {
            return LoadingReport::default();
        }

        let donors = donor_calculators(store, &layers);

        let mut report = LoadingReport::default();
        let mut requests = MissingCells::new();
        for (layer, key) in missing {
            let tile = if layer.is_debug() {
                Tile::Empty
            } else {
                donors
                    .get(&layer)
                    .map(|calculator| calculator.create_donor_tile(&key))
                    .unwrap_or_default()
            };
            let donor_empty = tile.is_empty();

            let entity = match store.create_cell(layer, key.clone(), tile) {
                Ok(entity) => entity,
                Err(err) => {
                    tracing::warn!(%err, "skipping placeholder");
                    continue;
                }
            };
            tracing::debug!(%layer, %key, %entity, donor_empty, "created cell placeholder");
            report.cells_created += 1;
            if layer.is_debug() {
                store.set_debug(
                    entity,
                    DebugCellComponent {
                        zoom: key.zoom(),
                        created_frame: self.frame,
                    },
                );
            } else {
                requests.insert((layer, key), entity);
            }
        }

        if !requests.is_empty() {
            fetcher.request(&requests);
        }
        report.requests_forwarded = requests.len();

        tracing::trace!(
            created = report.cells_created,
            requested = report.requests_forwarded,
            "cell loading complete"
        );
        report
    }
}

/// Freeze the cacheable tiles of every non-debug layer into calculators.
fn donor_calculators(
    store: &ComponentStore,
    layers: &[BasemapLayerKind],
) -> BTreeMap<BasemapLayerKind, DonorTileCalculator> {
    layers
        .iter()
        .filter(|layer| !layer.is_debug())
        .map(|&layer| (layer, DonorTileCalculator::new(store.cacheable_tiles(layer))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basemap_tile::BitmapHandle;
    use std::collections::BTreeSet;

    #[derive(Default)]
    struct RecordingFetcher {
        calls: Vec<MissingCells>,
    }

    impl TileFetcher for RecordingFetcher {
        fn request(&mut self, missing: &MissingCells) {
            self.calls.push(missing.clone());
        }
    }

    fn key(s: &str) -> CellKey {
        s.parse().unwrap()
    }

    fn required(list: &[&str]) -> CellState {
        let cells: BTreeSet<CellKey> = list.iter().map(|s| key(s)).collect();
        CellState {
            required_cells: cells.clone(),
            visible_cells: cells,
            cells_to_remove: BTreeSet::new(),
        }
    }

    fn store_with(layers: &[BasemapLayerKind]) -> ComponentStore {
        let mut store = ComponentStore::new();
        for layer in layers {
            store.register_layer(*layer);
        }
        store
    }

    fn tile_of(store: &ComponentStore, layer: BasemapLayerKind, k: &str) -> Tile {
        let entity = store.find(layer, &key(k)).unwrap();
        Tile::clone(&store.tile(entity).unwrap().tile)
    }

    #[test]
    fn creates_missing_cells_per_layer() {
        let mut store = store_with(&[BasemapLayerKind::World, BasemapLayerKind::Label]);
        store
            .create_cell(BasemapLayerKind::World, key("0"), Tile::Empty)
            .unwrap();
        let mut fetcher = RecordingFetcher::default();
        let mut system = CellLoadingSystem::new();

        let report = system.update(&mut store, &required(&["0", "1"]), &mut fetcher);

        assert_eq!(report.cells_created, 3);
        assert_eq!(store.layer_len(BasemapLayerKind::World), 2);
        assert_eq!(store.layer_len(BasemapLayerKind::Label), 2);
        assert_eq!(fetcher.calls.len(), 1);
        let requested: Vec<_> = fetcher.calls[0].keys().cloned().collect();
        assert_eq!(
            requested,
            vec![
                (BasemapLayerKind::World, key("1")),
                (BasemapLayerKind::Label, key("0")),
                (BasemapLayerKind::Label, key("1")),
            ]
        );
        for ((layer, k), entity) in &fetcher.calls[0] {
            assert_eq!(store.find(*layer, k), Some(*entity));
        }
    }

    #[test]
    fn nothing_missing_means_no_fetch() {
        let mut store = store_with(&[BasemapLayerKind::Raster]);
        let mut fetcher = RecordingFetcher::default();
        let mut system = CellLoadingSystem::new();
        system.update(&mut store, &required(&["0"]), &mut fetcher);
        let report = system.update(&mut store, &required(&["0"]), &mut fetcher);
        assert_eq!(report, LoadingReport::default());
        assert_eq!(fetcher.calls.len(), 1);
    }

    #[test]
    fn placeholder_gets_donor_from_ancestor() {
        let mut store = store_with(&[BasemapLayerKind::Raster]);
        store
            .create_cell(
                BasemapLayerKind::Raster,
                key("0"),
                Tile::Snapshot(BitmapHandle(1)),
            )
            .unwrap();
        let mut system = CellLoadingSystem::new();
        system.update(
            &mut store,
            &required(&["01"]),
            &mut RecordingFetcher::default(),
        );
        assert_eq!(
            tile_of(&store, BasemapLayerKind::Raster, "01"),
            Tile::sub_tile(Tile::Snapshot(BitmapHandle(1)), key("1"))
        );
    }

    #[test]
    fn donors_come_from_own_layer_only() {
        let mut store = store_with(&[BasemapLayerKind::World, BasemapLayerKind::Label]);
        store
            .create_cell(
                BasemapLayerKind::World,
                key("0"),
                Tile::Snapshot(BitmapHandle(1)),
            )
            .unwrap();
        let mut system = CellLoadingSystem::new();
        system.update(
            &mut store,
            &required(&["0", "00"]),
            &mut RecordingFetcher::default(),
        );
        assert!(!tile_of(&store, BasemapLayerKind::World, "00").is_empty());
        assert!(tile_of(&store, BasemapLayerKind::Label, "00").is_empty());
    }

    #[test]
    fn donor_snapshot_is_frozen_for_the_frame() {
        // "0" and "00" are both created this frame; "00" must not see "0".
        let mut store = store_with(&[BasemapLayerKind::Raster]);
        let mut system = CellLoadingSystem::new();
        system.update(
            &mut store,
            &required(&["0", "00"]),
            &mut RecordingFetcher::default(),
        );
        assert!(tile_of(&store, BasemapLayerKind::Raster, "0").is_empty());
        assert!(tile_of(&store, BasemapLayerKind::Raster, "00").is_empty());
    }

    #[test]
    fn non_cacheable_tiles_do_not_donate() {
        let mut store = store_with(&[BasemapLayerKind::Raster]);
        let broken = store
            .create_cell(
                BasemapLayerKind::Raster,
                key("0"),
                Tile::Snapshot(BitmapHandle(1)),
            )
            .unwrap();
        store.set_cacheable(broken, false);
        let mut system = CellLoadingSystem::new();
        system.update(
            &mut store,
            &required(&["01"]),
            &mut RecordingFetcher::default(),
        );
        assert!(tile_of(&store, BasemapLayerKind::Raster, "01").is_empty());
    }

    #[test]
    fn debug_layer_gets_marker_and_no_fetch() {
        let mut store = store_with(&[BasemapLayerKind::Debug]);
        let mut fetcher = RecordingFetcher::default();
        let mut system = CellLoadingSystem::new();
        let report = system.update(&mut store, &required(&["012"]), &mut fetcher);

        assert_eq!(report.cells_created, 1);
        assert_eq!(report.requests_forwarded, 0);
        assert!(fetcher.calls.is_empty());
        let entity = store.find(BasemapLayerKind::Debug, &key("012")).unwrap();
        assert_eq!(
            store.debug(entity),
            Some(&DebugCellComponent {
                zoom: 3,
                created_frame: 1
            })
        );
    }
}
