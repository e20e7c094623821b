use basemap_common::{CellKey, EntityId};
use basemap_ecs::ComponentStore;
use std::collections::{BTreeSet, VecDeque};

use crate::viewport::CellState;

/// Result of one removal pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub entities_hidden: usize,
    pub entities_shown: usize,
    /// Keys destroyed because the FIFO queue exceeded the cache limit, oldest first.
    pub evicted: Vec<CellKey>,
    /// Keys destroyed immediately because one of their tiles failed to load.
    pub errors_removed: Vec<CellKey>,
}

impl RemovalReport {
    /// Every key destroyed this pass.
    pub fn destroyed_keys(&self) -> impl Iterator<Item = &CellKey> + '_ {
        self.evicted.iter().chain(&self.errors_removed)
    }
}

/// Hides cells that left the viewport and evicts the oldest hidden ones.
///
/// One FIFO queue is shared by every layer. A key leaves the queue when it
/// becomes visible again or when it is evicted.
#[derive(Debug, Clone)]
pub struct CellRemovingSystem {
    cache_limit: usize,
    queue: VecDeque<CellKey>,
}

impl CellRemovingSystem {
    /// A limit of zero or less keeps nothing that is off screen.
    pub fn new(tile_cache_limit: i64) -> Self {
        Self {
            cache_limit: usize::try_from(tile_cache_limit).unwrap_or(0),
            queue: VecDeque::new(),
        }
    }

    pub fn cache_limit(&self) -> usize {
        self.cache_limit
    }

    /// Hidden keys awaiting eviction, oldest first.
    pub fn queue(&self) -> &VecDeque<CellKey> {
        &self.queue
    }

    pub fn update(&mut self, store: &mut ComponentStore, state: &CellState) -> RemovalReport {
        let _span = tracing::info_span!("cell_removing").entered();
        let mut report = RemovalReport::default();

        for key in &state.visible_cells {
            for entity in entities_of(store, key) {
                if store.show(entity) {
                    report.entities_shown += 1;
                }
            }
        }

        let leaving: BTreeSet<CellKey> = state.leaving_cells().cloned().collect();
        for key in &leaving {
            for entity in entities_of(store, key) {
                if store.hide(entity) {
                    report.entities_hidden += 1;
                }
            }
        }

        self.queue
            .retain(|key| !state.visible_cells.contains(key) && !leaving.contains(key));
        self.queue.extend(leaving.iter().cloned());

        // Covers cells that failed this frame as well as downloads that
        // failed after their cell was already hidden.
        let failed: Vec<CellKey> = self
            .queue
            .iter()
            .filter(|key| has_failed(store, key))
            .cloned()
            .collect();
        if !failed.is_empty() {
            self.queue.retain(|queued| !failed.contains(queued));
            for key in failed {
                hard_remove(store, &key);
                tracing::debug!(%key, "removed failed cell");
                report.errors_removed.push(key);
            }
        }

        while self.queue.len() > self.cache_limit {
            let Some(key) = self.queue.pop_front() else {
                break;
            };
            let removed = hard_remove(store, &key);
            tracing::debug!(%key, removed, "evicted cell");
            report.evicted.push(key);
        }

        tracing::trace!(
            hidden = report.entities_hidden,
            shown = report.entities_shown,
            evicted = report.evicted.len(),
            errors = report.errors_removed.len(),
            queued = self.queue.len(),
            "cell removing complete"
        );
        report
    }
}

fn entities_of(store: &ComponentStore, key: &CellKey) -> Vec<EntityId> {
    store.entities_for_key(key).collect()
}

/// True when any layer failed to load `key`.
fn has_failed(store: &ComponentStore, key: &CellKey) -> bool {
    store
        .entities_for_key(key)
        .any(|entity| !store.is_cacheable(entity))
}

/// Destroy the entities of `key` in every layer.
fn hard_remove(store: &mut ComponentStore, key: &CellKey) -> usize {
    entities_of(store, key)
        .into_iter()
        .filter(|entity| store.destroy(*entity).is_some())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::CellStateTracker;
    use basemap_common::BasemapLayerKind;
    use basemap_tile::Tile;

    fn key(s: &str) -> CellKey {
        s.parse().unwrap()
    }

    fn keys(list: &[&str]) -> BTreeSet<CellKey> {
        list.iter().map(|s| key(s)).collect()
    }

    fn store_with(layers: &[BasemapLayerKind], cells: &[&str]) -> ComponentStore {
        let mut store = ComponentStore::new();
        for layer in layers {
            store.register_layer(*layer);
            for k in cells {
                store.create_cell(*layer, key(k), Tile::Empty).unwrap();
            }
        }
        store
    }

    fn hidden_keys(store: &ComponentStore) -> BTreeSet<CellKey> {
        store
            .cells()
            .iter()
            .filter(|(id, _)| !store.is_visible(**id))
            .map(|(_, cell)| cell.key.clone())
            .collect()
    }

    #[test]
    fn sequential_pan_evicts_oldest() {
        let mut store = store_with(&[BasemapLayerKind::Raster], &["0", "1", "2", "3"]);
        let mut tracker = CellStateTracker::new();
        let mut system = CellRemovingSystem::new(2);

        let mut evicted = Vec::new();
        for k in ["0", "1", "2", "3"] {
            let state = tracker.update(keys(&[k]));
            evicted.extend(system.update(&mut store, &state).evicted);
        }

        assert_eq!(evicted, vec![key("0")]);
        assert_eq!(system.queue().iter().cloned().collect::<Vec<_>>(), vec![key("1"), key("2")]);
        assert_eq!(hidden_keys(&store), keys(&["1", "2"]));
        assert!(store.find(BasemapLayerKind::Raster, &key("3")).is_some());
    }

    #[test]
    fn visible_again_leaves_queue() {
        let mut store = store_with(&[BasemapLayerKind::Raster], &["0", "1"]);
        let mut tracker = CellStateTracker::new();
        let mut system = CellRemovingSystem::new(10);

        system.update(&mut store, &tracker.update(keys(&["0"])));
        let report = system.update(&mut store, &tracker.update(keys(&["1"])));
        assert_eq!(report.entities_hidden, 1);
        assert_eq!(system.queue().len(), 1);

        let report = system.update(&mut store, &tracker.update(keys(&["0", "1"])));
        assert_eq!(report.entities_shown, 1);
        assert!(system.queue().is_empty());
        assert!(hidden_keys(&store).is_empty());
    }

    #[test]
    fn eviction_spans_all_layers() {
        let layers = [BasemapLayerKind::World, BasemapLayerKind::Label];
        let mut store = store_with(&layers, &["0", "1"]);
        let mut tracker = CellStateTracker::new();
        let mut system = CellRemovingSystem::new(0);

        system.update(&mut store, &tracker.update(keys(&["0"])));
        let report = system.update(&mut store, &tracker.update(keys(&["1"])));

        assert_eq!(report.evicted, vec![key("0")]);
        for layer in layers {
            assert_eq!(store.find(layer, &key("0")), None);
            assert!(store.find(layer, &key("1")).is_some());
        }
    }

    #[test]
    fn failed_cell_removed_immediately() {
        let layers = [BasemapLayerKind::World, BasemapLayerKind::Label];
        let mut store = store_with(&layers, &["0", "1"]);
        let broken = store.find(BasemapLayerKind::Label, &key("0")).unwrap();
        store.set_cacheable(broken, false);

        let mut tracker = CellStateTracker::new();
        let mut system = CellRemovingSystem::new(100);
        system.update(&mut store, &tracker.update(keys(&["0"])));
        let report = system.update(&mut store, &tracker.update(keys(&["1"])));

        assert_eq!(report.errors_removed, vec![key("0")]);
        assert!(report.evicted.is_empty());
        assert!(system.queue().is_empty());
        for layer in layers {
            assert_eq!(store.find(layer, &key("0")), None);
        }
    }

    #[test]
    fn failure_after_hide_removed_next_pass() {
        let mut store = store_with(&[BasemapLayerKind::Raster], &["0", "1"]);
        let mut tracker = CellStateTracker::new();
        let mut system = CellRemovingSystem::new(100);
        system.update(&mut store, &tracker.update(keys(&["0"])));
        system.update(&mut store, &tracker.update(keys(&["1"])));
        assert_eq!(system.queue().len(), 1);

        let hidden = store.find(BasemapLayerKind::Raster, &key("0")).unwrap();
        store.set_cacheable(hidden, false);
        let report = system.update(&mut store, &tracker.update(keys(&["1"])));

        assert_eq!(report.errors_removed, vec![key("0")]);
        assert!(system.queue().is_empty());
        assert!(!store.contains(hidden));
        assert_eq!(store.hidden_count(), 0);
    }

    #[test]
    fn failed_cell_stays_while_visible() {
        let mut store = store_with(&[BasemapLayerKind::Raster], &["0"]);
        let broken = store.find(BasemapLayerKind::Raster, &key("0")).unwrap();
        store.set_cacheable(broken, false);

        let mut tracker = CellStateTracker::new();
        let mut system = CellRemovingSystem::new(0);
        let report = system.update(&mut store, &tracker.update(keys(&["0"])));
        assert!(report.destroyed_keys().next().is_none());
        assert!(store.contains(broken));
    }

    #[test]
    fn negative_limit_evicts_everything_hidden() {
        let mut store = store_with(&[BasemapLayerKind::Raster], &["0", "1", "2"]);
        let mut tracker = CellStateTracker::new();
        let mut system = CellRemovingSystem::new(-5);
        assert_eq!(system.cache_limit(), 0);

        system.update(&mut store, &tracker.update(keys(&["0", "1"])));
        let report = system.update(&mut store, &tracker.update(keys(&["2"])));
        assert_eq!(report.evicted, vec![key("0"), key("1")]);
        assert!(hidden_keys(&store).is_empty());

        let report = system.update(&mut store, &tracker.update(BTreeSet::new()));
        assert_eq!(report.evicted, vec![key("2")]);
        assert_eq!(store.entity_count(), 0);
    }

    #[test]
    fn key_both_visible_and_leaving_is_kept() {
        let mut store = store_with(&[BasemapLayerKind::Raster], &["0"]);
        let mut system = CellRemovingSystem::new(0);
        let state = CellState {
            required_cells: keys(&["0"]),
            visible_cells: keys(&["0"]),
            cells_to_remove: keys(&["0"]),
        };
        let report = system.update(&mut store, &state);
        assert_eq!(report.entities_hidden, 0);
        assert!(report.evicted.is_empty());
        assert_eq!(store.entity_count(), 1);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_frame() -> impl Strategy<Value = BTreeSet<CellKey>> {
            prop::collection::btree_set(0usize..16, 0..6).prop_map(|cells| {
                cells
                    .into_iter()
                    .map(|i| CellKey::from_xyz((i % 4) as u64, (i / 4) as u64, 2).unwrap())
                    .collect()
            })
        }

        proptest! {
            #[test]
            fn visible_never_evicted_and_cache_bounded(
                frames in prop::collection::vec(arb_frame(), 1..20),
                limit in 0i64..5
            ) {
                let mut store = ComponentStore::new();
                store.register_layer(BasemapLayerKind::Raster);
                let mut tracker = CellStateTracker::new();
                let mut system = CellRemovingSystem::new(limit);

                for visible in frames {
                    for k in &visible {
                        if store.find(BasemapLayerKind::Raster, k).is_none() {
                            store.create_cell(BasemapLayerKind::Raster, k.clone(), Tile::Empty).unwrap();
                        }
                    }
                    let state = tracker.update(visible.clone());
                    let report = system.update(&mut store, &state);

                    for destroyed in report.destroyed_keys() {
                        prop_assert!(!visible.contains(destroyed));
                    }
                    prop_assert!(hidden_keys(&store).len() <= limit as usize);
                    for k in &visible {
                        prop_assert!(store.find(BasemapLayerKind::Raster, k).is_some());
                    }
                }
            }
        }
    }
}
