//! Deterministic cell entity/component store.
//!
//! Each cell entity is identified by `(layer, CellKey)` and owns a tile
//! payload. Components are stored in BTreeMap for deterministic iteration.
//!
//! # Invariants
//! - At most one entity per `(layer, CellKey)`.
//! - All mutations produce events.
//! - Destroying an entity detaches it from its layer index.

use basemap_common::{BasemapLayerKind, CellKey, EntityId};
use basemap_tile::Tile;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Identifies which cell of which layer an entity stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellComponent {
    pub layer: BasemapLayerKind,
    pub key: CellKey,
}

/// Current payload of a cell entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileComponent {
    pub tile: Arc<Tile>,
    /// Cleared by the fetcher when the tile failed to load.
    pub cacheable: bool,
}

/// Marker carried by cells of the debug layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugCellComponent {
    pub zoom: usize,
    pub created_frame: u64,
}

/// Errors from store mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("layer {0} is not registered")]
    UnknownLayer(BasemapLayerKind),
    #[error("cell {key} already exists in layer {layer}")]
    DuplicateCell {
        layer: BasemapLayerKind,
        key: CellKey,
    },
}

/// Events produced by store mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellEvent {
    Created {
        entity: EntityId,
        layer: BasemapLayerKind,
        key: CellKey,
    },
    TileUpdated {
        entity: EntityId,
        cacheable: bool,
    },
    Hidden {
        entity: EntityId,
    },
    Shown {
        entity: EntityId,
    },
    Destroyed {
        entity: EntityId,
        layer: BasemapLayerKind,
        key: CellKey,
    },
}

/// Storage for all cell entities across every registered layer.
#[derive(Debug, Clone, Default)]
pub struct ComponentStore {
    cells: BTreeMap<EntityId, CellComponent>,
    tiles: BTreeMap<EntityId, TileComponent>,
    debug: BTreeMap<EntityId, DebugCellComponent>,
    hidden: BTreeSet<EntityId>,
    /// Per-layer entity index, doubling as the `(layer, key)` uniqueness check.
    layers: BTreeMap<BasemapLayerKind, BTreeMap<CellKey, EntityId>>,
    events: Vec<CellEvent>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return all pending events.
    pub fn drain_events(&mut self) -> Vec<CellEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only access to pending events.
    pub fn events(&self) -> &[CellEvent] {
        &self.events
    }

    // --- Layers ---

    /// Start tracking a layer. Returns false if it was already registered.
    pub fn register_layer(&mut self, layer: BasemapLayerKind) -> bool {
        if self.layers.contains_key(&layer) {
            return false;
        }
        tracing::debug!(%layer, "registered basemap layer");
        self.layers.insert(layer, BTreeMap::new());
        true
    }

    pub fn layers(&self) -> impl Iterator<Item = BasemapLayerKind> + '_ {
        self.layers.keys().copied()
    }

    pub fn is_registered(&self, layer: BasemapLayerKind) -> bool {
        self.layers.contains_key(&layer)
    }

    /// Keys backed by an entity in `layer`, in key order.
    pub fn layer_keys(&self, layer: BasemapLayerKind) -> impl Iterator<Item = &CellKey> + '_ {
        self.layers
            .get(&layer)
            .into_iter()
            .flat_map(|index| index.keys())
    }

    /// Number of entities in `layer`.
    pub fn layer_len(&self, layer: BasemapLayerKind) -> usize {
        self.layers.get(&layer).map_or(0, BTreeMap::len)
    }

    // --- Entities ---

    /// Create a cell entity with `tile` as its initial payload, cacheable and visible.
    pub fn create_cell(
        &mut self,
        layer: BasemapLayerKind,
        key: CellKey,
        tile: Tile,
    ) -> Result<EntityId, StoreError> {
        let index = self
            .layers
            .get_mut(&layer)
            .ok_or(StoreError::UnknownLayer(layer))?;
        if index.contains_key(&key) {
            return Err(StoreError::DuplicateCell { layer, key });
        }

        let entity = EntityId::new();
        index.insert(key.clone(), entity);
        self.cells.insert(
            entity,
            CellComponent {
                layer,
                key: key.clone(),
            },
        );
        self.tiles.insert(
            entity,
            TileComponent {
                tile: Arc::new(tile),
                cacheable: true,
            },
        );
        self.events.push(CellEvent::Created { entity, layer, key });
        Ok(entity)
    }

    /// Destroy an entity and detach it from its layer index.
    pub fn destroy(&mut self, entity: EntityId) -> Option<CellComponent> {
        let cell = self.cells.remove(&entity)?;
        self.tiles.remove(&entity);
        self.debug.remove(&entity);
        self.hidden.remove(&entity);
        if let Some(index) = self.layers.get_mut(&cell.layer) {
            index.remove(&cell.key);
        }
        self.events.push(CellEvent::Destroyed {
            entity,
            layer: cell.layer,
            key: cell.key.clone(),
        });
        Some(cell)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.cells.contains_key(&entity)
    }

    pub fn entity_count(&self) -> usize {
        self.cells.len()
    }

    pub fn find(&self, layer: BasemapLayerKind, key: &CellKey) -> Option<EntityId> {
        self.layers.get(&layer)?.get(key).copied()
    }

    /// Entities standing for `key` in any layer.
    pub fn entities_for_key<'a>(&'a self, key: &'a CellKey) -> impl Iterator<Item = EntityId> + 'a {
        self.layers
            .values()
            .filter_map(move |index| index.get(key).copied())
    }

    pub fn cells(&self) -> &BTreeMap<EntityId, CellComponent> {
        &self.cells
    }

    pub fn cell(&self, entity: EntityId) -> Option<&CellComponent> {
        self.cells.get(&entity)
    }

    // --- Tile ---

    pub fn tile(&self, entity: EntityId) -> Option<&TileComponent> {
        self.tiles.get(&entity)
    }

    /// Swap the payload of an entity. Returns false if the entity is gone.
    pub fn set_tile(&mut self, entity: EntityId, tile: Tile) -> bool {
        let Some(component) = self.tiles.get_mut(&entity) else {
            return false;
        };
        component.tile = Arc::new(tile);
        self.events.push(CellEvent::TileUpdated {
            entity,
            cacheable: component.cacheable,
        });
        true
    }

    /// Set the cacheable flag. Returns false if the entity is gone.
    pub fn set_cacheable(&mut self, entity: EntityId, cacheable: bool) -> bool {
        let Some(component) = self.tiles.get_mut(&entity) else {
            return false;
        };
        if component.cacheable != cacheable {
            component.cacheable = cacheable;
            self.events
                .push(CellEvent::TileUpdated { entity, cacheable });
        }
        true
    }

    pub fn is_cacheable(&self, entity: EntityId) -> bool {
        self.tiles.get(&entity).is_some_and(|t| t.cacheable)
    }

    /// Cacheable tiles of one layer keyed by cell.
    pub fn cacheable_tiles(&self, layer: BasemapLayerKind) -> BTreeMap<CellKey, Arc<Tile>> {
        let Some(index) = self.layers.get(&layer) else {
            return BTreeMap::new();
        };
        index
            .iter()
            .filter_map(|(key, entity)| {
                let component = self.tiles.get(entity)?;
                component
                    .cacheable
                    .then(|| (key.clone(), component.tile.clone()))
            })
            .collect()
    }

    // --- Debug ---

    pub fn set_debug(&mut self, entity: EntityId, debug: DebugCellComponent) -> bool {
        if !self.cells.contains_key(&entity) {
            return false;
        }
        self.debug.insert(entity, debug);
        true
    }

    pub fn debug(&self, entity: EntityId) -> Option<&DebugCellComponent> {
        self.debug.get(&entity)
    }

    // --- Visibility ---

    /// Stop rendering an entity without destroying it.
    pub fn hide(&mut self, entity: EntityId) -> bool {
        if !self.cells.contains_key(&entity) || !self.hidden.insert(entity) {
            return false;
        }
        self.events.push(CellEvent::Hidden { entity });
        true
    }

    /// Undo a previous `hide`.
    pub fn show(&mut self, entity: EntityId) -> bool {
        if !self.hidden.remove(&entity) {
            return false;
        }
        self.events.push(CellEvent::Shown { entity });
        true
    }

    pub fn is_visible(&self, entity: EntityId) -> bool {
        self.cells.contains_key(&entity) && !self.hidden.contains(&entity)
    }

    pub fn hidden_count(&self) -> usize {
        self.hidden.len()
    }
}

pub fn crate_info() -> &'static str {
    "basemap-ecs v0.1.0"
}
