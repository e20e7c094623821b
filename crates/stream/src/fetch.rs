use basemap_common::{BasemapLayerKind, CellKey, EntityId};
use basemap_ecs::ComponentStore;
use basemap_tile::Tile;
use std::collections::BTreeMap;

use crate::source::TileSource;

/// `(layer, key)` pairs that received a placeholder this frame, with the
/// placeholder entity that should receive the real tile.
pub type MissingCells = BTreeMap<(BasemapLayerKind, CellKey), EntityId>;

/// Receives the cells that need a real tile.
///
/// Called at most once per frame by the loading system. Results are written
/// back into the store on some later frame, never awaited.
pub trait TileFetcher {
    fn request(&mut self, missing: &MissingCells);
}

/// One outstanding tile download.
///
/// The request is also the token for its result: `complete` and `fail` only
/// apply it while it is still the in-flight request of its cell and the
/// target entity is alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub layer: BasemapLayerKind,
    pub key: CellKey,
    pub entity: EntityId,
    /// Download URL, `None` for locally synthesized sources.
    pub url: Option<String>,
}

/// Fetcher that keeps at most one in-flight request per `(layer, key)`.
///
/// Local sources are resolved by `resolve_local`; downloaded sources are
/// handed out through `pending` and finished with `complete` or `fail`.
#[derive(Debug, Clone)]
pub struct TileFetchQueue {
    source: TileSource,
    in_flight: BTreeMap<(BasemapLayerKind, CellKey), FetchRequest>,
}

impl TileFetchQueue {
    pub fn new(source: TileSource) -> Self {
        Self {
            source,
            in_flight: BTreeMap::new(),
        }
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, layer: BasemapLayerKind, key: &CellKey) -> bool {
        self.in_flight.contains_key(&(layer, key.clone()))
    }

    /// The current request for a cell, if one is outstanding.
    pub fn in_flight(&self, layer: BasemapLayerKind, key: &CellKey) -> Option<&FetchRequest> {
        self.in_flight.get(&(layer, key.clone()))
    }

    /// Outstanding requests in `(layer, key)` order.
    pub fn pending(&self) -> impl Iterator<Item = &FetchRequest> + '_ {
        self.in_flight.values()
    }

    /// Write a loaded tile into the requesting entity.
    ///
    /// Returns false when `request` is no longer in flight or its entity is
    /// gone; the result is dropped.
    pub fn complete(&mut self, store: &mut ComponentStore, request: &FetchRequest, tile: Tile) -> bool {
        if !self.settle(store, request) {
            return false;
        }
        store.set_tile(request.entity, tile);
        store.set_cacheable(request.entity, true)
    }

    /// Mark the requesting entity as failed: blank payload, excluded from
    /// donors, evicted as soon as it is off screen.
    pub fn fail(&mut self, store: &mut ComponentStore, request: &FetchRequest) -> bool {
        if !self.settle(store, request) {
            return false;
        }
        tracing::warn!(layer = %request.layer, key = %request.key, "tile failed to load");
        store.set_tile(request.entity, Tile::Empty);
        store.set_cacheable(request.entity, false)
    }

    /// Retire `request` if it is the current one for its cell. True when its
    /// entity is still the live cell entity.
    fn settle(&mut self, store: &ComponentStore, request: &FetchRequest) -> bool {
        let slot = (request.layer, request.key.clone());
        match self.in_flight.get(&slot) {
            Some(current) if current.entity == request.entity => {
                self.in_flight.remove(&slot);
            }
            _ => {
                tracing::debug!(
                    layer = %request.layer,
                    key = %request.key,
                    entity = %request.entity,
                    "dropping result of stale request"
                );
                return false;
            }
        }
        store.find(request.layer, &request.key) == Some(request.entity)
    }

    /// Finish every in-flight request of a local source. Returns how many
    /// tiles were written.
    pub fn resolve_local(&mut self, store: &mut ComponentStore) -> usize {
        if !self.source.is_local() {
            return 0;
        }
        let requests = std::mem::take(&mut self.in_flight);
        requests
            .into_values()
            .filter(|request| {
                let Some(tile) = self.source.local_tile(&request.key) else {
                    return false;
                };
                store.set_tile(request.entity, tile)
            })
            .count()
    }

    /// Drop requests whose target entity was destroyed.
    pub fn retain_live(&mut self, store: &ComponentStore) -> usize {
        let before = self.in_flight.len();
        self.in_flight
            .retain(|_, request| store.contains(request.entity));
        before - self.in_flight.len()
    }
}

impl TileFetcher for TileFetchQueue {
    fn request(&mut self, missing: &MissingCells) {
        let mut queued = 0usize;
        for ((layer, key), entity) in missing {
            let slot = (*layer, key.clone());
            if self
                .in_flight
                .get(&slot)
                .is_some_and(|current| current.entity == *entity)
            {
                tracing::trace!(%layer, %key, "fetch already in flight");
                continue;
            }
            let request = FetchRequest {
                layer: *layer,
                key: key.clone(),
                entity: *entity,
                url: self.source.url_for(key),
            };
            // A request for an older entity of the same cell is superseded.
            self.in_flight.insert(slot, request);
            queued += 1;
        }
        tracing::debug!(queued, in_flight = self.in_flight.len(), "tile requests queued");
    }
}
