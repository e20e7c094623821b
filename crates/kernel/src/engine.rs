use basemap_common::CellKey;
use basemap_ecs::{CellEvent, ComponentStore};
use basemap_stream::{
    CellLoadingSystem, CellRemovingSystem, CellState, CellStateTracker, FetchRequest, FrameStats,
    FrameTimer, TileFetchQueue,
};
use basemap_tile::Tile;
use std::collections::BTreeSet;
use std::time::Instant;

use crate::config::BasemapConfig;

const FRAME_TIMER_WINDOW: usize = 60;

/// Owns the cell store and runs the load/evict systems once per frame.
///
/// Frame order: local tiles requested last frame are delivered, then
/// missing cells are created, then off-screen cells are hidden and evicted,
/// then requests for destroyed cells are dropped.
#[derive(Debug)]
pub struct BasemapEngine {
    config: BasemapConfig,
    store: ComponentStore,
    tracker: CellStateTracker,
    loading: CellLoadingSystem,
    removing: CellRemovingSystem,
    fetcher: TileFetchQueue,
    timer: FrameTimer,
    frame: u64,
    /// Store events produced by the last tick.
    events: Vec<CellEvent>,
}

impl BasemapEngine {
    pub fn new(config: BasemapConfig) -> Self {
        let mut store = ComponentStore::new();
        for layer in config.layers() {
            store.register_layer(layer);
        }
        tracing::info!(
            layers = ?config.layers(),
            cache_limit = config.tile_cache_limit,
            "basemap engine created"
        );
        Self {
            removing: CellRemovingSystem::new(config.tile_cache_limit),
            fetcher: TileFetchQueue::new(config.tile_source.clone()),
            config,
            store,
            tracker: CellStateTracker::new(),
            loading: CellLoadingSystem::new(),
            timer: FrameTimer::new(FRAME_TIMER_WINDOW),
            frame: 0,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &BasemapConfig {
        &self.config
    }

    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ComponentStore {
        &mut self.store
    }

    pub fn fetcher(&self) -> &TileFetchQueue {
        &self.fetcher
    }

    pub fn fetcher_mut(&mut self) -> &mut TileFetchQueue {
        &mut self.fetcher
    }

    pub fn removing(&self) -> &CellRemovingSystem {
        &self.removing
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn events(&self) -> &[CellEvent] {
        &self.events
    }

    /// Deliver a downloaded tile. False when the request is stale or its
    /// cell was already evicted.
    pub fn complete(&mut self, request: &FetchRequest, tile: Tile) -> bool {
        self.fetcher.complete(&mut self.store, request, tile)
    }

    /// Report a failed download. False when the request is stale or its
    /// cell was already evicted.
    pub fn fail(&mut self, request: &FetchRequest) -> bool {
        self.fetcher.fail(&mut self.store, request)
    }

    /// Advance one frame with the given on-screen cells.
    pub fn tick(&mut self, visible: BTreeSet<CellKey>) -> FrameStats {
        let state = self.tracker.update(visible);
        self.tick_with_state(&state)
    }

    /// Advance one frame with an explicit cell state.
    pub fn tick_with_state(&mut self, state: &CellState) -> FrameStats {
        let started = Instant::now();
        self.frame += 1;
        let _span = tracing::info_span!("basemap_tick", frame = self.frame).entered();

        let tiles_delivered = self.fetcher.resolve_local(&mut self.store);
        let loading = self
            .loading
            .update(&mut self.store, state, &mut self.fetcher);
        let removal = self.removing.update(&mut self.store, state);
        let dropped = self.fetcher.retain_live(&self.store);
        if dropped > 0 {
            tracing::debug!(dropped, "dropped requests for destroyed cells");
        }
        self.events = self.store.drain_events();

        let frame_time = started.elapsed();
        self.timer.record(frame_time);

        let stats = FrameStats {
            frame: self.frame,
            cells_created: loading.cells_created,
            requests_forwarded: loading.requests_forwarded,
            tiles_delivered,
            entities_hidden: removal.entities_hidden,
            entities_shown: removal.entities_shown,
            keys_evicted: removal.evicted.len(),
            error_keys_removed: removal.errors_removed.len(),
            queue_len: self.removing.queue().len(),
            entity_count: self.store.entity_count(),
            frame_time,
        };
        tracing::trace!(%stats, "tick complete");
        stats
    }
}
