//! Basemap kernel: configuration and the per-frame engine tying the cell
//! store, loading and removal systems together.
//!
//! # Invariants
//! - Layers are registered once, from configuration, before the first frame.
//! - Each tick runs loading before removal.

pub mod config;
pub mod engine;

pub use config::{BasemapConfig, ConfigError, DEFAULT_TILE_CACHE_LIMIT};
pub use engine::BasemapEngine;

pub fn crate_info() -> &'static str {
    "basemap-kernel v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("kernel"));
    }
}
