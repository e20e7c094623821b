use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a cell entity in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_string()[..8])
    }
}

/// Independent partitions of the basemap cache.
///
/// Every layer keeps its own tile set and donor computation; eviction is
/// shared across all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasemapLayerKind {
    /// Vector ground: land, water, roads.
    World,
    /// Vector labels, drawn above data layers.
    Label,
    /// Cell grid overlay for diagnostics.
    Debug,
    /// Raster imagery.
    Raster,
}

impl BasemapLayerKind {
    pub const ALL: [BasemapLayerKind; 4] = [
        BasemapLayerKind::World,
        BasemapLayerKind::Label,
        BasemapLayerKind::Debug,
        BasemapLayerKind::Raster,
    ];

    pub fn is_debug(self) -> bool {
        self == BasemapLayerKind::Debug
    }

    pub fn name(self) -> &'static str {
        match self {
            BasemapLayerKind::World => "world",
            BasemapLayerKind::Label => "label",
            BasemapLayerKind::Debug => "debug",
            BasemapLayerKind::Raster => "raster",
        }
    }
}

impl fmt::Display for BasemapLayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_uniqueness() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn entity_id_display_is_short() {
        assert_eq!(EntityId::new().to_string().len(), 8);
    }

    #[test]
    fn only_debug_layer_is_debug() {
        let debug: Vec<_> = BasemapLayerKind::ALL
            .iter()
            .filter(|k| k.is_debug())
            .collect();
        assert_eq!(debug, vec![&BasemapLayerKind::Debug]);
    }
}
