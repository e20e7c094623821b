use basemap_common::{BasemapLayerKind, MapRect};
use basemap_ecs::ComponentStore;

use crate::blit::{Blit, cell_blits};

/// World extent the cell pyramid is drawn into.
#[derive(Debug, Clone, Copy)]
pub struct RenderView {
    pub world: MapRect,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            world: MapRect::square(256.0),
        }
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// Renderers read the cell store and never mutate it.
pub trait Renderer {
    type Output;

    fn render(&self, store: &ComponentStore, view: &RenderView) -> Self::Output;
}

/// Blits of every visible cell, layer by layer in layer order.
#[derive(Debug, Default)]
pub struct BlitRenderer;

impl Renderer for BlitRenderer {
    type Output = Vec<(BasemapLayerKind, Blit)>;

    fn render(&self, store: &ComponentStore, view: &RenderView) -> Self::Output {
        let mut out = Vec::new();
        for layer in store.layers() {
            for key in store.layer_keys(layer) {
                let Some(entity) = store.find(layer, key) else {
                    continue;
                };
                if !store.is_visible(entity) {
                    continue;
                }
                let Some(component) = store.tile(entity) else {
                    continue;
                };
                out.extend(
                    cell_blits(&component.tile, key, view.world)
                        .into_iter()
                        .map(|blit| (layer, blit)),
                );
            }
        }
        tracing::trace!(blits = out.len(), "rendered blits");
        out
    }
}

/// Human-readable dump of the visible cells, for the CLI and tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, store: &ComponentStore, view: &RenderView) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "=== Basemap (entities={}, hidden={}) ===\n",
            store.entity_count(),
            store.hidden_count()
        ));
        for layer in store.layers() {
            out.push_str(&format!("[{layer}] cells={}\n", store.layer_len(layer)));
            for key in store.layer_keys(layer) {
                let Some(entity) = store.find(layer, key) else {
                    continue;
                };
                if !store.is_visible(entity) {
                    continue;
                }
                let line = match (store.debug(entity), store.tile(entity)) {
                    (Some(debug), _) => {
                        format!("zoom={} frame={}", debug.zoom, debug.created_frame)
                    }
                    (None, Some(component)) => {
                        let rect = key.tile_rect(view.world);
                        format!(
                            "blits={} at=({:.1}, {:.1}) size={:.1}{}",
                            cell_blits(&component.tile, key, view.world).len(),
                            rect.origin.x,
                            rect.origin.y,
                            rect.width(),
                            if component.cacheable { "" } else { " failed" }
                        )
                    }
                    (None, None) => String::new(),
                };
                out.push_str(&format!("  {key} [{entity}] {line}\n"));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basemap_common::CellKey;
    use basemap_ecs::DebugCellComponent;
    use basemap_tile::{BitmapHandle, Tile};

    fn key(s: &str) -> CellKey {
        s.parse().unwrap()
    }

    fn store() -> ComponentStore {
        let mut store = ComponentStore::new();
        store.register_layer(BasemapLayerKind::Raster);
        store.register_layer(BasemapLayerKind::Debug);
        store
            .create_cell(
                BasemapLayerKind::Raster,
                key("0"),
                Tile::Snapshot(BitmapHandle(1)),
            )
            .unwrap();
        let hidden = store
            .create_cell(
                BasemapLayerKind::Raster,
                key("1"),
                Tile::Snapshot(BitmapHandle(2)),
            )
            .unwrap();
        store.hide(hidden);
        let debug = store
            .create_cell(BasemapLayerKind::Debug, key("0"), Tile::Empty)
            .unwrap();
        store.set_debug(
            debug,
            DebugCellComponent {
                zoom: 1,
                created_frame: 4,
            },
        );
        store
    }

    #[test]
    fn blit_renderer_skips_hidden_cells() {
        let out = BlitRenderer.render(&store(), &RenderView::default());
        assert_eq!(out.len(), 1);
        let (layer, blit) = out[0];
        assert_eq!(layer, BasemapLayerKind::Raster);
        assert_eq!(blit.bitmap, BitmapHandle(1));
        assert_eq!(blit.destination, MapRect::square(128.0));
    }

    #[test]
    fn debug_renderer_lists_visible_cells() {
        let output = DebugTextRenderer::new().render(&store(), &RenderView::default());
        assert!(output.contains("entities=3, hidden=1"));
        assert!(output.contains("blits=1 at=(0.0, 0.0) size=128.0"));
        assert!(output.contains("zoom=1 frame=4"));
        assert!(!output.contains("\n  1 ["));
    }

    #[test]
    fn render_view_default() {
        assert_eq!(RenderView::default().world, MapRect::square(256.0));
    }
}
