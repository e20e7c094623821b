use basemap_common::{BasemapLayerKind, CellKey};
use basemap_tile::{BitmapHandle, Tile};
use serde::{Deserialize, Serialize};

fn default_protocol_version() -> u32 {
    1
}

/// Where basemap tiles come from.
///
/// Solid color and checkerboard sources are synthesized locally; raster and
/// vector sources produce URLs for an external downloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TileSource {
    SolidColor {
        color: [u8; 4],
    },
    Checkerboard {
        light: [u8; 4],
        dark: [u8; 4],
    },
    /// Templates may use `{z}`, `{x}`, `{y}` and `{q}` (quadkey). Several
    /// templates are spread across cells to balance hosts.
    Raster {
        url_templates: Vec<String>,
    },
    Vector {
        url: String,
        #[serde(default = "default_protocol_version")]
        protocol_version: u32,
    },
}

impl Default for TileSource {
    fn default() -> Self {
        TileSource::Checkerboard {
            light: [0xe8, 0xe8, 0xe8, 0xff],
            dark: [0xc8, 0xc8, 0xc8, 0xff],
        }
    }
}

impl TileSource {
    pub fn is_vector(&self) -> bool {
        matches!(self, TileSource::Vector { .. })
    }

    /// True when tiles are synthesized without a download.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            TileSource::SolidColor { .. } | TileSource::Checkerboard { .. }
        )
    }

    /// Basemap layers this source renders into.
    pub fn layers(&self) -> Vec<BasemapLayerKind> {
        if self.is_vector() {
            vec![BasemapLayerKind::World, BasemapLayerKind::Label]
        } else {
            vec![BasemapLayerKind::Raster]
        }
    }

    /// Download URL for a cell, if the source has one.
    pub fn url_for(&self, key: &CellKey) -> Option<String> {
        match self {
            TileSource::Raster { url_templates } if !url_templates.is_empty() => {
                let xyz = key.to_xyz();
                let index = ((xyz.x + xyz.y) % url_templates.len() as u64) as usize;
                Some(expand_url_template(&url_templates[index], key))
            }
            TileSource::Vector {
                url,
                protocol_version,
            } => Some(format!(
                "{}?v={protocol_version}",
                expand_url_template(url, key)
            )),
            _ => None,
        }
    }

    /// Tile for a local source; `None` for downloaded sources.
    pub fn local_tile(&self, key: &CellKey) -> Option<Tile> {
        match self {
            TileSource::SolidColor { color } => Some(Tile::Snapshot(color_bitmap(*color))),
            TileSource::Checkerboard { light, dark } => {
                let xyz = key.to_xyz();
                let color = if (xyz.x + xyz.y) % 2 == 0 { light } else { dark };
                Some(Tile::Snapshot(color_bitmap(*color)))
            }
            _ => None,
        }
    }
}

/// Bitmap handle of a uniformly filled tile, keyed by its RGBA color.
pub fn color_bitmap(rgba: [u8; 4]) -> BitmapHandle {
    BitmapHandle(u32::from_be_bytes(rgba) as u64)
}

/// Substitute `{z}`, `{x}`, `{y}` and `{q}` in a URL template.
pub fn expand_url_template(template: &str, key: &CellKey) -> String {
    let xyz = key.to_xyz();
    template
        .replace("{z}", &xyz.z.to_string())
        .replace("{x}", &xyz.x.to_string())
        .replace("{y}", &xyz.y.to_string())
        .replace("{q}", &key.quadkey())
}
