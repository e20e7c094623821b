//! Rendering adapter: renderer-agnostic interface over the cell store.
//!
//! # Invariants
//! - Renderers never mutate the cell store.
//! - Hidden cells are not drawn.

mod blit;
mod renderer;

pub use blit::{Blit, blits, cell_blits};
pub use renderer::{BlitRenderer, DebugTextRenderer, RenderView, Renderer};

pub fn crate_info() -> &'static str {
    "basemap-render v0.1.0"
}
