//! Lumen demo viewer.
//!
//! Renders a small lit scene: a colored cube on a floor quad, circled by a
//! ring of colored point lights. WASD + E/Q move the camera, arrow keys
//! look around.
//!
//! Shaders ship as GLSL under `shaders/` and are loaded as precompiled
//! SPIR-V at startup; build them once with:
//!
//! ```bash
//! for s in shaders/*.vert shaders/*.frag; do glslc "$s" -o "$s.spv"; done
//! ```
//!
//! `RUST_LOG` controls log verbosity (e.g. info, debug, trace).

mod app;
mod meshes;

use lumen_app::{run_app, AppConfig};

use crate::app::ViewerApp;

fn main() -> anyhow::Result<()> {
    let config = AppConfig::new("Lumen Viewer")
        .with_size(1280, 720)
        .with_vsync(true);
    run_app::<ViewerApp>(config)
}
