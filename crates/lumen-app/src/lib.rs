//! Application framework: window, event loop, and frame-loop wiring.
//!
//! Implement [`LumenApp`] and hand it to [`run_app`]; the framework owns
//! the winit event loop, the GPU context, and the frame scheduler, and
//! calls back into the app for simulation and command recording.

pub mod config;
pub mod context;
pub mod input;
pub mod runner;
pub mod window;

pub use config::AppConfig;
pub use context::AppContext;
pub use input::KeyboardController;
pub use runner::{run_app, LumenApp};
pub use window::WindowState;
