pub mod config;
#[cfg_attr(not(target_arch = "arm"), path = "mock_display.rs")]
pub mod display;
pub mod face;
pub mod host;
pub mod layout;
pub mod render;
pub mod scheduler;
pub mod state;
pub mod sync;
pub mod util;
pub mod weather;
