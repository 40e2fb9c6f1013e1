#[cfg(feature = "camera")]
mod camera;

pub mod app;
pub mod client;
pub mod config;
pub mod source;
pub mod streamer;

pub use app::start_app;
