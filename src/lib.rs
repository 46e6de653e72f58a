pub mod app;
pub mod audio;
pub mod canvas;
pub mod cells;
pub mod color;
pub mod config;
pub mod downsample;
pub mod error;
pub mod idle;
pub mod logging;
pub mod palette;
pub mod render;
pub mod scheduler;
pub mod snapshot;
pub mod source;
pub mod terminal;
