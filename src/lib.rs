pub mod audio;
pub mod config;
pub mod engine;
pub mod render;
