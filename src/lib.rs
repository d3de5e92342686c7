pub mod app;
pub mod assets;
pub mod config;
pub mod editor;
pub mod geometry;
pub mod locomotion;
pub mod render;
pub mod scene;
