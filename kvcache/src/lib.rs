pub mod app;
pub mod cache;
pub mod core;
