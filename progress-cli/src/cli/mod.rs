pub mod args;
pub mod render;
pub mod sweep;
