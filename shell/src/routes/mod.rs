pub mod api;
pub mod windows;
