pub mod coordinator;
pub mod relay;
pub mod sync;
