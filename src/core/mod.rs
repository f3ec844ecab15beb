pub mod allocator;
pub mod caption;
pub mod config;
pub mod export;
pub mod gate;
pub mod pacing;
pub mod pipeline;
pub mod retry;
pub mod text;
