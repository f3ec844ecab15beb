pub mod manifest;
pub mod scene;
