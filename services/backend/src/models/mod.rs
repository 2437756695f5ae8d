pub mod download;
pub mod video;
