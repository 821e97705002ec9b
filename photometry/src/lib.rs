// Library part of `photometry`, the executable lives in `main.rs`.

pub mod atlas;
pub mod build_atlas;
pub mod bundle;
pub mod camera;
pub mod codec;
pub mod estimate;
pub mod fusion;
pub mod import_obj;
pub mod lighting;
pub mod mesh;
pub mod misc;
pub mod model;
pub mod render;
pub mod visibility;

pub use base;
