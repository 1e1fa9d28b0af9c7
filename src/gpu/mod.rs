//! Headless GPU plumbing using wgpu.
//!
//! Device acquisition, texture helpers, the full-screen pass used by every
//! filter, and the bridge that moves pixels between 2D surfaces and textures.

pub mod bridge;
pub mod context;
pub mod layouts;
pub mod pipelines;
pub mod shaders;
pub mod textures;

pub use bridge::{transfer_back_from_gpu_texture, transfer_to_gpu_texture, INTEROP_FORMAT};
pub use context::{GpuContext, GpuError, GpuOptions};
pub use layouts::{SourceTextureBinding, SOURCE_TEXTURE_BINDING};
pub use pipelines::{create_pipeline_layout, encode_fullscreen_pass, RenderPipelineBuilder};
pub use textures::{ReadbackBuffer, RenderTarget};
