//! Shader filters: user WGSL fragment programs applied to 2D surfaces.
//!
//! A filter program reads the layer pixels from `@group(0) @binding(0)` as a
//! `texture_2d<f32>` holding straight RGBA, and runs once per output pixel.
//! Its only input is `@builtin(position)`; it returns straight RGBA.

mod shader;

pub use shader::{create_canvas_shader, CanvasShader};

use serde::{Deserialize, Serialize};

use crate::gpu::GpuError;
use crate::surface::SurfaceError;

/// Fragment entry point used when the config doesn't name one.
pub const DEFAULT_ENTRY_POINT: &str = "mainfs";

fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.to_string()
}

/// Errors raised while building or applying a shader filter.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("GPU device unavailable: {0}")]
    DeviceUnavailable(#[source] GpuError),
    #[error("Shader compilation failed: {0}")]
    ShaderCompile(String),
    #[error("Fragment entry point `{0}` not found")]
    MissingEntryPoint(String),
    #[error("Shader filter used before initialization")]
    NotInitialized,
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
}

/// Configuration for a shader filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderFilterConfig {
    /// WGSL source of the fragment program.
    pub code: String,
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    /// Debug label for GPU objects.
    #[serde(default)]
    pub label: Option<String>,
}

impl ShaderFilterConfig {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            entry_point: default_entry_point(),
            label: None,
        }
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Parse a config such as `{"code": "..."}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Parse and validate a fragment program before it reaches the device.
///
/// Checks the program is valid WGSL, exposes `entry_point` as a fragment
/// stage, takes no interpolated inputs, writes a float color to
/// `@location(0)` and binds nothing beyond a `texture_2d<f32>` at group 0,
/// binding 0.
pub(crate) fn validate_fragment(source: &str, entry_point: &str) -> Result<(), FilterError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|err| FilterError::ShaderCompile(err.emit_to_string(source)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|err| FilterError::ShaderCompile(err.emit_to_string(source)))?;

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.name == entry_point && ep.stage == naga::ShaderStage::Fragment)
        .ok_or_else(|| FilterError::MissingEntryPoint(entry_point.to_string()))?;

    if entry
        .function
        .arguments
        .iter()
        .any(|arg| matches!(arg.binding, Some(naga::Binding::Location { .. })))
    {
        return Err(FilterError::ShaderCompile(format!(
            "`{entry_point}` takes @location inputs; only @builtin(position) is provided"
        )));
    }

    check_color_output(&module, entry_point, entry.function.result.as_ref())?;

    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        if binding.group != 0 || binding.binding != 0 {
            return Err(FilterError::ShaderCompile(format!(
                "unsupported resource at @group({}) @binding({})",
                binding.group, binding.binding
            )));
        }
        if !is_float_texture_2d(&module.types[global.ty].inner) {
            return Err(FilterError::ShaderCompile(
                "@group(0) @binding(0) must be a texture_2d<f32>".to_string(),
            ));
        }
    }

    Ok(())
}

fn is_float_texture_2d(inner: &naga::TypeInner) -> bool {
    matches!(
        inner,
        naga::TypeInner::Image {
            dim: naga::ImageDimension::D2,
            arrayed: false,
            class: naga::ImageClass::Sampled {
                kind: naga::ScalarKind::Float,
                multi: false,
            },
        }
    )
}

fn is_float_color(inner: &naga::TypeInner) -> bool {
    match inner {
        naga::TypeInner::Scalar(scalar) | naga::TypeInner::Vector { scalar, .. } => {
            scalar.kind == naga::ScalarKind::Float
        }
        _ => false,
    }
}

/// The render target is a single float color attachment at location 0.
fn check_color_output(
    module: &naga::Module,
    entry_point: &str,
    result: Option<&naga::FunctionResult>,
) -> Result<(), FilterError> {
    let outputs: Vec<(Option<&naga::Binding>, naga::Handle<naga::Type>)> = match result {
        None => Vec::new(),
        Some(result) => match (&result.binding, &module.types[result.ty].inner) {
            (None, naga::TypeInner::Struct { members, .. }) => members
                .iter()
                .map(|member| (member.binding.as_ref(), member.ty))
                .collect(),
            (binding, _) => vec![(binding.as_ref(), result.ty)],
        },
    };

    let mut has_color = false;
    for (binding, ty) in outputs {
        let Some(naga::Binding::Location { location, .. }) = binding else {
            continue;
        };
        if *location != 0 {
            return Err(FilterError::ShaderCompile(format!(
                "`{entry_point}` writes @location({location}); only @location(0) is bound"
            )));
        }
        if !is_float_color(&module.types[ty].inner) {
            return Err(FilterError::ShaderCompile(format!(
                "`{entry_point}` must return a float color at @location(0)"
            )));
        }
        has_color = true;
    }

    if !has_color {
        return Err(FilterError::ShaderCompile(format!(
            "`{entry_point}` has no @location(0) color output"
        )));
    }
    Ok(())
}
