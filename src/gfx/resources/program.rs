//! Shader programs
//!
//! The crate ships three WGSL programs: the lit, shadow-receiving scene
//! program, the depth-only shadow program and the skybox program. They all
//! share the uniform block declared in `shaders/uniforms.wgsl`.

use std::fs;
use std::path::Path;

use crate::gfx::device::{GpuDevice, ProgramHandle};
use crate::gfx::error::RenderError;

const UNIFORMS_WGSL: &str = include_str!("../shaders/uniforms.wgsl");
const LIGHTING_WGSL: &str = include_str!("../shaders/lighting.wgsl");
const DEPTH_WGSL: &str = include_str!("../shaders/depth.wgsl");
const SKYBOX_WGSL: &str = include_str!("../shaders/skybox.wgsl");

/// Which bindings and vertex streams a program expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// All vertex streams, material maps and the shadow map
    Lighting,
    /// Positions only, renders into a depth target without colour
    Depth,
    /// Positions only, samples the cube map on unit 0
    Skybox,
}

/// WGSL source plus the binding contract it follows
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSource {
    pub label: String,
    pub kind: ProgramKind,
    pub code: String,
}

impl ProgramSource {
    pub fn new(label: impl Into<String>, kind: ProgramKind, code: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind,
            code: code.into(),
        }
    }

    /// Built-in program for `kind`, with the shared uniform block prepended
    pub fn builtin(kind: ProgramKind) -> Self {
        let (label, body) = match kind {
            ProgramKind::Lighting => ("lighting", LIGHTING_WGSL),
            ProgramKind::Depth => ("depth", DEPTH_WGSL),
            ProgramKind::Skybox => ("skybox", SKYBOX_WGSL),
        };
        Self::new(label, kind, format!("{UNIFORMS_WGSL}\n{body}"))
    }

    /// Reads a WGSL file and prepends the shared uniform block
    pub fn from_file(kind: ProgramKind, path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RenderError::MissingAsset {
                path: path.to_path_buf(),
            });
        }
        let body = fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let label = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "program".to_string());
        Ok(Self::new(label, kind, format!("{UNIFORMS_WGSL}\n{body}")))
    }
}

/// A compiled program living on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderProgram {
    handle: ProgramHandle,
    kind: ProgramKind,
}

impl ShaderProgram {
    /// Compiles `source`; a compile or link failure is fatal
    pub fn compile(device: &mut dyn GpuDevice, source: &ProgramSource) -> Result<Self, RenderError> {
        let handle = device.create_program(source)?;
        log::info!("Compiled {:?} program '{}'", source.kind, source.label);
        Ok(Self {
            handle,
            kind: source.kind,
        })
    }

    pub fn builtin(device: &mut dyn GpuDevice, kind: ProgramKind) -> Result<Self, RenderError> {
        Self::compile(device, &ProgramSource::builtin(kind))
    }

    pub fn activate(&self, device: &mut dyn GpuDevice) {
        device.use_program(self.handle);
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    pub fn release(self, device: &mut dyn GpuDevice) {
        device.release_program(self.handle);
    }
}

/// The three programs a scene draws with
#[derive(Debug, Clone, Copy)]
pub struct ScenePrograms {
    pub lighting: ShaderProgram,
    pub depth: ShaderProgram,
    pub skybox: ShaderProgram,
}

impl ScenePrograms {
    pub fn builtin(device: &mut dyn GpuDevice) -> Result<Self, RenderError> {
        Ok(Self {
            lighting: ShaderProgram::builtin(device, ProgramKind::Lighting)?,
            depth: ShaderProgram::builtin(device, ProgramKind::Depth)?,
            skybox: ShaderProgram::builtin(device, ProgramKind::Skybox)?,
        })
    }

    pub fn release(self, device: &mut dyn GpuDevice) {
        self.lighting.release(device);
        self.depth.release(device);
        self.skybox.release(device);
    }
}
