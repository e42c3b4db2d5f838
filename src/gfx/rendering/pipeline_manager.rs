//! Render pipeline cache for the wgpu backend
//!
//! The immediate-mode state that affects pipelines (current program, depth
//! writes and face culling) is folded into a [`PipelineKey`]. Pipelines are
//! created the first time a key is drawn with, except for each program's
//! default state which is built when the program is loaded so that shader
//! errors surface at compile time.

use std::collections::HashMap;

use wgpu::*;

use crate::gfx::device::ProgramHandle;
use crate::gfx::error::RenderError;
use crate::gfx::resources::program::{ProgramKind, ProgramSource};
use crate::gfx::resources::texture_resource::TextureResource;
use crate::gfx::scene::vertex::{full_layout, position_layout};
use crate::wgpu_utils::binding_types::{
    entry, sampler, texture_2d, texture_cube, texture_depth, uniform_dynamic,
};

use super::uniform_layout::UNIFORM_BLOCK_SIZE;

/// Pipeline-affecting draw state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ProgramHandle,
    pub depth_write: bool,
    pub cull: bool,
}

impl PipelineKey {
    /// The state each program kind is normally drawn with
    pub fn default_for(program: ProgramHandle, kind: ProgramKind) -> Self {
        match kind {
            ProgramKind::Lighting => Self {
                program,
                depth_write: true,
                cull: true,
            },
            ProgramKind::Depth => Self {
                program,
                depth_write: true,
                cull: false,
            },
            ProgramKind::Skybox => Self {
                program,
                depth_write: false,
                cull: false,
            },
        }
    }
}

/// Bind group layouts shared by every pipeline of a kind
pub struct BindLayouts {
    /// group 0: the uniform block, dynamic offset per draw
    pub uniforms: BindGroupLayout,
    /// group 1 of the lighting program: diffuse, normal, specular, displacement
    pub material: BindGroupLayout,
    /// group 2 of the lighting program: shadow map and comparison sampler
    pub shadow: BindGroupLayout,
    /// group 1 of the skybox program
    pub skybox: BindGroupLayout,
}

impl BindLayouts {
    pub fn new(device: &Device) -> Self {
        let fragment = ShaderStages::FRAGMENT;
        let uniforms = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Uniform Layout"),
            entries: &[entry(
                0,
                ShaderStages::VERTEX_FRAGMENT,
                uniform_dynamic(UNIFORM_BLOCK_SIZE as u64),
            )],
        });

        let material_entries: Vec<_> = (0..4)
            .flat_map(|i| {
                [
                    entry(i * 2, fragment, texture_2d()),
                    entry(i * 2 + 1, fragment, sampler(SamplerBindingType::Filtering)),
                ]
            })
            .collect();
        let material = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Material Layout"),
            entries: &material_entries,
        });

        let shadow = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Shadow Layout"),
            entries: &[
                entry(0, fragment, texture_depth()),
                entry(1, fragment, sampler(SamplerBindingType::Comparison)),
            ],
        });

        let skybox = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Skybox Layout"),
            entries: &[
                entry(0, fragment, texture_cube()),
                entry(1, fragment, sampler(SamplerBindingType::Filtering)),
            ],
        });

        Self {
            uniforms,
            material,
            shadow,
            skybox,
        }
    }
}

struct ProgramEntry {
    label: String,
    kind: ProgramKind,
    module: ShaderModule,
    layout: PipelineLayout,
}

/// Compiled programs and the pipelines created from them
pub struct PipelineManager {
    layouts: BindLayouts,
    surface_format: TextureFormat,
    programs: HashMap<ProgramHandle, ProgramEntry>,
    pipelines: HashMap<PipelineKey, RenderPipeline>,
}

impl PipelineManager {
    pub fn new(device: &Device, surface_format: TextureFormat) -> Self {
        Self {
            layouts: BindLayouts::new(device),
            surface_format,
            programs: HashMap::new(),
            pipelines: HashMap::new(),
        }
    }

    pub fn layouts(&self) -> &BindLayouts {
        &self.layouts
    }

    pub fn program_kind(&self, program: ProgramHandle) -> Option<ProgramKind> {
        self.programs.get(&program).map(|entry| entry.kind)
    }

    /// Compiles `source` and builds its default pipeline
    ///
    /// # Errors
    /// [`RenderError::ShaderCompilation`] with wgpu's validation message.
    pub fn load_program(
        &mut self,
        device: &Device,
        handle: ProgramHandle,
        source: &ProgramSource,
    ) -> Result<(), RenderError> {
        device.push_error_scope(ErrorFilter::Validation);
        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: Some(&source.label),
            source: ShaderSource::Wgsl(source.code.as_str().into()),
        });

        let group_layouts: Vec<&BindGroupLayout> = match source.kind {
            ProgramKind::Lighting => vec![
                &self.layouts.uniforms,
                &self.layouts.material,
                &self.layouts.shadow,
            ],
            ProgramKind::Depth => vec![&self.layouts.uniforms],
            ProgramKind::Skybox => vec![&self.layouts.uniforms, &self.layouts.skybox],
        };
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(&format!("{} Layout", source.label)),
            bind_group_layouts: &group_layouts,
            push_constant_ranges: &[],
        });

        let entry = ProgramEntry {
            label: source.label.clone(),
            kind: source.kind,
            module,
            layout,
        };
        let key = PipelineKey::default_for(handle, source.kind);
        let pipeline = self.create_pipeline(device, &entry, key);

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ShaderCompilation {
                label: source.label.clone(),
                message: error.to_string(),
            });
        }

        self.pipelines.insert(key, pipeline);
        self.programs.insert(handle, entry);
        Ok(())
    }

    /// Drops a program and every pipeline built from it
    pub fn remove_program(&mut self, handle: ProgramHandle) {
        self.programs.remove(&handle);
        self.pipelines.retain(|key, _| key.program != handle);
    }

    /// Creates the pipeline for `key` if needed; false for unknown programs
    pub fn prepare(&mut self, device: &Device, key: PipelineKey) -> bool {
        if self.pipelines.contains_key(&key) {
            return true;
        }
        let Some(entry) = self.programs.get(&key.program) else {
            return false;
        };
        log::debug!(
            "Creating pipeline for '{}' (depth write {}, cull {})",
            entry.label,
            key.depth_write,
            key.cull
        );
        let pipeline = self.create_pipeline(device, entry, key);
        self.pipelines.insert(key, pipeline);
        true
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&RenderPipeline> {
        self.pipelines.get(key)
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn create_pipeline(&self, device: &Device, entry: &ProgramEntry, key: PipelineKey) -> RenderPipeline {
        let full = full_layout();
        let positions = position_layout();
        let buffers: &[VertexBufferLayout] = match entry.kind {
            ProgramKind::Lighting => &full,
            ProgramKind::Depth | ProgramKind::Skybox => &positions,
        };

        let color_targets = [Some(ColorTargetState {
            format: self.surface_format,
            blend: Some(match entry.kind {
                ProgramKind::Lighting => BlendState::ALPHA_BLENDING,
                _ => BlendState::REPLACE,
            }),
            write_mask: ColorWrites::ALL,
        })];

        // Depth-only pipelines render into the shadow map with no fragment stage
        let fragment = match entry.kind {
            ProgramKind::Depth => None,
            _ => Some(FragmentState {
                module: &entry.module,
                entry_point: Some("fs_main"),
                targets: &color_targets,
                compilation_options: PipelineCompilationOptions::default(),
            }),
        };

        let (depth_compare, bias) = match entry.kind {
            ProgramKind::Lighting => (CompareFunction::Less, DepthBiasState::default()),
            ProgramKind::Depth => (
                CompareFunction::LessEqual,
                DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            ),
            ProgramKind::Skybox => (CompareFunction::LessEqual, DepthBiasState::default()),
        };

        device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&entry.label),
            layout: Some(&entry.layout),
            vertex: VertexState {
                module: &entry.module,
                entry_point: Some("vs_main"),
                buffers,
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment,
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: key.cull.then_some(Face::Back),
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(DepthStencilState {
                format: TextureResource::DEPTH_FORMAT,
                depth_write_enabled: key.depth_write,
                depth_compare,
                stencil: StencilState::default(),
                bias,
            }),
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keys_per_kind() {
        let program = ProgramHandle(3);
        let lighting = PipelineKey::default_for(program, ProgramKind::Lighting);
        assert!(lighting.depth_write && lighting.cull);

        let depth = PipelineKey::default_for(program, ProgramKind::Depth);
        assert!(depth.depth_write && !depth.cull);

        let skybox = PipelineKey::default_for(program, ProgramKind::Skybox);
        assert!(!skybox.depth_write && !skybox.cull);
    }
}
