//! wgpu implementation of [`GpuDevice`]
//!
//! Immediate-mode calls are recorded into passes while the frame is built and
//! replayed on wgpu in [`GpuDevice::finish_frame`]:
//!
//! - binding a different framebuffer, or clearing after draws, starts a new pass
//! - each draw snapshots the current program's [`UniformBlock`] into the
//!   dynamic uniform buffer and remembers the textures bound to its units
//! - pipelines are looked up by program, depth-write and culling state
//!
//! Texture units map onto fixed bind group slots; units a program expects but
//! that have nothing bound fall back to 1x1 textures.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::gfx::device::{
    ClearFlags, DepthTarget, FramebufferHandle, GpuDevice, ImageData, MeshHandle, ProgramHandle,
    SamplerParams, TextureHandle, Uniform,
};
use crate::gfx::error::RenderError;
use crate::gfx::resources::material::{
    DIFFUSE_UNIT, DISPLACEMENT_UNIT, NORMAL_UNIT, SHADOW_UNIT, SKYBOX_UNIT, SPECULAR_UNIT,
};
use crate::gfx::resources::program::{ProgramKind, ProgramSource};
use crate::gfx::resources::texture_resource::TextureResource;
use crate::gfx::scene::vertex::MeshData;
use crate::wgpu_utils::DynamicUniformBuffer;

use super::pipeline_manager::{PipelineKey, PipelineManager};
use super::uniform_layout::{UniformBlock, UNIFORM_BLOCK_SIZE};

const MATERIAL_UNITS: [u32; 4] = [DIFFUSE_UNIT, NORMAL_UNIT, SPECULAR_UNIT, DISPLACEMENT_UNIT];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextureKind {
    Color,
    Cube,
    Depth,
}

struct GpuTexture {
    kind: TextureKind,
    resource: TextureResource,
}

struct GpuMesh {
    /// positions, normals, tex coords, tangents, bitangents
    streams: [wgpu::Buffer; 5],
    indices: wgpu::Buffer,
}

struct Framebuffer {
    depth: TextureHandle,
    width: u32,
    height: u32,
}

struct Fallbacks {
    material: [TextureResource; 4],
    shadow: TextureResource,
    skybox: TextureResource,
}

type MaterialKey = [Option<TextureHandle>; 4];

#[derive(Debug, Clone, Copy)]
struct DrawCall {
    key: PipelineKey,
    kind: ProgramKind,
    mesh: MeshHandle,
    index_count: u32,
    instance_count: u32,
    uniform_offset: u32,
    viewport: (u32, u32),
    material: MaterialKey,
    shadow: Option<TextureHandle>,
    skybox: Option<TextureHandle>,
}

struct PassRecord {
    target: Option<FramebufferHandle>,
    clear_color: Option<wgpu::Color>,
    clear_depth: bool,
    draws: Vec<DrawCall>,
}

impl PassRecord {
    fn new(target: Option<FramebufferHandle>) -> Self {
        Self {
            target,
            clear_color: None,
            clear_depth: false,
            draws: Vec::new(),
        }
    }
}

/// Immediate-mode state carried between calls and across frames
struct DrawState {
    program: Option<ProgramHandle>,
    framebuffer: Option<FramebufferHandle>,
    mesh: Option<MeshHandle>,
    units: HashMap<u32, TextureHandle>,
    viewport: (u32, u32),
    clear_color: [f32; 4],
    depth_write: bool,
    cull: bool,
}

/// Core rendering engine managing GPU resources and draw calls
pub struct RenderEngine {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_texture: TextureResource,
    pipelines: PipelineManager,
    uniforms: DynamicUniformBuffer,
    uniform_group: wgpu::BindGroup,
    fallbacks: Fallbacks,

    next_id: u32,
    textures: HashMap<TextureHandle, GpuTexture>,
    meshes: HashMap<MeshHandle, GpuMesh>,
    framebuffers: HashMap<FramebufferHandle, Framebuffer>,
    blocks: HashMap<ProgramHandle, UniformBlock>,

    material_groups: HashMap<MaterialKey, wgpu::BindGroup>,
    shadow_groups: HashMap<Option<TextureHandle>, wgpu::BindGroup>,
    skybox_groups: HashMap<Option<TextureHandle>, wgpu::BindGroup>,

    state: DrawState,
    passes: Vec<PassRecord>,
}

fn to_color(rgba: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: rgba[0] as f64,
        g: rgba[1] as f64,
        b: rgba[2] as f64,
        a: rgba[3] as f64,
    }
}

impl RenderEngine {
    /// Initializes wgpu for `window` and creates the frame resources
    ///
    /// # Arguments
    /// * `window` - Window surface target for rendering
    /// * `width` - Initial surface width in pixels
    /// * `height` - Initial surface height in pixels
    /// * `vsync` - Present on vertical blank
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<RenderEngine, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::SurfaceCreation(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::AdapterNotFound(e.to_string()))?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Umbra Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: 4096,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| RenderError::DeviceCreation(e.to_string()))?;

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .ok_or_else(|| RenderError::SurfaceCreation("surface reports no formats".into()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture =
            TextureResource::create_depth_texture(&device, config.width, config.height, "depth_texture");
        let pipelines = PipelineManager::new(&device, format);
        let uniforms = DynamicUniformBuffer::new(&device, UNIFORM_BLOCK_SIZE);
        let uniform_group = Self::create_uniform_group(&device, &pipelines, &uniforms);
        let fallbacks = Self::create_fallbacks(&device, &queue);

        Ok(RenderEngine {
            surface,
            device,
            queue,
            config,
            depth_texture,
            pipelines,
            uniforms,
            uniform_group,
            fallbacks,
            next_id: 1,
            textures: HashMap::new(),
            meshes: HashMap::new(),
            framebuffers: HashMap::new(),
            blocks: HashMap::new(),
            material_groups: HashMap::new(),
            shadow_groups: HashMap::new(),
            skybox_groups: HashMap::new(),
            state: DrawState {
                program: None,
                framebuffer: None,
                mesh: None,
                units: HashMap::new(),
                viewport: (width, height),
                clear_color: [0.0, 0.0, 0.0, 1.0],
                depth_write: true,
                cull: true,
            },
            passes: Vec::new(),
        })
    }

    fn create_uniform_group(
        device: &wgpu::Device,
        pipelines: &PipelineManager,
        uniforms: &DynamicUniformBuffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Bind Group"),
            layout: &pipelines.layouts().uniforms,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.binding_resource(),
            }],
        })
    }

    fn create_fallbacks(device: &wgpu::Device, queue: &wgpu::Queue) -> Fallbacks {
        let material = [
            TextureResource::solid(device, queue, "Fallback Diffuse", [255, 255, 255, 255]),
            TextureResource::solid(device, queue, "Fallback Normal", [128, 128, 255, 255]),
            TextureResource::solid(device, queue, "Fallback Specular", [255, 255, 255, 255]),
            TextureResource::solid(device, queue, "Fallback Displacement", [0, 0, 0, 255]),
        ];
        let shadow = TextureResource::create_shadow_map(device, 1, 1);
        let skybox = TextureResource::solid_cube(device, queue, "Fallback Skybox");

        // an empty shadow map reads as fully lit
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Fallback Shadow Clear"),
        });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Fallback Shadow Clear"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &shadow.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        queue.submit(std::iter::once(encoder.finish()));

        Fallbacks {
            material,
            shadow,
            skybox,
        }
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Resizes the surface and recreates the window depth buffer
    ///
    /// Zero-sized requests (minimised windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            TextureResource::create_depth_texture(&self.device, width, height, "depth_texture");
    }

    fn texture_of_kind(&self, handle: Option<TextureHandle>, kind: TextureKind) -> Option<TextureHandle> {
        handle.filter(|h| self.textures.get(h).is_some_and(|t| t.kind == kind))
    }

    fn resource_of_kind(&self, handle: Option<TextureHandle>, kind: TextureKind) -> Option<&TextureResource> {
        self.texture_of_kind(handle, kind)
            .and_then(|h| self.textures.get(&h))
            .map(|t| &t.resource)
    }

    fn invalidate_bind_groups(&mut self) {
        self.material_groups.clear();
        self.shadow_groups.clear();
        self.skybox_groups.clear();
    }

    /// Last pass if it renders to the current target, otherwise a new one
    fn current_pass(&mut self, fresh: bool) -> &mut PassRecord {
        let target = self.state.framebuffer;
        let reuse = self
            .passes
            .last()
            .is_some_and(|pass| pass.target == target && !(fresh && !pass.draws.is_empty()));
        if !reuse {
            self.passes.push(PassRecord::new(target));
        }
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    fn target_size(&self, target: Option<FramebufferHandle>) -> (u32, u32) {
        match target.and_then(|fb| self.framebuffers.get(&fb)) {
            Some(fb) => (fb.width, fb.height),
            None => (self.config.width, self.config.height),
        }
    }

    fn material_group(&self, key: &MaterialKey) -> wgpu::BindGroup {
        let resources: Vec<&TextureResource> = key
            .iter()
            .zip(&self.fallbacks.material)
            .map(|(handle, fallback)| self.resource_of_kind(*handle, TextureKind::Color).unwrap_or(fallback))
            .collect();
        let entries: Vec<wgpu::BindGroupEntry> = resources
            .iter()
            .enumerate()
            .flat_map(|(i, resource)| {
                let binding = i as u32 * 2;
                [
                    wgpu::BindGroupEntry {
                        binding,
                        resource: wgpu::BindingResource::TextureView(&resource.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: binding + 1,
                        resource: wgpu::BindingResource::Sampler(&resource.sampler),
                    },
                ]
            })
            .collect();
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &self.pipelines.layouts().material,
            entries: &entries,
        })
    }

    fn pair_group(
        &self,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        resource: &TextureResource,
    ) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&resource.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&resource.sampler),
                },
            ],
        })
    }

    /// Creates every pipeline and bind group the recorded draws need
    fn prepare(&mut self, passes: &[PassRecord]) {
        for draw in passes.iter().flat_map(|pass| &pass.draws) {
            self.pipelines.prepare(&self.device, draw.key);
            match draw.kind {
                ProgramKind::Lighting => {
                    if !self.material_groups.contains_key(&draw.material) {
                        let group = self.material_group(&draw.material);
                        self.material_groups.insert(draw.material, group);
                    }
                    if !self.shadow_groups.contains_key(&draw.shadow) {
                        let resource = self
                            .resource_of_kind(draw.shadow, TextureKind::Depth)
                            .unwrap_or(&self.fallbacks.shadow);
                        let group = self.pair_group("Shadow Bind Group", &self.pipelines.layouts().shadow, resource);
                        self.shadow_groups.insert(draw.shadow, group);
                    }
                }
                ProgramKind::Skybox => {
                    if !self.skybox_groups.contains_key(&draw.skybox) {
                        let resource = self
                            .resource_of_kind(draw.skybox, TextureKind::Cube)
                            .unwrap_or(&self.fallbacks.skybox);
                        let group = self.pair_group("Skybox Bind Group", &self.pipelines.layouts().skybox, resource);
                        self.skybox_groups.insert(draw.skybox, group);
                    }
                }
                ProgramKind::Depth => {}
            }
        }
    }

    fn encode(&self, encoder: &mut wgpu::CommandEncoder, surface_view: &wgpu::TextureView, passes: &[PassRecord]) {
        for pass in passes {
            let (target_width, target_height) = self.target_size(pass.target);
            let depth_load = if pass.clear_depth {
                wgpu::LoadOp::Clear(1.0)
            } else {
                wgpu::LoadOp::Load
            };

            let depth_view = match pass.target {
                Some(fb) => match self
                    .framebuffers
                    .get(&fb)
                    .and_then(|f| self.textures.get(&f.depth))
                {
                    Some(texture) => &texture.resource.view,
                    None => {
                        log::warn!("Skipping pass for released framebuffer {}", fb.id());
                        continue;
                    }
                },
                None => &self.depth_texture.view,
            };

            let color_attachments = match pass.target {
                Some(_) => vec![],
                None => vec![Some(wgpu::RenderPassColorAttachment {
                    view: surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: pass
                            .clear_color
                            .map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
            };

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(if pass.target.is_some() {
                    "Depth Target Pass"
                } else {
                    "Main Render Pass"
                }),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for draw in &pass.draws {
                let (Some(pipeline), Some(mesh)) = (self.pipelines.get(&draw.key), self.meshes.get(&draw.mesh))
                else {
                    continue;
                };
                let width = draw.viewport.0.clamp(1, target_width);
                let height = draw.viewport.1.clamp(1, target_height);
                render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &self.uniform_group, &[draw.uniform_offset]);

                let stream_count = match draw.kind {
                    ProgramKind::Lighting => {
                        if let (Some(material), Some(shadow)) = (
                            self.material_groups.get(&draw.material),
                            self.shadow_groups.get(&draw.shadow),
                        ) {
                            render_pass.set_bind_group(1, material, &[]);
                            render_pass.set_bind_group(2, shadow, &[]);
                        }
                        mesh.streams.len()
                    }
                    ProgramKind::Skybox => {
                        if let Some(skybox) = self.skybox_groups.get(&draw.skybox) {
                            render_pass.set_bind_group(1, skybox, &[]);
                        }
                        1
                    }
                    ProgramKind::Depth => 1,
                };
                for (slot, stream) in mesh.streams.iter().take(stream_count).enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, stream.slice(..));
                }
                render_pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..draw.index_count, 0, 0..draw.instance_count);
            }
        }
    }

    fn discard_frame(&mut self) {
        self.passes.clear();
        self.uniforms.ring_mut().reset();
    }
}

impl GpuDevice for RenderEngine {
    fn create_texture(
        &mut self,
        label: &str,
        image: &ImageData,
        params: SamplerParams,
    ) -> Result<TextureHandle, RenderError> {
        if image.width == 0 || image.height == 0 {
            return Err(RenderError::invalid_asset(label, "image has no pixels"));
        }
        if !image.has_consistent_len() {
            return Err(RenderError::invalid_asset(label, "pixel data does not match dimensions"));
        }
        let resource = TextureResource::from_image(&self.device, &self.queue, label, image, params);
        let handle = TextureHandle(self.next());
        self.textures.insert(
            handle,
            GpuTexture {
                kind: TextureKind::Color,
                resource,
            },
        );
        Ok(handle)
    }

    fn create_cube_map(
        &mut self,
        label: &str,
        faces: &[ImageData; 6],
    ) -> Result<TextureHandle, RenderError> {
        let size = faces[0].width;
        for face in faces {
            if face.width != size || face.height != size || size == 0 {
                return Err(RenderError::invalid_asset(label, "cube faces must be square and equal"));
            }
            if !face.has_consistent_len() {
                return Err(RenderError::invalid_asset(label, "pixel data does not match dimensions"));
            }
        }
        let resource = TextureResource::cube_map(&self.device, &self.queue, label, faces);
        let handle = TextureHandle(self.next());
        self.textures.insert(
            handle,
            GpuTexture {
                kind: TextureKind::Cube,
                resource,
            },
        );
        Ok(handle)
    }

    fn create_depth_target(&mut self, width: u32, height: u32) -> Result<DepthTarget, RenderError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::IncompleteFramebuffer(format!(
                "depth target {width}x{height} is outside 1..={max}"
            )));
        }
        let resource = TextureResource::create_shadow_map(&self.device, width, height);
        let texture = TextureHandle(self.next());
        let framebuffer = FramebufferHandle(self.next());
        self.textures.insert(
            texture,
            GpuTexture {
                kind: TextureKind::Depth,
                resource,
            },
        );
        self.framebuffers.insert(
            framebuffer,
            Framebuffer {
                depth: texture,
                width,
                height,
            },
        );
        Ok(DepthTarget {
            framebuffer,
            texture,
            width,
            height,
        })
    }

    fn create_mesh(&mut self, label: &str, data: &MeshData) -> Result<MeshHandle, RenderError> {
        data.validate(label)?;
        let vertex_count = data.vertex_count();
        let vec3_stream = |name: &str, values: &[[f32; 3]]| {
            let zeros;
            let contents: &[u8] = if values.is_empty() {
                zeros = vec![0u8; vertex_count * 12];
                &zeros
            } else {
                bytemuck::cast_slice(values)
            };
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} {name}")),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            })
        };

        let positions = vec3_stream("positions", data.positions.as_slice());
        let normals = vec3_stream("normals", data.normals.as_slice());
        let tangents = vec3_stream("tangents", data.tangents.as_slice());
        let bitangents = vec3_stream("bitangents", data.bitangents.as_slice());
        let tex_zeros;
        let tex_contents: &[u8] = if data.tex_coords.is_empty() {
            tex_zeros = vec![0u8; vertex_count * 8];
            &tex_zeros
        } else {
            bytemuck::cast_slice(&data.tex_coords)
        };
        let tex_coords = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} tex coords")),
            contents: tex_contents,
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} indices")),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let handle = MeshHandle(self.next());
        self.meshes.insert(
            handle,
            GpuMesh {
                streams: [positions, normals, tex_coords, tangents, bitangents],
                indices,
            },
        );
        Ok(handle)
    }

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, RenderError> {
        let handle = ProgramHandle(self.next());
        self.pipelines.load_program(&self.device, handle, source)?;
        self.blocks.insert(handle, UniformBlock::default());
        Ok(handle)
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.invalidate_bind_groups();
        }
        self.state.units.retain(|_, bound| *bound != texture);
    }

    fn release_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh);
        if self.state.mesh == Some(mesh) {
            self.state.mesh = None;
        }
    }

    fn release_depth_target(&mut self, target: &DepthTarget) {
        self.framebuffers.remove(&target.framebuffer);
        self.release_texture(target.texture);
        if self.state.framebuffer == Some(target.framebuffer) {
            self.state.framebuffer = None;
        }
    }

    fn release_program(&mut self, program: ProgramHandle) {
        self.pipelines.remove_program(program);
        self.blocks.remove(&program);
        if self.state.program == Some(program) {
            self.state.program = None;
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.state.program = Some(program);
    }

    fn set_uniform(&mut self, name: &str, value: Uniform) {
        let Some(block) = self.state.program.and_then(|p| self.blocks.get_mut(&p)) else {
            log::warn!("Uniform '{name}' set with no program in use");
            return;
        };
        if !block.set(name, value) {
            log::trace!("Uniform '{name}' has no slot in the uniform block");
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.state.units.insert(unit, texture);
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.state.framebuffer = framebuffer;
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.state.viewport = (width, height);
    }

    fn viewport(&self) -> (u32, u32) {
        self.state.viewport
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.state.clear_color = color;
    }

    fn clear(&mut self, flags: ClearFlags) {
        let color = to_color(self.state.clear_color);
        let pass = self.current_pass(true);
        if flags.color && pass.target.is_none() {
            pass.clear_color = Some(color);
        }
        if flags.depth {
            pass.clear_depth = true;
        }
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.state.depth_write = enabled;
    }

    fn set_face_culling(&mut self, enabled: bool) {
        self.state.cull = enabled;
    }

    fn bind_mesh(&mut self, mesh: MeshHandle) {
        self.state.mesh = Some(mesh);
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        let (Some(program), Some(mesh)) = (self.state.program, self.state.mesh) else {
            log::warn!("Draw skipped: no program or mesh bound");
            return;
        };
        let Some(kind) = self.pipelines.program_kind(program) else {
            log::warn!("Draw skipped: program {} was released", program.id());
            return;
        };
        let to_framebuffer = self.state.framebuffer.is_some();
        if to_framebuffer != (kind == ProgramKind::Depth) {
            log::warn!("Draw skipped: {kind:?} program cannot render to this target");
            return;
        }
        let Some(block) = self.blocks.get(&program) else {
            return;
        };
        let uniform_offset = self.uniforms.ring_mut().push(block.as_bytes());

        let unit = |u: u32| self.state.units.get(&u).copied();
        let draw = DrawCall {
            key: PipelineKey {
                program,
                depth_write: self.state.depth_write,
                cull: self.state.cull,
            },
            kind,
            mesh,
            index_count,
            instance_count,
            uniform_offset,
            viewport: self.state.viewport,
            material: MATERIAL_UNITS.map(|u| self.texture_of_kind(unit(u), TextureKind::Color)),
            shadow: self.texture_of_kind(unit(SHADOW_UNIT), TextureKind::Depth),
            skybox: self.texture_of_kind(unit(SKYBOX_UNIT), TextureKind::Cube),
        };
        self.current_pass(false).draws.push(draw);
    }

    fn finish_frame(&mut self) -> Result<(), RenderError> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                log::info!("Surface outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                self.discard_frame();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring surface texture, dropping frame");
                self.discard_frame();
                return Ok(());
            }
            Err(e) => {
                self.discard_frame();
                return Err(RenderError::Surface(e.to_string()));
            }
        };
        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let passes = std::mem::take(&mut self.passes);
        self.prepare(&passes);
        if self.uniforms.upload(&self.device, &self.queue) {
            self.uniform_group = Self::create_uniform_group(&self.device, &self.pipelines, &self.uniforms);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        self.encode(&mut encoder, &surface_view, &passes);
        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();

        self.uniforms.ring_mut().reset();
        Ok(())
    }
}
