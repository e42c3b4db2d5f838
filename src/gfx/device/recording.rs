//! CPU-side [`GpuDevice`] that records every command
//!
//! Nothing is rendered. The command stream, live resources and per-program
//! uniform state are kept so callers can assert on what a frame would do.

use std::collections::{HashMap, HashSet};

use super::{
    ClearFlags, DepthTarget, FramebufferHandle, GpuDevice, ImageData, MeshHandle, ProgramHandle,
    SamplerParams, TextureHandle, Uniform,
};
use crate::gfx::error::RenderError;
use crate::gfx::resources::program::ProgramSource;
use crate::gfx::scene::vertex::MeshData;

/// One recorded state change or draw
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    UseProgram(ProgramHandle),
    SetUniform {
        program: Option<ProgramHandle>,
        name: String,
        value: Uniform,
    },
    BindTexture {
        unit: u32,
        texture: TextureHandle,
    },
    BindFramebuffer(Option<FramebufferHandle>),
    SetViewport {
        width: u32,
        height: u32,
    },
    Clear(ClearFlags),
    SetDepthWrite(bool),
    SetFaceCulling(bool),
    BindMesh(MeshHandle),
    DrawIndexed {
        program: Option<ProgramHandle>,
        framebuffer: Option<FramebufferHandle>,
        mesh: Option<MeshHandle>,
        index_count: u32,
        instance_count: u32,
    },
    FinishFrame,
}

#[derive(Debug, Default)]
pub struct RecordingDevice {
    commands: Vec<Command>,
    next_id: u32,
    textures: HashSet<TextureHandle>,
    meshes: HashSet<MeshHandle>,
    programs: HashSet<ProgramHandle>,
    framebuffers: HashSet<FramebufferHandle>,
    textures_created: usize,
    meshes_created: usize,
    programs_created: usize,
    uniforms: HashMap<(ProgramHandle, String), Uniform>,
    current_program: Option<ProgramHandle>,
    current_framebuffer: Option<FramebufferHandle>,
    current_mesh: Option<MeshHandle>,
    viewport: (u32, u32),
    clear_color: [f32; 4],
    incomplete_framebuffers: bool,
}

impl RecordingDevice {
    /// Device whose initial viewport matches a `width` x `height` window
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: (width, height),
            next_id: 1,
            ..Default::default()
        }
    }

    /// Makes every subsequent depth target report as incomplete
    pub fn with_incomplete_framebuffers(mut self) -> Self {
        self.incomplete_framebuffers = true;
        self
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn textures_created(&self) -> usize {
        self.textures_created
    }

    pub fn meshes_created(&self) -> usize {
        self.meshes_created
    }

    pub fn programs_created(&self) -> usize {
        self.programs_created
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.current_program
    }

    /// Last value set for `name` on `program`
    pub fn uniform(&self, program: ProgramHandle, name: &str) -> Option<Uniform> {
        self.uniforms.get(&(program, name.to_string())).copied()
    }

    /// Draws issued with `program` current and the window surface bound
    pub fn surface_draws(&self, program: ProgramHandle) -> Vec<(u32, u32)> {
        self.draws_matching(|p, fb| p == Some(program) && fb.is_none())
    }

    /// Draws issued into `framebuffer`
    pub fn framebuffer_draws(&self, framebuffer: FramebufferHandle) -> Vec<(u32, u32)> {
        self.draws_matching(|_, fb| fb == Some(framebuffer))
    }

    fn draws_matching(
        &self,
        pred: impl Fn(Option<ProgramHandle>, Option<FramebufferHandle>) -> bool,
    ) -> Vec<(u32, u32)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::DrawIndexed {
                    program,
                    framebuffer,
                    index_count,
                    instance_count,
                    ..
                } if pred(*program, *framebuffer) => Some((*index_count, *instance_count)),
                _ => None,
            })
            .collect()
    }

    /// Position of the first command matching `pred`
    pub fn position_of(&self, pred: impl Fn(&Command) -> bool) -> Option<usize> {
        self.commands.iter().position(pred)
    }
}

impl GpuDevice for RecordingDevice {
    fn create_texture(
        &mut self,
        label: &str,
        image: &ImageData,
        _params: SamplerParams,
    ) -> Result<TextureHandle, RenderError> {
        if !image.has_consistent_len() {
            return Err(RenderError::invalid_asset(label, "pixel data does not match dimensions"));
        }
        let handle = TextureHandle(self.next());
        self.textures.insert(handle);
        self.textures_created += 1;
        Ok(handle)
    }

    fn create_cube_map(
        &mut self,
        label: &str,
        faces: &[ImageData; 6],
    ) -> Result<TextureHandle, RenderError> {
        if faces.iter().any(|face| face.width != faces[0].width || face.height != faces[0].height) {
            return Err(RenderError::invalid_asset(label, "cube faces differ in size"));
        }
        let handle = TextureHandle(self.next());
        self.textures.insert(handle);
        self.textures_created += 1;
        Ok(handle)
    }

    fn create_depth_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<DepthTarget, RenderError> {
        if self.incomplete_framebuffers || width == 0 || height == 0 {
            return Err(RenderError::IncompleteFramebuffer(format!(
                "depth target {width}x{height} has no complete depth attachment"
            )));
        }
        let framebuffer = FramebufferHandle(self.next());
        let texture = TextureHandle(self.next());
        self.framebuffers.insert(framebuffer);
        self.textures.insert(texture);
        self.textures_created += 1;
        Ok(DepthTarget {
            framebuffer,
            texture,
            width,
            height,
        })
    }

    fn create_mesh(&mut self, label: &str, data: &MeshData) -> Result<MeshHandle, RenderError> {
        data.validate(label)?;
        let handle = MeshHandle(self.next());
        self.meshes.insert(handle);
        self.meshes_created += 1;
        Ok(handle)
    }

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, RenderError> {
        if source.code.trim().is_empty() {
            return Err(RenderError::ShaderCompilation {
                label: source.label.clone(),
                message: "empty source".to_string(),
            });
        }
        let handle = ProgramHandle(self.next());
        self.programs.insert(handle);
        self.programs_created += 1;
        Ok(handle)
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if !self.textures.remove(&texture) {
            log::debug!("Texture {} already released", texture.id());
        }
    }

    fn release_mesh(&mut self, mesh: MeshHandle) {
        if !self.meshes.remove(&mesh) {
            log::debug!("Mesh {} already released", mesh.id());
        }
    }

    fn release_depth_target(&mut self, target: &DepthTarget) {
        self.framebuffers.remove(&target.framebuffer);
        self.release_texture(target.texture);
    }

    fn release_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.uniforms.retain(|(owner, _), _| *owner != program);
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
        self.commands.push(Command::UseProgram(program));
    }

    fn set_uniform(&mut self, name: &str, value: Uniform) {
        if let Some(program) = self.current_program {
            self.uniforms.insert((program, name.to_string()), value);
        }
        self.commands.push(Command::SetUniform {
            program: self.current_program,
            name: name.to_string(),
            value,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.commands.push(Command::BindTexture { unit, texture });
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.current_framebuffer = framebuffer;
        self.commands.push(Command::BindFramebuffer(framebuffer));
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.commands.push(Command::SetViewport { width, height });
    }

    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.commands.push(Command::Clear(flags));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.commands.push(Command::SetDepthWrite(enabled));
    }

    fn set_face_culling(&mut self, enabled: bool) {
        self.commands.push(Command::SetFaceCulling(enabled));
    }

    fn bind_mesh(&mut self, mesh: MeshHandle) {
        self.current_mesh = Some(mesh);
        self.commands.push(Command::BindMesh(mesh));
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        self.commands.push(Command::DrawIndexed {
            program: self.current_program,
            framebuffer: self.current_framebuffer,
            mesh: self.current_mesh,
            index_count,
            instance_count,
        });
    }

    fn finish_frame(&mut self) -> Result<(), RenderError> {
        self.commands.push(Command::FinishFrame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::resources::program::ProgramKind;

    #[test]
    fn test_uniforms_persist_per_program() {
        let mut device = RecordingDevice::new(640, 480);
        let a = device
            .create_program(&ProgramSource::builtin(ProgramKind::Lighting))
            .unwrap();
        let b = device
            .create_program(&ProgramSource::builtin(ProgramKind::Depth))
            .unwrap();

        device.use_program(a);
        device.set_float("mat.shininess", 32.0);
        device.use_program(b);
        device.set_float("mat.shininess", 8.0);
        device.use_program(a);

        assert_eq!(device.uniform(a, "mat.shininess"), Some(Uniform::Float(32.0)));
        assert_eq!(device.uniform(b, "mat.shininess"), Some(Uniform::Float(8.0)));
    }

    #[test]
    fn test_incomplete_framebuffer_is_reported() {
        let mut device = RecordingDevice::new(640, 480).with_incomplete_framebuffers();
        let err = device.create_depth_target(1024, 1024).unwrap_err();
        assert!(matches!(err, RenderError::IncompleteFramebuffer(_)));
    }

    #[test]
    fn test_huge_texture_rejected_without_overflow() {
        let mut device = RecordingDevice::new(640, 480);
        for (width, height) in [(32768, 32768), (u32::MAX, u32::MAX)] {
            let image = ImageData::new(width, height, vec![0; 16]);
            let err = device
                .create_texture("huge", &image, SamplerParams::MATERIAL)
                .unwrap_err();
            assert!(matches!(err, RenderError::InvalidAsset { .. }));
        }
        assert_eq!(device.textures_created(), 0);
    }

    #[test]
    fn test_double_release_is_tolerated() {
        let mut device = RecordingDevice::new(640, 480);
        let texture = device
            .create_texture("white", &ImageData::solid(1, 1, [255; 4]), SamplerParams::MATERIAL)
            .unwrap();
        device.release_texture(texture);
        device.release_texture(texture);
        assert_eq!(device.live_textures(), 0);
        assert_eq!(device.textures_created(), 1);
    }

    #[test]
    fn test_draws_are_attributed_to_target() {
        let mut device = RecordingDevice::new(640, 480);
        let program = device
            .create_program(&ProgramSource::builtin(ProgramKind::Depth))
            .unwrap();
        let target = device.create_depth_target(256, 256).unwrap();

        device.use_program(program);
        device.bind_framebuffer(Some(target.framebuffer));
        device.draw_indexed(36, 1);
        device.bind_framebuffer(None);
        device.draw_indexed(6, 1);

        assert_eq!(device.framebuffer_draws(target.framebuffer), vec![(36, 1)]);
        assert_eq!(device.surface_draws(program), vec![(6, 1)]);
    }
}
