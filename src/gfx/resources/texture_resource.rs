//! Texture resources for the wgpu backend
//!
//! Bundles a wgpu texture with its view and sampler. Material textures get
//! their mip chain built on the CPU with `image` before upload.

use image::imageops::FilterType;
use image::RgbaImage;

use crate::gfx::device::{FilterMode, ImageData, SamplerParams, WrapMode};

/// GPU texture resource containing texture, view, and sampler
pub struct TextureResource {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn sampler_descriptor(label: &str, params: SamplerParams) -> wgpu::SamplerDescriptor<'_> {
    let address = address_mode(params.wrap);
    wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter_mode(params.mag_filter),
        min_filter: filter_mode(params.min_filter),
        mipmap_filter: if params.mipmaps {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        },
        ..Default::default()
    }
}

/// Number of levels in a full mip chain for `width` x `height`
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Base level followed by successively halved levels down to 1x1
pub fn mip_chain(image: &ImageData) -> Vec<ImageData> {
    let Some(base) = RgbaImage::from_raw(image.width, image.height, image.pixels.clone()) else {
        return vec![image.clone()];
    };
    let levels = mip_level_count(image.width, image.height);
    let mut chain = Vec::with_capacity(levels as usize);
    chain.push(image.clone());

    let mut current = base;
    for _ in 1..levels {
        let width = (current.width() / 2).max(1);
        let height = (current.height() / 2).max(1);
        current = image::imageops::resize(&current, width, height, FilterType::Triangle);
        chain.push(ImageData::new(width, height, current.as_raw().clone()));
    }
    chain
}

fn write_level(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    level: &ImageData,
    mip_level: u32,
    layer: u32,
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
            aspect: wgpu::TextureAspect::All,
        },
        &level.pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * level.width),
            rows_per_image: Some(level.height),
        },
        wgpu::Extent3d {
            width: level.width,
            height: level.height,
            depth_or_array_layers: 1,
        },
    );
}

impl TextureResource {
    /// Standard depth buffer format used throughout the engine
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
    pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    /// Window-sized depth buffer
    pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor::default());
        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Square depth target sampled with a comparison sampler
    pub fn create_shadow_map(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Map"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Uploads an RGBA8 image, with a CPU-built mip chain when `params.mipmaps`
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        image: &ImageData,
        params: SamplerParams,
    ) -> Self {
        let levels = if params.mipmaps {
            mip_chain(image)
        } else {
            vec![image.clone()]
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (mip_level, level) in levels.iter().enumerate() {
            write_level(queue, &texture, level, mip_level as u32, 0);
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler_label = format!("{label} Sampler");
        let sampler = device.create_sampler(&sampler_descriptor(&sampler_label, params));
        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Six equally sized faces in the order +X, -X, +Y, -Y, +Z, -Z
    pub fn cube_map(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        faces: &[ImageData; 6],
    ) -> Self {
        let size = faces[0].width;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (layer, face) in faces.iter().enumerate() {
            write_level(queue, &texture, face, 0, layer as u32);
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler_label = format!("{label} Sampler");
        let sampler = device.create_sampler(&sampler_descriptor(&sampler_label, SamplerParams::CUBE_MAP));
        Self {
            texture,
            view,
            sampler,
        }
    }

    /// 1x1 texture bound in place of a missing material map
    pub fn solid(device: &wgpu::Device, queue: &wgpu::Queue, label: &str, rgba: [u8; 4]) -> Self {
        let params = SamplerParams {
            mipmaps: false,
            ..SamplerParams::MATERIAL
        };
        Self::from_image(device, queue, label, &ImageData::solid(1, 1, rgba), params)
    }

    /// 1x1 cube map bound when no skybox has been drawn yet
    pub fn solid_cube(device: &wgpu::Device, queue: &wgpu::Queue, label: &str) -> Self {
        let faces = std::array::from_fn(|_| ImageData::solid(1, 1, [0, 0, 0, 255]));
        Self::cube_map(device, queue, label, &faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(4, 4), 3);
        assert_eq!(mip_level_count(512, 256), 10);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn test_mip_chain_halves_to_one_pixel() {
        let image = ImageData::solid(8, 2, [200, 100, 50, 255]);
        let chain = mip_chain(&image);
        let sizes: Vec<_> = chain.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
        for level in &chain {
            assert_eq!(level.pixels.len(), (level.width * level.height * 4) as usize);
        }
        // a solid colour stays that colour
        for (got, want) in chain[3].pixels.iter().zip([200u8, 100, 50, 255]) {
            assert!(got.abs_diff(want) <= 1);
        }
    }

    #[test]
    fn test_mismatched_pixels_skip_mips() {
        let image = ImageData::new(4, 4, vec![0; 3]);
        assert_eq!(mip_chain(&image).len(), 1);
    }

    #[test]
    fn test_sampler_mapping() {
        let desc = sampler_descriptor("s", SamplerParams::MATERIAL);
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(desc.mipmap_filter, wgpu::FilterMode::Linear);
        let cube = sampler_descriptor("c", SamplerParams::CUBE_MAP);
        assert_eq!(cube.address_mode_w, wgpu::AddressMode::ClampToEdge);
        assert_eq!(cube.mipmap_filter, wgpu::FilterMode::Nearest);
    }
}
