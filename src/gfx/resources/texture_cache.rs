//! Deduplicating texture store
//!
//! [`TextureCache`] owns every material texture. Keys are file names resolved
//! against a resource root; the first request decodes and uploads the image,
//! and every later request for the same key returns the same shared
//! [`Texture`] without touching the GPU.
//!
//! The cache is an explicit service object. Callers pass it by `&mut` into
//! material construction; there is no global instance.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::gfx::device::{GpuDevice, ImageData, SamplerParams, TextureHandle};
use crate::gfx::error::RenderError;

/// A cached GPU texture
#[derive(Debug, PartialEq, Eq)]
pub struct Texture {
    handle: TextureHandle,
    key: String,
    width: u32,
    height: u32,
}

impl Texture {
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Decodes an image file into RGBA8
///
/// With `flip_vertically` the rows are reversed so that texture coordinate
/// (0, 0) addresses the bottom-left pixel.
pub fn load_image(path: &Path, flip_vertically: bool) -> Result<ImageData, RenderError> {
    if !path.exists() {
        return Err(RenderError::MissingAsset {
            path: path.to_path_buf(),
        });
    }
    let decoded = image::open(path).map_err(|source| RenderError::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = if flip_vertically {
        decoded.flipv()
    } else {
        decoded
    };
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageData::new(width, height, rgba.into_raw()))
}

pub struct TextureCache {
    root: PathBuf,
    textures: HashMap<String, Rc<Texture>>,
    params: SamplerParams,
}

impl TextureCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            textures: HashMap::new(),
            params: SamplerParams::MATERIAL,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Returns the texture for `key`, loading it on first use
    ///
    /// # Errors
    /// Fails if the file is missing or cannot be decoded. No placeholder is
    /// ever substituted.
    pub fn get_or_load(
        &mut self,
        device: &mut dyn GpuDevice,
        key: &str,
    ) -> Result<Rc<Texture>, RenderError> {
        if let Some(texture) = self.textures.get(key) {
            log::debug!("Texture cache hit: {key}");
            return Ok(Rc::clone(texture));
        }

        let path = self.path_for(key);
        let image = load_image(&path, true)?;
        let handle = device.create_texture(key, &image, self.params)?;
        log::info!("Loaded texture {} ({}x{})", path.display(), image.width, image.height);

        let texture = Rc::new(Texture {
            handle,
            key: key.to_string(),
            width: image.width,
            height: image.height,
        });
        self.textures.insert(key.to_string(), Rc::clone(&texture));
        Ok(texture)
    }

    pub fn get(&self, key: &str) -> Option<Rc<Texture>> {
        self.textures.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.textures.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Releases entries no material holds any more; returns how many went
    ///
    /// Never called implicitly.
    pub fn evict_unused(&mut self, device: &mut dyn GpuDevice) -> usize {
        let unused: Vec<String> = self
            .textures
            .iter()
            .filter(|(_, texture)| Rc::strong_count(texture) == 1)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &unused {
            if let Some(texture) = self.textures.remove(key) {
                device.release_texture(texture.handle);
            }
        }
        unused.len()
    }

    pub fn release_all(&mut self, device: &mut dyn GpuDevice) {
        for (_, texture) in self.textures.drain() {
            device.release_texture(texture.handle);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gfx::device::recording::RecordingDevice;
    use std::fs;

    /// Fresh directory under the system temp dir holding small RGB images,
    /// encoded according to each file's extension
    pub(crate) fn texture_dir(name: &str, files: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("umbra-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        for (i, file) in files.iter().enumerate() {
            let shade = (i as u8).wrapping_mul(40);
            let img = image::RgbImage::from_pixel(4, 4, image::Rgb([shade, 128, 255 - shade]));
            img.save(dir.join(file)).unwrap();
        }
        dir
    }

    #[test]
    fn test_second_lookup_is_a_cache_hit() {
        let dir = texture_dir("cache-hit", &["wood.png"]);
        let mut device = RecordingDevice::new(64, 64);
        let mut cache = TextureCache::new(&dir);

        let first = cache.get_or_load(&mut device, "wood.png").unwrap();
        let second = cache.get_or_load(&mut device, "wood.png").unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.handle(), second.handle());
        assert_eq!(device.textures_created(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(first.size(), (4, 4));
    }

    #[test]
    fn test_missing_texture_is_fatal() {
        let dir = texture_dir("cache-missing", &[]);
        let mut device = RecordingDevice::new(64, 64);
        let mut cache = TextureCache::new(&dir);

        let err = cache.get_or_load(&mut device, "nope.png").unwrap_err();
        assert!(matches!(err, RenderError::MissingAsset { .. }));
        assert_eq!(device.textures_created(), 0);
        assert!(!cache.contains("nope.png"));
    }

    #[test]
    fn test_undecodable_texture_is_fatal() {
        let dir = texture_dir("cache-garbage", &[]);
        fs::write(dir.join("garbage.png"), b"not an image").unwrap();
        let mut device = RecordingDevice::new(64, 64);
        let mut cache = TextureCache::new(&dir);

        let err = cache.get_or_load(&mut device, "garbage.png").unwrap_err();
        assert!(matches!(err, RenderError::ImageDecode { .. }));
    }

    #[test]
    fn test_load_image_flips_rows() {
        let dir = texture_dir("cache-flip", &[]);
        let mut img = image::RgbaImage::from_pixel(1, 2, image::Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.save(dir.join("top_red.png")).unwrap();

        let flipped = load_image(&dir.join("top_red.png"), true).unwrap();
        assert_eq!(&flipped.pixels[4..8], &[255, 0, 0, 255]);
        let upright = load_image(&dir.join("top_red.png"), false).unwrap();
        assert_eq!(&upright.pixels[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_evict_unused_keeps_referenced_textures() {
        let dir = texture_dir("cache-evict", &["a.png", "b.png"]);
        let mut device = RecordingDevice::new(64, 64);
        let mut cache = TextureCache::new(&dir);

        let held = cache.get_or_load(&mut device, "a.png").unwrap();
        cache.get_or_load(&mut device, "b.png").unwrap();

        assert_eq!(cache.evict_unused(&mut device), 1);
        assert!(cache.contains("a.png"));
        assert!(!cache.contains("b.png"));
        assert_eq!(device.live_textures(), 1);

        drop(held);
        cache.release_all(&mut device);
        assert!(cache.is_empty());
        assert_eq!(device.live_textures(), 0);
    }
}
