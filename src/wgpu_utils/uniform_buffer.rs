//! Per-draw uniform snapshots packed into one buffer
//!
//! Every draw in a frame gets its own copy of the current program's uniform
//! block. [`UniformRing`] packs the copies at aligned offsets on the CPU;
//! [`DynamicUniformBuffer`] uploads them once per frame and hands out the
//! offsets for `set_bind_group`.

use std::num::NonZeroU64;

/// Rounds `size` up to a multiple of `alignment`
pub fn align_to(size: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return size;
    }
    size.div_ceil(alignment) * alignment
}

/// CPU staging for one frame's uniform snapshots
#[derive(Debug, Clone)]
pub struct UniformRing {
    block_size: usize,
    stride: usize,
    staging: Vec<u8>,
}

impl UniformRing {
    pub fn new(block_size: usize, alignment: u64) -> Self {
        Self {
            block_size,
            stride: align_to(block_size as u64, alignment) as usize,
            staging: Vec::new(),
        }
    }

    /// Appends a snapshot and returns its dynamic offset
    pub fn push(&mut self, block: &[u8]) -> u32 {
        debug_assert_eq!(block.len(), self.block_size);
        let offset = self.staging.len();
        self.staging.extend_from_slice(block);
        self.staging.resize(offset + self.stride, 0);
        offset as u32
    }

    pub fn len(&self) -> usize {
        self.staging.len() / self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.staging.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.staging
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn reset(&mut self) {
        self.staging.clear();
    }
}

/// GPU side of [`UniformRing`], grown by doubling
pub struct DynamicUniformBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    ring: UniformRing,
}

impl DynamicUniformBuffer {
    const INITIAL_SLOTS: u64 = 256;

    pub fn new(device: &wgpu::Device, block_size: usize) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let ring = UniformRing::new(block_size, alignment);
        let capacity = ring.stride() as u64 * Self::INITIAL_SLOTS;
        Self {
            buffer: Self::create_buffer(device, capacity),
            capacity,
            ring,
        }
    }

    fn create_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Dynamic Uniform Buffer"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn ring_mut(&mut self) -> &mut UniformRing {
        &mut self.ring
    }

    /// Writes the staged snapshots; returns true if the buffer was recreated
    ///
    /// A recreated buffer invalidates bind groups built on the old one.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let needed = self.ring.bytes().len() as u64;
        let mut grown = false;
        if needed > self.capacity {
            let mut capacity = self.capacity.max(self.ring.stride() as u64);
            while capacity < needed {
                capacity *= 2;
            }
            log::debug!("Growing uniform buffer to {capacity} bytes");
            self.buffer = Self::create_buffer(device, capacity);
            self.capacity = capacity;
            grown = true;
        }
        if needed > 0 {
            queue.write_buffer(&self.buffer, 0, self.ring.bytes());
        }
        grown
    }

    /// One block-sized window; the draw's dynamic offset moves it
    pub fn binding_resource(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: 0,
            size: NonZeroU64::new(self.ring.block_size() as u64),
        })
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(768, 256), 768);
        assert_eq!(align_to(100, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(10, 0), 10);
    }

    #[test]
    fn test_offsets_are_aligned_and_sequential() {
        let mut ring = UniformRing::new(96, 256);
        let block = [7u8; 96];
        assert_eq!(ring.push(&block), 0);
        assert_eq!(ring.push(&block), 256);
        assert_eq!(ring.push(&block), 512);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.bytes().len(), 768);
        assert_eq!(ring.bytes()[256], 7);
        assert_eq!(ring.bytes()[200], 0);

        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.push(&block), 0);
    }
}
