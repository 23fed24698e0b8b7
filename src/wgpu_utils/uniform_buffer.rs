// src/wgpu_utils/uniform_buffer.rs
use std::cell::RefCell;
use std::num::NonZeroU64;

/// Slot the next bind reads a block from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub slot: u32,
    /// The CPU copy must be written into `slot` first.
    pub upload: bool,
}

/// Slot bookkeeping for a ring of per-bind uniform snapshots.
///
/// Queued buffer writes all land before the commands of the next submit, so every bind
/// whose values differ from the previous one reads its own slot. Slots are reused once
/// the frame epoch moves on.
#[derive(Debug, Clone)]
pub struct SnapshotRing {
    capacity: u32,
    epoch: u64,
    next: u32,
    current: Option<u32>,
    dirty: bool,
}

impl SnapshotRing {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            epoch: 0,
            next: 0,
            current: None,
            dirty: true,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn acquire(&mut self, epoch: u64) -> Snapshot {
        if epoch != self.epoch {
            self.epoch = epoch;
            self.next = 0;
            self.current = None;
        }

        if let (Some(slot), false) = (self.current, self.dirty) {
            return Snapshot { slot, upload: false };
        }

        if self.next == self.capacity {
            log::warn!(
                "more than {} uniform snapshots in one frame, earlier draws will see later values",
                self.capacity
            );
            self.next = 0;
        }
        let slot = self.next;
        self.next += 1;
        self.current = Some(slot);
        self.dirty = false;
        Snapshot { slot, upload: true }
    }
}

/// Uniform buffer backing one reflected uniform block.
///
/// Writes go to a CPU copy of the block; [`snapshot`](Self::snapshot) uploads it to a ring
/// slot and returns the dynamic offset to bind with.
pub struct UniformBlockBuffer {
    buffer: wgpu::Buffer,
    block_size: u64,
    stride: u64,
    shadow: RefCell<Vec<u8>>,
    ring: RefCell<SnapshotRing>,
}

impl UniformBlockBuffer {
    /// Create a zeroed buffer holding `snapshots` copies of a `size` byte block.
    pub fn new(device: &wgpu::Device, size: u64, snapshots: u32, label: &str) -> Self {
        let block_size = size.max(16).div_ceil(16) * 16;
        let align = device.limits().min_uniform_buffer_offset_alignment.max(1) as u64;
        let stride = block_size.div_ceil(align) * align;
        let ring = SnapshotRing::new(snapshots);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("UniformBlock: {}", label)),
            size: stride * ring.capacity() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        UniformBlockBuffer {
            buffer,
            block_size,
            stride,
            shadow: RefCell::new(vec![0; block_size as usize]),
            ring: RefCell::new(ring),
        }
    }

    /// Write `bytes` at `offset` in the CPU copy (optimized to skip unnecessary writes)
    pub fn write(&self, offset: u64, bytes: &[u8]) {
        let mut shadow = self.shadow.borrow_mut();
        let start = offset as usize;
        let Some(current) = shadow.get_mut(start..start + bytes.len()) else {
            log::warn!(
                "uniform write of {} bytes at {} overflows a {} byte block",
                bytes.len(),
                offset,
                self.block_size
            );
            return;
        };
        if current == bytes {
            return;
        }
        current.copy_from_slice(bytes);
        self.ring.borrow_mut().mark_dirty();
    }

    /// Dynamic offset of the slot holding the current values, uploading them if needed.
    pub fn snapshot(&self, queue: &wgpu::Queue, epoch: u64) -> wgpu::DynamicOffset {
        let Snapshot { slot, upload } = self.ring.borrow_mut().acquire(epoch);
        let offset = slot as u64 * self.stride;
        if upload {
            queue.write_buffer(&self.buffer, offset, &self.shadow.borrow());
        }
        offset as wgpu::DynamicOffset
    }

    /// One block wide window into the ring, moved by the dynamic offset.
    pub fn binding_resource(&self) -> wgpu::BindingResource {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: 0,
            size: NonZeroU64::new(self.block_size),
        })
    }

    /// Get the underlying buffer
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Block size in bytes, padded to 16.
    pub fn size(&self) -> u64 {
        self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchanged_values_reuse_the_slot() {
        let mut ring = SnapshotRing::new(4);
        assert_eq!(ring.acquire(0), Snapshot { slot: 0, upload: true });
        assert_eq!(ring.acquire(0), Snapshot { slot: 0, upload: false });
    }

    #[test]
    fn test_changed_values_take_a_new_slot() {
        let mut ring = SnapshotRing::new(4);
        ring.acquire(0);
        ring.mark_dirty();
        assert_eq!(ring.acquire(0), Snapshot { slot: 1, upload: true });
        ring.mark_dirty();
        assert_eq!(ring.acquire(0), Snapshot { slot: 2, upload: true });
    }

    #[test]
    fn test_new_frame_restarts_the_ring() {
        let mut ring = SnapshotRing::new(4);
        ring.acquire(0);
        ring.mark_dirty();
        ring.acquire(0);

        // clean values are uploaded again since the old slot may be overwritten this frame
        assert_eq!(ring.acquire(1), Snapshot { slot: 0, upload: true });
        assert_eq!(ring.acquire(1), Snapshot { slot: 0, upload: false });
    }

    #[test]
    fn test_full_ring_wraps() {
        let mut ring = SnapshotRing::new(2);
        ring.acquire(0);
        ring.mark_dirty();
        ring.acquire(0);
        ring.mark_dirty();
        assert_eq!(ring.acquire(0), Snapshot { slot: 0, upload: true });
        assert_eq!(SnapshotRing::new(0).capacity(), 1);
    }
}
