//! Dynamic geometry upload and per-slot uniform buffers
//!
//! A [`DynamicBuffer`] pairs a persistently mapped staging buffer with a
//! device-local working buffer of the same capacity. Each frame the current
//! elements are written to staging and copied across in a blocking one-time
//! submission. The working buffer is never mapped.

use ash::{vk, Device};
use bytemuck::Pod;
use std::marker::PhantomData;
use std::mem::size_of;

use super::buffer::Buffer;
use super::commands::CommandPool;
use super::{VulkanError, VulkanResult};

/// Element capacity fixed at creation
///
/// Writing exactly `max_elements` succeeds; anything larger is rejected
/// before any byte is copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingCapacity {
    max_elements: usize,
    element_size: usize,
}

impl StagingCapacity {
    /// Capacity for `max_elements` values of `T`
    pub fn of<T>(max_elements: usize) -> Self {
        Self {
            max_elements,
            element_size: size_of::<T>(),
        }
    }

    /// Declared maximum element count
    pub fn max_elements(&self) -> usize {
        self.max_elements
    }

    /// Size of both buffers in bytes
    pub fn byte_capacity(&self) -> vk::DeviceSize {
        (self.max_elements * self.element_size) as vk::DeviceSize
    }

    /// Bytes needed for `count` elements, or an error past capacity
    pub fn checked_len(&self, count: usize) -> VulkanResult<vk::DeviceSize> {
        if count > self.max_elements {
            return Err(VulkanError::CapacityExceeded {
                requested: count,
                capacity: self.max_elements,
            });
        }
        Ok((count * self.element_size) as vk::DeviceSize)
    }
}

/// Staging/working buffer pair for per-frame mutable data
pub struct DynamicBuffer<T: Pod> {
    staging: Buffer,
    working: Buffer,
    capacity: StagingCapacity,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> DynamicBuffer<T> {
    /// Allocate both halves sized for `max_elements`
    pub fn new(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        max_elements: usize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let capacity = StagingCapacity::of::<T>(max_elements);
        if capacity.byte_capacity() == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "dynamic buffer needs a non-zero capacity".to_string(),
            });
        }

        let mut staging = Buffer::new(
            device.clone(),
            memory_properties,
            capacity.byte_capacity(),
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.map_persistent()?;

        let working = Buffer::new(
            device.clone(),
            memory_properties,
            capacity.byte_capacity(),
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        Ok(Self {
            staging,
            working,
            capacity,
            len: 0,
            _marker: PhantomData,
        })
    }

    /// Write `data` into staging; fails without writing if it exceeds capacity
    pub fn write(&mut self, data: &[T]) -> VulkanResult<()> {
        self.capacity.checked_len(data.len())?;
        self.staging.write_bytes(0, bytemuck::cast_slice(data))?;
        self.len = data.len();
        Ok(())
    }

    /// Copy the written elements into the working buffer and wait for it
    pub fn publish(&self, command_pool: &CommandPool, queue: vk::Queue) -> VulkanResult<()> {
        let size = self.capacity.checked_len(self.len)?;
        if size == 0 {
            return Ok(());
        }
        let (src, dst) = (self.staging.handle(), self.working.handle());
        command_pool.submit_one_time(queue, |device, command_buffer| {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            unsafe { device.cmd_copy_buffer(command_buffer, src, dst, &[region]) };
            Ok(())
        })
    }

    /// Device-local buffer to bind for drawing
    pub fn working_handle(&self) -> vk::Buffer {
        self.working.handle()
    }

    /// Elements written by the last [`Self::write`]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One persistently mapped, host-coherent uniform buffer per frame slot
pub struct UniformBuffers<T: Pod> {
    buffers: Vec<Buffer>,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformBuffers<T> {
    /// Allocate and map `count` buffers
    pub fn new(device: &Device, memory_properties: &vk::PhysicalDeviceMemoryProperties, count: usize) -> VulkanResult<Self> {
        let buffers = (0..count)
            .map(|_| {
                let mut buffer = Buffer::new(
                    device.clone(),
                    memory_properties,
                    Self::range(),
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                )?;
                buffer.map_persistent()?;
                Ok(buffer)
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(Self {
            buffers,
            _marker: PhantomData,
        })
    }

    /// Size of one payload
    pub fn range() -> vk::DeviceSize {
        size_of::<T>() as vk::DeviceSize
    }

    /// Overwrite slot `slot`'s payload
    pub fn write(&mut self, slot: usize, value: &T) -> VulkanResult<()> {
        let buffer = self.buffers.get_mut(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("no uniform buffer for slot {slot}"),
        })?;
        buffer.write_bytes(0, bytemuck::bytes_of(value))
    }

    /// Buffer handle for slot `slot`
    pub fn handle(&self, slot: usize) -> Option<vk::Buffer> {
        self.buffers.get(slot).map(Buffer::handle)
    }
}
