// SPDX-License-Identifier: CEPL-1.0
//! Command pool for the driver's single queue family.

use ash::vk;

use crate::error::{DriverError, Result};

/// Buffers are re-recorded every frame and reset one at a time.
pub const POOL_FLAGS: vk::CommandPoolCreateFlags = vk::CommandPoolCreateFlags::from_raw(
    vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER.as_raw()
        | vk::CommandPoolCreateFlags::TRANSIENT.as_raw(),
);

pub fn pool_info(queue_family: u32) -> vk::CommandPoolCreateInfo<'static> {
    vk::CommandPoolCreateInfo::default()
        .flags(POOL_FLAGS)
        .queue_family_index(queue_family)
}

/// `count` primary buffers from `pool`.
pub fn allocate_info(pool: vk::CommandPool, count: u32) -> vk::CommandBufferAllocateInfo<'static> {
    vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count)
}

#[derive(Debug)]
pub struct CommandPool {
    pool: vk::CommandPool,
}

impl CommandPool {
    /// # Safety
    /// The device must be valid and own a queue from `queue_family`.
    pub unsafe fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let pool = unsafe { device.create_command_pool(&pool_info(queue_family), None) }
            .map_err(DriverError::vulkan("vkCreateCommandPool"))?;
        Ok(Self { pool })
    }

    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Allocates `count` primary buffers for the frame loop.
    ///
    /// # Safety
    /// `device` must be the device the pool was created on.
    pub unsafe fn allocate(&self, device: &ash::Device, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        unsafe { device.allocate_command_buffers(&allocate_info(self.pool, count)) }
            .map_err(DriverError::vulkan("vkAllocateCommandBuffers"))
    }

    /// # Safety
    /// No buffer from this pool may still be pending execution.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe { device.destroy_command_pool(self.pool, None) };
    }
}
