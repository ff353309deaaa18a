// SPDX-License-Identifier: CEPL-1.0
//! Logical device creation.

use std::ffi::{c_char, CStr};

use ash::vk;
use tracing::info;

use crate::device::PhysicalDeviceInfo;
use crate::error::{DriverError, Result};

/// Device extensions every context enables.
pub const DEVICE_EXTENSIONS: [&CStr; 4] = [
    ash::khr::swapchain::NAME,
    ash::khr::dynamic_rendering::NAME,
    ash::ext::descriptor_indexing::NAME,
    ash::khr::maintenance3::NAME,
];

/// Queue handles handed to the frame loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Queues {
    graphics: vk::Queue,
    present: vk::Queue,
}

impl Queues {
    /// One queue serving both roles.
    pub fn shared(queue: vk::Queue) -> Self {
        Self {
            graphics: queue,
            present: queue,
        }
    }

    pub fn graphics(&self) -> vk::Queue {
        self.graphics
    }

    pub fn present(&self) -> vk::Queue {
        self.present
    }
}

/// Logical device plus the GPU and queue it was created on.
pub struct GraphicsContext {
    physical: PhysicalDeviceInfo,
    device: ash::Device,
    queues: Queues,
}

impl GraphicsContext {
    /// Creates the device with a single queue from the selected family.
    ///
    /// # Safety
    /// `instance` must be valid and `physical` must come from it.
    pub unsafe fn new(instance: &ash::Instance, physical: PhysicalDeviceInfo) -> Result<Self> {
        let priorities = [1.0_f32];
        let queue_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(physical.queue_family_index)
            .queue_priorities(&priorities);

        let extension_names: Vec<*const c_char> =
            DEVICE_EXTENSIONS.iter().map(|e| e.as_ptr()).collect();

        let mut dynamic_rendering =
            vk::PhysicalDeviceDynamicRenderingFeatures::default().dynamic_rendering(true);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_info))
            .enabled_extension_names(&extension_names)
            .push_next(&mut dynamic_rendering);

        let device = unsafe { instance.create_device(physical.handle, &create_info, None) }
            .map_err(DriverError::vulkan("vkCreateDevice"))?;

        let queue = unsafe { device.get_device_queue(physical.queue_family_index, 0) };
        info!(
            "logical device ready on {} (queue family {})",
            physical.name, physical.queue_family_index
        );

        Ok(Self {
            physical,
            device,
            queues: Queues::shared(queue),
        })
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn physical(&self) -> &PhysicalDeviceInfo {
        &self.physical
    }

    pub fn queues(&self) -> Queues {
        self.queues
    }

    pub fn queue_family_index(&self) -> u32 {
        self.physical.queue_family_index
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.map_err(DriverError::vulkan("vkDeviceWaitIdle"))
    }

    /// # Safety
    /// Every object created from the device must already be destroyed.
    pub unsafe fn destroy(&self) {
        unsafe { self.device.destroy_device(None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn shared_queue_serves_both_roles() {
        let queues = Queues::shared(vk::Queue::from_raw(0x42));
        assert_eq!(queues.graphics(), queues.present());
        assert_ne!(queues.graphics(), vk::Queue::null());
    }

    #[test]
    fn swapchain_and_dynamic_rendering_are_enabled() {
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::dynamic_rendering::NAME));
        assert!(DEVICE_EXTENSIONS.contains(&c"VK_EXT_descriptor_indexing"));
        assert!(DEVICE_EXTENSIONS.contains(&c"VK_KHR_maintenance3"));
    }
}
