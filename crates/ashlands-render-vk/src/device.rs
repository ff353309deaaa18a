// SPDX-License-Identifier: CEPL-1.0
//! Physical device and queue family selection.

use ash::khr::surface;
use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{DriverError, Result};

/// The chosen GPU. Read-only; selection runs once per driver.
#[derive(Clone, Debug)]
pub struct PhysicalDeviceInfo {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub queue_family_index: u32,
}

/// Discrete beats integrated beats everything else.
pub fn device_type_score(device_type: vk::PhysicalDeviceType) -> i32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 500,
        _ => 0,
    }
}

/// Highest scoring candidate. Only a strictly better score replaces the
/// current pick, so ties go to the first enumerated device.
pub fn pick_best<T>(candidates: impl IntoIterator<Item = (T, vk::PhysicalDeviceType)>) -> Option<T> {
    let mut best = None;
    let mut best_score = -1;
    for (candidate, device_type) in candidates {
        let score = device_type_score(device_type);
        if score > best_score {
            best_score = score;
            best = Some(candidate);
        }
    }
    best
}

/// Enumerates the instance's devices and returns the best one with its
/// properties.
///
/// # Safety
/// `instance` must be valid.
pub unsafe fn find_best_physical_device(
    instance: &ash::Instance,
) -> Result<(vk::PhysicalDevice, vk::PhysicalDeviceProperties)> {
    let devices = unsafe { instance.enumerate_physical_devices() }
        .map_err(DriverError::vulkan("vkEnumeratePhysicalDevices"))?;

    let candidates = devices.into_iter().map(|device| {
        let props = unsafe { instance.get_physical_device_properties(device) };
        debug!(
            "candidate {:?} ({:?})",
            props.device_name_as_c_str().unwrap_or_default(),
            props.device_type
        );
        ((device, props), props.device_type)
    });

    pick_best(candidates).ok_or(DriverError::NoPhysicalDevice)
}

/// Outcome of scanning queue families for graphics and presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueSelection {
    /// One family does both. The only layout this driver runs on.
    Combined(u32),
    /// Both capabilities exist, but never in the same family.
    Split { graphics: u32, present: u32 },
    Missing {
        graphics: Option<u32>,
        present: Option<u32>,
    },
}

impl QueueSelection {
    /// Reduces the selection to the single family this driver can use.
    pub fn require_combined(self) -> Result<u32> {
        match self {
            Self::Combined(index) => Ok(index),
            Self::Split { graphics, present } => {
                Err(DriverError::SplitQueueFamilies { graphics, present })
            }
            Self::Missing { graphics, present } => {
                Err(DriverError::NoQueueFamily { graphics, present })
            }
        }
    }
}

/// Scans families in enumeration order. The first family with graphics and
/// presentation wins; otherwise the first family of each kind is reported.
pub fn select_queue_family(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> bool,
) -> QueueSelection {
    let mut graphics = None;
    let mut present = None;

    for (index, family) in (0u32..).zip(families) {
        let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let has_present = supports_present(index);

        if has_graphics && has_present {
            return QueueSelection::Combined(index);
        }
        if has_graphics && graphics.is_none() {
            graphics = Some(index);
        }
        if has_present && present.is_none() {
            present = Some(index);
        }
    }

    match (graphics, present) {
        (Some(graphics), Some(present)) => QueueSelection::Split { graphics, present },
        (graphics, present) => QueueSelection::Missing { graphics, present },
    }
}

/// Queries the device's families against `surface`.
///
/// # Safety
/// All handles must be valid.
pub unsafe fn find_queue_family(
    instance: &ash::Instance,
    surface_loader: &surface::Instance,
    physical: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> QueueSelection {
    let families = unsafe { instance.get_physical_device_queue_family_properties(physical) };
    select_queue_family(&families, |index| {
        match unsafe { surface_loader.get_physical_device_surface_support(physical, index, surface) } {
            Ok(supported) => supported,
            Err(err) => {
                warn!("present support query for family {index} failed: {err}");
                false
            }
        }
    })
}

/// Picks the GPU and the combined graphics/present family on it.
///
/// # Safety
/// All handles must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<PhysicalDeviceInfo> {
    let (handle, props) = unsafe { find_best_physical_device(instance) }?;
    let name = props
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!("found best physical device: {name} ({:?})", props.device_type);

    let selection = unsafe { find_queue_family(instance, surface_loader, handle, surface) };
    debug!("queue selection: {selection:?}");
    let queue_family_index = selection.require_combined()?;

    Ok(PhysicalDeviceInfo {
        handle,
        name,
        device_type: props.device_type,
        api_version: props.api_version,
        queue_family_index,
    })
}
