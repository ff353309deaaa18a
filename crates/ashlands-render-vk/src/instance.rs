// SPDX-License-Identifier: CEPL-1.0
//! Instance creation and the optional debug messenger.

use std::ffi::{c_char, c_void, CStr, CString};

use ash::ext::debug_utils;
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{DriverError, Result};

pub const ENGINE_NAME: &CStr = c"AshLands";
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

#[derive(Clone, Debug)]
pub struct InstanceConfig {
    pub app_name: String,
    /// Lowest API version the application asks for.
    pub api_version: u32,
    pub validation: bool,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            app_name: "AshLands".to_string(),
            api_version: vk::API_VERSION_1_3,
            // The Khronos layer is not shipped for macOS.
            validation: cfg!(not(target_os = "macos")),
        }
    }
}

/// Extensions, layers and flags for `vkCreateInstance`, decided from what the
/// platform requires and what the loader exposes.
#[derive(Debug, PartialEq, Eq)]
pub struct InstancePlan {
    pub extensions: Vec<&'static CStr>,
    pub layers: Vec<&'static CStr>,
    pub flags: vk::InstanceCreateFlags,
    pub debug_utils: bool,
}

impl InstancePlan {
    pub fn new(
        surface_extensions: &[&'static CStr],
        available_extensions: &[&CStr],
        available_layers: &[&CStr],
        validation: bool,
    ) -> Self {
        let has_ext = |name: &CStr| available_extensions.iter().any(|e| *e == name);
        let mut extensions = surface_extensions.to_vec();

        let debug_utils = has_ext(debug_utils::NAME);
        if debug_utils {
            extensions.push(debug_utils::NAME);
        } else {
            warn!("{:?} not available", debug_utils::NAME);
        }

        // Needed to see non-conformant implementations such as MoltenVK.
        let mut flags = vk::InstanceCreateFlags::empty();
        if has_ext(ash::khr::portability_enumeration::NAME) {
            extensions.push(ash::khr::portability_enumeration::NAME);
            flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
            if has_ext(ash::khr::get_physical_device_properties2::NAME) {
                extensions.push(ash::khr::get_physical_device_properties2::NAME);
            }
        }

        let mut layers = Vec::new();
        if validation {
            if available_layers.contains(&VALIDATION_LAYER) {
                layers.push(VALIDATION_LAYER);
            } else {
                warn!("validation requested but {:?} is not installed", VALIDATION_LAYER);
            }
        }

        Self {
            extensions,
            layers,
            flags,
            debug_utils,
        }
    }

    /// The messenger is only worth creating when a layer can talk to it.
    pub fn wants_messenger(&self) -> bool {
        self.debug_utils && !self.layers.is_empty()
    }
}

/// Creates the instance for a window living on `display`.
///
/// # Safety
/// `entry` must be a valid entry table.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    config: &InstanceConfig,
    display: RawDisplayHandle,
) -> Result<(ash::Instance, InstancePlan)> {
    let app_name = CString::new(config.app_name.as_str()).unwrap_or_else(|_| ENGINE_NAME.into());

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(ENGINE_NAME)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(config.api_version);

    let surface_extensions: Vec<&'static CStr> = ash_window::enumerate_required_extensions(display)
        .map_err(DriverError::vulkan("vkEnumerateInstanceExtensionProperties"))?
        .iter()
        // SAFETY: ash-window hands out pointers to static extension names.
        .map(|&p| unsafe { CStr::from_ptr(p) })
        .collect();

    let ext_props = unsafe { entry.enumerate_instance_extension_properties(None) }
        .map_err(DriverError::vulkan("vkEnumerateInstanceExtensionProperties"))?;
    let layer_props = unsafe { entry.enumerate_instance_layer_properties() }
        .map_err(DriverError::vulkan("vkEnumerateInstanceLayerProperties"))?;
    let available_extensions: Vec<&CStr> = ext_props
        .iter()
        .filter_map(|e| e.extension_name_as_c_str().ok())
        .collect();
    let available_layers: Vec<&CStr> = layer_props
        .iter()
        .filter_map(|l| l.layer_name_as_c_str().ok())
        .collect();

    let plan = InstancePlan::new(
        &surface_extensions,
        &available_extensions,
        &available_layers,
        config.validation,
    );
    debug!("instance extensions: {:?}", plan.extensions);

    let extension_names: Vec<*const c_char> = plan.extensions.iter().map(|e| e.as_ptr()).collect();
    let layer_names: Vec<*const c_char> = plan.layers.iter().map(|l| l.as_ptr()).collect();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(plan.flags);

    let instance = unsafe { entry.create_instance(&create_info, None) }
        .map_err(DriverError::vulkan("vkCreateInstance"))?;

    log_instance_version(entry);
    Ok((instance, plan))
}

fn log_instance_version(entry: &ash::Entry) {
    match unsafe { entry.try_enumerate_instance_version() } {
        Ok(Some(version)) => info!(
            "instance version supported: {}.{}.{}",
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version)
        ),
        _ => info!("instance version is <= 1.0"),
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let message = unsafe { (*data).message_as_c_str() }
        .map(CStr::to_string_lossy)
        .unwrap_or_default();

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vulkan] {types:?} {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan] {types:?} {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!("[vulkan] {types:?} {message}");
    } else {
        trace!("[vulkan] {types:?} {message}");
    }
    vk::FALSE
}

/// Forwards validation output into `tracing`.
pub struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// # Safety
    /// `instance` must have been created with the debug utils extension.
    pub unsafe fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self> {
        let loader = debug_utils::Instance::new(entry, instance);
        let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));
        let messenger = unsafe { loader.create_debug_utils_messenger(&info, None) }
            .map_err(DriverError::vulkan("vkCreateDebugUtilsMessengerEXT"))?;
        Ok(Self { loader, messenger })
    }

    /// # Safety
    /// Must run before the owning instance is destroyed.
    pub unsafe fn destroy(&self) {
        unsafe { self.loader.destroy_debug_utils_messenger(self.messenger, None) };
    }
}
