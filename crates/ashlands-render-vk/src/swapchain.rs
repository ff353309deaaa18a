// SPDX-License-Identifier: CEPL-1.0
//! Presentable image chain: parameter negotiation, creation and rebuild.

use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{DriverError, Result};

/// Format used when the surface accepts anything.
pub const FALLBACK_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Driver calls the manager needs. Implemented over ash for real surfaces.
pub trait SwapchainDevice {
    fn surface(&self) -> vk::SurfaceKHR;
    fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(&self) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR<'_>) -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
}

/// `SwapchainDevice` backed by a live device and surface.
pub struct AshSwapchainDevice {
    device: ash::Device,
    surface_loader: surface::Instance,
    swapchain_loader: swapchain::Device,
    physical: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
}

impl AshSwapchainDevice {
    /// # Safety
    /// Every handle must stay valid for as long as this value is used, and
    /// `device` must have the swapchain extension enabled.
    pub unsafe fn new(
        instance: &ash::Instance,
        device: &ash::Device,
        surface_loader: &surface::Instance,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Self {
        Self {
            device: device.clone(),
            surface_loader: surface_loader.clone(),
            swapchain_loader: swapchain::Device::new(instance, device),
            physical,
            surface,
        }
    }
}

// SAFETY (all methods): handle validity is the contract of `new`.
impl SwapchainDevice for AshSwapchainDevice {
    fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical, self.surface)
        }
    }

    fn surface_formats(&self) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(self.physical, self.surface)
        }
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR<'_>) -> VkResult<vk::SwapchainKHR> {
        unsafe { self.swapchain_loader.create_swapchain(info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        unsafe { self.device.create_image_view(info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }
}

/// One more than the minimum, capped by the maximum. A maximum of zero means
/// the surface sets no upper bound.
pub fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count.saturating_add(1);
    if caps.max_image_count == 0 {
        wanted
    } else {
        wanted.min(caps.max_image_count)
    }
}

/// First reported format, unless the surface reports a lone `UNDEFINED`
/// entry, in which case any format is accepted and sRGB BGRA is used.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    match formats {
        [only] if only.format == vk::Format::UNDEFINED => Some(FALLBACK_SURFACE_FORMAT),
        [first, ..] => Some(*first),
        [] => None,
    }
}

/// Everything negotiated with the surface before creating a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainParams {
    pub image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainParams {
    pub fn negotiate(
        caps: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
    ) -> Result<Self> {
        let format = choose_surface_format(formats).ok_or(DriverError::NoSurfaceFormat)?;
        Ok(Self {
            image_count: image_count(caps),
            format,
            // Taken verbatim; the window must report a real extent.
            extent: caps.current_extent,
            transform: caps.current_transform,
        })
    }

    pub fn create_info(
        &self,
        surface: vk::SurfaceKHR,
        old_swapchain: vk::SwapchainKHR,
    ) -> vk::SwapchainCreateInfoKHR<'static> {
        vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(self.image_count)
            .image_format(self.format.format)
            .image_color_space(self.format.color_space)
            .image_extent(self.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(self.transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(old_swapchain)
    }
}

pub fn image_view_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo<'static> {
    vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
}

/// A live chain. `images` and `image_views` always have the same length.
#[derive(Debug)]
pub struct SwapchainState {
    handle: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
}

impl SwapchainState {
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    fn release(self, device: &impl SwapchainDevice) {
        for view in self.image_views {
            device.destroy_image_view(view);
        }
        device.destroy_swapchain(self.handle);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapchainPhase {
    Uninitialized,
    Ready,
    Rebuilding,
}

enum ChainState {
    Uninitialized,
    Ready(SwapchainState),
    Rebuilding,
}

/// Owns the chain and drives `Uninitialized -> Ready -> Rebuilding -> Ready`.
///
/// A rebuild hands the live chain to the platform as `old_swapchain`; the old
/// images and views are released only once the replacement is fully built.
pub struct SwapchainManager<D: SwapchainDevice> {
    device: D,
    state: ChainState,
}

impl<D: SwapchainDevice> SwapchainManager<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            state: ChainState::Uninitialized,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn phase(&self) -> SwapchainPhase {
        match self.state {
            ChainState::Uninitialized => SwapchainPhase::Uninitialized,
            ChainState::Ready(_) => SwapchainPhase::Ready,
            ChainState::Rebuilding => SwapchainPhase::Rebuilding,
        }
    }

    pub fn state(&self) -> Option<&SwapchainState> {
        match &self.state {
            ChainState::Ready(state) => Some(state),
            _ => None,
        }
    }

    /// Builds the first chain.
    pub fn initialize(&mut self) -> Result<&SwapchainState> {
        if !matches!(self.state, ChainState::Uninitialized) {
            return Err(DriverError::AlreadyInitialized);
        }
        let state = self.build(vk::SwapchainKHR::null())?;
        info!(
            "swapchain ready ({}x{}, {:?}, {} images)",
            state.extent.width,
            state.extent.height,
            state.format.format,
            state.image_count()
        );
        self.state = ChainState::Ready(state);
        Ok(self.ready())
    }

    /// Replaces the live chain, reusing it as the creation hint.
    ///
    /// On failure every resource touched by the attempt is released, including
    /// the old chain (the platform retires it as soon as it is passed as a
    /// hint), and the manager is left `Uninitialized`.
    pub fn rebuild(&mut self) -> Result<&SwapchainState> {
        let old = match std::mem::replace(&mut self.state, ChainState::Rebuilding) {
            ChainState::Ready(old) => old,
            other => {
                self.state = other;
                return Err(DriverError::NotInitialized);
            }
        };

        match self.build(old.handle) {
            Ok(new) => {
                debug!("retiring swapchain {:?}", old.handle);
                old.release(&self.device);
                info!(
                    "swapchain rebuilt ({}x{}, {} images)",
                    new.extent.width,
                    new.extent.height,
                    new.image_count()
                );
                self.state = ChainState::Ready(new);
                Ok(self.ready())
            }
            Err(err) => {
                warn!("swapchain rebuild failed: {err}");
                old.release(&self.device);
                self.state = ChainState::Uninitialized;
                Err(err)
            }
        }
    }

    /// Releases the live chain, if any.
    pub fn destroy(&mut self) {
        if let ChainState::Ready(state) = std::mem::replace(&mut self.state, ChainState::Uninitialized) {
            state.release(&self.device);
        }
    }

    fn ready(&self) -> &SwapchainState {
        match &self.state {
            ChainState::Ready(state) => state,
            _ => unreachable!("chain state was just set to Ready"),
        }
    }

    fn build(&self, old_swapchain: vk::SwapchainKHR) -> Result<SwapchainState> {
        let device = &self.device;

        let caps = device
            .surface_capabilities()
            .map_err(DriverError::vulkan("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?;
        let formats = device
            .surface_formats()
            .map_err(DriverError::vulkan("vkGetPhysicalDeviceSurfaceFormatsKHR"))?;
        let params = SwapchainParams::negotiate(&caps, &formats)?;
        debug!(
            "swapchain params: {} images (min {}, max {}), {:?}/{:?}, {}x{}",
            params.image_count,
            caps.min_image_count,
            caps.max_image_count,
            params.format.format,
            params.format.color_space,
            params.extent.width,
            params.extent.height
        );

        let info = params.create_info(device.surface(), old_swapchain);
        let handle = device
            .create_swapchain(&info)
            .map_err(DriverError::vulkan("vkCreateSwapchainKHR"))?;

        // The platform may hand back more images than requested.
        let images = match device.swapchain_images(handle) {
            Ok(images) => images,
            Err(result) => {
                device.destroy_swapchain(handle);
                return Err(DriverError::vulkan("vkGetSwapchainImagesKHR")(result));
            }
        };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            match device.create_image_view(&image_view_info(image, params.format.format)) {
                Ok(view) => image_views.push(view),
                Err(result) => {
                    for view in image_views {
                        device.destroy_image_view(view);
                    }
                    device.destroy_swapchain(handle);
                    return Err(DriverError::vulkan("vkCreateImageView")(result));
                }
            }
        }

        Ok(SwapchainState {
            handle,
            format: params.format,
            extent: params.extent,
            images,
            image_views,
        })
    }
}

impl<D: SwapchainDevice> Drop for SwapchainManager<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}
