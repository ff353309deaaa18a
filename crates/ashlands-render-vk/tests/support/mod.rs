// SPDX-License-Identifier: CEPL-1.0
//! In-memory `SwapchainDevice` that hands out fake handles and records every
//! call, so swapchain lifecycles can be checked without a GPU.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use std::rc::Rc;

use ashlands_render_vk::ash::prelude::VkResult;
use ashlands_render_vk::ash::vk::{self, Handle};
use ashlands_render_vk::SwapchainDevice;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CreateSwapchain { handle: u64, old: u64 },
    CreateView { view: u64, image: u64 },
    DestroyView(u64),
    DestroySwapchain(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRecord {
    pub image: vk::Image,
    pub format: vk::Format,
    pub view_type: vk::ImageViewType,
    pub aspect: vk::ImageAspectFlags,
}

pub struct FakeSurface {
    pub caps: Cell<vk::SurfaceCapabilitiesKHR>,
    pub formats: RefCell<Vec<vk::SurfaceFormatKHR>>,
    /// Images handed out beyond the requested minimum.
    pub extra_images: Cell<u32>,
    /// Next `vkGetPhysicalDeviceSurfaceCapabilitiesKHR` fails with this.
    pub caps_error: Cell<Option<vk::Result>>,
    /// Next `vkCreateSwapchainKHR` fails with this.
    pub create_error: Cell<Option<vk::Result>>,
    /// View creations left before one fails.
    pub view_budget: Cell<Option<usize>>,
    pub calls: RefCell<Vec<Call>>,
    pub live_swapchains: RefCell<BTreeSet<u64>>,
    pub live_views: RefCell<BTreeMap<u64, ViewRecord>>,
    images: RefCell<BTreeMap<u64, Vec<vk::Image>>>,
    next_handle: Cell<u64>,
}

/// Cloneable handle so the test can keep inspecting after the manager takes
/// ownership.
#[derive(Clone)]
pub struct FakeDevice(Rc<FakeSurface>);

pub const SURFACE: u64 = 0x5u64;

pub fn caps(min: u32, max: u32, width: u32, height: u32) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count: min,
        max_image_count: max,
        current_extent: vk::Extent2D { width, height },
        current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
        ..Default::default()
    }
}

pub fn srgb() -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    }
}

impl FakeDevice {
    pub fn new(caps: vk::SurfaceCapabilitiesKHR, formats: Vec<vk::SurfaceFormatKHR>) -> Self {
        Self(Rc::new(FakeSurface {
            caps: Cell::new(caps),
            formats: RefCell::new(formats),
            extra_images: Cell::new(0),
            caps_error: Cell::new(None),
            create_error: Cell::new(None),
            view_budget: Cell::new(None),
            calls: RefCell::new(Vec::new()),
            live_swapchains: RefCell::new(BTreeSet::new()),
            live_views: RefCell::new(BTreeMap::new()),
            images: RefCell::new(BTreeMap::new()),
            next_handle: Cell::new(0x100),
        }))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// True once nothing created through this device is still alive.
    pub fn all_released(&self) -> bool {
        self.live_swapchains.borrow().is_empty() && self.live_views.borrow().is_empty()
    }

    fn next(&self) -> u64 {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        handle
    }
}

impl Deref for FakeDevice {
    type Target = FakeSurface;

    fn deref(&self) -> &FakeSurface {
        &self.0
    }
}

impl SwapchainDevice for FakeDevice {
    fn surface(&self) -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(SURFACE)
    }

    fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        match self.caps_error.take() {
            Some(result) => Err(result),
            None => Ok(self.caps.get()),
        }
    }

    fn surface_formats(&self) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.formats.borrow().clone())
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR<'_>) -> VkResult<vk::SwapchainKHR> {
        assert_eq!(info.surface.as_raw(), SURFACE);
        if let Some(result) = self.create_error.take() {
            return Err(result);
        }

        let handle = self.next();
        let count = info.min_image_count + self.extra_images.get();
        let images = (0..count).map(|_| vk::Image::from_raw(self.next())).collect();
        self.images.borrow_mut().insert(handle, images);
        self.live_swapchains.borrow_mut().insert(handle);
        self.calls.borrow_mut().push(Call::CreateSwapchain {
            handle,
            old: info.old_swapchain.as_raw(),
        });
        Ok(vk::SwapchainKHR::from_raw(handle))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.images
            .borrow()
            .get(&swapchain.as_raw())
            .cloned()
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        match self.view_budget.get() {
            Some(0) => return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY),
            Some(left) => self.view_budget.set(Some(left - 1)),
            None => {}
        }

        let view = self.next();
        self.live_views.borrow_mut().insert(
            view,
            ViewRecord {
                image: info.image,
                format: info.format,
                view_type: info.view_type,
                aspect: info.subresource_range.aspect_mask,
            },
        );
        self.calls.borrow_mut().push(Call::CreateView {
            view,
            image: info.image.as_raw(),
        });
        Ok(vk::ImageView::from_raw(view))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        let removed = self.live_views.borrow_mut().remove(&view.as_raw());
        assert!(removed.is_some(), "image view {view:?} destroyed twice or never created");
        self.calls.borrow_mut().push(Call::DestroyView(view.as_raw()));
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let removed = self.live_swapchains.borrow_mut().remove(&swapchain.as_raw());
        assert!(removed, "swapchain {swapchain:?} destroyed twice or never created");
        self.images.borrow_mut().remove(&swapchain.as_raw());
        self.calls.borrow_mut().push(Call::DestroySwapchain(swapchain.as_raw()));
    }
}
