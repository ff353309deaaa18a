// SPDX-License-Identifier: CEPL-1.0
mod support;

use ashlands_render_vk::ash::vk::{self, Handle};
use ashlands_render_vk::{DriverError, ErrorKind, SwapchainManager, SwapchainPhase, SwapchainState};
use support::{caps, srgb, Call, FakeDevice};

fn assert_consistent(state: &SwapchainState, device: &FakeDevice) {
    assert_eq!(state.images().len(), state.image_views().len());
    assert_eq!(state.image_count(), state.images().len());

    let live = device.live_views.borrow();
    assert_eq!(live.len(), state.image_views().len());
    for (view, image) in state.image_views().iter().zip(state.images()) {
        let record = live.get(&view.as_raw()).expect("view is alive");
        assert_eq!(record.image, *image);
        assert_eq!(record.format, state.format().format);
    }
}

#[test]
fn initialize_builds_one_view_per_image() {
    let device = FakeDevice::new(caps(2, 0, 1024, 768), vec![srgb()]);
    let mut manager = SwapchainManager::new(device.clone());
    assert_eq!(manager.phase(), SwapchainPhase::Uninitialized);
    assert!(manager.state().is_none());

    let state = manager.initialize().unwrap();
    assert_eq!(state.image_count(), 3);
    assert_eq!(state.extent(), vk::Extent2D { width: 1024, height: 768 });
    assert_eq!(state.format(), srgb());
    assert_consistent(state, &device);
    assert_eq!(manager.phase(), SwapchainPhase::Ready);

    match device.calls().first() {
        Some(Call::CreateSwapchain { old, .. }) => assert_eq!(*old, 0),
        other => panic!("expected swapchain creation first, got {other:?}"),
    }
}

#[test]
fn platform_may_return_more_images_than_requested() {
    let device = FakeDevice::new(caps(2, 3, 800, 600), vec![srgb()]);
    device.extra_images.set(2);
    let mut manager = SwapchainManager::new(device.clone());

    let state = manager.initialize().unwrap();
    assert_eq!(state.image_count(), 5);
    assert_consistent(state, &device);
}

#[test]
fn second_initialize_is_rejected() {
    let device = FakeDevice::new(caps(2, 3, 800, 600), vec![srgb()]);
    let mut manager = SwapchainManager::new(device.clone());
    manager.initialize().unwrap();
    device.clear_calls();

    assert!(matches!(manager.initialize(), Err(DriverError::AlreadyInitialized)));
    assert!(device.calls().is_empty());
    assert_eq!(manager.phase(), SwapchainPhase::Ready);
}

#[test]
fn rebuild_before_initialize_is_rejected() {
    let device = FakeDevice::new(caps(2, 3, 800, 600), vec![srgb()]);
    let mut manager = SwapchainManager::new(device.clone());

    assert!(matches!(manager.rebuild(), Err(DriverError::NotInitialized)));
    assert_eq!(manager.phase(), SwapchainPhase::Uninitialized);
    assert!(device.calls().is_empty());
}

#[test]
fn rebuild_retires_old_chain_after_new_one_exists() {
    let device = FakeDevice::new(caps(2, 3, 800, 600), vec![srgb()]);
    let mut manager = SwapchainManager::new(device.clone());

    let first = manager.initialize().unwrap();
    let old_handle = first.handle().as_raw();
    let old_views: Vec<u64> = first.image_views().iter().map(|v| v.as_raw()).collect();
    device.clear_calls();

    device.caps.set(caps(2, 3, 1280, 720));
    let state = manager.rebuild().unwrap();
    assert_eq!(state.extent(), vk::Extent2D { width: 1280, height: 720 });
    assert_ne!(state.handle().as_raw(), old_handle);
    assert_consistent(state, &device);

    let calls = device.calls();
    let created = calls
        .iter()
        .position(|c| matches!(c, Call::CreateSwapchain { old, .. } if *old == old_handle))
        .expect("old chain passed as creation hint");
    let retired = calls
        .iter()
        .position(|c| *c == Call::DestroySwapchain(old_handle))
        .expect("old chain destroyed");
    assert!(created < retired);

    for view in old_views {
        let destroyed = calls
            .iter()
            .position(|c| *c == Call::DestroyView(view))
            .expect("old view destroyed");
        assert!(destroyed < retired, "views go before their swapchain");
    }
    assert_eq!(device.live_swapchains.borrow().len(), 1);
}

#[test]
fn repeated_rebuilds_keep_counts_in_step() {
    let device = FakeDevice::new(caps(1, 0, 640, 480), vec![srgb()]);
    let mut manager = SwapchainManager::new(device.clone());
    manager.initialize().unwrap();

    for extra in 0..4 {
        device.extra_images.set(extra);
        let state = manager.rebuild().unwrap();
        assert_eq!(state.image_count(), 2 + extra as usize);
        assert_consistent(state, &device);
    }
    assert_eq!(device.live_swapchains.borrow().len(), 1);
}

#[test]
fn out_of_date_rebuild_is_recoverable() {
    let device = FakeDevice::new(caps(2, 3, 800, 600), vec![srgb()]);
    let mut manager = SwapchainManager::new(device.clone());
    manager.initialize().unwrap();

    device.create_error.set(Some(vk::Result::ERROR_OUT_OF_DATE_KHR));
    let err = manager.rebuild().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Recoverable);
    assert_eq!(manager.phase(), SwapchainPhase::Uninitialized);
    assert!(device.all_released());

    let state = manager.initialize().unwrap();
    assert_consistent(state, &device);
}

#[test]
fn failed_view_creation_releases_partial_chain() {
    let device = FakeDevice::new(caps(2, 0, 800, 600), vec![srgb()]);
    device.view_budget.set(Some(1));
    let mut manager = SwapchainManager::new(device.clone());

    let err = manager.initialize().unwrap_err();
    assert!(matches!(
        err,
        DriverError::Vulkan {
            call: "vkCreateImageView",
            result: vk::Result::ERROR_OUT_OF_HOST_MEMORY
        }
    ));
    assert!(err.is_fatal());
    assert_eq!(manager.phase(), SwapchainPhase::Uninitialized);
    assert!(device.all_released());
}

#[test]
fn capability_query_failure_releases_old_chain() {
    let device = FakeDevice::new(caps(2, 3, 800, 600), vec![srgb()]);
    let mut manager = SwapchainManager::new(device.clone());
    manager.initialize().unwrap();

    device.caps_error.set(Some(vk::Result::ERROR_SURFACE_LOST_KHR));
    assert!(manager.rebuild().is_err());
    assert!(manager.state().is_none());
    assert!(device.all_released());
}

#[test]
fn empty_format_list_fails_without_creating_anything() {
    let device = FakeDevice::new(caps(2, 3, 800, 600), Vec::new());
    let mut manager = SwapchainManager::new(device.clone());

    assert!(matches!(manager.initialize(), Err(DriverError::NoSurfaceFormat)));
    assert!(device.calls().is_empty());
}

#[test]
fn destroy_and_drop_release_everything() {
    let device = FakeDevice::new(caps(2, 3, 800, 600), vec![srgb()]);
    {
        let mut manager = SwapchainManager::new(device.clone());
        manager.initialize().unwrap();
        manager.destroy();
        assert!(manager.device().all_released());
        assert_eq!(manager.phase(), SwapchainPhase::Uninitialized);

        manager.initialize().unwrap();
        assert!(!device.all_released());
    }
    assert!(device.all_released());
}
