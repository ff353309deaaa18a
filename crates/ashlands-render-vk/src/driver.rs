// SPDX-License-Identifier: CEPL-1.0
//! `RenderDriver`: owns the whole GPU context for one window.

use ash::khr::surface;
use ash::vk;
use ashlands_render::ShaderLoader;
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, info, warn};

use crate::command::CommandPool;
use crate::context::GraphicsContext;
use crate::device::{select_physical_device, PhysicalDeviceInfo};
use crate::error::{DriverError, Result};
use crate::instance::{create_instance, DebugMessenger, InstanceConfig};
use crate::loader;
use crate::pipeline::{build_pipeline, PipelineHandle, PipelineObject, PipelineRegistry};
use crate::swapchain::{AshSwapchainDevice, SwapchainManager, SwapchainPhase, SwapchainState};

/// Everything that exists once `initialize` has succeeded.
struct Live {
    context: GraphicsContext,
    swapchain: SwapchainManager<AshSwapchainDevice>,
    command_pool: CommandPool,
    pipelines: PipelineRegistry,
}

/// Instance, device, queue, swapchain, command pool and pipelines for a
/// single window.
///
/// Lifecycle: [`RenderDriver::new`] creates the instance, the window
/// collaborator creates a surface from it, [`RenderDriver::initialize`] takes
/// that surface and brings up the rest. Teardown happens on drop, in reverse:
/// pipelines, command pool, swapchain, device, surface, instance.
pub struct RenderDriver {
    entry: ash::Entry,
    instance: ash::Instance,
    surface_loader: surface::Instance,
    debug_messenger: Option<DebugMessenger>,
    shaders: Box<dyn ShaderLoader>,
    surface: Option<vk::SurfaceKHR>,
    live: Option<Live>,
}

impl RenderDriver {
    /// Loads Vulkan (once per process) and creates the instance for windows
    /// on `display`.
    pub fn new(
        config: &InstanceConfig,
        display: RawDisplayHandle,
        shaders: Box<dyn ShaderLoader>,
    ) -> Result<Self> {
        let entry = loader::entry()?.clone();
        let (instance, plan) = unsafe { create_instance(&entry, config, display) }?;

        let debug_messenger = if plan.wants_messenger() {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(messenger) => Some(messenger),
                Err(err) => {
                    warn!("running without debug messenger: {err}");
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        Ok(Self {
            entry,
            instance,
            surface_loader,
            debug_messenger,
            shaders,
            surface: None,
            live: None,
        })
    }

    /// Selects the GPU, creates the device and queue, the first swapchain and
    /// the command pool, in that order. The first failure stops the sequence
    /// and releases whatever this call had created.
    ///
    /// Precondition: called once. The surface must come from
    /// [`RenderDriver::instance`]; it is destroyed with the driver, since it
    /// cannot outlive the instance. A second call, even after a failed first
    /// one, returns [`DriverError::AlreadyInitialized`].
    pub fn initialize(&mut self, surface: vk::SurfaceKHR) -> Result<()> {
        if self.surface.is_some() {
            return Err(DriverError::AlreadyInitialized);
        }
        self.surface = Some(surface);

        let physical = unsafe { select_physical_device(&self.instance, &self.surface_loader, surface) }?;
        let context = unsafe { GraphicsContext::new(&self.instance, physical) }?;

        let swapchain_device = unsafe {
            AshSwapchainDevice::new(
                &self.instance,
                context.device(),
                &self.surface_loader,
                context.physical().handle,
                surface,
            )
        };
        let mut swapchain = SwapchainManager::new(swapchain_device);
        if let Err(err) = swapchain.initialize().map(|_| ()) {
            drop(swapchain);
            unsafe { context.destroy() };
            return Err(err);
        }

        let command_pool =
            match unsafe { CommandPool::new(context.device(), context.queue_family_index()) } {
                Ok(pool) => pool,
                Err(err) => {
                    swapchain.destroy();
                    unsafe { context.destroy() };
                    return Err(err);
                }
            };

        info!("render driver initialized");
        self.live = Some(Live {
            context,
            swapchain,
            command_pool,
            pipelines: PipelineRegistry::new(),
        });
        Ok(())
    }

    /// Recreates the swapchain against the surface's current state, e.g.
    /// after a window resize. Waits for the device to go idle first.
    pub fn rebuild_swapchain(&mut self) -> Result<()> {
        let live = self.live.as_mut().ok_or(DriverError::NotInitialized)?;
        live.context.wait_idle()?;

        let previous_format = live.swapchain.state().map(|s| s.format().format);
        let state = match live.swapchain.phase() {
            SwapchainPhase::Ready => live.swapchain.rebuild()?,
            // A previous rebuild failed and released the chain.
            _ => live.swapchain.initialize()?,
        };

        let format = state.format().format;
        if previous_format.is_some_and(|f| f != format) && !live.pipelines.is_empty() {
            warn!(
                "swapchain format changed to {format:?}; {} pipeline(s) target the old format",
                live.pipelines.len()
            );
        }
        Ok(())
    }

    /// Builds the triangle pipeline from `<shader_name>.vert.spv` and
    /// `<shader_name>.frag.spv` for the current swapchain format. The driver
    /// keeps ownership; the returned handle identifies it.
    pub fn create_pipeline(&mut self, shader_name: &str) -> Result<PipelineHandle> {
        let live = self.live.as_mut().ok_or(DriverError::NotInitialized)?;
        let format = live
            .swapchain
            .state()
            .ok_or(DriverError::NotInitialized)?
            .format()
            .format;

        let object =
            unsafe { build_pipeline(live.context.device(), self.shaders.as_ref(), shader_name, format) }?;
        Ok(live.pipelines.insert(shader_name, object))
    }

    /// Destroys a pipeline built by this driver. The caller must make sure
    /// the GPU no longer uses it. Returns false for unknown handles.
    pub fn destroy_pipeline(&mut self, handle: PipelineHandle) -> bool {
        let Some(live) = self.live.as_mut() else {
            return false;
        };
        match live.pipelines.remove(handle) {
            Some(object) => {
                unsafe { object.destroy(live.context.device()) };
                debug!("destroyed pipeline {handle:?}");
                true
            }
            None => false,
        }
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn device(&self) -> Option<&ash::Device> {
        self.live.as_ref().map(|l| l.context.device())
    }

    pub fn physical_device(&self) -> Option<&PhysicalDeviceInfo> {
        self.live.as_ref().map(|l| l.context.physical())
    }

    pub fn queue_family_index(&self) -> Option<u32> {
        self.live.as_ref().map(|l| l.context.queue_family_index())
    }

    pub fn graphics_queue(&self) -> Option<vk::Queue> {
        self.live.as_ref().map(|l| l.context.queues().graphics())
    }

    /// Same handle as [`RenderDriver::graphics_queue`]; one family serves both.
    pub fn present_queue(&self) -> Option<vk::Queue> {
        self.live.as_ref().map(|l| l.context.queues().present())
    }

    /// The live chain. Re-fetch after every rebuild.
    pub fn swapchain(&self) -> Option<&SwapchainState> {
        self.live.as_ref().and_then(|l| l.swapchain.state())
    }

    pub fn command_pool(&self) -> Option<&CommandPool> {
        self.live.as_ref().map(|l| &l.command_pool)
    }

    pub fn pipeline(&self, handle: PipelineHandle) -> Option<&PipelineObject> {
        self.live.as_ref().and_then(|l| l.pipelines.get(handle))
    }
}

impl Drop for RenderDriver {
    fn drop(&mut self) {
        unsafe {
            if let Some(live) = self.live.take() {
                let Live {
                    context,
                    mut swapchain,
                    command_pool,
                    mut pipelines,
                } = live;
                if let Err(err) = context.wait_idle() {
                    warn!("teardown without idle device: {err}");
                }

                let device = context.device();
                for object in pipelines.drain() {
                    object.destroy(device);
                }
                command_pool.destroy(device);
                swapchain.destroy();
                drop(swapchain);
                context.destroy();
            }

            if let Some(surface) = self.surface.take() {
                self.surface_loader.destroy_surface(surface, None);
            }
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        debug!("render driver destroyed");
    }
}
