// SPDX-License-Identifier: CEPL-1.0
//! Vulkan device, swapchain and pipeline lifecycle for a single window.
#![deny(unsafe_op_in_unsafe_fn)]

pub mod command;
pub mod context;
pub mod device;
pub mod driver;
pub mod error;
pub mod instance;
pub mod loader;
pub mod pipeline;
pub mod swapchain;

pub use ash;
pub use command::CommandPool;
pub use context::{GraphicsContext, Queues};
pub use device::{PhysicalDeviceInfo, QueueSelection};
pub use driver::RenderDriver;
pub use error::{DriverError, ErrorKind, Result};
pub use instance::InstanceConfig;
pub use pipeline::{PipelineHandle, PipelineObject, Vertex};
pub use swapchain::{SwapchainDevice, SwapchainManager, SwapchainPhase, SwapchainState};
