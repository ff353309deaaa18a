// SPDX-License-Identifier: CEPL-1.0
//! Driver error types.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// Whether the caller can reasonably try again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The context cannot continue; log and shut down.
    Fatal,
    /// The surface changed underneath us; rebuilding the swapchain may help.
    Recoverable,
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("failed to load the Vulkan library: {0}")]
    Loader(String),

    #[error("{call} failed: {result}")]
    Vulkan {
        call: &'static str,
        result: vk::Result,
    },

    #[error("no physical device found")]
    NoPhysicalDevice,

    #[error("no queue family supports graphics and presentation (graphics: {graphics:?}, present: {present:?})")]
    NoQueueFamily {
        graphics: Option<u32>,
        present: Option<u32>,
    },

    #[error("graphics ({graphics}) and presentation ({present}) live in different queue families; separate queues are not supported")]
    SplitQueueFamilies { graphics: u32, present: u32 },

    #[error("surface reports no formats")]
    NoSurfaceFormat,

    #[error("failed to load shader {}: {source}", path.display())]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("driver is not initialized")]
    NotInitialized,

    #[error("driver is already initialized")]
    AlreadyInitialized,
}

impl DriverError {
    pub(crate) fn vulkan(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Vulkan { call, result }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Vulkan {
                result: vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR,
                ..
            } => ErrorKind::Recoverable,
            _ => ErrorKind::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
