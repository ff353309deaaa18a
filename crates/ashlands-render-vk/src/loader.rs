// SPDX-License-Identifier: CEPL-1.0
//! Process-wide Vulkan loader.
//!
//! The library is opened at most once per process. Every later call returns
//! the same entry table (or the same failure), so constructing several
//! drivers never reloads it.

use std::sync::OnceLock;

use tracing::debug;

use crate::error::{DriverError, Result};

static ENTRY: OnceLock<std::result::Result<ash::Entry, String>> = OnceLock::new();

/// Returns the shared entry table, loading the Vulkan library on first use.
pub fn entry() -> Result<&'static ash::Entry> {
    ENTRY
        .get_or_init(|| {
            debug!("loading Vulkan library");
            // SAFETY: the loaded library is kept alive for the rest of the
            // process by the static.
            unsafe { ash::Entry::load() }.map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|msg| DriverError::Loader(msg.clone()))
}

/// True once a load attempt has happened, successful or not.
pub fn is_loaded() -> bool {
    ENTRY.get().is_some()
}
