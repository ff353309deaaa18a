// SPDX-License-Identifier: CEPL-1.0
//! Windowing glue. The render core never touches the window; it only receives
//! the surface created from it.

pub use winit;

use winit::{dpi::LogicalSize, window::WindowAttributes};

/// Attributes for the single application window.
pub fn window_attributes(title: &str, width: u32, height: u32, resizable: bool) -> WindowAttributes {
    WindowAttributes::default()
        .with_title(title)
        .with_inner_size(LogicalSize::new(width.max(1), height.max(1)))
        .with_resizable(resizable)
}
