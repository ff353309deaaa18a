// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use ashlands_core::init_tracing;
use ashlands_platform::window_attributes;
use ashlands_render::{FsShaderLoader, RenderSize};
use ashlands_render_vk::{InstanceConfig, PipelineHandle, RenderDriver};
use clap::Parser;
use tracing::{debug, error, info, warn};

use ashlands_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    window::{Window, WindowId},
};

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file
    #[arg(long, default_value = "ashlands.toml")]
    config: PathBuf,
    /// Directory holding `<name>.vert.spv` / `<name>.frag.spv`
    #[arg(long)]
    shader_dir: Option<PathBuf>,
    /// Shader pair to build the pipeline from
    #[arg(long)]
    pipeline: Option<String>,
    #[arg(long)]
    no_validation: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
struct WindowCfg {
    title: String,
    width: u32,
    height: u32,
    resizable: bool,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "AshLands".to_string(),
            width: 800,
            height: 600,
            resizable: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
struct RenderCfg {
    app_name: String,
    shader_dir: Option<PathBuf>,
    pipeline: String,
    /// Unset means the platform default.
    validation: Option<bool>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            app_name: "AshLands".to_string(),
            shader_dir: None,
            pipeline: "universal".to_string(),
            validation: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct AppCfg {
    window: WindowCfg,
    render: RenderCfg,
}

fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => toml::from_str::<AppCfg>(&s).unwrap_or_else(|e| {
            warn!("ignoring {}: {e}", path.display());
            AppCfg::default()
        }),
        Err(_) => {
            debug!("no config at {}, using defaults", path.display());
            AppCfg::default()
        }
    }
}

/// Shaders compiled by the build script when `compile-shaders` is on,
/// otherwise `shaders/` under the working directory.
fn default_shader_dir() -> PathBuf {
    option_env!("ASHLANDS_SHADER_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("shaders"))
}

/// Config file merged with command-line overrides.
#[derive(Debug)]
struct Settings {
    window: WindowCfg,
    instance: InstanceConfig,
    shader_dir: PathBuf,
    pipeline: String,
}

impl Settings {
    fn resolve(args: Args, cfg: AppCfg) -> Self {
        let mut instance = InstanceConfig {
            app_name: cfg.render.app_name,
            ..InstanceConfig::default()
        };
        if let Some(validation) = cfg.render.validation {
            instance.validation = validation;
        }
        if args.no_validation {
            instance.validation = false;
        }

        Settings {
            window: cfg.window,
            instance,
            shader_dir: args
                .shader_dir
                .or(cfg.render.shader_dir)
                .unwrap_or_else(default_shader_dir),
            pipeline: args.pipeline.unwrap_or(cfg.render.pipeline),
        }
    }
}

struct App {
    settings: Settings,
    // Declared before `window`: the driver owns the surface made from it.
    driver: Option<RenderDriver>,
    pipeline: Option<PipelineHandle>,
    window: Option<Window>,
    render_size: RenderSize,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(settings: Settings) -> Self {
        App {
            settings,
            driver: None,
            pipeline: None,
            window: None,
            render_size: RenderSize {
                width: 0,
                height: 0,
            },
            failure: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let cfg = &self.settings.window;
        let window = event_loop
            .create_window(window_attributes(&cfg.title, cfg.width, cfg.height, cfg.resizable))
            .context("create window")?;

        let display = window.display_handle().context("display handle")?.as_raw();
        let raw_window = window.window_handle().context("window handle")?.as_raw();

        info!("shader dir = {}", self.settings.shader_dir.display());
        let shaders = Box::new(FsShaderLoader::new(&self.settings.shader_dir));
        let mut driver = RenderDriver::new(&self.settings.instance, display, shaders)
            .context("create render driver")?;

        let surface = unsafe {
            ash_window::create_surface(driver.entry(), driver.instance(), display, raw_window, None)
        }
        .context("create window surface")?;
        driver.initialize(surface).context("initialize render driver")?;

        let pipeline = driver
            .create_pipeline(&self.settings.pipeline)
            .with_context(|| format!("build pipeline '{}'", self.settings.pipeline))?;

        let size = window.inner_size();
        self.render_size = RenderSize {
            width: size.width,
            height: size.height,
        };
        self.driver = Some(driver);
        self.pipeline = Some(pipeline);
        self.window = Some(window);
        Ok(())
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        if size == self.render_size {
            return Ok(());
        }
        self.render_size = size;
        if size.is_empty() {
            info!("Resized → {}x{} (minimized, keeping swapchain)", size.width, size.height);
            return Ok(());
        }

        info!("Resized → {}x{}", size.width, size.height);
        if let Some(driver) = &mut self.driver {
            driver.rebuild_swapchain().context("rebuild swapchain")?;
        }
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let (Some(driver), Some(pipeline)) = (&mut self.driver, self.pipeline.take()) {
            driver.destroy_pipeline(pipeline);
        }
        self.driver = None;
        self.window = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.failure = Some(err);
        self.shutdown(event_loop);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if self.window.is_some() || self.failure.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                let size = RenderSize {
                    width: new_size.width,
                    height: new_size.height,
                };
                if let Err(err) = self.resize(size) {
                    self.fail(event_loop, err);
                }
            }

            _ => {}
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = load_cfg(&args.config);
    let settings = Settings::resolve(args, cfg);
    debug!("settings = {settings:?}");

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(settings);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
