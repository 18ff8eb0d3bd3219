//! Process context wiring the display, GPU device and input system
//!
//! A [`Platform`] is built once by the application and handed around
//! explicitly. It owns no hardware by itself: the display and GPU device are
//! created on first use and released when their last consumer (window or
//! render context) drops them.

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::KmsConfig;
use crate::display::{DisplayHandle, DisplayMode, ModeDescriptor, VideoMode};
use crate::error::{DisplayError, GpuError};
use crate::gpu::{ClientApi, ContextSettings, GpuDevice, RenderContext};
use crate::input::InputSystem;
use crate::shared::Shared;
use crate::window::{DrmWindow, WindowImpl};

/// Color depth reported for every display mode
const MODE_BITS_PER_PIXEL: u32 = 32;

#[derive(Debug, Clone)]
struct ModeCache {
    current: DisplayMode,
    available: Vec<ModeDescriptor>,
}

pub struct Platform {
    config: KmsConfig,
    api: ClientApi,
    // GPU before display: a live GpuDevice keeps its own Arc to the display
    gpu: Shared<GpuDevice>,
    display: Shared<DisplayHandle>,
    input: Arc<InputSystem>,
    modes: Mutex<Option<ModeCache>>,
}

impl Platform {
    pub fn new(config: KmsConfig) -> Self {
        let api = ClientApi::from_name(&config.context.api).unwrap_or_else(|| {
            warn!("Unknown client API '{}', using gles", config.context.api);
            ClientApi::Gles
        });
        let input = Arc::new(InputSystem::new(config.input.clone()));

        Self {
            config,
            api,
            gpu: Shared::new(),
            display: Shared::new(),
            input,
            modes: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &KmsConfig {
        &self.config
    }

    /// The live display, opening the DRM device if nobody holds it
    pub fn display(&self) -> Result<Arc<DisplayHandle>, DisplayError> {
        let display = self
            .display
            .acquire_with(|| DisplayHandle::open(&self.config.display))?;

        let mut modes = self.modes.lock();
        if modes.is_none() {
            *modes = Some(ModeCache {
                current: display.mode(),
                available: display.modes().to_vec(),
            });
        }
        Ok(display)
    }

    /// The live GPU device, initializing EGL on the display if needed
    pub fn gpu(&self) -> Result<Arc<GpuDevice>, GpuError> {
        self.gpu.acquire_with(|| {
            let display = self.display()?;
            let gpu = GpuDevice::new(display, self.api)?;
            info!("🎨 GPU device ready ({:?})", self.api);
            Ok(gpu)
        })
    }

    pub fn input(&self) -> &Arc<InputSystem> {
        &self.input
    }

    fn mode_cache(&self) -> Option<ModeCache> {
        if let Some(cache) = self.modes.lock().clone() {
            return Some(cache);
        }

        match self.display() {
            Ok(_) => self.modes.lock().clone(),
            Err(e) => {
                error!("Display unavailable: {}", e);
                None
            }
        }
    }

    /// The mode the display runs in; zero geometry if it could not be opened
    pub fn desktop_mode(&self) -> VideoMode {
        let current = self
            .mode_cache()
            .map(|cache| cache.current)
            .unwrap_or_default();
        VideoMode::new(current.width, current.height, MODE_BITS_PER_PIXEL)
    }

    /// Every mode of the connector, or just the desktop mode when unknown
    pub fn fullscreen_modes(&self) -> Vec<VideoMode> {
        let modes: Vec<VideoMode> = self
            .mode_cache()
            .map(|cache| {
                cache
                    .available
                    .iter()
                    .map(|mode| VideoMode::new(mode.width, mode.height, MODE_BITS_PER_PIXEL))
                    .collect()
            })
            .unwrap_or_default();

        if modes.is_empty() {
            vec![self.desktop_mode()]
        } else {
            modes
        }
    }

    /// A window of `mode`'s size; works without a display, which only costs
    /// the native handle
    pub fn create_window(&self, mode: VideoMode, title: &str) -> DrmWindow {
        let display = match self.display() {
            Ok(display) => Some(display),
            Err(e) => {
                error!("Window created without a display: {}", e);
                None
            }
        };
        DrmWindow::new(self.input.clone(), display, mode, title)
    }

    fn settings(&self) -> ContextSettings {
        ContextSettings::from(&self.config.context)
    }

    /// A scanout context rendering to `window`
    pub fn create_context(&self, window: &dyn WindowImpl) -> Result<RenderContext, GpuError> {
        let mut context = RenderContext::for_window(
            self.gpu()?,
            None,
            &self.settings(),
            Some(window),
            self.config.context.bits_per_pixel,
        )?;
        context.set_interrupt_on_stdin(self.config.present.interrupt_on_stdin);
        debug!("Context for {:?} window: {:?}", window.size(), context.settings());
        Ok(context)
    }

    /// An off-screen context, optionally sharing objects with `shared`
    pub fn create_offscreen_context(
        &self,
        shared: Option<&RenderContext>,
        width: u32,
        height: u32,
    ) -> Result<RenderContext, GpuError> {
        RenderContext::offscreen(
            self.gpu()?,
            shared,
            &self.settings(),
            width,
            height,
            self.config.context.bits_per_pixel,
        )
    }

    /// Release the platform's hold on everything. Displays and GPU devices
    /// still held by windows or contexts are released when those drop.
    pub fn shutdown(self) {
        let gpu_users = self.gpu.consumers();
        let display_users = self.display.consumers();
        if gpu_users > 0 || display_users > 0 {
            warn!(
                "Shutdown with {} GPU and {} display consumer(s) still alive",
                gpu_users, display_users
            );
        }
        info!("👋 kmsview platform shut down");
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("api", &self.api)
            .field("gpu", &self.gpu)
            .field("display", &self.display)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn headless_config() -> KmsConfig {
        let mut config = KmsConfig::default();
        config.display.device = Some(PathBuf::from("/nonexistent/dri/card0"));
        config.input.device_dir = PathBuf::from("/nonexistent/input");
        config.input.terminal_text = false;
        config
    }

    #[test]
    fn test_missing_display_degrades_to_zero_mode() {
        let platform = Platform::new(headless_config());

        assert!(platform.display().is_err());
        assert_eq!(platform.desktop_mode(), VideoMode::new(0, 0, 32));
        assert_eq!(platform.fullscreen_modes(), vec![VideoMode::new(0, 0, 32)]);
    }

    #[test]
    fn test_gpu_error_wraps_display_error() {
        let platform = Platform::new(headless_config());
        assert!(matches!(platform.gpu(), Err(GpuError::Display(_))));
    }

    #[test]
    fn test_unknown_api_falls_back_to_gles() {
        let mut config = headless_config();
        config.context.api = "vulkan".to_string();
        let platform = Platform::new(config);
        assert_eq!(platform.api, ClientApi::Gles);
    }
}
