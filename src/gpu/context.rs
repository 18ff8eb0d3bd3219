//! Render contexts and their GBM-backed window surfaces

use khronos_egl as egl;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::ffi::c_void;
use std::io;
use std::os::fd::AsFd;
use std::sync::Arc;

use drm::control::{framebuffer, Device as ControlDevice};
use gbm::{AsRaw, BufferObject, BufferObjectFlags};

use super::present::{PresentOutcome, Presenter, ScanoutTarget};
use super::wait::{self, FlipWait};
use super::{ContextSettings, GpuDevice};
use crate::error::{GpuError, PresentError};
use crate::window::WindowImpl;

/// A GBM surface wrapped in an EGL window surface
pub struct WindowSurface {
    framebuffers: HashMap<drm::buffer::Handle, framebuffer::Handle>,
    egl_surface: egl::Surface,
    gbm_surface: gbm::Surface<()>,
    gpu: Arc<GpuDevice>,
    width: u32,
    height: u32,
}

impl WindowSurface {
    /// Allocate a `width`×`height` ARGB8888 surface; `scanout` adds the scanout usage flag
    pub fn create(
        gpu: Arc<GpuDevice>,
        config: egl::Config,
        width: u32,
        height: u32,
        scanout: bool,
    ) -> Result<Self, GpuError> {
        let mut flags = BufferObjectFlags::RENDERING;
        if scanout {
            flags |= BufferObjectFlags::SCANOUT;
        }

        let gbm_surface = gpu
            .display()
            .gbm()
            .create_surface::<()>(width, height, gbm::Format::Argb8888, flags)
            .map_err(|source| GpuError::Surface {
                width,
                height,
                source,
            })?;

        let native = gbm_surface.as_raw() as *mut c_void;
        // The GBM surface is stored next to the EGL surface and dropped after it
        let egl_surface = unsafe { gpu.egl().create_window_surface(config, native)? };

        debug!(
            "Created {}x{} surface ({})",
            width,
            height,
            if scanout { "scanout" } else { "off-screen" }
        );

        Ok(Self {
            framebuffers: HashMap::new(),
            egl_surface,
            gbm_surface,
            gpu,
            width,
            height,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn egl_surface(&self) -> egl::Surface {
        self.egl_surface
    }
}

impl ScanoutTarget for WindowSurface {
    type Buffer = BufferObject<()>;
    type Framebuffer = framebuffer::Handle;

    fn swap(&mut self) -> Result<(), PresentError> {
        let egl = self.gpu.egl();
        egl.instance()
            .swap_buffers(egl.raw(), self.egl_surface)
            .map_err(|e| PresentError::Swap(e.to_string()))
    }

    fn lock_front(&mut self) -> Option<BufferObject<()>> {
        // Preceded by exactly one swap in the present protocol
        match unsafe { self.gbm_surface.lock_front_buffer() } {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                warn!("Failed to lock front buffer: {}", e);
                None
            }
        }
    }

    fn framebuffer(&mut self, buffer: &BufferObject<()>) -> Option<framebuffer::Handle> {
        let key = drm::buffer::Buffer::handle(buffer);
        if let Some(fb) = self.framebuffers.get(&key) {
            return Some(*fb);
        }

        match self.gpu.display().card().add_framebuffer(buffer, 24, 32) {
            Ok(fb) => {
                self.framebuffers.insert(key, fb);
                Some(fb)
            }
            Err(e) => {
                error!("Failed to create framebuffer from buffer object: {}", e);
                None
            }
        }
    }

    fn set_crtc(&mut self, fb: framebuffer::Handle) -> io::Result<()> {
        self.gpu.display().set_crtc(fb)
    }

    fn page_flip(&mut self, fb: framebuffer::Handle) -> io::Result<()> {
        self.gpu.display().page_flip(fb)
    }

    fn wait_for_flip(&mut self, interruptible: bool) -> FlipWait {
        let display = self.gpu.display();
        let stdin = io::stdin();
        let input = if interruptible {
            Some(stdin.as_fd())
        } else {
            None
        };

        wait::wait_for_flip(display.card().as_fd(), input, || {
            display.drain_flip_events()
        })
    }

    fn release(&mut self, buffer: BufferObject<()>) {
        // Dropping a locked buffer returns it to its surface
        drop(buffer);
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        let card = self.gpu.display().card();
        for (_, fb) in self.framebuffers.drain() {
            if let Err(e) = card.destroy_framebuffer(fb) {
                warn!("Failed to destroy framebuffer {:?}: {}", fb, e);
            }
        }

        let egl = self.gpu.egl();
        if let Err(e) = egl.instance().destroy_surface(egl.raw(), self.egl_surface) {
            warn!("eglDestroySurface failed: {}", e);
        }
    }
}

/// One EGL context plus (optionally) the surface it renders to
pub struct RenderContext {
    presenter: Option<Presenter<WindowSurface>>,
    context: egl::Context,
    config: egl::Config,
    settings: ContextSettings,
    bits_per_pixel: u32,
    gpu: Arc<GpuDevice>,
}

impl RenderContext {
    fn with_config(
        gpu: Arc<GpuDevice>,
        shared: Option<&RenderContext>,
        settings: &ContextSettings,
        bits_per_pixel: u32,
    ) -> Result<Self, GpuError> {
        let config = gpu.egl().choose_config(bits_per_pixel, settings)?;
        let actual = gpu.egl().read_settings(config)?;
        let context = gpu
            .egl()
            .create_context(config, shared.map(|shared| shared.context))?;

        Ok(Self {
            presenter: None,
            context,
            config,
            settings: actual,
            bits_per_pixel,
            gpu,
        })
    }

    /// Context with no owning window: an off-screen surface sized like
    /// `shared`'s surface, or 1×1 so the driver initializes
    pub fn bootstrap(
        gpu: Arc<GpuDevice>,
        shared: Option<&RenderContext>,
        bits_per_pixel: u32,
    ) -> Result<Self, GpuError> {
        let (width, height) = shared.and_then(|s| s.size()).unwrap_or((1, 1));
        let mut context = Self::with_config(gpu, shared, &ContextSettings::default(), bits_per_pixel)?;
        context.create_surface(width, height, false)?;
        Ok(context)
    }

    /// Context for a window: a scanout surface sized like `owner`, or no
    /// surface at all without one
    pub fn for_window(
        gpu: Arc<GpuDevice>,
        shared: Option<&RenderContext>,
        settings: &ContextSettings,
        owner: Option<&dyn WindowImpl>,
        bits_per_pixel: u32,
    ) -> Result<Self, GpuError> {
        let mut context = Self::with_config(gpu, shared, settings, bits_per_pixel)?;
        if let Some(owner) = owner {
            let (width, height) = owner.size();
            context.create_surface(width, height, true)?;
        }
        Ok(context)
    }

    /// Off-screen context of an explicit size
    pub fn offscreen(
        gpu: Arc<GpuDevice>,
        shared: Option<&RenderContext>,
        settings: &ContextSettings,
        width: u32,
        height: u32,
        bits_per_pixel: u32,
    ) -> Result<Self, GpuError> {
        let mut context = Self::with_config(gpu, shared, settings, bits_per_pixel)?;
        context.create_surface(width, height, false)?;
        Ok(context)
    }

    /// Allocate the surface this context renders to, replacing any previous one
    pub fn create_surface(&mut self, width: u32, height: u32, scanout: bool) -> Result<(), GpuError> {
        if self.presenter.is_some() {
            self.destroy_surface();
        }

        let surface = WindowSurface::create(self.gpu.clone(), self.config, width, height, scanout)?;
        self.presenter = Some(Presenter::new(surface, scanout));
        Ok(())
    }

    /// Tear down the surface, deactivating the context first if it is current
    pub fn destroy_surface(&mut self) {
        let presenter = match self.presenter.take() {
            Some(presenter) => presenter,
            None => return,
        };

        if self.is_current() {
            self.release_current();
        }

        drop(presenter.into_target());
    }

    pub fn make_current(&mut self, current: bool) -> Result<(), GpuError> {
        let surface = self
            .presenter
            .as_ref()
            .map(|p| p.target().egl_surface())
            .ok_or(GpuError::NoSurface)?;

        let egl = self.gpu.egl();
        if current {
            egl.instance()
                .make_current(egl.raw(), Some(surface), Some(surface), Some(self.context))
                .map_err(GpuError::egl("eglMakeCurrent"))
        } else {
            egl.instance()
                .make_current(egl.raw(), None, None, None)
                .map_err(GpuError::egl("eglMakeCurrent"))
        }
    }

    fn release_current(&self) {
        let egl = self.gpu.egl();
        if let Err(e) = egl.instance().make_current(egl.raw(), None, None, None) {
            warn!("Failed to release current context: {}", e);
        }
    }

    pub fn is_current(&self) -> bool {
        self.gpu.egl().instance().get_current_context() == Some(self.context)
    }

    /// Show the last rendered frame
    pub fn present(&mut self) -> Result<PresentOutcome, PresentError> {
        match self.presenter.as_mut() {
            Some(presenter) => presenter.present(),
            None => Ok(PresentOutcome::NoSurface),
        }
    }

    /// Whether pending terminal input may interrupt a flip wait
    pub fn set_interrupt_on_stdin(&mut self, interrupt: bool) {
        if let Some(presenter) = self.presenter.as_mut() {
            presenter.set_interruptible(interrupt);
        }
    }

    /// Swap interval 1 (enabled) or 0; applies to the current context
    pub fn set_vertical_sync_enabled(&self, enabled: bool) -> Result<(), GpuError> {
        let egl = self.gpu.egl();
        egl.instance()
            .swap_interval(egl.raw(), if enabled { 1 } else { 0 })
            .map_err(GpuError::egl("eglSwapInterval"))
    }

    /// Resolve a GL entry point
    pub fn get_function(&self, name: &str) -> Option<extern "system" fn()> {
        self.gpu.egl().instance().get_proc_address(name)
    }

    /// Attributes of the chosen config
    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    pub fn bits_per_pixel(&self) -> u32 {
        self.bits_per_pixel
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.presenter.as_ref().map(|p| p.target().size())
    }

    pub fn is_scanout(&self) -> bool {
        self.presenter
            .as_ref()
            .map(|p| p.is_scanout())
            .unwrap_or(false)
    }

    pub fn gpu(&self) -> &Arc<GpuDevice> {
        &self.gpu
    }

    pub fn raw_context(&self) -> egl::Context {
        self.context
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if self.is_current() {
            self.release_current();
        }
        self.destroy_surface();

        let egl = self.gpu.egl();
        if let Err(e) = egl.instance().destroy_context(egl.raw(), self.context) {
            warn!("eglDestroyContext failed: {}", e);
        }

        if Arc::strong_count(&self.gpu) == 1 {
            info!("🧹 Last render context gone, releasing GPU device");
        }
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("settings", &self.settings)
            .field("bits_per_pixel", &self.bits_per_pixel)
            .field("size", &self.size())
            .field("scanout", &self.is_scanout())
            .finish()
    }
}
