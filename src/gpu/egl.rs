//! EGL binding on top of the GBM device
//!
//! libEGL is loaded at runtime. The display comes from
//! `eglGetPlatformDisplayEXT(EGL_PLATFORM_GBM_KHR, ..)` when the client
//! advertises `EGL_EXT_platform_base`, and from plain `eglGetDisplay` otherwise.
//! Advertising the platform base without a GBM platform is fatal.

use khronos_egl as egl;
use log::{debug, info, warn};
use std::ffi::c_void;

use gbm::AsRaw;

use super::ContextSettings;
use crate::display::Card;
use crate::error::GpuError;

pub type EglInstance = egl::DynamicInstance<egl::EGL1_4>;

/// `EGL_PLATFORM_GBM_KHR` (same value as `EGL_PLATFORM_GBM_MESA`)
pub const PLATFORM_GBM_KHR: egl::Enum = 0x31D7;

const PLATFORM_BASE: &str = "EGL_EXT_platform_base";
const PLATFORM_GBM: [&str; 2] = ["EGL_KHR_platform_gbm", "EGL_MESA_platform_gbm"];

type GetPlatformDisplayFn =
    unsafe extern "system" fn(egl::Enum, *mut c_void, *const egl::Int) -> *mut c_void;
type CreatePlatformWindowSurfaceFn = unsafe extern "system" fn(
    *mut c_void,
    *mut c_void,
    *mut c_void,
    *const egl::Int,
) -> *mut c_void;

/// Client API bound on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientApi {
    Gles,
    Gl,
}

impl ClientApi {
    /// Parse the `context.api` configuration value
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gles" => Some(ClientApi::Gles),
            "gl" => Some(ClientApi::Gl),
            _ => None,
        }
    }

    fn egl_api(self) -> egl::Enum {
        match self {
            ClientApi::Gles => egl::OPENGL_ES_API,
            ClientApi::Gl => egl::OPENGL_API,
        }
    }

    fn renderable_bit(self) -> egl::Int {
        match self {
            ClientApi::Gles => egl::OPENGL_ES_BIT,
            ClientApi::Gl => egl::OPENGL_BIT,
        }
    }
}

/// How the display and window surfaces are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformPath {
    /// `eglGetPlatformDisplayEXT` / `eglCreatePlatformWindowSurfaceEXT`
    Extension,
    /// `eglGetDisplay` / `eglCreateWindowSurface` with the raw GBM pointers
    Legacy,
}

/// Whether `name` appears as a whole word in a space separated extension list
pub fn has_extension(extensions: &str, name: &str) -> bool {
    extensions.split_whitespace().any(|ext| ext == name)
}

/// Decide the platform path from the client extension string
pub fn negotiate_platform(client_extensions: &str) -> Result<PlatformPath, GpuError> {
    if !has_extension(client_extensions, PLATFORM_BASE) {
        return Ok(PlatformPath::Legacy);
    }

    if PLATFORM_GBM
        .iter()
        .any(|ext| has_extension(client_extensions, ext))
    {
        Ok(PlatformPath::Extension)
    } else {
        Err(GpuError::MissingPlatformExtension(PLATFORM_GBM[0]))
    }
}

/// Attribute list handed to `eglChooseConfig`
pub fn config_attributes(
    bits_per_pixel: u32,
    settings: &ContextSettings,
    api: ClientApi,
) -> Vec<egl::Int> {
    vec![
        egl::BUFFER_SIZE,
        bits_per_pixel as egl::Int,
        egl::DEPTH_SIZE,
        settings.depth_bits as egl::Int,
        egl::STENCIL_SIZE,
        settings.stencil_bits as egl::Int,
        egl::SAMPLE_BUFFERS,
        (settings.antialiasing_level > 0) as egl::Int,
        egl::SAMPLES,
        settings.antialiasing_level as egl::Int,
        egl::BLUE_SIZE,
        8,
        egl::GREEN_SIZE,
        8,
        egl::RED_SIZE,
        8,
        egl::ALPHA_SIZE,
        8,
        egl::SURFACE_TYPE,
        egl::WINDOW_BIT,
        egl::RENDERABLE_TYPE,
        api.renderable_bit(),
        egl::NONE,
    ]
}

/// An initialized EGL display for the GBM device
pub struct EglDisplay {
    instance: EglInstance,
    display: egl::Display,
    api: ClientApi,
    create_platform_window_surface: Option<CreatePlatformWindowSurfaceFn>,
}

impl EglDisplay {
    pub fn initialize(gbm: &gbm::Device<Card>, api: ClientApi) -> Result<Self, GpuError> {
        let instance = unsafe { EglInstance::load_required() }
            .map_err(|e| GpuError::Load(e.to_string()))?;

        // Fails when EGL_EXT_client_extensions is absent; treat that as an empty list
        let client_extensions = instance
            .query_string(None, egl::EXTENSIONS)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let path = negotiate_platform(&client_extensions)?;
        let native = gbm.as_raw() as *mut c_void;

        let (display, create_platform_window_surface) = match path {
            PlatformPath::Extension => {
                let get_platform_display = instance
                    .get_proc_address("eglGetPlatformDisplayEXT")
                    .map(|f| unsafe {
                        std::mem::transmute::<extern "system" fn(), GetPlatformDisplayFn>(f)
                    });
                let create_surface = instance
                    .get_proc_address("eglCreatePlatformWindowSurfaceEXT")
                    .map(|f| unsafe {
                        std::mem::transmute::<extern "system" fn(), CreatePlatformWindowSurfaceFn>(
                            f,
                        )
                    });

                let display = match get_platform_display {
                    Some(get) => {
                        let raw = unsafe { get(PLATFORM_GBM_KHR, native, std::ptr::null()) };
                        if raw.is_null() {
                            None
                        } else {
                            Some(unsafe { egl::Display::from_ptr(raw) })
                        }
                    }
                    None => unsafe { instance.get_display(native) },
                };
                (display, create_surface)
            }
            PlatformPath::Legacy => {
                warn!("{} extension not found, using eglGetDisplay", PLATFORM_BASE);
                (unsafe { instance.get_display(native) }, None)
            }
        };

        let display = display.ok_or(GpuError::NoDisplay)?;
        let (major, minor) = instance
            .initialize(display)
            .map_err(GpuError::egl("eglInitialize"))?;

        if let Err(e) = instance.bind_api(api.egl_api()) {
            // Not fatal: the display stays usable with its default API
            warn!("Failed to bind {:?} API: {}", api, e);
        }

        info!("🎨 EGL {}.{} initialized ({:?} path, {:?})", major, minor, path, api);

        Ok(Self {
            instance,
            display,
            api,
            create_platform_window_surface,
        })
    }

    pub fn instance(&self) -> &EglInstance {
        &self.instance
    }

    pub fn raw(&self) -> egl::Display {
        self.display
    }

    pub fn api(&self) -> ClientApi {
        self.api
    }

    /// Best config for the requested pixel depth and context settings
    pub fn choose_config(
        &self,
        bits_per_pixel: u32,
        settings: &ContextSettings,
    ) -> Result<egl::Config, GpuError> {
        let attributes = config_attributes(bits_per_pixel, settings, self.api);
        self.instance
            .choose_first_config(self.display, &attributes)
            .map_err(GpuError::egl("eglChooseConfig"))?
            .ok_or(GpuError::NoConfig {
                bits_per_pixel,
                depth: settings.depth_bits,
                stencil: settings.stencil_bits,
                samples: settings.antialiasing_level,
            })
    }

    /// Settings actually provided by `config`
    pub fn read_settings(&self, config: egl::Config) -> Result<ContextSettings, GpuError> {
        let attrib = |attribute| {
            self.instance
                .get_config_attrib(self.display, config, attribute)
                .map(|value| value.max(0) as u32)
                .map_err(GpuError::egl("eglGetConfigAttrib"))
        };

        Ok(ContextSettings {
            depth_bits: attrib(egl::DEPTH_SIZE)?,
            stencil_bits: attrib(egl::STENCIL_SIZE)?,
            antialiasing_level: attrib(egl::SAMPLES)?,
            major_version: 1,
            minor_version: 1,
        })
    }

    /// Create a context, sharing object namespaces with `shared` if given
    pub fn create_context(
        &self,
        config: egl::Config,
        shared: Option<egl::Context>,
    ) -> Result<egl::Context, GpuError> {
        let attributes: &[egl::Int] = match self.api {
            ClientApi::Gles => &[egl::CONTEXT_CLIENT_VERSION, 1, egl::NONE],
            ClientApi::Gl => &[egl::NONE],
        };

        if shared.is_some() {
            // The sharing context must not be current on this thread
            self.release_current();
        }

        self.instance
            .create_context(self.display, config, shared, attributes)
            .map_err(GpuError::egl("eglCreateContext"))
    }

    /// Unbind whatever context is current on this thread
    pub fn release_current(&self) -> bool {
        released(self.instance.make_current(self.display, None, None, None))
    }

    /// Wrap a GBM surface in an EGL window surface
    ///
    /// # Safety
    ///
    /// `native` must point to a live `gbm_surface` created from this display's
    /// GBM device, and must outlive the returned surface.
    pub unsafe fn create_window_surface(
        &self,
        config: egl::Config,
        native: *mut c_void,
    ) -> Result<egl::Surface, GpuError> {
        match self.create_platform_window_surface {
            Some(create) => {
                let raw = create(
                    self.display.as_ptr(),
                    config.as_ptr(),
                    native,
                    std::ptr::null(),
                );
                if raw.is_null() {
                    let source = self.instance.get_error().unwrap_or(egl::Error::BadSurface);
                    Err(GpuError::Egl {
                        call: "eglCreatePlatformWindowSurfaceEXT",
                        source,
                    })
                } else {
                    Ok(egl::Surface::from_ptr(raw))
                }
            }
            None => self
                .instance
                .create_window_surface(self.display, config, native, None)
                .map_err(GpuError::egl("eglCreateWindowSurface")),
        }
    }
}

impl Drop for EglDisplay {
    fn drop(&mut self) {
        self.release_current();
        match self.instance.terminate(self.display) {
            Ok(()) => debug!("EGL display terminated"),
            Err(e) => warn!("eglTerminate failed: {}", e),
        }
    }
}

fn released(result: Result<(), egl::Error>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to release the current context: {}", e);
            false
        }
    }
}

impl std::fmt::Debug for EglDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EglDisplay")
            .field("api", &self.api)
            .field(
                "platform_surfaces",
                &self.create_platform_window_surface.is_some(),
            )
            .finish()
    }
}
