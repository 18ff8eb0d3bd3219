//! # kmsview
//!
//! A display and input backend that lets a windowing toolkit run directly on
//! Linux kernel mode-setting hardware, without a compositor underneath.
//!
//! ## Architecture
//!
//! kmsview is built from four cooperating layers:
//! - `display`: DRM node discovery, connector/CRTC/mode resolution, CRTC restore
//! - `gpu`: EGL-on-GBM render contexts and the swap → mode-set → page-flip present loop
//! - `input`: evdev keyboard/mouse/touch decoding plus the terminal text fallback
//! - `window`: the window facade tying the two together for a toolkit
//!
//! `platform` wires them into one explicitly constructed context object, and
//! `config` carries the TOML/environment configuration.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kmsview::{KmsConfig, Platform, WindowImpl};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut config = KmsConfig::default();
//!     config.apply_env();
//!     let platform = Platform::new(config);
//!
//!     let mut window = platform.create_window(platform.desktop_mode(), "demo");
//!     let mut context = platform.create_context(&window)?;
//!     context.make_current(true)?;
//!
//!     loop {
//!         window.process_events();
//!         while let Some(event) = window.pop_event() {
//!             println!("{:?}", event);
//!         }
//!         context.present()?;
//!     }
//! }
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod gpu;
pub mod input;
pub mod platform;
pub mod shared;
pub mod window;

// Re-export main types for easy access
pub use config::KmsConfig;
pub use display::{DisplayHandle, DisplayMode, VideoMode};
pub use error::{DisplayError, GpuError, InputError, PresentError};
pub use gpu::{ContextSettings, GpuDevice, PresentOutcome, RenderContext};
pub use input::{Event, InputSystem, Key, MouseButton};
pub use platform::Platform;
pub use window::{DrmWindow, WindowHandle, WindowImpl};

/// Version information for kmsview
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
