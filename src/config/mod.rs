//! Configuration management for kmsview
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files, plus the environment overrides for the display device,
//! mode name and refresh rate.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the DRM device node (empty means auto-detect)
pub const ENV_DRM_DEVICE: &str = "KMSVIEW_DRM_DEVICE";
/// Environment variable naming the requested mode, e.g. `1920x1080`
pub const ENV_DRM_MODE: &str = "KMSVIEW_DRM_MODE";
/// Environment variable with the requested refresh rate; only honoured with a mode
pub const ENV_DRM_REFRESH: &str = "KMSVIEW_DRM_REFRESH";

/// Main configuration struct containing all kmsview settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct KmsConfig {
    /// Display device and mode selection
    #[serde(default)]
    pub display: DisplayConfig,

    /// Input device enumeration
    #[serde(default)]
    pub input: InputConfig,

    /// Rendering context defaults
    #[serde(default)]
    pub context: ContextConfig,

    /// Present loop behaviour
    #[serde(default)]
    pub present: PresentConfig,
}

/// Display device and mode selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// DRM device node; auto-detected when unset
    pub device: Option<PathBuf>,

    /// Mode name as reported by the connector (e.g. "1280x720")
    pub mode: Option<String>,

    /// Refresh rate for `mode` in Hz (0 = whichever comes first)
    pub refresh: u32,

    /// Number of /dev/dri/cardN nodes probed during auto-detection
    pub card_scan_limit: u32,
}

/// Input device enumeration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Directory holding the evdev character devices
    pub device_dir: PathBuf,

    /// Probe event0 .. event{max_devices - 1}
    pub max_devices: u32,

    /// Read typed text from the controlling terminal when no device reports anything
    pub terminal_text: bool,
}

/// Rendering context defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    /// Color depth of the window surface (16, 24 or 32)
    pub bits_per_pixel: u32,

    /// Depth buffer bits
    pub depth_bits: u32,

    /// Stencil buffer bits
    pub stencil_bits: u32,

    /// Multisample count (0 = off)
    pub antialiasing_level: u32,

    /// Client API bound on the EGL display ("gles" or "gl")
    pub api: String,

    /// Swap interval 1 when enabled
    pub vsync: bool,
}

/// Present loop behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PresentConfig {
    /// Pending input on stdin interrupts a page-flip wait
    pub interrupt_on_stdin: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            device: None,
            mode: None,
            refresh: 0,
            card_scan_limit: 8,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device_dir: PathBuf::from("/dev/input"),
            max_devices: 32,
            terminal_text: true,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            bits_per_pixel: 32,
            depth_bits: 0,
            stencil_bits: 0,
            antialiasing_level: 0,
            api: "gles".to_string(),
            vsync: true,
        }
    }
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            interrupt_on_stdin: true,
        }
    }
}

impl KmsConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            let rest = path.strip_prefix("~").unwrap_or(path);
            Path::new(&home).join(rest)
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: KmsConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if ![16, 24, 32].contains(&self.context.bits_per_pixel) {
            anyhow::bail!(
                "Invalid bits_per_pixel: {} (expected 16, 24 or 32)",
                self.context.bits_per_pixel
            );
        }

        if !["gles", "gl"].contains(&self.context.api.as_str()) {
            anyhow::bail!("Invalid context api: {}", self.context.api);
        }

        if self.input.max_devices == 0 || self.input.max_devices > 1024 {
            anyhow::bail!("Invalid max_devices: must be between 1 and 1024");
        }

        if self.display.refresh != 0 && self.display.mode.is_none() {
            anyhow::bail!("display.refresh requires display.mode to be set");
        }

        Ok(())
    }

    /// Apply the KMSVIEW_DRM_* environment overrides
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// An empty device string means "auto-detect". The refresh rate is only
    /// taken into account together with a mode name; an unparsable value
    /// counts as 0.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(device) = lookup(ENV_DRM_DEVICE) {
            self.display.device = if device.is_empty() {
                None
            } else {
                Some(PathBuf::from(device))
            };
        }

        if let Some(mode) = lookup(ENV_DRM_MODE) {
            self.display.mode = Some(mode);
        }

        if self.display.mode.is_some() {
            if let Some(refresh) = lookup(ENV_DRM_REFRESH) {
                self.display.refresh = leading_number(&refresh);
            }
        }
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}

/// Leading decimal digits of `text` after optional whitespace and `+`;
/// 0 when there are none or the number is negative.
fn leading_number(text: &str) -> u32 {
    let text = text.trim_start();
    if text.starts_with('-') {
        return 0;
    }
    let text = text.strip_prefix('+').unwrap_or(text);
    text.chars()
        .map_while(|c| c.to_digit(10))
        .fold(0u32, |value, digit| value.saturating_mul(10).saturating_add(digit))
}
