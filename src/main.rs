//! # kmsview
//!
//! Diagnostic front end for the kmsview backend: lists the connector's modes
//! or the usable input devices, or opens a full-screen window with a scanout
//! context and presents frames while logging decoded input.

use anyhow::{Context as _, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kmsview::gpu::SkipReason;
use kmsview::input::{Event, KeyEvent};
use kmsview::{InputSystem, Key, KmsConfig, Platform, PresentOutcome, WindowImpl};

#[derive(Parser)]
#[command(name = "kmsview")]
#[command(about = "Run a full-screen KMS window with evdev input, no compositor required")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// DRM device node, e.g. /dev/dri/card1
    #[arg(long)]
    device: Option<PathBuf>,

    /// Mode name, e.g. 1920x1080
    #[arg(long)]
    mode: Option<String>,

    /// Refresh rate in Hz (needs --mode)
    #[arg(long)]
    refresh: Option<u32>,

    /// Print the connector's modes and exit
    #[arg(long)]
    list_modes: bool,

    /// Print the usable input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Stop after presenting this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Print build information and exit
    #[arg(long)]
    version_info: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    if cli.version_info {
        print_version_info();
        return Ok(());
    }

    let config = load_config(&cli)?;

    if cli.list_devices {
        list_devices(&config);
        return Ok(());
    }

    let platform = Platform::new(config);
    if cli.list_modes {
        return list_modes(&platform);
    }

    let result = run(&platform, cli.frames);
    platform.shutdown();
    result
}

fn print_version_info() {
    println!("kmsview {}", kmsview::VERSION);
    println!("{}", kmsview::DESCRIPTION);
    println!("Built: {} ({})", env!("KMSVIEW_BUILD_DATE"), env!("KMSVIEW_PROFILE"));
    println!("Target: {}", env!("KMSVIEW_TARGET"));
    if let Some(commit) = option_env!("KMSVIEW_GIT_COMMIT") {
        println!("Commit: {}", commit);
    }
}

fn load_config(cli: &Cli) -> Result<KmsConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = KmsConfig::load(path)?;
            info!("✅ Configuration loaded from: {}", path);
            config
        }
        None => KmsConfig::default(),
    };

    config.apply_env();

    // Command line wins over the environment
    if let Some(device) = &cli.device {
        config.display.device = Some(device.clone());
    }
    if let Some(mode) = &cli.mode {
        config.display.mode = Some(mode.clone());
    }
    if let Some(refresh) = cli.refresh {
        config.display.refresh = refresh;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn list_devices(config: &KmsConfig) {
    let input = InputSystem::new(config.input.clone());
    let devices = input.devices();
    if devices.is_empty() {
        println!("No input devices under {}", config.input.device_dir.display());
    }
    for (name, class) in devices {
        println!("{:<40} {}", name, class);
    }
}

fn list_modes(platform: &Platform) -> Result<()> {
    let display = platform.display().context("Failed to open display")?;
    let current = display.mode();

    println!("{}", display.path().display());
    for mode in display.modes() {
        let active = mode.width == current.width
            && mode.height == current.height
            && mode.refresh == current.refresh;
        println!(
            "{} {:<12} {}x{} @ {} Hz{}",
            if active { "*" } else { " " },
            mode.name,
            mode.width,
            mode.height,
            mode.refresh,
            if mode.preferred { " (preferred)" } else { "" }
        );
    }
    Ok(())
}

fn run(platform: &Platform, frames: Option<u64>) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            info!("🛑 Received shutdown signal");
            running.store(false, Ordering::SeqCst);
        })
        .context("Failed to install signal handler")?;
    }

    let mode = platform.desktop_mode();
    info!("🖥️ Desktop mode {}x{}", mode.width, mode.height);

    let mut window = platform.create_window(mode, "kmsview");
    let mut context = platform
        .create_context(&window)
        .context("Failed to create render context")?;
    context.make_current(true)?;
    if let Err(e) = context.set_vertical_sync_enabled(platform.config().context.vsync) {
        warn!("Could not set swap interval: {}", e);
    }

    let mut presented = 0u64;
    while running.load(Ordering::SeqCst) {
        window.process_events();
        while let Some(event) = window.pop_event() {
            if is_escape(&event) {
                info!("Escape pressed, leaving");
                running.store(false, Ordering::SeqCst);
            }
            debug!("{:?}", event);
        }

        match context.present() {
            Ok(PresentOutcome::Skipped(SkipReason::Interrupted)) => {
                debug!("Flip wait interrupted by terminal input");
            }
            Ok(PresentOutcome::Skipped(reason)) => warn!("Frame skipped: {:?}", reason),
            Ok(outcome) => debug!("Frame {}: {:?}", presented, outcome),
            Err(e) if e.is_fatal() => {
                error!("❌ {}", e);
                return Err(e.into());
            }
            Err(e) => warn!("Present failed: {}", e),
        }

        presented += 1;
        if frames.is_some_and(|limit| presented >= limit) {
            break;
        }
    }

    info!("Presented {} frame(s)", presented);
    Ok(())
}

fn is_escape(event: &Event) -> bool {
    matches!(
        event,
        Event::KeyPressed(KeyEvent {
            code: Key::Escape,
            ..
        })
    )
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_build_metadata_is_exported() {
        assert!(env!("KMSVIEW_BUILD_DATE").ends_with(" UTC"));
        assert!(!env!("KMSVIEW_TARGET").is_empty());
        assert!(matches!(env!("KMSVIEW_PROFILE"), "debug" | "release"));
    }
}
