#![cfg_attr(not(windows), allow(dead_code))]

mod domain;
mod infrastructure;

use anyhow::Context;
use clap::Parser;
use domain::settings::{Settings, SettingsService};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Feeds entry-model rhythm game controllers into a virtual joystick.
#[derive(Parser, Debug, Default)]
#[command(name = "rhythm-controller-feeder", version, about)]
struct Cli {
    /// Virtual joystick device number (1-16)
    #[arg(long = "dev-id")]
    dev_id: Option<u32>,

    /// Analog sensitivity of the X axis
    #[arg(long)]
    sensitivity_x: Option<f64>,

    /// Analog sensitivity of the Y axis
    #[arg(long)]
    sensitivity_y: Option<f64>,

    /// Report turntables and knobs as min/mid/max rails
    #[arg(long)]
    digital: bool,

    /// Settings file to use instead of the per-user one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save_config: bool,

    /// Go back to scanning when the controller disconnects
    #[arg(long)]
    rescan: bool,
}

impl Cli {
    /// Command line flags override values loaded from the settings file.
    fn apply(&self, settings: &mut Settings) {
        if let Some(slot) = self.dev_id {
            settings.device_slot = slot;
        }
        if let Some(sensitivity) = self.sensitivity_x {
            settings.sensitivity_x = sensitivity;
        }
        if let Some(sensitivity) = self.sensitivity_y {
            settings.sensitivity_y = sensitivity;
        }
        if self.digital {
            settings.digital_mode = true;
        }
        if self.rescan {
            settings.rescan_on_disconnect = true;
        }
    }
}

/// Returns the effective settings and the file they came from.
fn load_settings(cli: &Cli) -> anyhow::Result<(Settings, PathBuf)> {
    let mut service = match &cli.config {
        Some(path) => SettingsService::from_path(path.clone()),
        None => SettingsService::new(),
    }
    .context("failed to load settings")?;

    cli.apply(service.get_mut());
    service.get().validate().context("invalid settings")?;

    if cli.save_config {
        service.save().context("failed to save settings")?;
    }
    Ok((service.get().clone(), service.path().to_path_buf()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (settings, settings_path) = match load_settings(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let _logging_guard = infrastructure::logging::init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {:#}", e))
        .ok();

    info!("Starting Rhythm Controller Feeder");
    info!("Using settings from {}", settings_path.display());

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            ctrl_c.cancel();
        }
    });

    match feed(&settings, &shutdown).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(windows)]
async fn feed(settings: &Settings, shutdown: &CancellationToken) -> anyhow::Result<ExitCode> {
    use domain::profiles::DeviceRegistry;
    use infrastructure::bluetooth::connection::WinRtTransport;
    use infrastructure::bluetooth::session::{ConnectionSession, SessionConfig, SessionEnd};
    use infrastructure::output::vjoy::VJoyDevice;
    use infrastructure::output::OutputSink;

    let mut sink = match VJoyDevice::load()
        .and_then(|device| OutputSink::open(device, settings.device_slot))
    {
        Ok(sink) => sink,
        Err(e) => {
            error!("{}", e);
            return Ok(e.exit_code());
        }
    };

    let registry = DeviceRegistry::new(settings.device_names.clone());
    let mut transport = WinRtTransport::new();

    loop {
        let mut session = ConnectionSession::new(
            &mut transport,
            &mut sink,
            &registry,
            SessionConfig::from_settings(settings),
        );
        let end = session.run(shutdown).await.context("session failed")?;
        let stats = session.stats();
        info!(
            "Session ended ({:?}): {} notifications, {} frames, {} feed failures",
            end, stats.notifications, stats.frames, stats.feed_failures
        );

        if end == SessionEnd::Stopped || !settings.rescan_on_disconnect {
            break;
        }
        info!("Rescanning for a controller");
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(not(windows))]
async fn feed(_settings: &Settings, _shutdown: &CancellationToken) -> anyhow::Result<ExitCode> {
    use infrastructure::output::StartupError;

    let e = StartupError::DriverUnavailable;
    error!("{} (no Bluetooth transport on this platform)", e);
    Ok(e.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::try_parse_from([
            "rhythm-controller-feeder",
            "--dev-id",
            "3",
            "--sensitivity-x",
            "1.5",
            "--digital",
            "--rescan",
        ])
        .unwrap();

        let mut settings = Settings::default();
        cli.apply(&mut settings);

        assert_eq!(settings.device_slot, 3);
        assert_eq!(settings.sensitivity_x, 1.5);
        assert_eq!(settings.sensitivity_y, 1.0);
        assert!(settings.digital_mode);
        assert!(settings.rescan_on_disconnect);
    }

    #[test]
    fn test_absent_flags_keep_file_values() {
        let mut settings = Settings {
            device_slot: 5,
            digital_mode: true,
            ..Settings::default()
        };
        Cli::default().apply(&mut settings);

        assert_eq!(settings.device_slot, 5);
        assert!(settings.digital_mode);
    }

    #[test]
    fn test_load_settings_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "device_slot": 2, "sensitivity_y": 0.5 }"#).unwrap();

        let cli = Cli {
            config: Some(path),
            digital: true,
            ..Cli::default()
        };
        let (settings, _) = load_settings(&cli).unwrap();

        assert_eq!(settings.device_slot, 2);
        assert_eq!(settings.sensitivity_y, 0.5);
        assert!(settings.digital_mode);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: Some(dir.path().join("settings.json")),
            dev_id: Some(17),
            save_config: true,
            ..Cli::default()
        };

        assert!(load_settings(&cli).is_err());
        // Nothing is written for rejected settings
        assert!(!dir.path().join("settings.json").exists());
    }
}
