use anyhow::Context;
use clap::Parser;
use jimny_remote::app::{self, ExitReason};
use jimny_remote::domain::settings::SettingsService;
use jimny_remote::infrastructure::{keyboard, logging};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Drive a BLE RC car from the keyboard")]
struct Cli {
    /// Device address (AA:BB:CC:DD:EE:FF) or platform peripheral id
    #[arg(long)]
    address: Option<String>,

    /// Command characteristic UUID
    #[arg(long)]
    write_uuid: Option<String>,

    /// Battery level characteristic UUID
    #[arg(long)]
    battery_uuid: Option<String>,

    /// Do not poll the battery level
    #[arg(long)]
    no_battery: bool,

    /// Seconds between battery reads
    #[arg(long)]
    battery_interval_secs: Option<u64>,

    /// Control tick in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Log level or filter directive
    #[arg(long)]
    log_level: Option<String>,

    /// Settings file to use instead of the per-user one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save: bool,
}

impl Cli {
    fn apply(&self, service: &mut SettingsService) {
        let settings = service.get_mut();
        if let Some(address) = &self.address {
            settings.device_address = address.clone();
        }
        if let Some(uuid) = &self.write_uuid {
            settings.write_char_uuid = uuid.clone();
        }
        if let Some(uuid) = &self.battery_uuid {
            settings.battery_char_uuid = uuid.clone();
        }
        if self.no_battery {
            settings.battery_poll_enabled = false;
        }
        if let Some(secs) = self.battery_interval_secs {
            settings.battery_poll_interval_ms = secs.saturating_mul(1000);
        }
        if let Some(ms) = self.tick_ms {
            settings.tick_interval_ms = ms;
        }
        if let Some(level) = &self.log_level {
            settings.log_settings.level = level.clone();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut service = match &cli.config {
        Some(path) => SettingsService::from_path(path.clone())?,
        None => SettingsService::new()?,
    };
    cli.apply(&mut service);

    let _log_guard = logging::init_logger(&service.get().log_settings)?;
    info!("Starting Jimny remote");

    if cli.save {
        service
            .save()
            .with_context(|| format!("saving settings to {}", service.path().display()))?;
        info!("Settings saved to {}", service.path().display());
    }

    let settings = service.get();
    let keys = keyboard::open_key_source(settings.keyboard_backend, settings.key_hold_timeout())
        .context("opening keyboard")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    match app::connect_and_run(settings, keys, shutdown).await {
        Ok(ExitReason::Esc) => info!("Stopped by Esc"),
        Ok(ExitReason::Interrupted) => info!("Stopped by interrupt"),
        Err(e) => {
            error!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    }

    Ok(ExitCode::SUCCESS)
}
