use anyhow::{bail, Context, Result};
use idot_display::domain::settings::SettingsService;
use idot_display::infrastructure::logging;
use idot_display::{BtleplugAdapter, ClockTime, DisplayService, ScanCancel};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let settings_service = SettingsService::new()?;

    let _logging_guard = logging::init_logger(&settings_service.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting iDot display client");
    info!("Settings file: {}", settings_service.path().display());

    let settings = settings_service.get().clone();
    let Some(address) = settings.target_address.clone() else {
        bail!(
            "No target_address configured, set it in {}",
            settings_service.path().display()
        );
    };

    // read the image before touching the radio so a bad path fails fast
    let image = match &settings.image_file {
        Some(path) => Some(
            std::fs::read(path)
                .with_context(|| format!("Failed to read image {}", path.display()))?,
        ),
        None => None,
    };

    let adapter = Arc::new(BtleplugAdapter::new().await?);

    let cancel = ScanCancel::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping scan");
            interrupt.cancel();
        }
    });

    let mut display =
        DisplayService::connect(adapter, &address, settings.connection_config(), &cancel).await?;

    let result = match image {
        Some(image) => display.show_image(&image).await,
        None => {
            let now = ClockTime::from_datetime(&chrono::Local::now());
            display.show_clock(&now, &settings.clock).await
        }
    };

    display.disconnect().await;

    match result {
        Ok(()) => {
            info!("Done");
            Ok(())
        }
        Err(e) => {
            error!("Display command failed: {}", e);
            Err(e.into())
        }
    }
}
