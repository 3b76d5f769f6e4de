mod logging;
mod mode;
mod models;
mod session;
mod settings;
mod ui;

use eframe::egui;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let settings = settings::SettingsService::new()?.get().clone();
    let _logging_guard = logging::init_logger(&settings.log_settings)?;
    info!("starting ModeLink");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([420.0, 320.0])
            .with_title("ModeLink"),
        ..Default::default()
    };

    eframe::run_native(
        "ModeLink",
        options,
        Box::new(|cc| Ok(Box::new(ui::ModeLinkApp::new(cc, settings)))),
    )
    .map_err(|e| anyhow::anyhow!("failed to start UI: {e}"))
}
