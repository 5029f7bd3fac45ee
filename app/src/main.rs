use anyhow::anyhow;
use clap::Parser;
use eframe::egui;
use overcooked::{MessengerController, OvercookedEguiApp, ThemeMode};
use overcooked_core::{telemetry, LocalStack, MessengerSettings, SessionStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "overcooked", version, about = "Overcooked Messenger desktop client")]
struct Cli {
    /// Settings file; defaults to the standard overcooked.yaml locations.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where the signed-in session is kept between runs.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Log filter used when RUST_LOG is not set.
    #[arg(long)]
    log: Option<String>,
    /// Keep the session in memory only.
    #[arg(long)]
    ephemeral: bool,
    #[arg(long, value_enum, default_value_t = ThemeMode::System)]
    theme: ThemeMode,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = MessengerSettings::load_or_default(cli.config.as_deref())
        .map_err(|err| anyhow!(err.user_message()))?;
    telemetry::init_tracing(telemetry::filter_or(
        cli.log.as_deref().unwrap_or(&settings.log_filter),
    ))?;

    let runtime = Arc::new(Runtime::new()?);
    let store = if cli.ephemeral {
        None
    } else {
        let dir = cli
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.resolve_data_dir());
        info!(data_dir = %dir.display(), "using session store");
        Some(SessionStore::new(dir))
    };
    let (stack, events) = LocalStack::new(&settings, store, runtime.handle().clone());
    let mut controller = MessengerController::new(stack.coordinator, stack.navigation, events);
    controller.start();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(egui::vec2(480.0, 720.0))
            .with_min_inner_size(egui::vec2(360.0, 520.0)),
        follow_system_theme: cli.theme == ThemeMode::System,
        default_theme: cli.theme.fallback_theme(),
        ..Default::default()
    };

    let theme = cli.theme;
    eframe::run_native(
        "Overcooked Messenger",
        native_options,
        Box::new(move |_cc| Box::new(OvercookedEguiApp::new(controller, runtime, theme))),
    )
    .map_err(|err| anyhow!(err.to_string()))?;

    info!("bye");
    Ok(())
}
