use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use overcooked_core::{
    telemetry, Identity, LocalStack, MessengerSettings, NavigationTarget, Registration, Screen,
    SessionStore,
};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for Overcooked Messenger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the session lifecycle end to end against the local collaborators.
    Smoke,
}

fn main() -> Result<()> {
    telemetry::init_tracing(telemetry::filter_or("info"))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke => smoke_test(),
    }
}

fn smoke_test() -> Result<()> {
    let runtime = Runtime::new()?;
    let temp_dir = TempDir::new()?;
    let store = SessionStore::new(temp_dir.path().to_path_buf());
    let settings = MessengerSettings::default();

    // Cold start without a session.
    let (stack, _events) = LocalStack::new(&settings, Some(store.clone()), runtime.handle().clone());
    ensure!(stack.coordinator.on_app_start().is_none(), "unexpected connect on empty start");
    ensure!(stack.coordinator.navigation_target() == NavigationTarget::Login);

    // Register, connect, then restart with the persisted session.
    let task = runtime
        .block_on(
            stack
                .coordinator
                .register(&Registration::new("Smoke", "smoke@example.com", "secret1")),
        )?
        .context("registration did not issue a connect")?;
    runtime.block_on(task.finished());
    ensure!(stack.coordinator.navigation_target() == NavigationTarget::Chat);
    drop(stack);

    let (stack, _events) = LocalStack::new(&settings, Some(store), runtime.handle().clone());
    let task = stack
        .coordinator
        .on_app_start()
        .context("persisted session was not resumed")?;
    runtime.block_on(task.finished());
    ensure!(stack.coordinator.navigation_target() == NavigationTarget::Chat);
    info!("cold start resumed the persisted session");

    // Failed connect surfaces a retry affordance.
    stack.chat.fail_connects(Some("smoke failure"));
    let task = stack
        .coordinator
        .on_auth_success(Identity::new("smoke-u2", "Second"))
        .context("switching users did not connect")?;
    runtime.block_on(task.finished());
    ensure!(
        stack.coordinator.navigation_target()
            == NavigationTarget::Loading {
                retry_available: true
            }
    );
    stack.chat.fail_connects(None);
    if let Some(task) = stack.coordinator.retry() {
        runtime.block_on(task.finished());
    }
    ensure!(stack.coordinator.navigation_target() == NavigationTarget::Chat);
    info!("retry recovered from a failed connect");

    // Logout resets everything and leaves Login as the only screen.
    runtime.block_on(stack.coordinator.logout());
    ensure!(stack.coordinator.navigation_target() == NavigationTarget::Login);
    ensure!(stack.navigation.history() == vec![Screen::Login]);
    info!(
        connects = stack.chat.connect_calls(),
        disconnects = stack.chat.disconnect_calls(),
        "smoke test passed"
    );

    Ok(())
}
