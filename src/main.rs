#![forbid(unsafe_code)]
mod cli;
mod commands;
mod components;
mod state_store;
mod termination;
mod ui_manager;

use std::io;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre;

use crate::cli::{Cli, Command};
use crate::state_store::StateStore;
use crate::termination::{create_termination, Interrupted};
use crate::ui_manager::UiManager;
use volt_tui::model::user::RegisterRequest;
use volt_tui::services::api_client::VoltClient;
use volt_tui::services::batch_debouncer::DebounceTimings;
use volt_tui::services::transfer_channel::UploadOptions;
use volt_tui::settings::app_config::AppConfig;
use volt_tui::settings::session::{FileSessionStore, SessionStore};
use volt_tui::utils::{initialize_logging, initialize_panic_handler};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    initialize_logging()?;
    initialize_panic_handler()?;
    let args = Cli::parse();

    let mut config = AppConfig::load()?;
    if let Some(api_url) = args.api_url {
        config.api_base_url = api_url;
    }
    let session: Arc<dyn SessionStore> = Arc::new(FileSessionStore::open_default()?);
    let client = Arc::new(VoltClient::new(&config.api_base_url, session.clone())?);
    let mut out = io::stdout();

    match args.command.unwrap_or(Command::Dashboard) {
        Command::Login { email, password } => {
            commands::login(client.as_ref(), session.as_ref(), email, password, &mut out).await
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let request = RegisterRequest {
                username,
                email,
                password,
            };
            commands::register(client.as_ref(), session.as_ref(), request, &mut out).await
        }
        Command::Logout => commands::logout(session.as_ref(), &mut out),
        Command::Whoami => commands::whoami(client.as_ref(), session.as_ref(), &mut out).await,
        Command::List => commands::list(client.as_ref(), session.as_ref(), &mut out).await,
        Command::Delete { id } => {
            commands::delete(client.as_ref(), session.as_ref(), id, &mut out).await
        }
        Command::Upload { files, public } => {
            let options = UploadOptions {
                is_private: !public,
                ..UploadOptions::from(&config)
            };
            let timings = DebounceTimings {
                quiescence: config.quiescence(),
                clear_after: config.clear_progress_after(),
            };
            let summary = commands::upload(
                client.clone(),
                session.as_ref(),
                options,
                timings,
                files,
                &mut out,
            )
            .await?;
            commands::write_upload_summary(&mut out, &summary)
        }
        Command::Dashboard => run_dashboard(config, session, client).await,
    }
}

async fn run_dashboard(
    config: AppConfig,
    session: Arc<dyn SessionStore>,
    client: Arc<VoltClient>,
) -> eyre::Result<()> {
    let (terminator, mut interrupt_rx) = create_termination();
    let (state_store, state_rx) = StateStore::new(config, session, client);
    let (ui_manager, action_rx) = UiManager::new();

    tokio::try_join!(
        state_store.main_loop(terminator, action_rx, interrupt_rx.resubscribe()),
        ui_manager.main_loop(state_rx, interrupt_rx.resubscribe()),
    )?;

    if let Ok(reason) = interrupt_rx.recv().await {
        match reason {
            Interrupted::UserInt => tracing::info!("exited per user request"),
            Interrupted::OsSigInt => tracing::info!("exited because of an os sig int"),
        }
    } else {
        tracing::error!("exited because of an unexpected error");
    }

    Ok(())
}
