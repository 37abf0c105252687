// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info};

use journal_link::api::journal::JOURNAL_AI_COMPLETE;
use journal_link::api::NewEntry;
use journal_link::config::LinkConfig;
use journal_link::realtime::ConnectionState;
use journal_link::refresh::SessionEvent;
use journal_link::store::FileStore;
use journal_link::AppSession;

#[derive(Parser)]
#[command(name = "journal-link", version, about = "Journal API and realtime client")]
struct Cli {
    #[command(flatten)]
    config: LinkConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the token pair
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "JOURNAL_LINK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Revoke this device's session and clear stored tokens
    Logout,
    /// Revoke every session of this account and clear stored tokens
    LogoutAll,
    /// Show the signed-in user's profile
    Me,
    /// Journal entry commands
    Journal {
        #[command(subcommand)]
        command: JournalCommand,
    },
    /// Open the realtime connection and print events until Ctrl-C
    Watch {
        /// Only print events with this name (repeatable)
        #[arg(long = "event")]
        events: Vec<String>,
    },
}

#[derive(Subcommand)]
enum JournalCommand {
    /// List entries
    List,
    /// Show one entry
    Get { id: String },
    /// Create an entry
    Create {
        content: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        mood: Option<String>,
    },
    /// Delete an entry
    Delete { id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(&cli.config);

    if let Err(e) = run(cli).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(config: &LinkConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = Arc::new(FileStore::in_dir(&cli.config.state_dir())?);
    let session = AppSession::new(&cli.config, store);

    match cli.command {
        Command::Login { email, password } => {
            let tokens = session.auth().login(&email, &password).await?;
            match tokens.user {
                Some(user) => info!(email = %user.email, "logged in"),
                None => info!("logged in"),
            }
        }
        Command::Logout => session.logout().await?,
        Command::LogoutAll => session.logout_all().await?,
        Command::Me => print_json(&session.auth().me().await?)?,
        Command::Journal { command } => journal(&session, command).await?,
        Command::Watch { events } => watch(&session, events).await?,
    }
    Ok(())
}

async fn journal(session: &AppSession, command: JournalCommand) -> anyhow::Result<()> {
    let journal = session.journal();
    match command {
        JournalCommand::List => print_json(&journal.list().await?)?,
        JournalCommand::Get { id } => print_json(&journal.get(&id).await?)?,
        JournalCommand::Create { content, title, mood } => {
            print_json(&journal.create(&NewEntry { content, title, mood }).await?)?
        }
        JournalCommand::Delete { id } => journal.delete(&id).await?,
    }
    Ok(())
}

async fn watch(session: &AppSession, events: Vec<String>) -> anyhow::Result<()> {
    let events = if events.is_empty() { vec![JOURNAL_AI_COMPLETE.to_owned()] } else { events };
    let _subscriptions: Vec<_> = events
        .into_iter()
        .map(|event| session.dispatcher().on(event, |msg| println!("{msg}")))
        .collect();

    if !session.restore().await? {
        anyhow::bail!("not logged in; run `journal-link login` first");
    }

    let mut states = session.realtime().watch();
    let mut session_events = session.session_events();
    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            changed = states.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = states.borrow_and_update().clone();
                info!(state = ?state, "realtime state");
                if let ConnectionState::ClosedGaveUp { reason } = state {
                    break Err(anyhow::anyhow!("realtime connection gave up: {reason:?}"));
                }
            }
            event = session_events.recv() => match event {
                Ok(event @ SessionEvent::Ended { .. }) => {
                    session.handle_session_event(&event);
                    break Err(anyhow::anyhow!("session ended; log in again"));
                }
                Ok(SessionEvent::Refreshed) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    session.shutdown().await;
    outcome
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
