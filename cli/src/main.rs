//! CLI entrypoint for parley
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{bail, Result};
use clap::Parser;
use parley_application::{Dispatcher, GenerationCoordinator, SendMode, SessionStore, StoreEvent};
use parley_domain::{Role, SendOutcome};
use parley_infrastructure::{ConfigLoader, HttpBackendGateway};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod repl;

use commands::Cli;
use repl::ChatRepl;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting parley");

    // Load and override configuration
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?
    };
    if let Some(url) = cli.base_url {
        config.backend.base_url = url;
    }
    if let Some(model) = cli.model {
        config.chat.default_model = Some(model);
    }
    config.validate()?;

    // === Dependency Injection ===
    let timeout = config.behavior.timeout_seconds.map(Duration::from_secs);
    let gateway = Arc::new(HttpBackendGateway::new(
        &config.backend.base_url,
        config.backend.auth_source(),
        timeout,
    )?);
    let store = Arc::new(SessionStore::new());
    let coordinator = Arc::new(GenerationCoordinator::new());

    let mut dispatcher = Dispatcher::new(
        Arc::clone(&gateway),
        Arc::clone(&store),
        Arc::clone(&coordinator),
    )
    .with_poll_interval(Duration::from_millis(config.polling.interval_ms));
    if let Some(model) = &config.chat.default_model {
        dispatcher = dispatcher.with_default_model(model.clone());
    }
    let dispatcher = Arc::new(dispatcher);

    dispatcher.load_sessions().await?;

    // One-shot mode
    if let Some(question) = cli.question {
        let mode = if cli.consensus {
            match config.consensus.setup() {
                Some(setup) => SendMode::Consensus(setup),
                None => bail!("--consensus requires a [consensus] section in the configuration"),
            }
        } else {
            SendMode::Direct
        };
        return run_one_shot(&dispatcher, &question, mode).await;
    }

    // Chat mode
    let repl = ChatRepl::new(
        Arc::clone(&dispatcher),
        Arc::clone(&coordinator),
        config.consensus.setup(),
    );
    repl.run().await
}

/// Send a single question, printing streamed deltas as they arrive, and
/// exit with the outcome.
async fn run_one_shot(
    dispatcher: &Dispatcher<HttpBackendGateway>,
    question: &str,
    mode: SendMode,
) -> Result<()> {
    let mut events = dispatcher.store().subscribe();
    let store = Arc::clone(dispatcher.store());
    let printer = tokio::spawn(async move {
        use std::io::Write;
        let mut shown = 0usize;
        while let Some(event) = events.recv().await {
            let StoreEvent::MessageUpdated { session } = event else {
                continue;
            };
            let Some(s) = store.session(&session) else {
                continue;
            };
            let Some(m) = s.messages.last() else {
                continue;
            };
            if m.role == Role::Assistant
                && !m.is_consensus
                && m.content.len() > shown
                && m.content.is_char_boundary(shown)
            {
                print!("{}", &m.content[shown..]);
                let _ = std::io::stdout().flush();
                shown = m.content.len();
            }
        }
    });

    let consensus = matches!(mode, SendMode::Consensus(_));
    let outcome = dispatcher.send(question, mode).await?;
    printer.abort();

    match outcome {
        SendOutcome::Completed(text) => {
            if consensus {
                println!("{text}");
            } else {
                // Deltas were already printed; terminate the line.
                println!();
            }
            Ok(())
        }
        SendOutcome::Failed(reason) => bail!("generation failed: {reason}"),
        SendOutcome::Cancelled => {
            println!("(cancelled)");
            Ok(())
        }
    }
}
