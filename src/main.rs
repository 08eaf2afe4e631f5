mod commands;
mod config;
mod console;
mod error;
mod model;
mod proxy;
mod registry;
mod session;
mod speech;
mod view;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::console::Console;
use crate::proxy::{DialogProxy, HttpDialogProxy, LoggingProxy};
use crate::registry::DialogRegistry;
use crate::session::ConversationSession;
use crate::speech::SpeechSynthesizer;

#[derive(Parser)]
#[command(name = "dialog-console")]
#[command(version)]
#[command(about = "Manage dialogs and converse with them through a dialog proxy", long_about = None)]
struct Cli {
    /// Dialog proxy base url, overrides the config file
    #[arg(long, global = true)]
    proxy_url: Option<String>,

    /// Do not synthesize speech for bot replies
    #[arg(long, global = true)]
    no_speech: bool,

    /// Write the effective configuration to ~/.dialog-console/config.toml
    #[arg(long, global = true)]
    save_config: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all dialogs
    List,
    /// Upload a new dialog definition
    Create { name: String, file: PathBuf },
    /// Replace the definition of the dialog at an index
    Replace { index: usize, file: PathBuf },
    /// Delete the dialog at an index
    Delete { index: usize },
    /// Print the design tool link of the dialog at an index
    Edit { index: usize },
    /// Open the console with a conversation on the dialog at an index
    Chat { index: usize },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "dialog_console=debug"
    } else {
        "dialog_console=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load()?;
    if let Some(url) = cli.proxy_url {
        config.dialog_proxy_url = url;
    }
    if cli.no_speech {
        config.speech.enabled = false;
    }
    if cli.save_config {
        let path = config.save()?;
        println!("💾 Configuration saved to {}", path.display());
    }

    let http = HttpDialogProxy::new(config.dialog_proxy_url.clone(), config.request_timeout())
        .context("Failed to set up the dialog proxy client")?;
    let proxy: Arc<dyn DialogProxy> = Arc::new(LoggingProxy::new(Arc::new(http)));
    let registry = DialogRegistry::new(proxy.clone(), config.delete_refresh_delay());
    let session = ConversationSession::new(proxy);

    match cli.command {
        Some(Commands::List) => commands::list_dialogs(&registry, &session).await,
        Some(Commands::Create { name, file }) => {
            commands::create_dialog(&registry, &session, &name, &file).await
        }
        Some(Commands::Replace { index, file }) => {
            registry.refresh().await?;
            commands::replace_dialog(&registry, &session, index, &file).await
        }
        Some(Commands::Delete { index }) => {
            registry.refresh().await?;
            if let Some(refresh) = commands::delete_dialog(&registry, index).await? {
                refresh.await.context("Delayed refresh task failed")??;
                commands::print_dialogs(&registry, &session);
            }
            Ok(())
        }
        Some(Commands::Edit { index }) => {
            registry.refresh().await?;
            commands::edit_dialog(&config, &registry, index)
        }
        Some(Commands::Chat { index }) => {
            let speech = speech_for(&config)?;
            Console::new(config, registry, session, speech).run(Some(index)).await
        }
        None => {
            let speech = speech_for(&config)?;
            Console::new(config, registry, session, speech).run(None).await
        }
    }
}

fn speech_for(config: &Config) -> Result<Option<SpeechSynthesizer>> {
    if !config.speech.enabled {
        return Ok(None);
    }
    SpeechSynthesizer::new(&config.speech, config.request_timeout()).map(Some)
}
