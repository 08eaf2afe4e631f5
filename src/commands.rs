use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::config::Config;
use crate::error::ConsoleError;
use crate::model::DialogFile;
use crate::registry::{DeleteOutcome, DialogRegistry, ReplaceOutcome};
use crate::session::ConversationSession;
use crate::view;
use tokio::task::JoinHandle;

/// Commands that can be invoked by starting a console line with a slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Reload and show the dialog list
    List,
    /// Start a conversation on a dialog
    Start,
    /// Upload a new dialog
    Create,
    /// Replace a dialog's definition
    Replace,
    /// Delete a dialog
    Delete,
    /// Show the design tool link of a dialog
    Edit,
    /// Show the current profile
    Profile,
    /// Show the active conversation ids
    Info,
    /// Show the transcript
    History,
    /// Show help
    Help,
    /// Exit the console
    Bye,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// Leading numeric argument, the dialog index for most commands
    pub fn index(&self) -> Option<usize> {
        self.args.first()?.parse().ok()
    }

    pub fn arg(&self, position: usize) -> Option<&str> {
        self.args.get(position).map(String::as_str)
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::List => "reload and show the dialogs",
            SlashCommand::Start => "start a conversation: /start <index>",
            SlashCommand::Create => "upload a dialog: /create <name> <file.xml>",
            SlashCommand::Replace => "replace a dialog definition: /replace <index> <file.xml>",
            SlashCommand::Delete => "delete a dialog: /delete <index>",
            SlashCommand::Edit => "show the design tool link: /edit <index>",
            SlashCommand::Profile => "show what the dialog inferred about you",
            SlashCommand::Info => "show the active conversation ids",
            SlashCommand::History => "show the conversation transcript",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the console",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let head = parts.next()?;

    let command = SlashCommand::from_str(head).ok().or_else(|| match head.to_lowercase().as_str() {
        "q" | "quit" | "exit" => Some(SlashCommand::Bye),
        "ls" | "dialogs" => Some(SlashCommand::List),
        "s" | "chat" => Some(SlashCommand::Start),
        "rm" => Some(SlashCommand::Delete),
        "h" | "?" => Some(SlashCommand::Help),
        _ => None,
    })?;

    Some(ParsedCommand {
        command,
        args: parts.map(str::to_string).collect(),
    })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for command in SlashCommand::iter() {
        help.push_str(&format!("/{} - {}\n", command.command(), command.description()));
    }
    help.push_str("\nAnything not starting with '/' is sent to the active conversation.");
    help.push_str("\nAliases: /q for /bye, /ls for /list, /s for /start, /rm for /delete");
    help
}

/// Print the dialog list after a refresh
pub async fn list_dialogs(registry: &DialogRegistry, session: &ConversationSession) -> Result<()> {
    registry.refresh().await?;
    print_dialogs(registry, session);
    Ok(())
}

pub fn print_dialogs(registry: &DialogRegistry, session: &ConversationSession) {
    let active = session.dialog_id();
    let rows = view::dialog_rows(&registry.dialogs(), active.as_deref());
    println!("📋 Dialogs ({}):", registry.len());
    if registry.is_busy() {
        println!("  ⏳ an update is still in progress");
    }
    for line in view::render_dialog_rows(&rows) {
        println!("  {line}");
    }
}

pub async fn create_dialog(
    registry: &DialogRegistry,
    session: &ConversationSession,
    name: &str,
    path: &Path,
) -> Result<()> {
    let file = DialogFile::read(path)
        .await
        .with_context(|| format!("Failed to read dialog file {}", path.display()))?;

    match registry.create(name, &file).await {
        Ok(_) => {
            println!("🎉 Dialog '{name}' created.");
            print_dialogs(registry, session);
            Ok(())
        }
        Err(ConsoleError::Validation(reason)) => {
            tracing::debug!(%reason, "create skipped");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn replace_dialog(
    registry: &DialogRegistry,
    session: &ConversationSession,
    index: usize,
    path: &Path,
) -> Result<()> {
    let dialog = registry.get(index)?;
    let file = DialogFile::read(path)
        .await
        .with_context(|| format!("Failed to read dialog file {}", path.display()))?;

    match registry.replace(&dialog.dialog_id, &file, session).await {
        Ok(outcome) => {
            println!("✅ Dialog '{}' updated.", dialog.name);
            match outcome {
                ReplaceOutcome::Updated => {}
                ReplaceOutcome::Restarted(turn) => {
                    println!("🔄 Conversation restarted.");
                    println!("🤖 {}", view::bot_text(&turn));
                }
                ReplaceOutcome::RestartFailed(ConsoleError::Superseded) => {
                    tracing::debug!("restart after replace superseded");
                }
                ReplaceOutcome::RestartFailed(e) => println!("❌ {e}"),
            }
            Ok(())
        }
        Err(ConsoleError::Validation(reason)) => {
            tracing::debug!(%reason, "replace skipped");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a dialog. Returns the delayed refresh when a delete was issued.
pub async fn delete_dialog(
    registry: &DialogRegistry,
    index: usize,
) -> Result<Option<JoinHandle<Result<usize, ConsoleError>>>> {
    let dialog = registry.get(index)?;
    match registry.delete(&dialog.dialog_id).await? {
        DeleteOutcome::AlreadyPending => {
            println!("⏳ Dialog '{}' is already being deleted.", dialog.name);
            Ok(None)
        }
        DeleteOutcome::Scheduled(refresh) => {
            println!("🗑️  Dialog '{}' deleted, the list refreshes shortly.", dialog.name);
            Ok(Some(refresh))
        }
    }
}

pub fn edit_dialog(config: &Config, registry: &DialogRegistry, index: usize) -> Result<()> {
    let dialog = registry.get(index)?;
    let url = config.design_tool_url(&dialog.dialog_id)?;
    println!("✏️  Edit '{}' at {url}", dialog.name);
    Ok(())
}
