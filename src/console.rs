//! Interactive console: slash commands manage dialogs, any other line is a
//! turn in the active conversation.

use anyhow::Result;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::commands::{self, ParsedCommand, SlashCommand};
use crate::config::Config;
use crate::error::ConsoleError;
use crate::model::Turn;
use crate::registry::DialogRegistry;
use crate::session::ConversationSession;
use crate::speech::SpeechSynthesizer;
use crate::view;

/// What the loop should do after handling a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub struct Console {
    config: Config,
    registry: DialogRegistry,
    session: ConversationSession,
    speech: Option<SpeechSynthesizer>,
}

impl Console {
    pub fn new(
        config: Config,
        registry: DialogRegistry,
        session: ConversationSession,
        speech: Option<SpeechSynthesizer>,
    ) -> Self {
        Self {
            config,
            registry,
            session,
            speech,
        }
    }

    /// Run the read-eval loop until `/bye` or end of input. When `start_index`
    /// is given a conversation on that dialog is opened first.
    pub async fn run(&self, start_index: Option<usize>) -> Result<()> {
        println!("💬 Dialog console. Type /help for commands.");
        self.report(commands::list_dialogs(&self.registry, &self.session).await);

        if let Some(index) = start_index {
            self.start(index).await;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            prompt().await?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if self.handle_line(line.trim()).await == Flow::Exit {
                break;
            }
        }

        println!("👋 Bye!");
        Ok(())
    }

    async fn handle_line(&self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }

        if line.starts_with('/') {
            match commands::parse_slash_command(line) {
                Some(command) => return self.handle_command(command).await,
                None => {
                    println!("❓ Unknown command. Type /help for the list.");
                    return Flow::Continue;
                }
            }
        }

        self.converse(line).await;
        Flow::Continue
    }

    async fn handle_command(&self, command: ParsedCommand) -> Flow {
        match command.command {
            SlashCommand::List => {
                self.report(commands::list_dialogs(&self.registry, &self.session).await);
            }
            SlashCommand::Start => match command.index() {
                Some(index) => self.start(index).await,
                None => println!("Usage: /start <index>"),
            },
            SlashCommand::Create => match (command.arg(0), command.arg(1)) {
                (Some(name), Some(path)) => self.report(
                    commands::create_dialog(&self.registry, &self.session, name, Path::new(path)).await,
                ),
                _ => println!("Usage: /create <name> <file.xml>"),
            },
            SlashCommand::Replace => match (command.index(), command.arg(1)) {
                (Some(index), Some(path)) => self.report(
                    commands::replace_dialog(&self.registry, &self.session, index, Path::new(path)).await,
                ),
                _ => println!("Usage: /replace <index> <file.xml>"),
            },
            SlashCommand::Delete => match command.index() {
                Some(index) => self.delete(index).await,
                None => println!("Usage: /delete <index>"),
            },
            SlashCommand::Edit => match command.index() {
                Some(index) => self.report(commands::edit_dialog(&self.config, &self.registry, index)),
                None => println!("Usage: /edit <index>"),
            },
            SlashCommand::Profile => match self.session.fetch_profile().await {
                Some(entries) => print_profile(&view::profile_lines(&entries)),
                None if !self.session.is_active() => println!("No active conversation."),
                None => println!("Profile unavailable."),
            },
            SlashCommand::Info => self.print_info(),
            SlashCommand::History => {
                for entry in self.session.transcript() {
                    println!("{}", view::transcript_line(&entry));
                }
            }
            SlashCommand::Help => println!("{}", commands::get_help_text()),
            SlashCommand::Bye => return Flow::Exit,
        }
        Flow::Continue
    }

    async fn start(&self, index: usize) {
        match self.session.start_at(&self.registry, index).await {
            Ok(turn) => {
                self.print_info();
                show_bot(&turn);
            }
            Err(e) => report_error(&e),
        }
    }

    async fn converse(&self, input: &str) {
        match self.session.send_turn(input).await {
            Ok(reply) => {
                show_bot(&reply.turn);
                self.speak(&reply.turn);
                tokio::spawn(async move {
                    if let Ok(Some(entries)) = reply.profile.await {
                        print_profile(&view::profile_lines(&entries));
                    }
                });
            }
            Err(e) => report_error(&e),
        }
    }

    async fn delete(&self, index: usize) {
        match commands::delete_dialog(&self.registry, index).await {
            Ok(Some(refresh)) => {
                let registry = self.registry.clone();
                let session = self.session.clone();
                tokio::spawn(async move {
                    match refresh.await {
                        Ok(Ok(_)) => commands::print_dialogs(&registry, &session),
                        Ok(Err(e)) => report_error(&e),
                        Err(e) => tracing::warn!(error = %e, "delayed refresh task failed"),
                    }
                });
            }
            Ok(None) => {}
            Err(e) => self.report(Err(e)),
        }
    }

    /// Only replies to user turns are spoken, never an opening line
    fn speak(&self, turn: &Turn) {
        if let Some(speech) = &self.speech {
            let _ = speech.speak(&view::plain_text(&turn.joined()));
        }
    }

    fn print_info(&self) {
        let Some(state) = self.session.current() else {
            println!("No active conversation.");
            return;
        };
        let name = self
            .registry
            .dialogs()
            .into_iter()
            .find(|d| d.dialog_id == state.dialog_id)
            .map(|d| d.name);
        println!("ℹ️  Conversation");
        for line in view::info_lines(name.as_deref(), &state) {
            println!("   {line}");
        }
    }

    fn report(&self, result: Result<()>) {
        if let Err(e) = result {
            match e.downcast_ref::<ConsoleError>() {
                Some(console_error) => report_error(console_error),
                None => println!("❌ {e:#}"),
            }
        }
    }
}

async fn prompt() -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    Ok(())
}

fn report_error(error: &ConsoleError) {
    match error {
        ConsoleError::Validation(_) | ConsoleError::Superseded => {
            tracing::debug!(%error, "suppressed");
        }
        other => println!("❌ {other}"),
    }
}

fn show_bot(turn: &Turn) {
    println!("🤖 {}", view::bot_text(turn));
}

fn print_profile(lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    println!("🧾 Profile");
    for line in lines {
        println!("   {line}");
    }
}
