use futures::StreamExt;
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio_stream::wrappers::LinesStream;

use crate::controller::ChatController;
use crate::models::chat::{ Message, Role };
use crate::state::{ Action, ConversationState, CopyStatus };

const HELP: &str = "Commands: /new, /sessions, /load <id>, /delete <id>, /copy, /help, /quit";

#[derive(Debug, PartialEq)]
pub enum Command {
    Send(String),
    NewChat,
    ListSessions,
    Load(String),
    Delete(String),
    CopyLatest,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if !trimmed.starts_with('/') {
        return Command::Send(line.to_string());
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

    match (name, arg) {
        ("/new", None) => Command::NewChat,
        ("/sessions", None) => Command::ListSessions,
        ("/load", Some(id)) => Command::Load(id.to_string()),
        ("/delete", Some(id)) => Command::Delete(id.to_string()),
        ("/copy", None) => Command::CopyLatest,
        ("/help", None) => Command::Help,
        ("/quit", None) | ("/exit", None) => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

/// Prints snapshots incrementally. Streamed replies carry the whole text so
/// far, so only the part not yet on screen is written.
#[derive(Default)]
pub struct Renderer {
    session_id: String,
    first_message: Option<String>,
    rendered: usize,
    /// Bytes of the current reply already printed, once its prefix is out.
    partial: Option<usize>,
    copies: u64,
}

impl Renderer {
    pub fn render(&mut self, state: &ConversationState, out: &mut impl Write) -> std::io::Result<()> {
        // history is still on its way; wait for the replacement messages
        if state.loading() && state.streaming_message().is_none() {
            return Ok(());
        }

        let first = state.messages.first().map(|m| m.id.clone());
        if state.session_id != self.session_id || first != self.first_message || state.messages.len() < self.rendered {
            if self.partial.is_some() {
                writeln!(out)?;
            }
            writeln!(out, "── {} ──", state.session_id)?;
            self.session_id = state.session_id.clone();
            self.first_message = first;
            self.rendered = 0;
            self.partial = None;
        }

        while let Some(message) = state.messages.get(self.rendered) {
            if !self.render_message(message, out)? {
                break;
            }
            self.rendered += 1;
        }

        if state.copies != self.copies {
            match state.copy_status {
                CopyStatus::Copied => writeln!(out, "(copied)")?,
                CopyStatus::Failed => writeln!(out, "(copy failed)")?,
                CopyStatus::Idle => {}
            }
            self.copies = state.copies;
        }
        out.flush()
    }

    /// Returns whether the message is fully on screen.
    fn render_message(&mut self, message: &Message, out: &mut impl Write) -> std::io::Result<bool> {
        if message.role == Role::User {
            writeln!(out, "you › {}", message.content)?;
            return Ok(true);
        }

        let printed = match self.partial {
            Some(printed) => printed,
            None => {
                write!(out, "bot › ")?;
                0
            }
        };
        let content = message.content.as_str();
        match content.get(printed..) {
            Some(unseen) => write!(out, "{}", unseen)?,
            None => write!(out, "\n{}", content)?,
        }
        self.partial = Some(content.len());

        if message.is_streaming() {
            return Ok(false);
        }
        writeln!(out)?;
        self.partial = None;
        Ok(true)
    }
}

fn print_sessions(state: &ConversationState) {
    if state.sessions.is_empty() {
        println!("No saved sessions.");
        return;
    }
    for session in &state.sessions {
        let marker = if session.id == state.session_id { "*" } else { " " };
        println!("{} {}  {}", marker, session.id, session.title);
    }
}

enum Input {
    Line(Option<std::io::Result<String>>),
    Result(Option<Action>),
}

pub async fn run(mut controller: ChatController) -> Result<(), Box<dyn Error + Send + Sync>> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = LinesStream::new(stdin.lines());
    let mut renderer = Renderer::default();
    let mut stdout = std::io::stdout();

    println!("Brainware AI. {}", HELP);
    renderer.render(controller.state(), &mut stdout)?;

    loop {
        let input = tokio::select! {
            line = lines.next() => Input::Line(line),
            result = controller.next_result() => Input::Result(result),
        };

        match input {
            Input::Result(Some(action)) => controller.dispatch(action).await,
            Input::Result(None) | Input::Line(None) => {
                break;
            }
            Input::Line(Some(line)) => {
                match parse_command(&line?) {
                    Command::Send(text) => {
                        if controller.state().loading() {
                            println!("(still waiting for the previous reply)");
                        }
                        controller.dispatch(Action::SubmitUserMessage(text)).await;
                    }
                    Command::NewChat => controller.dispatch(Action::StartSession).await,
                    Command::ListSessions => print_sessions(controller.state()),
                    Command::Load(id) => controller.dispatch(Action::LoadSession(id)).await,
                    Command::Delete(id) => controller.dispatch(Action::DeleteSession(id)).await,
                    Command::CopyLatest => {
                        match controller.state().latest_reply().map(|m| m.id.clone()) {
                            Some(id) => controller.dispatch(Action::CopyMessage(id)).await,
                            None => println!("Nothing to copy yet."),
                        }
                    }
                    Command::Help => println!("{}", HELP),
                    Command::Quit => {
                        break;
                    }
                    Command::Unknown(cmd) => println!("Unknown command '{}'. {}", cmd, HELP),
                }
            }
        }

        renderer.render(controller.state(), &mut stdout)?;
    }

    Ok(())
}
