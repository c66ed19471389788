// Command handlers for the terminal front end

use crate::controller::{ClearOutcome, SubmitOutcome, EXAMPLE_PROMPTS};
use crate::models::{Notice, Role, Severity, Turn};
use crate::render::{render_turn, Block};
use crate::state::AppState;
use crate::wiki::format_for_prompt;
use anyhow::Result;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message(String),
    SetKey(String),
    Clear,
    ToggleReasoning,
    Wiki(String),
    AskWithWiki(String),
    Help,
    Quit,
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Message(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim().to_string()),
        None => (rest, String::new()),
    };
    match name {
        "key" => Command::SetKey(arg),
        "clear" => Command::Clear,
        "reasoning" => Command::ToggleReasoning,
        "wiki" => Command::Wiki(arg),
        "ask-wiki" => Command::AskWithWiki(arg),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

const HELP: &str = "Commands:
  /key <api key>       save your Gemini API key
  /clear               remove all messages
  /reasoning           show or hide the model's thought process
  /wiki <query>        look something up on Wikipedia
  /ask-wiki <question> ask with Wikipedia context attached
  /quit                leave
Anything else is sent as a message.";

pub fn write_notice<W: Write>(out: &mut W, notice: &Notice) -> Result<()> {
    let marker = match notice.severity {
        Severity::Info => "i",
        Severity::Destructive => "!",
    };
    writeln!(out, "[{}] {}: {}", marker, notice.title, notice.description)?;
    Ok(())
}

pub fn write_blocks<W: Write>(out: &mut W, blocks: &[Block], indent: &str) -> Result<()> {
    for block in blocks {
        match block {
            Block::Bullet { text } => writeln!(out, "{indent}• {text}")?,
            Block::SubBullet { text } => writeln!(out, "{indent}    - {text}")?,
            Block::Numbered { label, text } => writeln!(out, "{indent}    {label} {text}")?,
            Block::Spacing => writeln!(out)?,
            Block::Paragraph { text } => writeln!(out, "{indent}{text}")?,
        }
    }
    Ok(())
}

pub fn write_turn<W: Write>(out: &mut W, turn: &Turn, show_reasoning: bool) -> Result<()> {
    let speaker = match turn.role() {
        Role::User => "You",
        Role::Assistant => "MindMate",
    };
    writeln!(out, "{}:", speaker)?;
    let rendered = render_turn(turn, show_reasoning);
    write_blocks(out, &rendered.content, "  ")?;
    if let Some(error) = turn.error() {
        writeln!(out, "  (error: {})", error)?;
    }
    if let Some(reasoning) = &rendered.reasoning {
        writeln!(out, "  Thought Process:")?;
        write_blocks(out, reasoning, "  | ")?;
    }
    Ok(())
}

pub fn write_welcome<W: Write>(state: &AppState, out: &mut W) -> Result<()> {
    writeln!(out, "Welcome to Your Safe Space")?;
    writeln!(
        out,
        "I'm here to listen and support you. Feel free to share what's on your mind."
    )?;
    if !state.controller.has_credential() {
        writeln!(
            out,
            "API Key Required: add your Gemini API key with /key <api key> to start using the assistant."
        )?;
    }
    writeln!(out, "Try asking about:")?;
    for prompt in EXAMPLE_PROMPTS {
        writeln!(out, "  - {}", prompt)?;
    }
    writeln!(out, "Type /help for commands.")?;
    Ok(())
}

async fn send<W: Write>(
    state: &AppState,
    out: &mut W,
    text: &str,
    context: Option<&str>,
) -> Result<()> {
    let show_reasoning = state.show_reasoning();
    match state.controller.submit_with_context(text, context).await {
        SubmitOutcome::Ignored => {}
        SubmitOutcome::Busy => writeln!(out, "Still waiting for the previous response...")?,
        SubmitOutcome::Rejected(notice) => write_notice(out, &notice)?,
        SubmitOutcome::Answered(turn) => write_turn(out, &turn, show_reasoning)?,
        SubmitOutcome::Failed { turn, notice } => {
            write_notice(out, &notice)?;
            write_turn(out, &turn, show_reasoning)?;
        }
    }
    Ok(())
}

pub async fn execute<W: Write>(state: &AppState, command: Command, out: &mut W) -> Result<Flow> {
    match command {
        Command::Message(text) => send(state, out, &text, None).await?,
        Command::SetKey(key) => write_notice(out, &state.controller.save_credential(&key))?,
        Command::Clear => {
            let outcome = state.controller.clear().await;
            write_notice(out, outcome.notice())?;
            if let ClearOutcome::Cleared(_) = outcome {
                write_welcome(state, out)?;
            }
        }
        Command::ToggleReasoning => {
            let shown = state.toggle_reasoning();
            writeln!(out, "Thought process {}", if shown { "shown" } else { "hidden" })?;
        }
        Command::Wiki(query) => {
            let summary = state.encyclopedia.lookup(&query).await;
            write!(out, "{}", format_for_prompt(&summary))?;
        }
        Command::AskWithWiki(question) => {
            let summary = state.encyclopedia.lookup(&question).await;
            let context = format_for_prompt(&summary);
            send(state, out, &question, Some(&context)).await?;
        }
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Quit => return Ok(Flow::Exit),
        Command::Unknown(name) => writeln!(out, "Unknown command '/{}'. Type /help.", name)?,
    }
    out.flush()?;
    Ok(Flow::Continue)
}
