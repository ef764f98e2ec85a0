//! Terminal front end: the interactive loop and single-turn mode.

use parley_agent::{CancellationToken, ConversationRunner, TurnObserver};
use parley_core::ParleyError;
use parley_session::ConversationStore;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

const HELP: &str = "\
Commands:
  /help, /h                 show this help
  /clear, /c                start a new conversation
  /history                  print the conversation transcript
  /quit, /q, /x, /exit      leave
Ctrl-C cancels a running request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Help,
    Quit,
    Clear,
    History,
}

impl Command {
    fn parse(input: &str) -> Option<Self> {
        match input {
            "/help" | "/h" => Some(Command::Help),
            "/quit" | "/q" | "/x" | "/exit" => Some(Command::Quit),
            "/clear" | "/c" => Some(Command::Clear),
            "/history" => Some(Command::History),
            _ => None,
        }
    }
}

/// Prints output to stdout as it arrives.
struct TerminalObserver {
    stdout: std::io::Stdout,
}

impl TerminalObserver {
    fn new() -> Self {
        Self {
            stdout: std::io::stdout(),
        }
    }

    fn emit(&mut self, text: &str) {
        let mut out = self.stdout.lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

impl TurnObserver for TerminalObserver {
    fn on_content(&mut self, text: &str) {
        self.emit(text);
    }

    fn on_reasoning(&mut self, text: &str) {
        self.emit(&format!("{DIM}{text}{RESET}"));
    }

    fn on_tool_call(&mut self, call: &str) {
        self.emit(&format!("\nTool Called: {call}\n"));
    }
}

/// Runs one user turn, cancelling it on Ctrl-C.
async fn turn(
    runner: &ConversationRunner,
    store: &mut ConversationStore,
    input: &str,
) -> Result<String, ParleyError> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut observer = TerminalObserver::new();
    let result = runner.run(store, None, input, &mut observer, &cancel).await;
    watcher.abort();
    result
}

fn report(result: Result<String, ParleyError>) {
    match result {
        Ok(_) => println!(),
        Err(ParleyError::Cancelled) => println!("\n[cancelled]"),
        Err(ParleyError::ToolLoopExceeded {
            max_round_trips,
            partial_content,
        }) => {
            if !partial_content.is_empty() {
                println!();
            }
            eprintln!("Stopped after {max_round_trips} round trips without a final answer.");
        }
        Err(e) => {
            warn!(error = %e, "Turn failed");
            eprintln!("\nError: {e}");
        }
    }
}

pub async fn chat(runner: &ConversationRunner, store: &mut ConversationStore) -> anyhow::Result<()> {
    println!("Type /help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match Command::parse(input) {
            Some(Command::Help) => println!("{HELP}"),
            Some(Command::Quit) => break,
            Some(Command::Clear) => {
                store.clear();
                println!("Conversation cleared.");
            }
            Some(Command::History) => print!("{}", store.transcript()),
            None if input.starts_with('/') => {
                println!("Unknown command {input}. Type /help for commands.");
            }
            None => report(turn(runner, store, input).await),
        }
    }

    Ok(())
}

pub async fn ask(
    runner: &ConversationRunner,
    store: &mut ConversationStore,
    prompt: &str,
) -> anyhow::Result<()> {
    turn(runner, store, prompt).await?;
    println!();
    Ok(())
}
