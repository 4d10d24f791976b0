//! Interactive question loop.

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use rustyline::history::History;
use tracing::debug;

use crate::corpus::EXAMPLE_QUESTIONS;
use crate::session::Session;

/// What one line of input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    ListExamples,
    Ask(String),
    /// Blank input.
    Skip,
    /// `exN` with `N` outside the example list.
    InvalidExample,
}

/// Interpret a line of input against a list of `examples`.
///
/// `quit`, `exit` and `q` leave the loop, `examples` lists the examples, and
/// `exN` picks example `N` counting from one.
pub fn parse_command(input: &str, examples: &[&str]) -> Command {
    let input = input.trim();
    if input.is_empty() {
        return Command::Skip;
    }

    let lowered = input.to_lowercase();
    match lowered.as_str() {
        "quit" | "exit" | "q" => return Command::Quit,
        "examples" => return Command::ListExamples,
        _ => {}
    }

    if let Some(digits) = lowered.strip_prefix("ex") {
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return match digits.parse::<usize>() {
                Ok(n) if (1..=examples.len()).contains(&n) => {
                    Command::Ask(examples[n - 1].to_string())
                }
                _ => Command::InvalidExample,
            };
        }
    }

    Command::Ask(input.to_string())
}

/// Add a question to the line history, logging any failure.
fn record_history(history: &mut impl History, line: &str) -> bool {
    match history.add(line.trim()) {
        Ok(added) => added,
        Err(e) => {
            debug!(error = %e, "failed to record history entry");
            false
        }
    }
}

fn print_examples() {
    println!("\nExample questions:");
    for (i, question) in EXAMPLE_QUESTIONS.iter().enumerate() {
        println!("  ex{}: {question}", i + 1);
    }
}

/// Read questions until the user quits or closes input.
pub async fn run(session: &Session) -> Result<()> {
    let mut editor = DefaultEditor::new()?;

    println!("Ask a question about healthcare AI.");
    println!(
        "Type 'examples' for sample questions, 'ex1'..'ex{}' to run one, 'quit' to leave.",
        EXAMPLE_QUESTIONS.len()
    );

    loop {
        let line = match editor.readline("\nquestion> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        match parse_command(&line, &EXAMPLE_QUESTIONS) {
            Command::Quit => break,
            Command::Skip => continue,
            Command::ListExamples => print_examples(),
            Command::InvalidExample => {
                println!("Invalid example number, choose 1-{}", EXAMPLE_QUESTIONS.len());
            }
            Command::Ask(question) => {
                record_history(editor.history_mut(), &line);
                println!("Question: {question}");
                if let Err(e) = session.ask(&question).await {
                    eprintln!("Error: {e:#}");
                }
            }
        }
    }

    println!("Goodbye.");
    Ok(())
}
