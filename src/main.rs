//! exvi - line-oriented driver for the ex/vi command interpreter.
//!
//! Reads ex commands from stdin, one per line, and applies them to an
//! in-memory buffer. Output lines go to stdout; errors are reported on
//! stderr with a leading `?`, the way line editors traditionally do.

use clap::Parser;
use exvi::{ExviError, Interpreter, LineBuffer, Outcome};
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

/// exvi - ex command interpreter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Suppress informational messages
    #[arg(short, long)]
    silent: bool,

    /// File to load into the buffer
    file: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let buffer = match &args.file {
        Some(path) => match fs::read_to_string(path) {
            Ok(text) => LineBuffer::from_text(&text),
            Err(e) => {
                eprintln!("?{}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => LineBuffer::new(),
    };

    let mut interpreter = Interpreter::new(buffer);
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("?{}", ExviError::from(e));
                return ExitCode::FAILURE;
            }
        };

        match interpreter.execute(&line) {
            Ok(Outcome::Quit) => return ExitCode::SUCCESS,
            Ok(Outcome::Output(lines)) => {
                for text in lines {
                    if writeln!(out, "{}", text).is_err() {
                        return ExitCode::FAILURE;
                    }
                }
            }
            Ok(Outcome::Message(message)) => {
                if !args.silent {
                    let _ = writeln!(out, "{}", message);
                }
            }
            Ok(Outcome::Continue) => {}
            Err(e) => {
                eprintln!("?{}", e);
            }
        }
        let _ = out.flush();
    }

    ExitCode::SUCCESS
}
