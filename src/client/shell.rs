//! Interactive checkout shell
//!
//! Line-oriented front end over a [`ClientSession`]. Parsing is separate
//! from execution so commands can be driven without a terminal.

use crate::error::ApiError;
use crate::lock::LockCoordinator;
use crate::session::{ClientSession, SessionState, Transport};
use crate::tree::node::FileEntry;
use crate::tree::path;
use owo_colors::OwoColorize;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Content source for `write`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteSource {
    /// Inline text; hex-encoded bytes when `-b` is given
    Inline(String),
    /// Contents of a local file (`< path`)
    LocalFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Open {
        path: String,
    },
    Close,
    Read {
        offset: Option<usize>,
        length: Option<usize>,
    },
    Write {
        path: Option<String>,
        offset: usize,
        binary: bool,
        source: WriteSource,
    },
    Delete {
        path: String,
    },
    Discard,
    Status,
    Help,
    Exit,
}

/// What the shell should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Continue(String),
    Exit,
}

pub const HELP: &str = "\
open <path>                                   Check out a file (created if missing)
close                                         Commit the open file and release its lock
read [offset] [length]                        Show the open file's local copy
write [<path>] [offset] [-b] (<text> | < file) Write into the local copy (-b: hex text or raw file)
delete <path>                                 Delete a file
discard                                       Drop local edits and release the lock
status                                        Show the session state
help                                          Show this help
exit                                          Leave the shell";

/// Parse one shell line.
pub fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (head, redirect) = match line.split_once('<') {
        Some((head, file)) => (head, Some(file.trim())),
        None => (line, None),
    };
    let mut tokens = tokenize(head)?;
    if tokens.is_empty() {
        return Err("empty command".to_string());
    }
    let name = tokens.remove(0);
    if redirect.is_some() && name != "write" {
        return Err(format!("{} does not accept '<' redirection", name));
    }

    match name.as_str() {
        "open" => match tokens.as_slice() {
            [path] => Ok(ShellCommand::Open { path: path.clone() }),
            _ => Err("usage: open <path>".to_string()),
        },
        "close" => no_args(&tokens, ShellCommand::Close, "close"),
        "read" => {
            let numbers = tokens
                .iter()
                .map(|t| parse_number(t))
                .collect::<Result<Vec<_>, _>>()?;
            match numbers.as_slice() {
                [] => Ok(ShellCommand::Read {
                    offset: None,
                    length: None,
                }),
                [offset] => Ok(ShellCommand::Read {
                    offset: Some(*offset),
                    length: None,
                }),
                [offset, length] => Ok(ShellCommand::Read {
                    offset: Some(*offset),
                    length: Some(*length),
                }),
                _ => Err("usage: read [offset] [length]".to_string()),
            }
        }
        "write" => parse_write(tokens, redirect),
        "delete" => match tokens.as_slice() {
            [path] => Ok(ShellCommand::Delete { path: path.clone() }),
            _ => Err("usage: delete <path>".to_string()),
        },
        "discard" => no_args(&tokens, ShellCommand::Discard, "discard"),
        "status" => no_args(&tokens, ShellCommand::Status, "status"),
        "help" => Ok(ShellCommand::Help),
        "exit" | "quit" => Ok(ShellCommand::Exit),
        other => Err(format!("Unknown command: {}. Type 'help' for available commands.", other)),
    }
}

fn no_args(tokens: &[String], command: ShellCommand, name: &str) -> Result<ShellCommand, String> {
    if tokens.is_empty() {
        Ok(command)
    } else {
        Err(format!("{} does not take any arguments", name))
    }
}

fn parse_number(token: &str) -> Result<usize, String> {
    token
        .parse()
        .map_err(|_| format!("expected a number, got '{}'", token))
}

fn parse_write(mut tokens: Vec<String>, redirect: Option<&str>) -> Result<ShellCommand, String> {
    let usage = "usage: write [<path>] [offset] [-b] (<text> | < localfile)";
    let binary = tokens.iter().any(|t| t == "-b");
    tokens.retain(|t| t != "-b");

    let source = match redirect {
        Some("") => return Err(usage.to_string()),
        Some(file) => WriteSource::LocalFile(PathBuf::from(file)),
        None => WriteSource::Inline(tokens.pop().ok_or_else(|| usage.to_string())?),
    };

    let mut path = None;
    let mut offset = None;
    for token in tokens {
        if token.starts_with('/') && path.is_none() && offset.is_none() {
            path = Some(token);
        } else if offset.is_none() {
            offset = Some(parse_number(&token)?);
        } else {
            return Err(usage.to_string());
        }
    }

    Ok(ShellCommand::Write {
        path,
        offset: offset.unwrap_or(0),
        binary,
        source,
    })
}

/// Whitespace split honouring double quotes.
fn tokenize(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;

    for c in input.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    tokens.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if quoted {
        return Err("unterminated quote".to_string());
    }
    if pending {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Run `command` against `session`.
pub async fn execute<T, L>(
    session: &mut ClientSession<T, L>,
    command: ShellCommand,
) -> Result<Outcome, ApiError>
where
    T: Transport,
    L: LockCoordinator,
{
    let message = match command {
        ShellCommand::Open { path } => {
            let entry = session.open(&path).await?;
            format!("File {} opened\n{}", entry.virtual_path, describe(&entry))
        }
        ShellCommand::Close => {
            let entry = session.close().await?;
            format!("File {} closed\n{}", entry.virtual_path, describe(&entry))
        }
        ShellCommand::Read { offset, length } => {
            let bytes = match (offset, length) {
                (None, _) => session.read()?,
                (Some(offset), Some(length)) => session.read_range(offset, length)?,
                (Some(offset), None) => session.read_range(offset, usize::MAX)?,
            };
            String::from_utf8_lossy(bytes).into_owned()
        }
        ShellCommand::Write {
            path,
            offset,
            binary,
            source,
        } => {
            if let (Some(path), Some(entry)) = (&path, session.entry()) {
                if entry.virtual_path != path::normalize_path(path)? {
                    return Err(ApiError::InvalidState(format!(
                        "{} is not the open file ({})",
                        path, entry.virtual_path
                    )));
                }
            }
            let data = load_source(&source, binary).await?;
            let written = session.write(offset, &data)?;
            format!("Wrote {} bytes at offset {}", written, offset)
        }
        ShellCommand::Delete { path } => {
            session.delete(&path).await?;
            format!("File {} deleted", path)
        }
        ShellCommand::Discard => {
            session.discard().await?;
            "Local changes discarded".to_string()
        }
        ShellCommand::Status => {
            let status = session.status();
            match status.entry {
                Some(entry) => format!(
                    "session {} {}\n{}",
                    status.session,
                    status.state,
                    describe(&entry)
                ),
                None => format!("session {} {}", status.session, status.state),
            }
        }
        ShellCommand::Help => HELP.to_string(),
        ShellCommand::Exit => return Ok(Outcome::Exit),
    };
    Ok(Outcome::Continue(message))
}

async fn load_source(source: &WriteSource, binary: bool) -> Result<Vec<u8>, ApiError> {
    match (source, binary) {
        (WriteSource::Inline(text), false) => Ok(text.as_bytes().to_vec()),
        (WriteSource::Inline(text), true) => hex::decode(text)
            .map_err(|e| ApiError::InvalidState(format!("-b expects hex text: {}", e))),
        (WriteSource::LocalFile(path), binary) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                ApiError::InvalidState(format!("Failed to read {}: {}", path.display(), e))
            })?;
            if !binary && std::str::from_utf8(&bytes).is_err() {
                return Err(ApiError::InvalidState(format!(
                    "{} is not text; use -b for binary content",
                    path.display()
                )));
            }
            Ok(bytes)
        }
    }
}

fn describe(entry: &FileEntry) -> String {
    format!(
        "  id: {}\n  size: {} bytes\n  created: {}\n  modified: {}",
        entry.id,
        entry.size_bytes,
        entry.created_at.to_rfc3339(),
        entry.modified_at.to_rfc3339()
    )
}

/// Read commands from stdin until `exit` or end of input.
///
/// A file still checked out at exit is discarded so its lock is released.
pub async fn run<T, L>(session: &mut ClientSession<T, L>) -> Result<(), ApiError>
where
    T: Transport,
    L: LockCoordinator,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", "checkoutfs shell. Type 'help' for available commands.".bold());

    loop {
        print!("{} ", "checkoutfs>".cyan());
        std::io::stdout()
            .flush()
            .map_err(|e| ApiError::InvalidState(format!("stdout: {}", e)))?;

        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| ApiError::InvalidState(format!("stdin: {}", e)))?
        else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message.red());
                continue;
            }
        };
        match execute(session, command).await {
            Ok(Outcome::Continue(message)) => println!("{}", message.bright_blue()),
            Ok(Outcome::Exit) => break,
            Err(e) => println!("{}", e.to_string().red()),
        }
    }

    if matches!(
        session.state(),
        SessionState::Editing | SessionState::Committing
    ) {
        println!("{}", "Discarding uncommitted changes".yellow());
        session.discard().await?;
    }
    Ok(())
}
