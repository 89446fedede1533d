//! Console collaborator: prints log lines and parses typed input.

use chrono::Local;
use tracing::{error, info, warn};

use roomchat_client::{ChatObserver, StatusSeverity};

/// Prints every log line to stdout with a local timestamp.
pub struct ConsoleObserver;

impl ChatObserver for ConsoleObserver {
    fn on_status_changed(&mut self, text: &str, severity: StatusSeverity) {
        match severity {
            StatusSeverity::Ok => info!(status = %text, "status changed"),
            StatusSeverity::Warning => warn!(status = %text, "status changed"),
            StatusSeverity::Error => error!(status = %text, "status changed"),
        }
    }

    fn on_log_line(&mut self, line: &str) {
        println!("{}", stamp(&Local::now().format("%H:%M:%S").to_string(), line));
    }
}

fn stamp(time: &str, line: &str) -> String {
    format!("[{time}] {line}")
}

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Broadcast(String),
    Private { target: String, text: String },
    Room(String),
    Join { username: String, room: String },
    Connect,
    Close,
    Quit,
    Help,
    Empty,
}

pub const HELP: &str = "\
commands:
  /pm <targetId> <text>    private message
  /room <roomId>           change room
  /join <username> <room>  set identity and reconnect
  /connect, /close         connection control
  /quit                    exit
anything else is broadcast to the room";

pub fn parse_input(line: &str) -> Input {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Input::Empty;
    }

    let trimmed = line.trim_start();
    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    match command {
        "/pm" => {
            let (target, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Input::Private {
                target: target.to_string(),
                text: text.trim().to_string(),
            }
        }
        "/room" => Input::Room(rest.to_string()),
        "/join" => {
            let (username, room) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Input::Join {
                username: username.to_string(),
                room: room.trim().to_string(),
            }
        }
        "/connect" => Input::Connect,
        "/close" => Input::Close,
        "/quit" | "/exit" => Input::Quit,
        "/help" => Input::Help,
        _ => Input::Broadcast(line.to_string()),
    }
}
