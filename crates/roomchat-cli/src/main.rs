//! roomchat: console client for room-based WebSocket chat.
//!
//! Connects to a chat server, joins a room, prints everything that arrives,
//! and sends each typed line as a broadcast (or a command, see `/help`).

mod config;
mod console;

use std::io::{BufRead, Write};

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use roomchat_client::{ChatClient, ChatHandle, JoinMode};

use crate::console::{ConsoleObserver, Input};

/// Room chat client
#[derive(Parser)]
#[command(name = "roomchat", version, about = "Room-based chat client over WebSocket")]
struct Cli {
    /// Config file path
    #[arg(long = "config")]
    config: Option<String>,

    /// Server URL (ws:// or wss://)
    #[arg(short, long)]
    url: Option<String>,

    /// Auth token sent with every request
    #[arg(short, long)]
    token: Option<String>,

    /// Room to join
    #[arg(short, long)]
    room: Option<String>,

    /// Display name
    #[arg(short = 'n', long)]
    username: Option<String>,

    /// Ask for username and room before connecting
    #[arg(long)]
    prompt: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing.
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("roomchat=debug,roomchat_cli=debug,roomchat_client=debug,roomchat_core=debug")
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("roomchat=warn,roomchat_cli=warn,roomchat_client=warn")
            .with_target(false)
            .init();
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("roomchat: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(|| {
        let home = dirs::home_dir().unwrap_or_default();
        home.join(".roomchat").join("config.toml").to_string_lossy().to_string()
    });
    let mut cfg = config::Config::load(&config_path)?;
    cfg.apply(config::Overrides {
        url: cli.url,
        token: cli.token,
        room: cli.room,
        username: cli.username,
        prompt: cli.prompt,
    });
    let client_config = cfg.client_config()?;

    let prompt = (client_config.join_mode == JoinMode::Prompt)
        .then(|| (client_config.username.clone(), client_config.room_id.clone()));

    let mut client = ChatClient::new(
        client_config,
        ConsoleObserver,
        tokio::runtime::Handle::current(),
    );

    let (tx_quit, mut rx_quit) = mpsc::channel::<()>(1);
    let handle = client.handle();

    // Stdin is read on a blocking thread; every line becomes a queued request.
    let input_handle = tokio::task::spawn_blocking(move || {
        read_input(handle, prompt);
        let _ = tx_quit.blocking_send(());
    });

    client.start();

    let mut ticker = tokio::time::interval(cfg.tick_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                client.tick();
            }
            _ = rx_quit.recv() => {
                debug!("input closed");
                break;
            }
        }
    }

    // Run whatever the input thread queued before quitting.
    client.tick();
    client.shutdown();
    let _ = input_handle.await;
    Ok(())
}

/// Forward stdin lines to the client until `/quit` or EOF.
fn read_input(handle: ChatHandle, prompt: Option<(String, String)>) {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    if let Some((username, room)) = prompt {
        let Some(username) = ask(&mut lines, "username", &username) else {
            return;
        };
        let Some(room) = ask(&mut lines, "room", &room) else {
            return;
        };
        handle.join(username, room);
    }

    for line in lines {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("stdin read error: {e}");
                break;
            }
        };
        match console::parse_input(&line) {
            Input::Broadcast(text) => handle.send_broadcast(text),
            Input::Private { target, text } => handle.send_private(target, text),
            Input::Room(room) => handle.change_room(room),
            Input::Join { username, room } => handle.join(username, room),
            Input::Connect => handle.request_connect(),
            Input::Close => handle.request_close(),
            Input::Help => println!("{}", console::HELP),
            Input::Empty => {}
            Input::Quit => break,
        }
    }
}

/// Ask for one value; a blank answer keeps `default`. `None` on EOF.
fn ask<B: BufRead>(lines: &mut std::io::Lines<B>, label: &str, default: &str) -> Option<String> {
    if default.is_empty() {
        print!("{label}: ");
    } else {
        print!("{label} [{default}]: ");
    }
    let _ = std::io::stdout().flush();

    let answer = lines.next()?.ok()?;
    let answer = answer.trim();
    Some(if answer.is_empty() { default.to_string() } else { answer.to_string() })
}
