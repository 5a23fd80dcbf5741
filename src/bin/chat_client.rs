//! Chat Client - terminal front end
//!
//! Usage: `chat_client <user_id> [ws://host:port]`
//!
//! Joins, prints the history replay, then streams notifications while
//! reading lines from stdin.

use std::env;
use std::io::Write;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use chat_broker::command::{render_history, CLEAR_SCREEN, HELP, USAGE};
use chat_broker::{AppError, ClientMessage, Command, ServerMessage, UserId};

/// Default server URL
const DEFAULT_URL: &str = "ws://127.0.0.1:8080";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Quiet by default so logs don't interleave with the chat
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_broker=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let Some(raw_user) = args.next() else {
        eprintln!("Error: You must specify a username");
        eprintln!("Usage: chat_client <user_id> [{}]", DEFAULT_URL);
        std::process::exit(1);
    };
    let user_id = UserId::parse(raw_user)?;
    let url = args.next().unwrap_or_else(|| DEFAULT_URL.to_string());

    println!("=== Chat Client ===");
    println!("Connecting as: {}", user_id);
    println!("Server: {}", url);
    println!("===================");

    let (ws, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = ws.split();

    send(&mut sink, &ClientMessage::Join { user_id: user_id.to_string() }).await?;
    match next_reply(&mut stream).await? {
        ServerMessage::Welcome { text } => println!("{}", text),
        ServerMessage::Error { message, .. } => {
            eprintln!("Failed to join chat: {}", message);
            std::process::exit(1);
        }
        other => debug!("Unexpected reply to join: {:?}", other),
    }

    send(&mut sink, &ClientMessage::GetHistory { user_id: None }).await?;
    match next_reply(&mut stream).await? {
        ServerMessage::History { events } => print!("{}", render_history(&events)),
        other => println!("Note: Could not retrieve chat history: {:?}", other),
    }

    send(&mut sink, &ClientMessage::Listen).await?;

    println!("\n{}", USAGE);
    println!("{}", "-".repeat(40));

    let display = tokio::spawn(display_messages(stream));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();

        let line = tokio::select! {
            line = read_line(&mut lines) => line?,
            _ = tokio::signal::ctrl_c() => {
                println!("\nDisconnecting...");
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        match Command::parse(&line) {
            None => continue,
            Some(Command::Quit) => break,
            Some(Command::Help) => println!("{}", HELP),
            Some(Command::Clear) => print!("{}", CLEAR_SCREEN),
            Some(Command::Users) => {
                println!("(You are connected as {})", user_id);
                send(&mut sink, &ClientMessage::Users).await?;
            }
            Some(Command::Say(content)) => {
                if let Err(e) = send(&mut sink, &ClientMessage::SendMessage { content }).await {
                    println!("Error: {}", e);
                }
            }
        }
    }

    let _ = send(&mut sink, &ClientMessage::Leave).await;
    let _ = sink.close().await;
    display.abort();

    println!("Disconnected from server.");
    println!("Goodbye!");
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>, AppError> {
    Ok(lines.next_line().await?)
}

async fn send(sink: &mut WsSink, msg: &ClientMessage) -> Result<(), AppError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json.into())).await?;
    Ok(())
}

/// Read frames until a server message arrives
async fn next_reply(stream: &mut SplitStream<WsStream>) -> Result<ServerMessage, AppError> {
    while let Some(frame) = stream.next().await {
        if let Message::Text(text) = frame? {
            return Ok(serde_json::from_str(&text)?);
        }
    }
    Err(AppError::ConnectionClosed)
}

/// Print everything the server pushes until the connection closes
async fn display_messages(mut stream: SplitStream<WsStream>) {
    loop {
        let msg = match next_reply(&mut stream).await {
            Ok(msg) => msg,
            Err(e) => {
                debug!("Receive loop ended: {}", e);
                break;
            }
        };
        match msg {
            ServerMessage::Notification { text } => println!("\r{}", text),
            ServerMessage::Users { users } => {
                let names: Vec<String> = users.iter().map(UserId::to_string).collect();
                println!("\rOnline: {}", names.join(", "));
            }
            ServerMessage::Error { message, .. } => println!("\rError: {}", message),
            ServerMessage::Left { .. } => break,
            _ => continue,
        }
        prompt();
    }
}
