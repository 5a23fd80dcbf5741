//! Multi-user WebSocket Chat Broker Library
//!
//! Clients join under a unique user id, exchange text messages, and get
//! the full chat history replayed on request.
//!
//! # Features
//! - Unique user ids with join/leave announcements
//! - Append-only message log with history replay
//! - Fan-out to every other user, with a `[You]` echo for the sender
//! - Bounded per-user mailboxes; slow readers lose notifications instead
//!   of stalling everyone else
//! - Push delivery of mailbox contents over the WebSocket after `listen`
//!
//! # Architecture
//! - `Coordinator` owns the registry and log behind one `RwLock` and
//!   queues a broadcast request for every state change
//! - `Broadcaster` is the single consumer of that bounded queue and
//!   offers each notification to the recipients' mailboxes
//! - Each connection has a `handler` task that binds one user id and
//!   forwards the user's mailbox to the socket
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use chat_broker::{serve, Coordinator, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let listener = TcpListener::bind(&config.addr).await.unwrap();
//!     let (coordinator, broadcaster) = Coordinator::new(&config);
//!
//!     tokio::spawn(broadcaster.run());
//!     serve(listener, coordinator).await;
//! }
//! ```

pub mod broadcaster;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod handler;
pub mod log;
pub mod message;
pub mod registry;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use broadcaster::{BroadcastRequest, Broadcaster};
pub use command::Command;
pub use config::ServerConfig;
pub use coordinator::Coordinator;
pub use error::{AppError, SendError};
pub use event::{ChatEvent, EventKind};
pub use handler::{handle_connection, serve};
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use session::{Inbox, Mailbox, Session};
pub use types::{ConnectionId, UserId};
