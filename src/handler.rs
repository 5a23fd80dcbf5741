//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, binding
//! the connection to a user id, request dispatch to the coordinator, and
//! streaming the user's mailbox back over the socket.

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::coordinator::Coordinator;
use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::session::Inbox;
use crate::types::{ConnectionId, UserId};

/// Buffered server -> client frames per connection
const OUTBOUND_BUFFER_SIZE: usize = 32;

/// Accept connections forever, one handler task each
pub async fn serve(listener: TcpListener, coordinator: Coordinator) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let coordinator = coordinator.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, coordinator).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Performs WebSocket handshake, serves requests until the peer goes
/// away, then leaves the chat on behalf of whoever was bound.
pub async fn handle_connection(stream: TcpStream, coordinator: Coordinator) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection_id = ConnectionId::new();
    info!("Connection {} opened from {}", connection_id, peer_addr);

    // Replies and notifications share one outbound channel
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER_SIZE);

    // Write task (ServerMessage -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
        debug!("Write task ended for connection");

        let _ = ws_sender.close().await;
    });
    let mut write_done = false;

    let mut connection = Connection::new(connection_id, coordinator, out_tx);

    // Read loop (WebSocket -> Coordinator)
    loop {
        tokio::select! {
            frame = ws_receiver.next() => {
                let Some(frame) = frame else {
                    debug!("Connection {} stream ended", connection_id);
                    break;
                };
                match frame {
                    Ok(Message::Text(text)) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(request) => connection.dispatch(request).await,
                            Err(e) => {
                                warn!("Invalid JSON from {}: {}", connection_id, e);
                                AppError::Json(e).into()
                            }
                        };
                        if connection.reply(reply).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Connection {} sent close frame", connection_id);
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                        // Pong is handled automatically by tungstenite
                    }
                    Ok(_) => {
                        // Binary or other message types - ignore
                    }
                    Err(e) => {
                        error!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
            _ = &mut write_task => {
                debug!("Write task completed for {}", connection_id);
                write_done = true;
                break;
            }
        }
    }

    connection.disconnect().await;
    drop(connection);

    // Flush whatever is still queued, then the writer closes the socket
    if !write_done {
        let _ = write_task.await;
    }

    info!("Connection {} closed", connection_id);

    Ok(())
}

/// Per-connection state: the bound user, if any
struct Connection {
    id: ConnectionId,
    coordinator: Coordinator,
    outbound: mpsc::Sender<ServerMessage>,
    user: Option<UserId>,
}

impl Connection {
    fn new(id: ConnectionId, coordinator: Coordinator, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            coordinator,
            outbound,
            user: None,
        }
    }

    async fn reply(&self, msg: ServerMessage) -> Result<(), AppError> {
        self.outbound
            .send(msg)
            .await
            .map_err(|_| AppError::ChannelSend)
    }

    async fn dispatch(&mut self, request: ClientMessage) -> ServerMessage {
        match self.try_dispatch(request).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!("Request from {} failed: {}", self.id, e);
                e.into()
            }
        }
    }

    async fn try_dispatch(&mut self, request: ClientMessage) -> Result<ServerMessage, AppError> {
        match request {
            ClientMessage::Join { user_id } => {
                if let Some(bound) = &self.user {
                    return Err(AppError::AlreadyJoined(bound.clone()));
                }
                let user_id = UserId::parse(user_id)?;
                let text = self.coordinator.join(&user_id).await?;
                info!("Connection {} bound to {}", self.id, user_id);
                self.user = Some(user_id);
                Ok(ServerMessage::Welcome { text })
            }
            ClientMessage::SendMessage { content } => {
                let user_id = self.user.as_ref().ok_or(AppError::NoSession)?;
                self.coordinator.send_message(user_id, content).await?;
                Ok(ServerMessage::Sent { ok: true })
            }
            ClientMessage::GetHistory { user_id } => {
                let user_id = match (&self.user, user_id) {
                    (Some(bound), _) => bound.clone(),
                    (None, raw) => UserId::parse(raw.unwrap_or_default())?,
                };
                let events = self.coordinator.history(&user_id).await;
                Ok(ServerMessage::History { events })
            }
            ClientMessage::Leave => {
                // Stay bound until the coordinator has really dropped the session
                if let Some(user_id) = &self.user {
                    self.coordinator.leave(user_id).await?;
                }
                self.user = None;
                Ok(ServerMessage::Left { ok: true })
            }
            ClientMessage::Listen => {
                if let Some(user_id) = &self.user {
                    if let Some(inbox) = self.coordinator.listen(user_id).await {
                        self.forward(inbox);
                    }
                }
                Ok(ServerMessage::Listening { ok: true })
            }
            ClientMessage::Users => {
                let users = self.coordinator.online_users().await;
                Ok(ServerMessage::Users { users })
            }
        }
    }

    /// Stream mailbox contents to the socket until the session ends
    fn forward(&self, mut inbox: Inbox) {
        let outbound = self.outbound.clone();
        let id = self.id;
        tokio::spawn(async move {
            while let Some(text) = inbox.recv().await {
                if outbound.send(ServerMessage::Notification { text }).await.is_err() {
                    break;
                }
            }
            debug!("Forwarder ended for {}", id);
        });
    }

    /// Leave on behalf of the bound user, if any
    async fn disconnect(&mut self) {
        let Some(user_id) = self.user.take() else {
            return;
        };
        if let Err(e) = self.coordinator.leave(&user_id).await {
            warn!("Failed to leave {} on disconnect: {}", user_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    use super::*;
    use crate::config::ServerConfig;
    use crate::event::ChatEvent;
    use crate::message::ErrorCode;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (coordinator, broadcaster) = Coordinator::new(&ServerConfig::default());
        tokio::spawn(broadcaster.run());
        tokio::spawn(serve(listener, coordinator));
        format!("ws://{}", addr)
    }

    async fn connect(url: &str) -> Client {
        let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        ws
    }

    async fn send(ws: &mut Client, request: ClientMessage) {
        let json = serde_json::to_string(&request).unwrap();
        ws.send(Message::Text(json.into())).await.unwrap();
    }

    async fn next_message(ws: &mut Client) -> ServerMessage {
        let read = async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return serde_json::from_str::<ServerMessage>(&text).unwrap();
                    }
                    Some(Ok(_)) => continue,
                    other => panic!("Connection ended: {:?}", other),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(2), read).await.unwrap()
    }

    /// Next reply that is not a mailbox notification
    async fn next_reply(ws: &mut Client) -> ServerMessage {
        loop {
            match next_message(ws).await {
                ServerMessage::Notification { .. } => continue,
                reply => return reply,
            }
        }
    }

    async fn expect_notification(ws: &mut Client, expected: &str) {
        loop {
            if let ServerMessage::Notification { text } = next_message(ws).await {
                if text == expected {
                    return;
                }
            }
        }
    }

    async fn join(ws: &mut Client, name: &str) {
        send(ws, ClientMessage::Join { user_id: name.to_string() }).await;
        assert!(matches!(next_reply(ws).await, ServerMessage::Welcome { .. }));
        send(ws, ClientMessage::Listen).await;
        assert_eq!(next_reply(ws).await, ServerMessage::Listening { ok: true });
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let url = start_server().await;
        let mut alice = connect(&url).await;
        let mut bob = connect(&url).await;

        join(&mut alice, "alice").await;
        join(&mut bob, "bob").await;
        expect_notification(&mut alice, "--> User bob joined").await;

        send(&mut bob, ClientMessage::SendMessage { content: "hi".to_string() }).await;

        // The echo and the ack travel independently, so accept either order
        let mut acked = false;
        let mut echoed = false;
        while !(acked && echoed) {
            match next_message(&mut bob).await {
                ServerMessage::Sent { ok } => acked = ok,
                ServerMessage::Notification { text } if text == "[You] hi" => echoed = true,
                ServerMessage::Notification { text } => assert_ne!(text, "[bob] hi"),
                other => panic!("Unexpected reply: {:?}", other),
            }
        }

        expect_notification(&mut alice, "[bob] hi").await;
    }

    #[tokio::test]
    async fn test_history_replay() {
        let url = start_server().await;
        let mut alice = connect(&url).await;
        join(&mut alice, "alice").await;

        let mut reader = connect(&url).await;
        send(&mut reader, ClientMessage::GetHistory { user_id: Some("reader".to_string()) }).await;

        let alice_id = UserId::parse("alice").unwrap();
        assert_eq!(
            next_reply(&mut reader).await,
            ServerMessage::History {
                events: vec![ChatEvent::join(&alice_id)]
            }
        );
    }

    #[tokio::test]
    async fn test_errors_reported() {
        let url = start_server().await;
        let mut first = connect(&url).await;
        let mut second = connect(&url).await;

        send(&mut first, ClientMessage::SendMessage { content: "early".to_string() }).await;
        assert!(matches!(
            next_reply(&mut first).await,
            ServerMessage::Error { code: ErrorCode::NotJoined, .. }
        ));

        send(&mut first, ClientMessage::Join { user_id: "  ".to_string() }).await;
        assert!(matches!(
            next_reply(&mut first).await,
            ServerMessage::Error { code: ErrorCode::InvalidUserId, .. }
        ));

        join(&mut first, "carol").await;
        send(&mut second, ClientMessage::Join { user_id: "carol".to_string() }).await;
        assert!(matches!(
            next_reply(&mut second).await,
            ServerMessage::Error { code: ErrorCode::AlreadyJoined, .. }
        ));

        second.send(Message::Text("not json".into())).await.unwrap();
        assert!(matches!(
            next_reply(&mut second).await,
            ServerMessage::Error { code: ErrorCode::InvalidMessage, .. }
        ));
    }

    #[tokio::test]
    async fn test_disconnect_leaves() {
        let url = start_server().await;
        let mut alice = connect(&url).await;
        join(&mut alice, "alice").await;

        let mut bob = connect(&url).await;
        join(&mut bob, "bob").await;
        bob.close(None).await.unwrap();

        expect_notification(&mut alice, "<-- User bob left").await;

        send(&mut alice, ClientMessage::Users).await;
        let alice_id = UserId::parse("alice").unwrap();
        assert_eq!(
            next_reply(&mut alice).await,
            ServerMessage::Users { users: vec![alice_id] }
        );
    }

    #[tokio::test]
    async fn test_leave_then_rejoin_same_connection() {
        let url = start_server().await;
        let mut ws = connect(&url).await;
        join(&mut ws, "dave").await;

        send(&mut ws, ClientMessage::Leave).await;
        assert_eq!(next_reply(&mut ws).await, ServerMessage::Left { ok: true });

        join(&mut ws, "dave").await;
    }

    #[tokio::test]
    async fn test_failed_leave_keeps_binding() {
        let (coordinator, broadcaster) = Coordinator::new(&ServerConfig::default());
        let (out_tx, _out_rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
        let mut connection = Connection::new(ConnectionId::new(), coordinator.clone(), out_tx);
        let erin = UserId::parse("erin").unwrap();

        let reply = connection
            .dispatch(ClientMessage::Join { user_id: "erin".to_string() })
            .await;
        assert!(matches!(reply, ServerMessage::Welcome { .. }));

        // Without a fan-out loop the coordinator cannot accept the leave
        drop(broadcaster);
        let reply = connection.dispatch(ClientMessage::Leave).await;

        assert!(matches!(
            reply,
            ServerMessage::Error { code: ErrorCode::Internal, .. }
        ));
        assert_eq!(connection.user.as_ref(), Some(&erin));
        assert_eq!(coordinator.online_users().await, vec![erin]);
    }
}
