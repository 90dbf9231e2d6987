//! Realtime Chat Session
//!
//! Owns one conversation's duplex channel: optimistic send with an HTTP
//! fallback, idempotent receive, typing presence, and read receipts. The
//! session is the single owner of its message list; UI surfaces read
//! snapshots and react to handler callbacks.
//!
//! # Send Path
//!
//! 1. An optimistic message (temporary id, `pending = true`, fresh
//!    idempotency key) is appended to the list before any network I/O.
//! 2. When connected, the message goes over the channel; the server echo
//!    carrying the same `client_key` later replaces the optimistic entry.
//! 3. When the channel is unavailable or the send fails, the HTTP fallback
//!    confirms (replace by temporary id) or rolls back (remove entirely).
//!
//! # State Machine
//!
//! `Disconnected → Connecting → Connected → {Error → Disconnected}`.
//! `disconnect()` is unconditional: it aborts the typing relay and receive
//! loop synchronously, closes the channel, and always lands in
//! `Disconnected`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::traits::{ApiError, ChatApi};
use crate::config::RealtimeConfig;
use crate::messages::{ChatMessage, ConnectionState, ConversationId, UserId};

use super::channel::{ChannelError, ChannelFrame, ChatChannel};
use super::typing::{TypingRelay, TypingTable};

/// Errors surfaced by session operations
#[derive(Debug, Error)]
pub enum ChatError {
    /// `connect` was called on a session that is not disconnected
    #[error("session already connected")]
    AlreadyConnected,

    /// The duplex channel failed
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The HTTP fallback failed
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Caller-supplied handlers for inbound session events
///
/// All handlers default to no-ops; set the ones you care about.
pub struct ChatHandlers {
    on_message: Box<dyn FnMut(ChatMessage) + Send>,
    on_typing: Box<dyn FnMut(UserId, bool) + Send>,
    on_messages_read: Box<dyn FnMut(UserId) + Send>,
    on_error: Box<dyn FnMut(ChatError) + Send>,
}

impl Default for ChatHandlers {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatHandlers {
    /// Create handlers that ignore every event
    #[must_use]
    pub fn new() -> Self {
        Self {
            on_message: Box::new(|_| {}),
            on_typing: Box::new(|_, _| {}),
            on_messages_read: Box::new(|_| {}),
            on_error: Box::new(|_| {}),
        }
    }

    /// Handle list changes delivered over the channel (appends and
    /// confirmed replacements)
    #[must_use]
    pub fn on_message(mut self, f: impl FnMut(ChatMessage) + Send + 'static) -> Self {
        self.on_message = Box::new(f);
        self
    }

    /// Handle remote typing reports
    #[must_use]
    pub fn on_typing(mut self, f: impl FnMut(UserId, bool) + Send + 'static) -> Self {
        self.on_typing = Box::new(f);
        self
    }

    /// Handle remote read receipts
    #[must_use]
    pub fn on_messages_read(mut self, f: impl FnMut(UserId) + Send + 'static) -> Self {
        self.on_messages_read = Box::new(f);
        self
    }

    /// Handle receive-loop failures
    #[must_use]
    pub fn on_error(mut self, f: impl FnMut(ChatError) + Send + 'static) -> Self {
        self.on_error = Box::new(f);
        self
    }
}

/// One conversation's realtime session
pub struct RealtimeChatSession {
    conversation_id: ConversationId,
    current_user: UserId,
    channel: Arc<dyn ChatChannel>,
    api: Arc<dyn ChatApi>,
    state: Arc<RwLock<ConnectionState>>,
    messages: Arc<Mutex<Vec<ChatMessage>>>,
    typing_table: Arc<TypingTable>,
    typing_relay: TypingRelay,
    recv_task: Mutex<Option<JoinHandle<()>>>,
    unread: Arc<AtomicU32>,
    config: RealtimeConfig,
}

impl RealtimeChatSession {
    /// Create a session for one conversation
    ///
    /// The session starts in `Disconnected`; `send` works immediately via
    /// the HTTP fallback.
    #[must_use]
    pub fn new(
        conversation_id: ConversationId,
        current_user: UserId,
        channel: Arc<dyn ChatChannel>,
        api: Arc<dyn ChatApi>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            conversation_id,
            current_user,
            channel,
            api,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            messages: Arc::new(Mutex::new(Vec::new())),
            typing_table: Arc::new(TypingTable::new(config.typing_quiet_window)),
            typing_relay: TypingRelay::new(),
            recv_task: Mutex::new(None),
            unread: Arc::new(AtomicU32::new(0)),
            config,
        }
    }

    /// The conversation this session owns
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Current connection state
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Snapshot of the message list
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }

    /// Messages received since the last `mark_read`
    #[must_use]
    pub fn unread_count(&self) -> u32 {
        self.unread.load(Ordering::SeqCst)
    }

    /// Whether `user_id` is currently reported as typing
    #[must_use]
    pub fn is_remote_typing(&self, user_id: &UserId) -> bool {
        self.typing_table.is_typing(user_id)
    }

    /// Register handlers and open the duplex channel
    ///
    /// Spawns the receive loop on success.
    ///
    /// # Errors
    ///
    /// - [`ChatError::AlreadyConnected`] when the session is not disconnected
    /// - [`ChatError::Channel`] when the channel cannot be established; the
    ///   session is left in `Error` until `disconnect` is called
    pub async fn connect(&self, handlers: ChatHandlers) -> Result<(), ChatError> {
        {
            let mut state = self.state.write();
            if *state != ConnectionState::Disconnected {
                return Err(ChatError::AlreadyConnected);
            }
            *state = ConnectionState::Connecting;
        }

        if let Err(e) = self.channel.connect().await {
            tracing::warn!(
                conversation_id = %self.conversation_id,
                error = %e,
                "Chat channel connect failed"
            );
            *self.state.write() = ConnectionState::Error;
            return Err(ChatError::Channel(e));
        }
        *self.state.write() = ConnectionState::Connected;
        tracing::debug!(conversation_id = %self.conversation_id, "Chat channel connected");

        let receive_loop = ReceiveLoop {
            channel: Arc::clone(&self.channel),
            state: Arc::clone(&self.state),
            messages: Arc::clone(&self.messages),
            typing_table: Arc::clone(&self.typing_table),
            unread: Arc::clone(&self.unread),
            current_user: self.current_user.clone(),
            handlers,
        };
        *self.recv_task.lock() = Some(tokio::spawn(receive_loop.run()));

        Ok(())
    }

    /// Tear the channel down unconditionally
    ///
    /// Aborts the typing relay and receive loop synchronously, then closes
    /// the channel and returns to `Disconnected`.
    pub async fn disconnect(&self) {
        self.typing_relay.cancel();
        if let Some(task) = self.recv_task.lock().take() {
            task.abort();
        }
        if let Err(e) = self.channel.disconnect().await {
            tracing::debug!(error = %e, "Chat channel disconnect failed");
        }
        *self.state.write() = ConnectionState::Disconnected;
        tracing::debug!(conversation_id = %self.conversation_id, "Chat session disconnected");
    }

    /// Send a message with optimistic local echo
    ///
    /// The optimistic entry is visible in [`messages`](Self::messages)
    /// before any network round trip. Returns the optimistic entry when the
    /// channel accepted the send (confirmation arrives later via echo) or
    /// the confirmed message when the HTTP fallback was used.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Api`] when the fallback fails; the optimistic
    /// entry has been removed by then.
    pub async fn send(&self, content: &str) -> Result<ChatMessage, ChatError> {
        let client_key = Uuid::new_v4().to_string();
        let optimistic = ChatMessage::optimistic(
            self.conversation_id.clone(),
            self.current_user.clone(),
            content,
            client_key.clone(),
        );
        self.messages.lock().push(optimistic.clone());

        if self.connection_state() == ConnectionState::Connected {
            let frame = ChannelFrame::Message {
                message: optimistic.clone(),
            };
            match self.channel.send(frame).await {
                Ok(()) => {
                    tracing::trace!(message_id = %optimistic.id, "Message sent over channel");
                    return Ok(optimistic);
                }
                Err(e) => {
                    tracing::debug!(
                        error = %e,
                        "Channel send failed, falling back to HTTP"
                    );
                }
            }
        }

        match self
            .api
            .send_message(&self.conversation_id, content, &client_key)
            .await
        {
            Ok(mut confirmed) => {
                confirmed.is_from_current_user = true;
                confirmed.pending = false;
                let mut list = self.messages.lock();
                if let Some(entry) = list.iter_mut().find(|m| m.id == optimistic.id) {
                    *entry = confirmed.clone();
                }
                Ok(confirmed)
            }
            Err(e) => {
                // No ghost messages: the failed optimistic entry disappears
                self.messages.lock().retain(|m| m.id != optimistic.id);
                tracing::warn!(error = %e, "Message send failed, rolled back optimistic entry");
                Err(ChatError::Api(e))
            }
        }
    }

    /// Report a local input change
    ///
    /// Relays the current typing state immediately when connected and
    /// debounces the automatic stopped-typing relay: it fires one quiet
    /// window after the *last* edit.
    pub async fn input_changed(&self, text: &str) {
        let is_typing = !text.trim().is_empty();
        self.typing_relay.cancel();

        if self.connection_state() == ConnectionState::Connected {
            let frame = ChannelFrame::Typing {
                conversation_id: self.conversation_id.clone(),
                user_id: self.current_user.clone(),
                is_typing,
            };
            if let Err(e) = self.channel.send(frame).await {
                tracing::debug!(error = %e, "Typing relay failed");
            }
        }

        if is_typing {
            let channel = Arc::clone(&self.channel);
            let conversation_id = self.conversation_id.clone();
            let user_id = self.current_user.clone();
            self.typing_relay
                .schedule_stop(self.config.typing_quiet_window, async move {
                    let frame = ChannelFrame::Typing {
                        conversation_id,
                        user_id,
                        is_typing: false,
                    };
                    if let Err(e) = channel.send(frame).await {
                        tracing::debug!(error = %e, "Stopped-typing relay failed");
                    }
                });
        }
    }

    /// Mark the conversation read and reset the unread counter
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Api`] when the call fails; the local counter is
    /// left untouched in that case.
    pub async fn mark_read(&self) -> Result<(), ChatError> {
        self.api.mark_read(&self.conversation_id).await?;
        self.unread.store(0, Ordering::SeqCst);
        Ok(())
    }
}

/// The spawned receive loop of one session
struct ReceiveLoop {
    channel: Arc<dyn ChatChannel>,
    state: Arc<RwLock<ConnectionState>>,
    messages: Arc<Mutex<Vec<ChatMessage>>>,
    typing_table: Arc<TypingTable>,
    unread: Arc<AtomicU32>,
    current_user: UserId,
    handlers: ChatHandlers,
}

impl ReceiveLoop {
    async fn run(mut self) {
        loop {
            match self.channel.recv().await {
                Ok(frame) => self.handle_frame(frame),
                Err(ChannelError::ConnectionClosed) => {
                    tracing::debug!("Chat channel closed by peer");
                    *self.state.write() = ConnectionState::Disconnected;
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Chat channel receive failed");
                    *self.state.write() = ConnectionState::Error;
                    (self.handlers.on_error)(ChatError::Channel(e));
                    break;
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: ChannelFrame) {
        match frame {
            ChannelFrame::Message { message } => self.handle_message(message),
            ChannelFrame::Typing {
                user_id, is_typing, ..
            } => {
                if user_id != self.current_user {
                    self.typing_table.record(user_id.clone(), is_typing);
                    (self.handlers.on_typing)(user_id, is_typing);
                }
            }
            ChannelFrame::Read { user_id, .. } => {
                if user_id != self.current_user {
                    let now = Utc::now();
                    let mut list = self.messages.lock();
                    for message in list
                        .iter_mut()
                        .filter(|m| m.is_from_current_user && m.read_at.is_none())
                    {
                        message.read_at = Some(now);
                    }
                    drop(list);
                    (self.handlers.on_messages_read)(user_id);
                }
            }
        }
    }

    fn handle_message(&mut self, mut message: ChatMessage) {
        message.is_from_current_user = message.sender_id == self.current_user;

        if message.is_from_current_user {
            // Server echo of our own send: reconcile by idempotency key,
            // otherwise drop (the sender already holds its copy)
            let confirmed = {
                let mut list = self.messages.lock();
                message.client_key.clone().and_then(|key| {
                    list.iter_mut()
                        .find(|m| m.pending && m.client_key.as_deref() == Some(key.as_str()))
                        .map(|entry| {
                            message.pending = false;
                            *entry = message.clone();
                            message.clone()
                        })
                })
            };
            if let Some(confirmed) = confirmed {
                tracing::trace!(message_id = %confirmed.id, "Optimistic entry confirmed by echo");
                (self.handlers.on_message)(confirmed);
            }
            return;
        }

        {
            let mut list = self.messages.lock();
            if list.iter().any(|m| m.id == message.id) {
                tracing::trace!(message_id = %message.id, "Dropping duplicate inbound message");
                return;
            }
            list.push(message.clone());
        }
        self.unread.fetch_add(1, Ordering::SeqCst);
        (self.handlers.on_message)(message);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::chat::in_process::InProcessChannel;
    use crate::messages::MessageId;

    pub(crate) struct ScriptedChatApi {
        responses: Mutex<VecDeque<Result<ChatMessage, ApiError>>>,
    }

    impl ScriptedChatApi {
        pub(crate) fn new(responses: Vec<Result<ChatMessage, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait]
    impl ChatApi for ScriptedChatApi {
        async fn send_message(
            &self,
            conversation_id: &ConversationId,
            content: &str,
            client_key: &str,
        ) -> Result<ChatMessage, ApiError> {
            self.responses.lock().pop_front().unwrap_or_else(|| {
                Ok(ChatMessage {
                    id: MessageId(format!("msg_{client_key}")),
                    conversation_id: conversation_id.clone(),
                    sender_id: UserId("user_1".to_string()),
                    content: content.to_string(),
                    created_at: Utc::now(),
                    read_at: None,
                    is_from_current_user: false,
                    pending: false,
                    client_key: Some(client_key.to_string()),
                })
            })
        }

        async fn mark_read(&self, _conversation_id: &ConversationId) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn session_with_channel() -> (
        RealtimeChatSession,
        tokio::sync::mpsc::Receiver<ChannelFrame>,
        tokio::sync::mpsc::Sender<ChannelFrame>,
    ) {
        let (channel, outbound, inbound) = InProcessChannel::new_pair();
        let session = RealtimeChatSession::new(
            ConversationId("conv_1".to_string()),
            UserId("user_1".to_string()),
            Arc::new(channel),
            ScriptedChatApi::new(Vec::new()),
            RealtimeConfig::default(),
        );
        (session, outbound, inbound)
    }

    fn inbound_message(id: &str, sender: &str, content: &str) -> ChannelFrame {
        ChannelFrame::Message {
            message: ChatMessage {
                id: MessageId(id.to_string()),
                conversation_id: ConversationId("conv_1".to_string()),
                sender_id: UserId(sender.to_string()),
                content: content.to_string(),
                created_at: Utc::now(),
                read_at: None,
                is_from_current_user: false,
                pending: false,
                client_key: None,
            },
        }
    }

    #[tokio::test]
    async fn test_connect_disconnect_state_transitions() {
        let (session, _outbound, _inbound) = session_with_channel();
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);

        session.connect(ChatHandlers::new()).await.unwrap();
        assert_eq!(session.connection_state(), ConnectionState::Connected);

        let again = session.connect(ChatHandlers::new()).await;
        assert!(matches!(again, Err(ChatError::AlreadyConnected)));

        session.disconnect().await;
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_over_channel_keeps_pending_entry() {
        let (session, mut outbound, _inbound) = session_with_channel();
        session.connect(ChatHandlers::new()).await.unwrap();

        let sent = session.send("hello chef").await.unwrap();
        assert!(sent.pending);

        let frame = outbound.recv().await.unwrap();
        match frame {
            ChannelFrame::Message { message } => {
                assert_eq!(message.content, "hello chef");
                assert_eq!(message.client_key, sent.client_key);
            }
            other => panic!("unexpected frame: {other:?}"),
        }

        let list = session.messages();
        assert_eq!(list.len(), 1);
        assert!(list[0].pending);
    }

    #[tokio::test]
    async fn test_echo_reconciles_optimistic_entry() {
        let (session, mut outbound, inbound) = session_with_channel();
        session.connect(ChatHandlers::new()).await.unwrap();

        let sent = session.send("hello chef").await.unwrap();
        let _ = outbound.recv().await;

        // Server echo: confirmed copy with the same client_key
        let echo = ChatMessage {
            id: MessageId("msg_42".to_string()),
            conversation_id: ConversationId("conv_1".to_string()),
            sender_id: UserId("user_1".to_string()),
            content: "hello chef".to_string(),
            created_at: Utc::now(),
            read_at: None,
            is_from_current_user: false,
            pending: false,
            client_key: sent.client_key.clone(),
        };
        inbound
            .send(ChannelFrame::Message { message: echo })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let list = session.messages();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, MessageId("msg_42".to_string()));
        assert!(!list[0].pending);
        assert!(list[0].is_from_current_user);
    }

    #[tokio::test]
    async fn test_own_message_without_key_match_is_dropped() {
        let (session, _outbound, inbound) = session_with_channel();
        session.connect(ChatHandlers::new()).await.unwrap();

        inbound
            .send(inbound_message("msg_9", "user_1", "stale echo"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(session.messages().is_empty());
        assert_eq!(session.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_inbound_read_receipt_marks_own_messages() {
        let (session, mut outbound, inbound) = session_with_channel();
        session.connect(ChatHandlers::new()).await.unwrap();

        session.send("dinner at 7?").await.unwrap();
        let _ = outbound.recv().await;

        inbound
            .send(ChannelFrame::Read {
                conversation_id: ConversationId("conv_1".to_string()),
                user_id: UserId("user_2".to_string()),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let list = session.messages();
        assert!(list[0].read_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_read_resets_counter() {
        let (session, _outbound, inbound) = session_with_channel();
        session.connect(ChatHandlers::new()).await.unwrap();

        inbound
            .send(inbound_message("msg_1", "user_2", "hi"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(session.unread_count(), 1);

        session.mark_read().await.unwrap();
        assert_eq!(session.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_typing_report_tracked() {
        let (session, _outbound, inbound) = session_with_channel();
        session.connect(ChatHandlers::new()).await.unwrap();

        inbound
            .send(ChannelFrame::Typing {
                conversation_id: ConversationId("conv_1".to_string()),
                user_id: UserId("user_2".to_string()),
                is_typing: true,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(session.is_remote_typing(&UserId("user_2".to_string())));
        assert!(!session.is_remote_typing(&UserId("user_3".to_string())));
    }
}
