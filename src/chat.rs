//! Chat Session Controller: optimistic send, transport call, authoritative reload.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AidError;
use crate::locale;
use crate::pipeline::DocumentContext;
use crate::schema::{ChatSession, Message, Role, DEFAULT_CHAT_TITLE};
use crate::services::{ChatRequest, ChatTransport, HistoryEntry};
use crate::store::ChatStore;

/// Messages of prior context sent with each question.
const HISTORY_LEN: usize = 10;

/// State owned by one chat view.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatViewState {
    pub user_id: Option<String>,
    pub active_chat_id: Option<String>,
    pub messages: Vec<Message>,
    pub busy: bool,
    #[serde(skip)]
    pub document_context: Option<DocumentContext>,
}

/// What a send did, for the view to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendOutcome {
    pub chat_id: Option<String>,
    pub delivered: bool,
    /// Transient notification, if any.
    pub notice: Option<&'static str>,
}

pub struct ChatSessionController {
    chats: Arc<dyn ChatStore>,
    transport: Arc<dyn ChatTransport>,
    state: ChatViewState,
}

impl ChatSessionController {
    pub fn new(
        chats: Arc<dyn ChatStore>,
        transport: Arc<dyn ChatTransport>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            chats,
            transport,
            state: ChatViewState {
                user_id,
                ..Default::default()
            },
        }
    }

    pub fn state(&self) -> &ChatViewState {
        &self.state
    }

    pub fn into_state(self) -> ChatViewState {
        self.state
    }

    /// Forward `context` with every following send until cleared.
    pub fn set_document_context(&mut self, context: Option<DocumentContext>) {
        self.state.document_context = context;
    }

    fn user(&self) -> Result<&str, AidError> {
        self.state.user_id.as_deref().ok_or(AidError::Unauthenticated)
    }

    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>, AidError> {
        let user_id = self.user()?;
        Ok(self.chats.list_chats(user_id).await?)
    }

    /// Make `chat_id` the active session and load its transcript.
    pub async fn open(&mut self, chat_id: &str) -> Result<(), AidError> {
        let user_id = self.user()?;
        self.chats
            .get_chat(user_id, chat_id)
            .await?
            .ok_or_else(|| AidError::NotFound(format!("chat {}", chat_id)))?;
        let messages = self.chats.list_messages(chat_id).await?;
        self.state.active_chat_id = Some(chat_id.to_string());
        self.state.messages = messages;
        Ok(())
    }

    /// Replace the transcript with the persisted one.
    pub async fn reload(&mut self) -> Result<(), AidError> {
        if let Some(chat_id) = self.state.active_chat_id.clone() {
            self.state.messages = self.chats.list_messages(&chat_id).await?;
        }
        Ok(())
    }

    /// Deselect; the next send creates a session.
    pub fn new_session(&mut self) {
        self.state.active_chat_id = None;
        self.state.messages.clear();
    }

    pub async fn rename(&self, chat_id: &str, title: &str) -> Result<(), AidError> {
        let user_id = self.user()?;
        let title = title.trim();
        if title.is_empty() {
            return Err(AidError::BadRequest("title must not be empty".into()));
        }
        Ok(self.chats.rename_chat(user_id, chat_id, title).await?)
    }

    pub async fn delete(&mut self, chat_id: &str) -> Result<(), AidError> {
        let user_id = self.user()?;
        self.chats.delete_chat(user_id, chat_id).await?;
        if self.state.active_chat_id.as_deref() == Some(chat_id) {
            self.new_session();
        }
        Ok(())
    }

    /// Send `text` in the active session, creating one first when none is selected.
    ///
    /// Only a missing user is an error. Every other failure is reported
    /// through the outcome's notice, and `busy` is cleared on every path.
    pub async fn send(&mut self, text: &str) -> Result<SendOutcome, AidError> {
        let user_id = self.user()?.to_string();
        let text = text.trim();
        if text.is_empty() || self.state.busy {
            return Ok(SendOutcome {
                chat_id: self.state.active_chat_id.clone(),
                delivered: false,
                notice: None,
            });
        }

        let chat_id = match self.state.active_chat_id.clone() {
            Some(id) => id,
            None => match self.chats.create_chat(&user_id, DEFAULT_CHAT_TITLE).await {
                Ok(chat) => {
                    info!("Started chat {} for user {}", chat.id, user_id);
                    self.state.active_chat_id = Some(chat.id.clone());
                    self.state.messages.clear();
                    chat.id
                }
                Err(e) => {
                    warn!("Could not create chat for user {}: {}", user_id, e);
                    return Ok(SendOutcome {
                        chat_id: None,
                        delivered: false,
                        notice: Some(locale::CHAT_CREATE_FAILED),
                    });
                }
            },
        };

        let history_start = self.state.messages.len().saturating_sub(HISTORY_LEN);
        let chat_history = self.state.messages[history_start..]
            .iter()
            .map(|m| HistoryEntry {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();

        self.state
            .messages
            .push(Message::local("temp", &chat_id, Role::User, text));
        self.state.busy = true;

        let request = ChatRequest {
            message: text.to_string(),
            chat_history,
            chat_id: Some(chat_id.clone()),
            user_id: Some(user_id),
            document_context: self.state.document_context.as_ref().map(|c| c.render()),
        };
        let sent = self.transport.send(&request).await;

        let outcome = match sent {
            Ok(reply) => {
                match self.chats.list_messages(&chat_id).await {
                    Ok(messages) => self.state.messages = messages,
                    Err(e) => {
                        warn!("Reload of chat {} failed: {}", chat_id, e);
                        self.state.messages.push(Message::local(
                            "local",
                            &chat_id,
                            Role::Assistant,
                            reply.answer,
                        ));
                    }
                }
                debug!("Chat {} now has {} messages", chat_id, self.state.messages.len());
                SendOutcome {
                    chat_id: Some(chat_id),
                    delivered: true,
                    notice: None,
                }
            }
            Err(e) => {
                warn!("Chat send failed in {}: {}", chat_id, e);
                self.state.messages.push(Message::local(
                    "error",
                    &chat_id,
                    Role::Assistant,
                    locale::CHAT_APOLOGY,
                ));
                SendOutcome {
                    chat_id: Some(chat_id),
                    delivered: false,
                    notice: Some(locale::CHAT_SEND_FAILED),
                }
            }
        };

        self.state.busy = false;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::dify::{RagAnswer, RagBackend, RagQuery};
    use crate::functions::rag_chat::LocalChatTransport;
    use crate::gateway::GatewayError;
    use crate::schema::{ChatSession, NewMessage};
    use crate::services::ChatReply;
    use crate::store::memory::MemoryStore;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedRag(&'static str);

    #[async_trait]
    impl RagBackend for FixedRag {
        async fn ask(&self, _query: RagQuery) -> Result<RagAnswer, GatewayError> {
            Ok(RagAnswer {
                answer: self.0.to_string(),
                sources: Vec::new(),
            })
        }
    }

    /// Records requests and checks the session exists before answering.
    struct RecordingTransport {
        store: Arc<MemoryStore>,
        fail: bool,
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn send(&self, request: &ChatRequest) -> Result<ChatReply, AidError> {
            self.seen.lock().unwrap().push(request.clone());
            let chat_id = request.chat_id.clone().unwrap();
            let user_id = request.user_id.clone().unwrap();
            assert!(self.store.get_chat(&user_id, &chat_id).await.unwrap().is_some());
            if self.fail {
                return Err(AidError::UpstreamUnavailable("down".into()));
            }
            Ok(ChatReply {
                answer: "ok".into(),
                sources: Vec::new(),
            })
        }
    }

    fn recording(store: &Arc<MemoryStore>, fail: bool) -> Arc<RecordingTransport> {
        Arc::new(RecordingTransport {
            store: store.clone(),
            fail,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn with_rag(store: &Arc<MemoryStore>, answer: &'static str) -> ChatSessionController {
        let transport = Arc::new(LocalChatTransport::new(Arc::new(FixedRag(answer)), store.clone()));
        ChatSessionController::new(store.clone(), transport, Some("u1".into()))
    }

    #[tokio::test]
    async fn test_first_question_creates_named_session() {
        let store = Arc::new(MemoryStore::new());
        let mut controller = with_rag(&store, "करार हेर्नुहोस्।");

        let outcome = controller.send("म कति तलब पाउनुपर्छ?").await.unwrap();
        assert!(outcome.delivered);
        assert!(outcome.notice.is_none());
        let chat_id = outcome.chat_id.unwrap();
        assert_eq!(controller.state().active_chat_id.as_deref(), Some(chat_id.as_str()));

        let sessions = controller.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, chat_id);
        assert_eq!(sessions[0].title, "म कति तलब पाउनुपर्छ?");

        let messages = &controller.state().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "म कति तलब पाउनुपर्छ?");
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages.iter().all(|m| !m.is_local()));
        assert!(!controller.state().busy);
    }

    #[tokio::test]
    async fn test_no_duplicate_after_reload() {
        let store = Arc::new(MemoryStore::new());
        let mut controller = with_rag(&store, "उत्तर");

        controller.send("पहिलो").await.unwrap();
        controller.send("दोस्रो").await.unwrap();

        let contents: Vec<&str> = controller
            .state()
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["पहिलो", "उत्तर", "दोस्रो", "उत्तर"]);
        let times: Vec<&String> = controller.state().messages.iter().map(|m| &m.created_at).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));

        let before = controller.state().messages.clone();
        controller.reload().await.unwrap();
        assert_eq!(controller.state().messages, before);
    }

    #[tokio::test]
    async fn test_session_created_before_transport_call() {
        let store = Arc::new(MemoryStore::new());
        let transport = recording(&store, false);
        let mut controller =
            ChatSessionController::new(store.clone(), transport.clone(), Some("u1".into()));

        let outcome = controller.send("hello").await.unwrap();
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].chat_id, outcome.chat_id);
        assert_eq!(seen[0].user_id.as_deref(), Some("u1"));
        assert!(seen[0].chat_history.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_appends_apology() {
        let store = Arc::new(MemoryStore::new());
        let mut controller =
            ChatSessionController::new(store.clone(), recording(&store, true), Some("u1".into()));

        let outcome = controller.send("hello").await.unwrap();
        assert!(!outcome.delivered);
        assert_eq!(outcome.notice, Some(locale::CHAT_SEND_FAILED));

        let messages = &controller.state().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        assert!(messages[0].id.starts_with("temp-"));
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, locale::CHAT_APOLOGY);
        assert!(messages[1].id.starts_with("error-"));
        assert!(!controller.state().busy);
    }

    #[tokio::test]
    async fn test_history_is_last_ten_before_the_new_message() {
        let store = Arc::new(MemoryStore::new());
        let chat = store.create_chat("u1", "t").await.unwrap();
        for i in 0..12 {
            store
                .insert_message(NewMessage {
                    chat_id: chat.id.clone(),
                    role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                    content: format!("m{}", i),
                    metadata: None,
                })
                .await
                .unwrap();
        }
        let transport = recording(&store, false);
        let mut controller =
            ChatSessionController::new(store.clone(), transport.clone(), Some("u1".into()));
        controller.open(&chat.id).await.unwrap();

        controller.send("new").await.unwrap();
        let seen = transport.seen.lock().unwrap();
        let history: Vec<&str> = seen[0].chat_history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0], "m2");
        assert_eq!(history[9], "m11");
    }

    #[tokio::test]
    async fn test_missing_user_and_blank_text() {
        let store = Arc::new(MemoryStore::new());
        let transport = recording(&store, false);
        let mut anonymous = ChatSessionController::new(store.clone(), transport.clone(), None);
        assert!(matches!(anonymous.send("hi").await, Err(AidError::Unauthenticated)));

        let mut controller =
            ChatSessionController::new(store.clone(), transport.clone(), Some("u1".into()));
        let outcome = controller.send("   ").await.unwrap();
        assert!(!outcome.delivered);
        assert!(controller.state().messages.is_empty());
        assert!(store.list_chats("u1").await.unwrap().is_empty());
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_document_context_is_forwarded_not_rendered() {
        let store = Arc::new(MemoryStore::new());
        let transport = recording(&store, false);
        let mut controller =
            ChatSessionController::new(store.clone(), transport.clone(), Some("u1".into()));
        controller.set_document_context(Some(DocumentContext {
            filename: "visa.jpg".into(),
            text: "Visa text".into(),
            analysis: crate::schema::DocumentAnalysis::unstructured(Some("visa"), "भिसा"),
        }));

        controller.send("यो भिसा ठीक छ?").await.unwrap();
        let seen = transport.seen.lock().unwrap();
        assert!(seen[0].document_context.as_deref().unwrap().contains("Visa text"));
        // recording transport persists nothing, so the reload is empty
        assert!(controller.state().messages.is_empty());
    }

    /// Chat store whose creation always fails.
    struct NoCreate;

    #[async_trait]
    impl ChatStore for NoCreate {
        async fn create_chat(&self, _: &str, _: &str) -> Result<ChatSession, StoreError> {
            Err(StoreError::Decode("insert chats returned no row".into()))
        }
        async fn get_chat(&self, _: &str, _: &str) -> Result<Option<ChatSession>, StoreError> {
            Ok(None)
        }
        async fn list_chats(&self, _: &str) -> Result<Vec<ChatSession>, StoreError> {
            Ok(Vec::new())
        }
        async fn rename_chat(&self, _: &str, _: &str, _: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete_chat(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn touch_chat(&self, _: &str, _: Option<&str>) -> Result<(), StoreError> {
            Ok(())
        }
        async fn insert_message(&self, _: NewMessage) -> Result<Message, StoreError> {
            Err(StoreError::Decode("unused".into()))
        }
        async fn list_messages(&self, _: &str) -> Result<Vec<Message>, StoreError> {
            Err(StoreError::Decode("offline".into()))
        }
        async fn count_messages(&self, _: &str, _: usize) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_session_creation_failure_blocks_send() {
        let store = Arc::new(MemoryStore::new());
        let transport = recording(&store, false);
        let mut controller =
            ChatSessionController::new(Arc::new(NoCreate), transport.clone(), Some("u1".into()));

        let outcome = controller.send("hello").await.unwrap();
        assert_eq!(outcome.notice, Some(locale::CHAT_CREATE_FAILED));
        assert!(outcome.chat_id.is_none());
        assert!(controller.state().messages.is_empty());
        assert!(transport.seen.lock().unwrap().is_empty());
        assert!(!controller.state().busy);
    }

    #[tokio::test]
    async fn test_reload_failure_still_clears_busy() {
        struct Answering;

        #[async_trait]
        impl ChatTransport for Answering {
            async fn send(&self, _: &ChatRequest) -> Result<ChatReply, AidError> {
                Ok(ChatReply {
                    answer: "उत्तर".into(),
                    sources: Vec::new(),
                })
            }
        }

        let mut controller =
            ChatSessionController::new(Arc::new(NoCreate), Arc::new(Answering), Some("u1".into()));
        controller.state.active_chat_id = Some("c1".into());

        let outcome = controller.send("hello").await.unwrap();
        assert!(outcome.delivered);
        assert!(!controller.state().busy);
        let last = controller.state().messages.last().unwrap();
        assert_eq!(last.content, "उत्तर");
        assert!(last.id.starts_with("local-"));
    }

    #[tokio::test]
    async fn test_delete_active_session_deselects() {
        let store = Arc::new(MemoryStore::new());
        let mut controller = with_rag(&store, "उत्तर");
        let chat_id = controller.send("hi").await.unwrap().chat_id.unwrap();

        controller.rename(&chat_id, "  तलब  ").await.unwrap();
        assert_eq!(controller.list_sessions().await.unwrap()[0].title, "तलब");

        controller.delete(&chat_id).await.unwrap();
        assert!(controller.state().active_chat_id.is_none());
        assert!(controller.state().messages.is_empty());
        assert!(store.list_messages(&chat_id).await.unwrap().is_empty());
    }
}
