//! Persistence capabilities.
//!
//! One trait per table family so the pipeline and the chat controller depend
//! only on what they touch. [`supabase::SupabaseClient`] talks to PostgREST and
//! Storage; [`memory::MemoryStore`] keeps everything in process.

pub mod memory;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::schema::{
    ChatSession, Contact, ContactKind, Document, Message, NewDocument, NewMessage, Profile,
    ProfileUpdate,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to persistence layer failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{operation} failed: {status} - {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_chat(&self, user_id: &str, title: &str) -> Result<ChatSession, StoreError>;

    /// Owner-scoped lookup; another user's chat reads as absent.
    async fn get_chat(&self, user_id: &str, chat_id: &str)
        -> Result<Option<ChatSession>, StoreError>;

    /// Most recently updated first.
    async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSession>, StoreError>;

    async fn rename_chat(&self, user_id: &str, chat_id: &str, title: &str)
        -> Result<(), StoreError>;

    /// Removes the chat and its messages.
    async fn delete_chat(&self, user_id: &str, chat_id: &str) -> Result<(), StoreError>;

    /// Bump `updated_at`, optionally replacing the title.
    async fn touch_chat(&self, chat_id: &str, title: Option<&str>) -> Result<(), StoreError>;

    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// Oldest first.
    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Number of messages in the chat, counting at most `limit`.
    async fn count_messages(&self, chat_id: &str, limit: usize) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store the original upload and return its storage path.
    async fn upload_original(
        &self,
        user_id: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, StoreError>;

    async fn insert_document(&self, document: NewDocument) -> Result<Document, StoreError>;

    async fn get_document(&self, user_id: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Newest first.
    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>, StoreError>;
}

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn list_contacts(
        &self,
        country: &str,
        kind: Option<ContactKind>,
    ) -> Result<Vec<Contact>, StoreError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError>;

    /// Last write wins. Creates the row when the user has none yet.
    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<Profile, StoreError>;
}

/// The four capabilities, usually backed by one shared client.
#[derive(Clone)]
pub struct Stores {
    pub chats: Arc<dyn ChatStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub directory: Arc<dyn DirectoryStore>,
    pub profiles: Arc<dyn ProfileStore>,
}

impl Stores {
    pub fn shared<T>(store: Arc<T>) -> Self
    where
        T: ChatStore + DocumentStore + DirectoryStore + ProfileStore + 'static,
    {
        Self {
            chats: store.clone(),
            documents: store.clone(),
            directory: store.clone(),
            profiles: store,
        }
    }
}

/// Content-addressed location for an upload: `<user>/<sha256>.<ext>`.
pub fn storage_path(user_id: &str, filename: &str, data: &[u8]) -> String {
    let hash = {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    };
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    format!("{}/{}.{}", user_id, hash, ext)
}
