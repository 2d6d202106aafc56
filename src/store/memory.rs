//! In-process store used in development mode and by tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::{storage_path, ChatStore, DirectoryStore, DocumentStore, ProfileStore, StoreError};
use crate::schema::{
    now_iso8601, ChatSession, Contact, ContactKind, Document, Message, NewDocument, NewMessage,
    Profile, ProfileUpdate,
};

#[derive(Debug, Default)]
struct Tables {
    chats: Vec<ChatSession>,
    messages: Vec<Message>,
    documents: Vec<Document>,
    objects: HashMap<String, Vec<u8>>,
    contacts: Vec<Contact>,
    profiles: HashMap<String, Profile>,
}

/// Tables held behind one lock. Rows keep insertion order, which breaks
/// `created_at` ties.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the read-only contact directory.
    pub fn with_contacts(self, contacts: Vec<Contact>) -> Self {
        self.inner.write().unwrap().contacts = contacts;
        self
    }

    /// Seed the directory from a JSON array of contact rows.
    pub fn with_contacts_file(self, path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let contacts: Vec<Contact> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid contacts in {}", path.display()))?;
        info!("Loaded {} contacts from {}", contacts.len(), path.display());
        Ok(self.with_contacts(contacts))
    }

    /// Raw bytes stored under a storage path.
    #[cfg(test)]
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.read().unwrap().objects.get(path).cloned()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn create_chat(&self, user_id: &str, title: &str) -> Result<ChatSession, StoreError> {
        let now = now_iso8601();
        let chat = ChatSession {
            id: new_id(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.inner.write().unwrap().chats.push(chat.clone());
        tracing::debug!("MemoryStore: created chat {}", chat.id);
        Ok(chat)
    }

    async fn get_chat(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> Result<Option<ChatSession>, StoreError> {
        let tables = self.inner.read().unwrap();
        Ok(tables
            .chats
            .iter()
            .find(|c| c.id == chat_id && c.user_id == user_id)
            .cloned())
    }

    async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSession>, StoreError> {
        let tables = self.inner.read().unwrap();
        let mut chats: Vec<ChatSession> = tables
            .chats
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        // Newest insert wins a tie, matching "most recent first".
        chats.reverse();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    async fn rename_chat(
        &self,
        user_id: &str,
        chat_id: &str,
        title: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.inner.write().unwrap();
        let chat = tables
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id && c.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("chat {}", chat_id)))?;
        chat.title = title.to_string();
        chat.updated_at = now_iso8601();
        Ok(())
    }

    async fn delete_chat(&self, user_id: &str, chat_id: &str) -> Result<(), StoreError> {
        let mut tables = self.inner.write().unwrap();
        let before = tables.chats.len();
        tables
            .chats
            .retain(|c| !(c.id == chat_id && c.user_id == user_id));
        if tables.chats.len() == before {
            return Err(StoreError::NotFound(format!("chat {}", chat_id)));
        }
        tables.messages.retain(|m| m.chat_id != chat_id);
        Ok(())
    }

    async fn touch_chat(&self, chat_id: &str, title: Option<&str>) -> Result<(), StoreError> {
        let mut tables = self.inner.write().unwrap();
        let chat = tables
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| StoreError::NotFound(format!("chat {}", chat_id)))?;
        chat.updated_at = now_iso8601();
        if let Some(title) = title {
            chat.title = title.to_string();
        }
        Ok(())
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let mut tables = self.inner.write().unwrap();
        if !tables.chats.iter().any(|c| c.id == message.chat_id) {
            return Err(StoreError::NotFound(format!("chat {}", message.chat_id)));
        }
        let row = Message {
            id: new_id(),
            chat_id: message.chat_id,
            role: message.role,
            content: message.content,
            metadata: message.metadata.unwrap_or(serde_json::Value::Null),
            created_at: now_iso8601(),
        };
        tables.messages.push(row.clone());
        Ok(row)
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError> {
        let tables = self.inner.read().unwrap();
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn count_messages(&self, chat_id: &str, limit: usize) -> Result<usize, StoreError> {
        let tables = self.inner.read().unwrap();
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .take(limit)
            .count())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upload_original(
        &self,
        user_id: &str,
        filename: &str,
        _content_type: &str,
        data: &[u8],
    ) -> Result<String, StoreError> {
        let path = storage_path(user_id, filename, data);
        self.inner
            .write()
            .unwrap()
            .objects
            .insert(path.clone(), data.to_vec());
        Ok(path)
    }

    async fn insert_document(&self, document: NewDocument) -> Result<Document, StoreError> {
        let row = Document {
            id: new_id(),
            user_id: document.user_id,
            chat_id: document.chat_id,
            original_filename: Some(document.original_filename),
            ocr_text: Some(document.ocr_text),
            doc_type: Some(document.doc_type),
            clarity_score: Some(document.clarity_score),
            red_flags: document.red_flags,
            analysis: Some(document.analysis),
            storage_path: document.storage_path,
            created_at: now_iso8601(),
        };
        self.inner.write().unwrap().documents.push(row.clone());
        Ok(row)
    }

    async fn get_document(&self, user_id: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let tables = self.inner.read().unwrap();
        Ok(tables
            .documents
            .iter()
            .find(|d| d.id == id && d.user_id == user_id)
            .cloned())
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>, StoreError> {
        let tables = self.inner.read().unwrap();
        let mut documents: Vec<Document> = tables
            .documents
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        documents.reverse();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn list_contacts(
        &self,
        country: &str,
        kind: Option<ContactKind>,
    ) -> Result<Vec<Contact>, StoreError> {
        let tables = self.inner.read().unwrap();
        let mut contacts: Vec<Contact> = tables
            .contacts
            .iter()
            .filter(|c| c.country == country)
            .filter(|c| kind.map_or(true, |k| c.kind == k))
            .cloned()
            .collect();
        contacts.sort_by(|a, b| {
            a.kind
                .as_str()
                .cmp(b.kind.as_str())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(contacts)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        Ok(self.inner.read().unwrap().profiles.get(user_id).cloned())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<Profile, StoreError> {
        let mut tables = self.inner.write().unwrap();
        let now = now_iso8601();
        let profile = tables
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| Profile {
                user_id: user_id.to_string(),
                name: None,
                phone: None,
                country: None,
                emergency_contact: None,
                preferred_language: None,
                created_at: now.clone(),
                updated_at: now.clone(),
            });
        if let Some(name) = update.name {
            profile.name = Some(name);
        }
        if let Some(phone) = update.phone {
            profile.phone = Some(phone);
        }
        if let Some(country) = update.country {
            profile.country = Some(country);
        }
        if let Some(contact) = update.emergency_contact {
            profile.emergency_contact = Some(contact);
        }
        if let Some(language) = update.preferred_language {
            profile.preferred_language = Some(language);
        }
        profile.updated_at = now;
        Ok(profile.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Language, Role};

    fn contact(name: &str, country: &str, kind: ContactKind) -> Contact {
        Contact {
            id: new_id(),
            country: country.to_string(),
            kind,
            name: name.to_string(),
            name_ne: None,
            phone: None,
            email: None,
            address: None,
            lat: None,
            lon: None,
        }
    }

    #[tokio::test]
    async fn test_messages_are_ordered_and_reload_is_stable() {
        let store = MemoryStore::new();
        let chat = store.create_chat("u1", "t").await.unwrap();
        for (role, text) in [(Role::User, "a"), (Role::Assistant, "b"), (Role::User, "c")] {
            store
                .insert_message(NewMessage {
                    chat_id: chat.id.clone(),
                    role,
                    content: text.to_string(),
                    metadata: None,
                })
                .await
                .unwrap();
        }

        let first = store.list_messages(&chat.id).await.unwrap();
        let second = store.list_messages(&chat.id).await.unwrap();
        let contents: Vec<&str> = first.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
        assert_eq!(first, second);
        assert_eq!(store.count_messages(&chat.id, 2).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_chats_are_owner_scoped() {
        let store = MemoryStore::new();
        let chat = store.create_chat("owner", "t").await.unwrap();

        assert!(store.get_chat("intruder", &chat.id).await.unwrap().is_none());
        assert!(matches!(
            store.rename_chat("intruder", &chat.id, "x").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_chat("intruder", &chat.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.list_chats("intruder").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_chat_removes_messages() {
        let store = MemoryStore::new();
        let chat = store.create_chat("u", "t").await.unwrap();
        store
            .insert_message(NewMessage {
                chat_id: chat.id.clone(),
                role: Role::User,
                content: "hello".into(),
                metadata: None,
            })
            .await
            .unwrap();

        store.delete_chat("u", &chat.id).await.unwrap();
        assert!(store.list_messages(&chat.id).await.unwrap().is_empty());
        assert!(store
            .insert_message(NewMessage {
                chat_id: chat.id.clone(),
                role: Role::User,
                content: "late".into(),
                metadata: None,
            })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_touch_moves_chat_to_front() {
        let store = MemoryStore::new();
        let older = store.create_chat("u", "older").await.unwrap();
        let _newer = store.create_chat("u", "newer").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.touch_chat(&older.id, Some("renamed")).await.unwrap();

        let chats = store.list_chats("u").await.unwrap();
        assert_eq!(chats[0].id, older.id);
        assert_eq!(chats[0].title, "renamed");
    }

    #[tokio::test]
    async fn test_contacts_filter_and_order() {
        let store = MemoryStore::new().with_contacts(vec![
            contact("Zeta NGO", "UAE", ContactKind::Ngo),
            contact("Embassy of Nepal", "UAE", ContactKind::Embassy),
            contact("Labour Office", "Qatar", ContactKind::Labor),
            contact("Alpha NGO", "UAE", ContactKind::Ngo),
        ]);

        let uae = store.list_contacts("UAE", None).await.unwrap();
        let names: Vec<&str> = uae.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Embassy of Nepal", "Alpha NGO", "Zeta NGO"]);

        let ngos = store
            .list_contacts("UAE", Some(ContactKind::Ngo))
            .await
            .unwrap();
        assert_eq!(ngos.len(), 2);
    }

    #[tokio::test]
    async fn test_contacts_file_seeds_directory() {
        let path = std::env::temp_dir().join(format!("contacts-{}.json", new_id()));
        std::fs::write(
            &path,
            r#"[{"id":"1","country":"UAE","type":"embassy","name":"Embassy of Nepal","phone":"+971 4 000 0000"},
               {"id":"2","country":"Qatar","type":"labor","name":"Labour Office"}]"#,
        )
        .unwrap();

        let store = MemoryStore::new().with_contacts_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let uae = store.list_contacts("UAE", None).await.unwrap();
        assert_eq!(uae.len(), 1);
        assert_eq!(uae[0].kind, ContactKind::Embassy);
        assert_eq!(uae[0].phone.as_deref(), Some("+971 4 000 0000"));

        assert!(MemoryStore::new()
            .with_contacts_file(Path::new("/nonexistent/contacts.json"))
            .is_err());
    }

    #[tokio::test]
    async fn test_profile_update_is_last_write_wins() {
        let store = MemoryStore::new();
        assert!(store.get_profile("u").await.unwrap().is_none());

        store
            .update_profile(
                "u",
                ProfileUpdate {
                    name: Some("Ram".into()),
                    country: Some("Qatar".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let profile = store
            .update_profile(
                "u",
                ProfileUpdate {
                    country: Some("UAE".into()),
                    preferred_language: Some(Language::Ne),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(profile.name.as_deref(), Some("Ram"));
        assert_eq!(profile.country.as_deref(), Some("UAE"));
        assert_eq!(profile.preferred_language, Some(Language::Ne));
    }

    #[tokio::test]
    async fn test_upload_keeps_bytes_under_path() {
        let store = MemoryStore::new();
        let path = store
            .upload_original("u", "visa.jpg", "image/jpeg", b"jpeg-bytes")
            .await
            .unwrap();
        assert_eq!(store.object(&path).unwrap(), b"jpeg-bytes");
    }
}
