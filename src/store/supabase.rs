//! Supabase client: PostgREST tables and Storage objects.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use super::{storage_path, ChatStore, DirectoryStore, DocumentStore, ProfileStore, StoreError};
use crate::config::SupabaseSettings;
use crate::schema::{
    now_iso8601, ChatSession, Contact, ContactKind, Document, Message, NewDocument, NewMessage,
    Profile, ProfileUpdate,
};

/// Supabase client configuration.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
    bucket: String,
}

type Query<'a> = Vec<(&'a str, String)>;

impl SupabaseClient {
    pub fn new(client: Client, settings: &SupabaseSettings) -> Self {
        Self {
            client,
            base_url: settings.url.clone(),
            service_role_key: settings.service_role_key.clone(),
            bucket: settings.storage_bucket.clone(),
        }
    }

    fn authed(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
    }

    fn table(&self, method: Method, table: &str, query: &Query<'_>) -> RequestBuilder {
        self.authed(method, format!("{}/rest/v1/{}", self.base_url, table))
            .query(query)
    }

    /// Helper: fail on non-success statuses with the body in the error.
    async fn check(operation: &str, resp: Response) -> Result<Response, StoreError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Status {
            operation: operation.to_string(),
            status,
            body,
        })
    }

    /// Helper: GET rows from a table.
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: Query<'_>,
    ) -> Result<Vec<T>, StoreError> {
        let resp = self.table(Method::GET, table, &query).send().await?;
        let resp = Self::check(&format!("select {}", table), resp).await?;
        resp.json()
            .await
            .map_err(|e| StoreError::Decode(format!("{}: {}", table, e)))
    }

    /// Helper: write rows and return the first affected row, if any.
    async fn write_returning<T: DeserializeOwned>(
        &self,
        method: Method,
        table: &str,
        query: Query<'_>,
        body: serde_json::Value,
    ) -> Result<Option<T>, StoreError> {
        let operation = format!("{} {}", method, table);
        let resp = self
            .table(method, table, &query)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        let resp = Self::check(&operation, resp).await?;
        let rows: Vec<T> = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("{}: {}", operation, e)))?;
        Ok(rows.into_iter().next())
    }

    /// Helper: write without reading anything back.
    async fn write_minimal(
        &self,
        method: Method,
        table: &str,
        query: Query<'_>,
        body: Option<serde_json::Value>,
    ) -> Result<(), StoreError> {
        let operation = format!("{} {}", method, table);
        let mut request = self
            .table(method, table, &query)
            .header("Prefer", "return=minimal");
        if let Some(body) = body {
            request = request.json(&body);
        }
        Self::check(&operation, request.send().await?).await?;
        Ok(())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl ChatStore for SupabaseClient {
    async fn create_chat(&self, user_id: &str, title: &str) -> Result<ChatSession, StoreError> {
        let chat: Option<ChatSession> = self
            .write_returning(
                Method::POST,
                "chats",
                Vec::new(),
                json!({ "user_id": user_id, "title": title }),
            )
            .await?;
        let chat = chat.ok_or_else(|| StoreError::Decode("insert chats returned no row".into()))?;
        info!("Created chat {} for user {}", chat.id, user_id);
        Ok(chat)
    }

    async fn get_chat(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> Result<Option<ChatSession>, StoreError> {
        let rows: Vec<ChatSession> = self
            .select(
                "chats",
                vec![
                    ("id", eq(chat_id)),
                    ("user_id", eq(user_id)),
                    ("select", "*".into()),
                    ("limit", "1".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSession>, StoreError> {
        self.select(
            "chats",
            vec![
                ("user_id", eq(user_id)),
                ("select", "*".into()),
                ("order", "updated_at.desc".into()),
            ],
        )
        .await
    }

    async fn rename_chat(
        &self,
        user_id: &str,
        chat_id: &str,
        title: &str,
    ) -> Result<(), StoreError> {
        let updated: Option<ChatSession> = self
            .write_returning(
                Method::PATCH,
                "chats",
                vec![("id", eq(chat_id)), ("user_id", eq(user_id))],
                json!({ "title": title, "updated_at": now_iso8601() }),
            )
            .await?;
        updated
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("chat {}", chat_id)))
    }

    /// A single owner-scoped delete. Messages go with the chat through the
    /// foreign key cascade, so a rejected delete leaves the transcript intact.
    async fn delete_chat(&self, user_id: &str, chat_id: &str) -> Result<(), StoreError> {
        let query = vec![("id", eq(chat_id)), ("user_id", eq(user_id))];
        let resp = self
            .table(Method::DELETE, "chats", &query)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let resp = Self::check("DELETE chats", resp).await?;
        let deleted: Vec<ChatSession> = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("DELETE chats: {}", e)))?;
        if deleted.is_empty() {
            return Err(StoreError::NotFound(format!("chat {}", chat_id)));
        }
        info!("Deleted chat {}", chat_id);
        Ok(())
    }

    async fn touch_chat(&self, chat_id: &str, title: Option<&str>) -> Result<(), StoreError> {
        let mut body = json!({ "updated_at": now_iso8601() });
        if let Some(title) = title {
            body["title"] = json!(title);
        }
        self.write_minimal(Method::PATCH, "chats", vec![("id", eq(chat_id))], Some(body))
            .await
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let body = serde_json::to_value(&message)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let row: Option<Message> = self
            .write_returning(Method::POST, "messages", Vec::new(), body)
            .await?;
        let row = row.ok_or_else(|| StoreError::Decode("insert messages returned no row".into()))?;
        debug!("Inserted {} message {} in chat {}", row.role.as_str(), row.id, row.chat_id);
        Ok(row)
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError> {
        self.select(
            "messages",
            vec![
                ("chat_id", eq(chat_id)),
                ("select", "*".into()),
                ("order", "created_at.asc".into()),
            ],
        )
        .await
    }

    async fn count_messages(&self, chat_id: &str, limit: usize) -> Result<usize, StoreError> {
        #[derive(serde::Deserialize)]
        struct IdRow {
            #[allow(dead_code)]
            id: String,
        }

        let rows: Vec<IdRow> = self
            .select(
                "messages",
                vec![
                    ("chat_id", eq(chat_id)),
                    ("select", "id".into()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl DocumentStore for SupabaseClient {
    async fn upload_original(
        &self,
        user_id: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, StoreError> {
        let path = storage_path(user_id, filename, data);
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path);

        let resp = self
            .authed(Method::POST, url)
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(data.to_vec())
            .send()
            .await?;
        Self::check("storage upload", resp).await?;

        info!("Uploaded {} ({} bytes) to {}/{}", filename, data.len(), self.bucket, path);
        Ok(path)
    }

    async fn insert_document(&self, document: NewDocument) -> Result<Document, StoreError> {
        let body = serde_json::to_value(&document)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let row: Option<Document> = self
            .write_returning(Method::POST, "documents", Vec::new(), body)
            .await?;
        row.ok_or_else(|| StoreError::Decode("insert documents returned no row".into()))
    }

    async fn get_document(&self, user_id: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let rows: Vec<Document> = self
            .select(
                "documents",
                vec![
                    ("id", eq(id)),
                    ("user_id", eq(user_id)),
                    ("select", "*".into()),
                    ("limit", "1".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>, StoreError> {
        self.select(
            "documents",
            vec![
                ("user_id", eq(user_id)),
                ("select", "*".into()),
                ("order", "created_at.desc".into()),
            ],
        )
        .await
    }
}

#[async_trait]
impl DirectoryStore for SupabaseClient {
    async fn list_contacts(
        &self,
        country: &str,
        kind: Option<ContactKind>,
    ) -> Result<Vec<Contact>, StoreError> {
        let mut query = vec![
            ("country", eq(country)),
            ("select", "*".into()),
            ("order", "type.asc,name.asc".into()),
        ];
        if let Some(kind) = kind {
            query.push(("type", eq(kind.as_str())));
        }
        self.select("contacts", query).await
    }
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let rows: Vec<Profile> = self
            .select(
                "profiles",
                vec![("user_id", eq(user_id)), ("select", "*".into())],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<Profile, StoreError> {
        let mut body =
            serde_json::to_value(&update).map_err(|e| StoreError::Decode(e.to_string()))?;
        body["updated_at"] = json!(now_iso8601());

        let updated: Option<Profile> = self
            .write_returning(
                Method::PATCH,
                "profiles",
                vec![("user_id", eq(user_id))],
                body.clone(),
            )
            .await?;
        if let Some(profile) = updated {
            return Ok(profile);
        }

        body["user_id"] = json!(user_id);
        let created: Option<Profile> = self
            .write_returning(Method::POST, "profiles", Vec::new(), body)
            .await?;
        info!("Created profile for user {}", user_id);
        created.ok_or_else(|| StoreError::Decode("insert profiles returned no row".into()))
    }
}
