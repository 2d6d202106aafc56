//! Persisted record types for chats, messages, documents, contacts and profiles.
//!
//! Field names follow the relational tables column-for-column so rows
//! deserialize straight from PostgREST responses.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Title given to a chat session before its first exchange.
pub const DEFAULT_CHAT_TITLE: &str = "नयाँ कुराकानी";

/// Countries covered by the contact directory.
pub const COUNTRIES: [&str; 5] = ["UAE", "Qatar", "Saudi Arabia", "Malaysia", "Kuwait"];

/// Generate ISO8601 timestamp (millisecond precision) for current time.
pub fn now_iso8601() -> String {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format_iso8601(duration.as_millis() as u64)
}

/// Format milliseconds since the epoch as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// Fixed width, so lexicographic order equals chronological order.
pub fn format_iso8601(millis: u64) -> String {
    let secs = millis / 1000;
    let days_since_epoch = secs / 86400;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let mut year = 1970i32;
    let mut remaining_days = days_since_epoch as i32;

    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let days_in_months: [i32; 12] = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1;
    for days in days_in_months {
        if remaining_days < days {
            break;
        }
        remaining_days -= days;
        month += 1;
    }
    let day = remaining_days + 1;

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        year,
        month,
        day,
        hours,
        minutes,
        seconds,
        millis % 1000
    )
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A conversation owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One transcript entry. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: String,
}

/// Id prefixes for messages that exist only in a view and were never persisted.
const LOCAL_ID_PREFIXES: [&str; 3] = ["temp-", "error-", "local-"];

impl Message {
    /// Build a view-only message whose id starts with `prefix` (`temp`, `error`, `local`).
    pub fn local(prefix: &str, chat_id: &str, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: format!("{}-{}", prefix, Uuid::new_v4().simple()),
            chat_id: chat_id.to_string(),
            role,
            content: content.into(),
            metadata: serde_json::Value::Null,
            created_at: now_iso8601(),
        }
    }

    /// True for optimistic or error entries that have no persisted row.
    pub fn is_local(&self) -> bool {
        LOCAL_ID_PREFIXES.iter().any(|p| self.id.starts_with(p))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

// ============================================================================
// Documents
// ============================================================================

/// Structured classification returned by the document analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    #[serde(default = "default_doc_type")]
    pub doc_type: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default = "default_clarity", deserialize_with = "clamped_score")]
    pub clarity_score: u8,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub red_flags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub questions_to_ask: Vec<String>,
}

impl DocumentAnalysis {
    /// Degraded record used when the model reply carries no parseable JSON.
    pub fn unstructured(doc_type: Option<&str>, summary: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.unwrap_or("other").to_string(),
            summary: summary.into(),
            clarity_score: 50,
            red_flags: Vec::new(),
            questions_to_ask: Vec::new(),
        }
    }

    /// Localized label for the document type.
    pub fn doc_type_label(&self) -> &str {
        match self.doc_type.as_str() {
            "contract" => "करार",
            "visa" => "भिसा",
            "offer_letter" => "अफर लेटर",
            "id" => "परिचय पत्र",
            "other" => "अन्य",
            other => other,
        }
    }
}

fn default_doc_type() -> String {
    "other".to_string()
}

fn default_clarity() -> u8 {
    50
}

/// Accept any JSON number (or numeric string) and clamp it into 0..=100.
fn clamped_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let raw = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(raw.map(|v| v.round().clamp(0.0, 100.0) as u8).unwrap_or(50))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A persisted analysis of one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub clarity_score: Option<u8>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub storage_path: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDocument {
    pub user_id: String,
    pub chat_id: Option<String>,
    pub original_filename: String,
    pub ocr_text: String,
    pub doc_type: String,
    pub clarity_score: u8,
    pub red_flags: Vec<String>,
    pub analysis: String,
    pub storage_path: Option<String>,
}

// ============================================================================
// Directory & profile
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Embassy,
    Labor,
    Ngo,
    #[serde(other)]
    Other,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::Embassy => "embassy",
            ContactKind::Labor => "labor",
            ContactKind::Ngo => "ngo",
            ContactKind::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContactKind::Embassy => "दूतावास",
            ContactKind::Labor => "श्रम कार्यालय",
            ContactKind::Ngo => "NGO",
            ContactKind::Other => "अन्य",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub country: String,
    #[serde(rename = "type")]
    pub kind: ContactKind,
    pub name: String,
    #[serde(default)]
    pub name_ne: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    /// Free-form column; codes outside [`Language::ALL`] read as unset.
    #[serde(default, deserialize_with = "known_language")]
    pub preferred_language: Option<Language>,
    pub created_at: String,
    pub updated_at: String,
}

fn known_language<'de, D>(deserializer: D) -> Result<Option<Language>, D::Error>
where
    D: Deserializer<'de>,
{
    let code = Option::<String>::deserialize(deserializer)?;
    Ok(code.as_deref().and_then(Language::from_code))
}

/// Owner-submitted profile edit. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<Language>,
}

// ============================================================================
// Languages
// ============================================================================

/// Languages offered by the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ne,
    En,
    Ar,
    Hi,
    My,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Ne,
        Language::En,
        Language::Ar,
        Language::Hi,
        Language::My,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL.into_iter().find(|l| l.code().eq_ignore_ascii_case(code))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Ne => "ne",
            Language::En => "en",
            Language::Ar => "ar",
            Language::Hi => "hi",
            Language::My => "my",
        }
    }

    /// Name of the language written in that language.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Ne => "नेपाली",
            Language::En => "English",
            Language::Ar => "العربية",
            Language::Hi => "हिन्दी",
            Language::My => "Bahasa Melayu",
        }
    }

    /// BCP-47 locale used by speech capture and playback.
    pub fn speech_code(&self) -> &'static str {
        match self {
            Language::Ne => "ne-NP",
            Language::En => "en-US",
            Language::Ar => "ar-SA",
            Language::Hi => "hi-IN",
            Language::My => "ms-MY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso8601_is_fixed_width_and_ordered() {
        let a = format_iso8601(0);
        let b = format_iso8601(1_738_756_800_123);
        assert_eq!(a, "1970-01-01T00:00:00.000Z");
        assert_eq!(b, "2025-02-05T12:00:00.123Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    #[test]
    fn test_leap_day() {
        // 2024-02-29T00:00:00Z
        assert_eq!(format_iso8601(1_709_164_800_000), "2024-02-29T00:00:00.000Z");
    }

    #[test]
    fn test_analysis_defaults_and_clamping() {
        let parsed: DocumentAnalysis = serde_json::from_str(
            r#"{"doc_type":"contract","summary":"s","clarity_score":140,"red_flags":null}"#,
        )
        .unwrap();
        assert_eq!(parsed.clarity_score, 100);
        assert!(parsed.red_flags.is_empty());
        assert!(parsed.questions_to_ask.is_empty());

        let parsed: DocumentAnalysis =
            serde_json::from_str(r#"{"summary":"s","clarity_score":"72.4"}"#).unwrap();
        assert_eq!(parsed.doc_type, "other");
        assert_eq!(parsed.clarity_score, 72);

        let parsed: DocumentAnalysis =
            serde_json::from_str(r#"{"clarity_score":-3}"#).unwrap();
        assert_eq!(parsed.clarity_score, 0);
    }

    #[test]
    fn test_local_message_ids() {
        let temp = Message::local("temp", "c1", Role::User, "hi");
        assert!(temp.id.starts_with("temp-"));
        assert!(temp.is_local());

        let persisted = Message {
            id: Uuid::new_v4().to_string(),
            ..temp
        };
        assert!(!persisted.is_local());
    }

    #[test]
    fn test_contact_kind_unknown_maps_to_other() {
        let contact: Contact = serde_json::from_str(
            r#"{"id":"1","country":"UAE","type":"hospital","name":"X"}"#,
        )
        .unwrap();
        assert_eq!(contact.kind, ContactKind::Other);
    }

    #[test]
    fn test_language_codes_round_trip_through_serde() {
        for lang in Language::ALL {
            let json = serde_json::to_string(&lang).unwrap();
            assert_eq!(json, format!("\"{}\"", lang.code()));
        }
        assert!(serde_json::from_str::<Language>("\"fr\"").is_err());
    }

    #[test]
    fn test_profile_with_unknown_language_still_loads() {
        let row = |lang: &str| {
            format!(
                r#"{{"user_id":"u","preferred_language":{},"created_at":"x","updated_at":"x"}}"#,
                lang
            )
        };

        let profile: Profile = serde_json::from_str(&row("\"fr\"")).unwrap();
        assert_eq!(profile.preferred_language, None);
        assert_eq!(profile.user_id, "u");

        let profile: Profile = serde_json::from_str(&row("\"hi\"")).unwrap();
        assert_eq!(profile.preferred_language, Some(Language::Hi));

        let profile: Profile = serde_json::from_str(&row("null")).unwrap();
        assert_eq!(profile.preferred_language, None);

        let profile: Profile =
            serde_json::from_str(r#"{"user_id":"u","created_at":"x","updated_at":"x"}"#).unwrap();
        assert_eq!(profile.preferred_language, None);
    }
}
