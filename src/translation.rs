//! Translation view state: text translation, language swap and the voice chain.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AidError;
use crate::schema::Language;
use crate::services::{TranslateRequest, Translator};

/// Speech-to-text capture, started and stopped by the user.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn start(&self, locale: &str) -> anyhow::Result<()>;
    /// Stop capturing and return what was heard.
    async fn stop(&self) -> anyhow::Result<String>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, text: &str, locale: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationView {
    pub from_lang: Language,
    pub to_lang: Language,
    pub input: String,
    pub translation: String,
    pub busy: bool,
    pub listening: bool,
}

pub struct TranslationSession {
    translator: Arc<dyn Translator>,
    from: Language,
    to: Language,
    input: String,
    output: String,
    busy: bool,
    listening: bool,
}

impl TranslationSession {
    /// Starts as Nepali to English.
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self {
            translator,
            from: Language::Ne,
            to: Language::En,
            input: String::new(),
            output: String::new(),
            busy: false,
            listening: false,
        }
    }

    pub fn with_languages(mut self, from: Language, to: Language) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Snapshot of what the translator view shows.
    pub fn view(&self) -> TranslationView {
        TranslationView {
            from_lang: self.from,
            to_lang: self.to,
            input: self.input.clone(),
            translation: self.output.clone(),
            busy: self.busy,
            listening: self.listening,
        }
    }

    /// Translate the current input. Whitespace-only input changes nothing.
    pub async fn translate(&mut self) -> Result<&str, AidError> {
        if self.input.trim().is_empty() {
            return Ok(&self.output);
        }

        self.busy = true;
        let request = TranslateRequest {
            text: self.input.clone(),
            from_lang: self.from,
            to_lang: self.to,
        };
        let result = self.translator.translate(&request).await;
        self.busy = false;

        self.output = result.map_err(|e| {
            warn!("Translation {} -> {} failed: {}", self.from.code(), self.to.code(), e);
            e
        })?;
        Ok(&self.output)
    }

    /// Exchange both the languages and the texts.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.from, &mut self.to);
        std::mem::swap(&mut self.input, &mut self.output);
    }

    /// Begin voice capture in the source language. Clears the previous output.
    pub async fn start_voice(&mut self, recognizer: &dyn SpeechRecognizer) -> Result<(), AidError> {
        self.output.clear();
        recognizer
            .start(self.from.speech_code())
            .await
            .map_err(|e| AidError::SpeechFailed(e.to_string()))?;
        self.listening = true;
        Ok(())
    }

    /// Stop capture, translate the transcript and speak a non-empty result.
    pub async fn finish_voice(
        &mut self,
        recognizer: &dyn SpeechRecognizer,
        synthesizer: &dyn SpeechSynthesizer,
    ) -> Result<(), AidError> {
        self.listening = false;
        let transcript = recognizer
            .stop()
            .await
            .map_err(|e| AidError::SpeechFailed(e.to_string()))?;
        if transcript.trim().is_empty() {
            debug!("Voice capture ended without speech");
            return Ok(());
        }
        self.input = transcript;

        let locale = self.to.speech_code();
        let translation = self.translate().await?.to_string();
        if translation.trim().is_empty() {
            return Ok(());
        }
        synthesizer
            .speak(&translation, locale)
            .await
            .map_err(|e| AidError::SpeechFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Upper {
        fail: bool,
        calls: Mutex<Vec<TranslateRequest>>,
    }

    #[async_trait]
    impl Translator for Upper {
        async fn translate(&self, request: &TranslateRequest) -> Result<String, AidError> {
            self.calls.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(AidError::UpstreamRateLimited);
            }
            Ok(request.text.to_uppercase())
        }
    }

    fn upper(fail: bool) -> Arc<Upper> {
        Arc::new(Upper {
            fail,
            calls: Mutex::new(Vec::new()),
        })
    }

    struct Mic {
        heard: &'static str,
        started_in: Mutex<Option<String>>,
    }

    #[async_trait]
    impl SpeechRecognizer for Mic {
        async fn start(&self, locale: &str) -> anyhow::Result<()> {
            *self.started_in.lock().unwrap() = Some(locale.to_string());
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<String> {
            Ok(self.heard.to_string())
        }
    }

    #[derive(Default)]
    struct Speaker {
        spoken: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for Speaker {
        async fn speak(&self, text: &str, locale: &str) -> anyhow::Result<()> {
            self.spoken
                .lock()
                .unwrap()
                .push((text.to_string(), locale.to_string()));
            Ok(())
        }
    }

    fn mic(heard: &'static str) -> Mic {
        Mic {
            heard,
            started_in: Mutex::new(None),
        }
    }

    #[tokio::test]
    async fn test_translate_and_blank_input() {
        let translator = upper(false);
        let mut session = TranslationSession::new(translator.clone());

        session.set_input("  ");
        assert_eq!(session.translate().await.unwrap(), "");
        assert!(translator.calls.lock().unwrap().is_empty());

        session.set_input("hello");
        assert_eq!(session.translate().await.unwrap(), "HELLO");
        let calls = translator.calls.lock().unwrap();
        assert_eq!(calls[0].from_lang, Language::Ne);
        assert_eq!(calls[0].to_lang, Language::En);
    }

    #[tokio::test]
    async fn test_swap_exchanges_languages_and_texts() {
        let mut session =
            TranslationSession::new(upper(false)).with_languages(Language::Ar, Language::Hi);
        session.set_input("abc");
        session.translate().await.unwrap();

        session.swap();
        let view = session.view();
        assert_eq!((view.from_lang, view.to_lang), (Language::Hi, Language::Ar));
        assert_eq!(view.input, "ABC");
        assert_eq!(view.translation, "abc");
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_output_and_clears_busy() {
        let mut session = TranslationSession::new(upper(true));
        session.set_input("hello");
        let err = session.translate().await.unwrap_err();
        assert!(matches!(err, AidError::UpstreamRateLimited));
        let view = session.view();
        assert!(!view.busy);
        assert_eq!(view.translation, "");
    }

    #[tokio::test]
    async fn test_voice_chain_speaks_translation_in_target_locale() {
        let mut session =
            TranslationSession::new(upper(false)).with_languages(Language::Ne, Language::My);
        session.set_input("old");
        session.translate().await.unwrap();

        let mic = mic("salary");
        let speaker = Speaker::default();
        session.start_voice(&mic).await.unwrap();
        assert!(session.view().listening);
        assert_eq!(session.view().translation, "");
        assert_eq!(mic.started_in.lock().unwrap().as_deref(), Some("ne-NP"));

        session.finish_voice(&mic, &speaker).await.unwrap();
        let view = session.view();
        assert!(!view.listening);
        assert_eq!(view.input, "salary");
        assert_eq!(
            *speaker.spoken.lock().unwrap(),
            vec![("SALARY".to_string(), "ms-MY".to_string())]
        );
    }

    #[tokio::test]
    async fn test_silence_and_failure_speak_nothing() {
        let speaker = Speaker::default();

        let mut session = TranslationSession::new(upper(false));
        let silent = mic("  ");
        session.start_voice(&silent).await.unwrap();
        session.finish_voice(&silent, &speaker).await.unwrap();

        let mut failing = TranslationSession::new(upper(true));
        let heard = mic("hello");
        failing.start_voice(&heard).await.unwrap();
        assert!(failing.finish_voice(&heard, &speaker).await.is_err());

        assert!(speaker.spoken.lock().unwrap().is_empty());
    }
}
