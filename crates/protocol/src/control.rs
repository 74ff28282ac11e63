//! Steuernachrichten (Text/JSON ueber die Client-Verbindung)
//!
//! Begleiten den Audio-Strom und markieren Zug- und Satzgrenzen:
//!
//! ```text
//! {"type":"tts","state":"start","session_id":"..."}
//! {"type":"tts","state":"sentence_start","session_id":"...","text":"..."}
//! {"type":"tts","state":"stop","session_id":"..."}
//! {"type":"stt","text":"...","session_id":"..."}
//! ```

use serde::{Deserialize, Serialize};
use sprachrelais_core::SessionId;

/// Zustand einer TTS-Steuernachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsZustand {
    /// Beginn eines gesprochenen Zuges
    Start,
    /// Beginn eines Satzes (mit Text)
    SentenceStart,
    /// Ende der Wiedergabe
    Stop,
}

impl TtsZustand {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::SentenceStart => "sentence_start",
            Self::Stop => "stop",
        }
    }
}

/// Alle Steuernachrichten, die der Server an den Client schickt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Steuernachricht {
    Tts {
        state: TtsZustand,
        session_id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Stt {
        text: String,
        session_id: SessionId,
    },
}

impl Steuernachricht {
    /// Erstellt eine TTS-Nachricht
    pub fn tts(state: TtsZustand, session_id: SessionId, text: Option<String>) -> Self {
        Self::Tts {
            state,
            session_id,
            text,
        }
    }

    /// Erstellt eine STT-Nachricht fuer erkannte Sprache
    pub fn stt(text: impl Into<String>, session_id: SessionId) -> Self {
        Self::Stt {
            text: text.into(),
            session_id,
        }
    }

    /// Serialisiert die Nachricht in ihr JSON-Leitungsformat
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Gibt den TTS-Zustand zurueck, falls es eine TTS-Nachricht ist
    pub fn tts_zustand(&self) -> Option<TtsZustand> {
        match self {
            Self::Tts { state, .. } => Some(*state),
            Self::Stt { .. } => None,
        }
    }
}

/// Vom ASR-Backend gelieferter Text im JSON-Format mit Sprecherangabe
///
/// Kommt der erkannte Text als `{"speaker":"...","content":"..."}`, wird nur
/// `content` angezeigt und der Sprecher an der Verbindung vermerkt.
#[derive(Debug, Clone, Deserialize)]
pub struct SprecherText {
    pub content: String,
    #[serde(default)]
    pub speaker: Option<String>,
}

impl SprecherText {
    /// Versucht den Text als Sprecher-JSON zu lesen
    pub fn parsen(text: &str) -> Option<Self> {
        let getrimmt = text.trim();
        if !(getrimmt.starts_with('{') && getrimmt.ends_with('}')) {
            return None;
        }
        serde_json::from_str(getrimmt).ok()
    }
}
