//! Gemeinsame Identifikationstypen fuer Sprachrelais
//!
//! Session- und Satz-IDs verwenden das Newtype-Pattern, damit sie zur
//! Compilezeit nicht verwechselt werden koennen. Beide werden vom Client
//! bzw. vom TTS-Backend als Strings vergeben und unveraendert weitergereicht.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kennung einer Client-Session (erscheint in jeder Steuernachricht)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Gibt die ID als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kennung des aktuell gesprochenen Satzes bzw. Zuges
///
/// Die Flusskontrolle bindet sich an eine `SatzId`; weicht sie von der
/// aktuellen ID der Verbindung ab, ist die Bindung veraltet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SatzId(pub String);

impl SatzId {
    /// Erstellt eine neue zufaellige SatzId
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Gibt die ID als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SatzId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SatzId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::fmt::Display for SatzId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "satz:{}", self.0)
    }
}
