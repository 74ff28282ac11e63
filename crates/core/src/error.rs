//! Fehlertypen fuer Sprachrelais
//!
//! Zentraler Fehler-Enum fuer den Audio-Zustellpfad. Der Abbruch durch den
//! Client ist als eigene Variante modelliert, ist aber kein echter Fehler:
//! Aufrufer pruefen ihn mit [`RelaisFehler::ist_abbruch`].

use thiserror::Error;

/// Globaler Result-Alias fuer Sprachrelais
pub type Result<T> = std::result::Result<T, RelaisFehler>;

/// Alle moeglichen Fehler im Sprachrelais-System
#[derive(Debug, Error)]
pub enum RelaisFehler {
    // --- Transport ---
    #[error("Transportfehler: {0}")]
    Transport(String),

    #[error("Zustellung vom Client abgebrochen")]
    Abgebrochen,

    // --- Relay-Protokoll ---
    #[error("Korrupter Relay-Frame: {0}")]
    KorrupterFrame(String),

    // --- Flusskontrolle ---
    #[error("Flusskontrolle an veralteten Satz gebunden")]
    VeralteteBindung,

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    // --- I/O (Relay-Codec-Strom) ---
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RelaisFehler {
    /// Erstellt einen Transportfehler aus einer beliebigen Nachricht
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Client die Zustellung abgebrochen hat
    pub fn ist_abbruch(&self) -> bool {
        matches!(self, Self::Abgebrochen)
    }

    /// Gibt true zurueck wenn der Fehler auf Transportebene wiederholbar sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = RelaisFehler::transport("Socket geschlossen");
        assert_eq!(e.to_string(), "Transportfehler: Socket geschlossen");
    }

    #[test]
    fn abbruch_ist_kein_transportfehler() {
        assert!(RelaisFehler::Abgebrochen.ist_abbruch());
        assert!(!RelaisFehler::Abgebrochen.ist_wiederholbar());
        assert!(!RelaisFehler::transport("x").ist_abbruch());
    }

    #[test]
    fn wiederholbar_erkennung() {
        assert!(RelaisFehler::transport("test").ist_wiederholbar());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(RelaisFehler::from(io).ist_wiederholbar());
        assert!(!RelaisFehler::KorrupterFrame("laenge".into()).ist_wiederholbar());
    }
}
