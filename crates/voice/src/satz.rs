//! Satzprotokoll – Zustandsautomat der TTS-Steuernachrichten
//!
//! ```text
//! Leerlauf --(erstes Frame des Zugs)--> ZugGestartet          [start]
//! ZugGestartet/SatzOffen --(Erster)--> SatzOffen              [sentence_start]
//! SatzOffen --(Letzter, nach Leerlauf + Jitter)--> ZugBeendet [stop]
//! ZugBeendet --> Leerlauf
//! ```
//!
//! Der Automat entscheidet nur, *welche* Nachrichten faellig sind. Senden
//! und Reihenfolge relativ zum Audio regelt die Zustellung.

use serde::{Deserialize, Serialize};

/// Position eines Frames innerhalb eines Satzes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatzTyp {
    /// Erstes Frame eines Satzes (traegt den Satztext)
    Erster,
    /// Reines Audio ohne Zustandswechsel
    Mitte,
    /// Letztes Frame des Zugs
    Letzter,
}

/// Zustand des Satzprotokolls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtokollZustand {
    #[default]
    Leerlauf,
    ZugGestartet,
    SatzOffen,
    ZugBeendet,
}

/// Faellige Steuernachrichten fuer ein eingehendes Frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uebergang {
    /// `start` muss vor allem anderen gesendet werden
    pub zug_start: bool,
    /// Text fuer `sentence_start` (nur bei nicht-leerem Text)
    pub satz_start: Option<String>,
    /// Zug endet nach diesem Frame (`stop` faellig)
    pub zug_ende: bool,
}

/// Zustandsautomat pro Verbindung
#[derive(Debug, Clone, Default)]
pub struct SatzProtokoll {
    zustand: ProtokollZustand,
}

impl SatzProtokoll {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn zustand(&self) -> ProtokollZustand {
        self.zustand
    }

    /// Verarbeitet ein Frame bzw. einen Stapel und liefert die faelligen Nachrichten
    pub fn frame_empfangen(&mut self, typ: SatzTyp, text: Option<&str>) -> Uebergang {
        let mut uebergang = Uebergang::default();

        if matches!(
            self.zustand,
            ProtokollZustand::Leerlauf | ProtokollZustand::ZugBeendet
        ) {
            uebergang.zug_start = true;
            self.zustand = ProtokollZustand::ZugGestartet;
        }

        match typ {
            SatzTyp::Erster => {
                self.zustand = ProtokollZustand::SatzOffen;
                uebergang.satz_start = text.filter(|t| !t.is_empty()).map(str::to_owned);
            }
            SatzTyp::Mitte => {}
            SatzTyp::Letzter => uebergang.zug_ende = true,
        }

        uebergang
    }

    /// Letztes Frame angenommen, `stop` steht aus
    pub fn zug_beenden(&mut self) {
        self.zustand = ProtokollZustand::ZugBeendet;
    }

    /// `stop` gesendet; das naechste Frame beginnt einen neuen Zug
    pub fn zug_abgeschlossen(&mut self) {
        self.zustand = ProtokollZustand::Leerlauf;
    }

    /// Beginnt einen neuen Zug: das naechste Frame sendet wieder `start`
    pub fn zuruecksetzen(&mut self) {
        self.zustand = ProtokollZustand::Leerlauf;
    }
}
