//! Test-Hilfen: aufzeichnender Transport mit virtuellen Zeitstempeln

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use sprachrelais_core::{RelaisFehler, Result};
use sprachrelais_protocol::TtsZustand;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::verbindung::{HinweisTon, Transport};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Gesendet {
    Binaer(Bytes),
    Text(String),
    Geschlossen,
}

/// Zeichnet jeden Schreibvorgang mit `tokio::time::Instant` auf
#[derive(Default)]
pub(crate) struct AufzeichnenderTransport {
    ereignisse: Mutex<Vec<(Instant, Gesendet)>>,
    fehlschlagen: AtomicBool,
}

impl AufzeichnenderTransport {
    pub(crate) fn ereignisse(&self) -> Vec<(Instant, Gesendet)> {
        self.ereignisse.lock().clone()
    }

    pub(crate) fn fehlschlagen_lassen(&self) {
        self.fehlschlagen.store(true, Ordering::SeqCst);
    }

    pub(crate) fn wieder_verbinden(&self) {
        self.fehlschlagen.store(false, Ordering::SeqCst);
    }

    /// Alle Binaer-Frames mit Zeitpunkt
    pub(crate) fn frames(&self) -> Vec<(Instant, Bytes)> {
        self.ereignisse
            .lock()
            .iter()
            .filter_map(|(t, e)| match e {
                Gesendet::Binaer(b) => Some((*t, b.clone())),
                _ => None,
            })
            .collect()
    }

    /// Zeitpunkt der ersten TTS-Nachricht mit dem gegebenen Zustand
    pub(crate) fn tts_zeitpunkt(&self, zustand: TtsZustand) -> Option<Instant> {
        let muster = format!("\"state\":\"{}\"", zustand.als_str());
        self.ereignisse.lock().iter().find_map(|(t, e)| match e {
            Gesendet::Text(json) if json.contains(&muster) => Some(*t),
            _ => None,
        })
    }

    /// Kurzform der Leitung: "start", "sentence_start:<text>", "stop", "stt:<text>",
    /// "audio:<erstes Byte>" und "close"
    pub(crate) fn protokoll(&self) -> Vec<String> {
        self.ereignisse
            .lock()
            .iter()
            .map(|(_, e)| match e {
                Gesendet::Binaer(b) => format!("audio:{}", b.first().copied().unwrap_or(0)),
                Gesendet::Geschlossen => "close".to_owned(),
                Gesendet::Text(json) => {
                    let wert: serde_json::Value =
                        serde_json::from_str(json).expect("gueltiges JSON");
                    match (wert["type"].as_str(), wert["state"].as_str()) {
                        (Some("tts"), Some("sentence_start")) => {
                            format!("sentence_start:{}", wert["text"].as_str().unwrap_or(""))
                        }
                        (Some("tts"), Some(state)) => state.to_owned(),
                        (Some("stt"), _) => format!("stt:{}", wert["text"].as_str().unwrap_or("")),
                        _ => json.clone(),
                    }
                }
            })
            .collect()
    }

    fn pruefen(&self) -> Result<()> {
        if self.fehlschlagen.load(Ordering::SeqCst) {
            return Err(RelaisFehler::transport("Verbindung zurueckgesetzt"));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for AufzeichnenderTransport {
    async fn binaer_senden(&self, daten: Bytes) -> Result<()> {
        self.pruefen()?;
        self.ereignisse.lock().push((Instant::now(), Gesendet::Binaer(daten)));
        Ok(())
    }

    async fn text_senden(&self, text: String) -> Result<()> {
        self.pruefen()?;
        self.ereignisse.lock().push((Instant::now(), Gesendet::Text(text)));
        Ok(())
    }

    async fn schliessen(&self) -> Result<()> {
        self.ereignisse.lock().push((Instant::now(), Gesendet::Geschlossen));
        Ok(())
    }
}

/// Hinweiston aus festen Paketen
pub(crate) struct FesterHinweisTon(pub Vec<Bytes>);

#[async_trait]
impl HinweisTon for FesterHinweisTon {
    async fn pakete_laden(&self, _pfad: &str) -> Result<Vec<Bytes>> {
        Ok(self.0.clone())
    }
}

/// Test-Paket, dessen erstes Byte die laufende Nummer traegt
pub(crate) fn paket(nr: u8) -> Bytes {
    Bytes::from(vec![nr; 20])
}

pub(crate) fn ms(wert: u64) -> Duration {
    Duration::from_millis(wert)
}
