//! Sende-Konfiguration pro Verbindung
//!
//! Die Feldnamen entsprechen den Schluesseln der Backend-Konfiguration,
//! damit eine bestehende Konfigurationsdatei unveraendert gelesen werden kann.

use serde::{Deserialize, Serialize};
use sprachrelais_core::{RelaisFehler, Result};
use std::time::Duration;

use crate::AUDIO_FRAME_DAUER_MS;

/// Standardpfad des Hinweistons nach dem Sprechende
pub const STANDARD_HINWEIS_TON: &str = "config/assets/tts_notify.mp3";

/// Konfiguration fuer die Audiozustellung einer Verbindung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSendeConfig {
    /// Feste Verzoegerung pro Paket in ms (`<= 0` = dynamischer Takt)
    pub tts_audio_send_delay: i64,
    /// Hinweiston vor der Stop-Nachricht abspielen
    pub enable_stop_tts_notify: bool,
    /// Pfad des Hinweistons
    pub stop_tts_notify_voice: String,
    /// Abschluss-Prompt des Agenten
    pub end_prompt: EndPrompt,
    /// Dauer eines Frames in ms (Takt der Hintergrundschleife)
    pub frame_dauer_ms: u64,
}

impl Default for AudioSendeConfig {
    fn default() -> Self {
        Self {
            tts_audio_send_delay: -1,
            enable_stop_tts_notify: false,
            stop_tts_notify_voice: STANDARD_HINWEIS_TON.into(),
            end_prompt: EndPrompt::default(),
            frame_dauer_ms: AUDIO_FRAME_DAUER_MS,
        }
    }
}

/// Abschluss-Prompt; erkennt das ASR genau diesen Text, wird keine STT-Nachricht gesendet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndPrompt {
    pub prompt: Option<String>,
}

impl AudioSendeConfig {
    /// Feste Verzoegerung pro Paket, falls konfiguriert
    pub fn feste_verzoegerung(&self) -> Option<Duration> {
        (self.tts_audio_send_delay > 0)
            .then(|| Duration::from_millis(self.tts_audio_send_delay as u64))
    }

    /// Frame-Dauer als `Duration`
    pub fn frame_dauer(&self) -> Duration {
        Duration::from_millis(self.frame_dauer_ms)
    }

    /// Gibt den Abschluss-Prompt zurueck, falls gesetzt und nicht leer
    pub fn end_prompt(&self) -> Option<&str> {
        self.end_prompt.prompt.as_deref().filter(|p| !p.is_empty())
    }

    /// Validiert die Konfiguration
    pub fn validieren(&self) -> Result<()> {
        if self.frame_dauer_ms == 0 {
            return Err(RelaisFehler::Konfiguration(
                "frame_dauer_ms muss groesser als 0 sein".into(),
            ));
        }
        if self.enable_stop_tts_notify && self.stop_tts_notify_voice.is_empty() {
            return Err(RelaisFehler::Konfiguration(
                "stop_tts_notify_voice darf bei aktivem Hinweiston nicht leer sein".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_ist_dynamischer_takt() {
        let cfg = AudioSendeConfig::default();
        assert_eq!(cfg.feste_verzoegerung(), None);
        assert_eq!(cfg.frame_dauer(), Duration::from_millis(60));
        assert!(cfg.validieren().is_ok());
    }

    #[test]
    fn feste_verzoegerung_nur_positiv() {
        let mut cfg = AudioSendeConfig {
            tts_audio_send_delay: 0,
            ..Default::default()
        };
        assert_eq!(cfg.feste_verzoegerung(), None);
        cfg.tts_audio_send_delay = 40;
        assert_eq!(cfg.feste_verzoegerung(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn aus_toml_mit_end_prompt() {
        let cfg: AudioSendeConfig = toml::from_str(
            r#"
            tts_audio_send_delay = 20
            [end_prompt]
            prompt = "Tschuess"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.end_prompt(), Some("Tschuess"));
        assert!(!cfg.enable_stop_tts_notify);
        assert_eq!(cfg.stop_tts_notify_voice, STANDARD_HINWEIS_TON);
    }

    #[test]
    fn leerer_prompt_zaehlt_nicht() {
        let cfg = AudioSendeConfig {
            end_prompt: EndPrompt {
                prompt: Some(String::new()),
            },
            ..Default::default()
        };
        assert_eq!(cfg.end_prompt(), None);
    }

    #[test]
    fn validierung_frame_dauer_null() {
        let cfg = AudioSendeConfig {
            frame_dauer_ms: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validieren(), Err(RelaisFehler::Konfiguration(_))));
    }

    #[test]
    fn hinweiston_ohne_pfad_ungueltig() {
        let cfg = AudioSendeConfig {
            enable_stop_tts_notify: true,
            stop_tts_notify_voice: String::new(),
            ..Default::default()
        };
        assert!(matches!(cfg.validieren(), Err(RelaisFehler::Konfiguration(_))));
    }
}
