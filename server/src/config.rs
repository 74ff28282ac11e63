//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};
use sprachrelais_voice::AudioSendeConfig;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Audiozustellung (gilt fuer jede neue Verbindung)
    pub audio: AudioSendeConfig,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Bind-Adresse der Client-Verbindungen
    pub bind_adresse: String,
    /// Port der Client-Verbindungen
    pub port: u16,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Sprachrelais".into(),
            bind_adresse: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// Eine JSON-Zeile pro Ereignis (fuer Log-Sammler)
    Json,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Filter-Direktive, z.B. "info" oder "sprachrelais_voice=trace,info"
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    /// Waehlt den Konfigurationspfad: Kommandozeile vor Umgebung vor `config.toml`
    pub fn pfad_bestimmen(argument: Option<String>, umgebung: Option<String>) -> String {
        argument
            .into_iter()
            .chain(umgebung)
            .find(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "config.toml".into())
    }

    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ));
            }
        };
        Ok(config)
    }

    /// Liest und validiert eine Konfiguration aus einem TOML-String
    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(inhalt)?;
        config.audio.validieren()?;
        Ok(config)
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.server.bind_adresse, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprachrelais_core::RelaisFehler;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.audio.tts_audio_send_delay, -1);
        assert_eq!(cfg.audio.frame_dauer_ms, 60);
        assert!(cfg.audio.validieren().is_ok());
    }

    #[test]
    fn bind_adresse() {
        assert_eq!(ServerConfig::default().bind_adresse(), "0.0.0.0:8000");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Kueche"

            [audio]
            tts_audio_send_delay = 50
            enable_stop_tts_notify = true

            [audio.end_prompt]
            prompt = "Auf Wiedersehen"

            [logging]
            format = "json"
        "#;
        let cfg = ServerConfig::aus_toml(toml).unwrap();
        assert_eq!(cfg.server.name, "Kueche");
        assert_eq!(cfg.audio.tts_audio_send_delay, 50);
        assert!(cfg.audio.enable_stop_tts_notify);
        assert_eq!(cfg.audio.end_prompt(), Some("Auf Wiedersehen"));
        assert_eq!(cfg.logging.format, LogFormat::Json);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn pfad_reihenfolge() {
        let arg = Some("arg.toml".to_string());
        let env = Some("env.toml".to_string());
        assert_eq!(ServerConfig::pfad_bestimmen(arg, env.clone()), "arg.toml");
        assert_eq!(ServerConfig::pfad_bestimmen(None, env), "env.toml");
        assert_eq!(ServerConfig::pfad_bestimmen(None, None), "config.toml");
    }

    #[test]
    fn unbekanntes_log_format_wird_abgelehnt() {
        assert!(ServerConfig::aus_toml("[logging]\nformat = \"xml\"\n").is_err());
    }

    #[test]
    fn ungueltige_frame_dauer_wird_abgelehnt() {
        let fehler = ServerConfig::aus_toml("[audio]\nframe_dauer_ms = 0\n").unwrap_err();
        assert!(fehler.downcast_ref::<RelaisFehler>().is_some());
        assert!(fehler.to_string().starts_with("Konfigurationsfehler"));
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/sprachrelais.toml").unwrap();
        assert_eq!(cfg.server.name, "Sprachrelais");
    }
}
