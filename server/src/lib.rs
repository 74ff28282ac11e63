//! sprachrelais-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und stellt die Verbindungsfabrik bereit,
//! ueber die die Transportschicht pro Client eine Audiozustellung erhaelt.

pub mod config;
pub mod logging;

use anyhow::Result;
use config::ServerConfig;
use sprachrelais_core::SessionId;
use sprachrelais_voice::{AudioZustellung, HinweisTon, Transport, Verbindung};
use std::sync::Arc;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    hinweis_ton: Option<Arc<dyn HinweisTon>>,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self {
            config,
            hinweis_ton: None,
        }
    }

    /// Setzt den Anbieter fuer den Hinweiston nach dem Sprechende
    pub fn mit_hinweis_ton(mut self, hinweis_ton: Arc<dyn HinweisTon>) -> Self {
        self.hinweis_ton = Some(hinweis_ton);
        self
    }

    /// Erstellt Session-Zustand und Audiozustellung fuer eine neue Client-Verbindung
    ///
    /// `ueber_gateway` waehlt Relay-Frames statt rohem Opus.
    pub fn verbindung_oeffnen(
        &self,
        transport: Arc<dyn Transport>,
        session_id: SessionId,
        ueber_gateway: bool,
    ) -> AudioZustellung {
        tracing::info!(
            session_id = %session_id,
            ueber_gateway,
            "Neue Verbindung"
        );
        let verbindung = Arc::new(Verbindung::neu(
            session_id,
            transport,
            self.config.audio.clone(),
            ueber_gateway,
        ));
        let zustellung = AudioZustellung::neu(verbindung);
        match &self.hinweis_ton {
            Some(hinweis_ton) => zustellung.mit_hinweis_ton(Arc::clone(hinweis_ton)),
            None => zustellung,
        }
    }

    /// Protokolliert die aktive Konfiguration und laeuft bis zum Shutdown-Signal
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %self.config.bind_adresse(),
            "Server startet"
        );

        let audio = &self.config.audio;
        tracing::info!(
            frame_dauer_ms = audio.frame_dauer_ms,
            feste_verzoegerung_ms = audio.feste_verzoegerung().map(|d| d.as_millis() as u64),
            hinweis_ton = audio.enable_stop_tts_notify,
            "Audiozustellung konfiguriert"
        );
        if audio.enable_stop_tts_notify && self.hinweis_ton.is_none() {
            tracing::warn!("Hinweiston aktiviert, aber kein Anbieter gesetzt");
        }

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        Ok(())
    }
}
