//! Verbindung – Zustand einer Client-Session aus Sicht der Audiozustellung
//!
//! Der eigentliche Transport (WebSocket, Gateway-Socket) liegt ausserhalb
//! dieses Crates und wird ueber den [`Transport`]-Trait angebunden. Der
//! Session-Zustand, den Zustellung und Taktschleife teilen, liegt explizit
//! in [`Verbindung`]:
//!
//! - `client_abbruch` wird an jeder Frame-Grenze abgefragt
//! - `client_spricht` / `letzte_aktivitaet_ms` werden bei jeder Zustellung gesetzt
//! - `satz_id` ist die aktuelle Satzkennung, an die sich die Flusskontrolle bindet
//!
//! Thread-safe durch Atomics und kurze `parking_lot`-Locks (nie ueber `.await`).

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use sprachrelais_core::{RelaisFehler, Result, SatzId, SessionId};
use sprachrelais_protocol::Steuernachricht;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::AudioSendeConfig;

// ---------------------------------------------------------------------------
// Externe Schnittstellen
// ---------------------------------------------------------------------------

/// Schreibende Seite der Client-Verbindung
///
/// Aufrufe pro Verbindung muessen in Aufrufreihenfolge auf der Leitung landen.
/// Wiederholungen bei Fehlern sind Sache der Implementierung.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sendet ein Binaer-Frame (Opus-Paket oder Relay-Frame)
    async fn binaer_senden(&self, daten: Bytes) -> Result<()>;

    /// Sendet eine Text-Nachricht (JSON)
    async fn text_senden(&self, text: String) -> Result<()>;

    /// Schliesst die Verbindung
    async fn schliessen(&self) -> Result<()>;
}

/// Liefert die Opus-Pakete einer Audiodatei (z.B. des Hinweistons)
///
/// Das Dekodieren/Enkodieren selbst ist nicht Teil dieses Crates.
#[async_trait]
pub trait HinweisTon: Send + Sync + 'static {
    async fn pakete_laden(&self, pfad: &str) -> Result<Vec<Bytes>>;
}

// ---------------------------------------------------------------------------
// Verbindung
// ---------------------------------------------------------------------------

/// Gibt die aktuelle Wanduhrzeit in Millisekunden zurueck
pub fn jetzt_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Per-Verbindung geteilter Session-Zustand
pub struct Verbindung {
    session_id: SessionId,
    transport: Arc<dyn Transport>,
    config: AudioSendeConfig,
    /// Verbindung kommt ueber das Gateway (Relay-Frames statt rohem Opus)
    ueber_gateway: bool,
    satz_id: RwLock<SatzId>,
    client_abbruch: AtomicBool,
    client_spricht: AtomicBool,
    schliessen_nach_chat: AtomicBool,
    letzte_aktivitaet_ms: AtomicU64,
    aktueller_sprecher: Mutex<Option<String>>,
}

impl Verbindung {
    /// Erstellt eine neue Verbindung
    pub fn neu(
        session_id: SessionId,
        transport: Arc<dyn Transport>,
        config: AudioSendeConfig,
        ueber_gateway: bool,
    ) -> Self {
        Self {
            session_id,
            transport,
            config,
            ueber_gateway,
            satz_id: RwLock::new(SatzId::new()),
            client_abbruch: AtomicBool::new(false),
            client_spricht: AtomicBool::new(false),
            schliessen_nach_chat: AtomicBool::new(false),
            letzte_aktivitaet_ms: AtomicU64::new(jetzt_ms()),
            aktueller_sprecher: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn config(&self) -> &AudioSendeConfig {
        &self.config
    }

    pub fn ueber_gateway(&self) -> bool {
        self.ueber_gateway
    }

    // --- Satz-Kennung ---

    /// Aktuelle Satzkennung der Verbindung
    pub fn satz_id(&self) -> SatzId {
        self.satz_id.read().clone()
    }

    /// Setzt die Satzkennung (vom TTS-Backend bei jedem neuen Satz/Zug)
    pub fn satz_id_setzen(&self, satz_id: SatzId) {
        *self.satz_id.write() = satz_id;
    }

    // --- Flags ---

    pub fn client_abbruch(&self) -> bool {
        self.client_abbruch.load(Ordering::Acquire)
    }

    pub fn abbruch_setzen(&self, abbruch: bool) {
        self.client_abbruch.store(abbruch, Ordering::Release);
    }

    pub fn client_spricht(&self) -> bool {
        self.client_spricht.load(Ordering::Acquire)
    }

    pub fn spricht_setzen(&self, spricht: bool) {
        self.client_spricht.store(spricht, Ordering::Release);
    }

    pub fn schliessen_nach_chat(&self) -> bool {
        self.schliessen_nach_chat.load(Ordering::Acquire)
    }

    /// Verbindung nach dem laufenden Zug schliessen
    pub fn schliessen_nach_chat_setzen(&self, schliessen: bool) {
        self.schliessen_nach_chat.store(schliessen, Ordering::Release);
    }

    // --- Aktivitaet ---

    /// Vermerkt die aktuelle Zeit als letzte Aktivitaet (fuer Idle-Erkennung)
    pub fn aktivitaet_vermerken(&self) {
        self.letzte_aktivitaet_ms.store(jetzt_ms(), Ordering::Release);
    }

    pub fn letzte_aktivitaet_ms(&self) -> u64 {
        self.letzte_aktivitaet_ms.load(Ordering::Acquire)
    }

    // --- Sprecher ---

    pub fn aktueller_sprecher(&self) -> Option<String> {
        self.aktueller_sprecher.lock().clone()
    }

    pub fn sprecher_setzen(&self, sprecher: Option<String>) {
        *self.aktueller_sprecher.lock() = sprecher;
    }

    // --- Senden ---

    /// Gibt ein Binaer-Frame an den Transport
    pub async fn binaer_senden(&self, daten: Bytes) -> Result<()> {
        self.transport.binaer_senden(daten).await
    }

    /// Serialisiert und sendet eine Steuernachricht
    pub async fn nachricht_senden(&self, nachricht: &Steuernachricht) -> Result<()> {
        let json = nachricht
            .to_json()
            .map_err(|e| RelaisFehler::intern(format!("Steuernachricht nicht serialisierbar: {e}")))?;
        tracing::trace!(session_id = %self.session_id, nachricht = %json, "Steuernachricht gesendet");
        self.transport.text_senden(json).await
    }

    /// Schliesst die Verbindung
    pub async fn schliessen(&self) -> Result<()> {
        tracing::info!(session_id = %self.session_id, "Verbindung wird geschlossen");
        self.transport.schliessen().await
    }
}

impl std::fmt::Debug for Verbindung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verbindung")
            .field("session_id", &self.session_id)
            .field("ueber_gateway", &self.ueber_gateway)
            .field("client_abbruch", &self.client_abbruch())
            .field("client_spricht", &self.client_spricht())
            .finish()
    }
}
