//! Flusskontrolle – Zaehler und Satz-Bindung einer Verbindung
//!
//! Vorgepufferte (direkt gesendete) und getaktete Pakete teilen sich
//! dieselben Zaehler. Deshalb laeuft jede Zustellung ueber
//! [`paket_zustellen`], das den `tokio::sync::Mutex` ueber den gesamten
//! Schreibvorgang haelt: Sequenznummern kollidieren nie und steigen in
//! Zustellreihenfolge.

use bytes::Bytes;
use sprachrelais_core::{RelaisFehler, Result, SatzId};
use sprachrelais_protocol::RelayFrame;
use tokio::sync::Mutex;

use crate::verbindung::{jetzt_ms, Verbindung};
use crate::PRE_BUFFER_COUNT;

/// Per-Verbindung Zaehler der Audiozustellung
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlussKontrolle {
    /// Seit der letzten Bindung zugestellte Pakete (steuert den Vorpuffer)
    pub paket_zaehler: u64,
    /// Sequenznummer fuer Relay-Frames
    pub sequenz: u32,
    /// Satz, an den die Zaehler gebunden sind
    pub satz_id: Option<SatzId>,
}

impl FlussKontrolle {
    /// Bindet die Zaehler an einen neuen Satz und setzt sie auf 0
    pub fn binden(&mut self, satz_id: SatzId) {
        self.paket_zaehler = 0;
        self.sequenz = 0;
        self.satz_id = Some(satz_id);
    }

    /// Prueft ob die Bindung noch zum aktuellen Satz der Verbindung passt
    ///
    /// # Fehler
    /// `VeralteteBindung` wenn nicht gebunden oder an einen anderen Satz gebunden
    pub fn pruefen(&self, aktuell: &SatzId) -> Result<()> {
        match &self.satz_id {
            Some(gebunden) if gebunden == aktuell => Ok(()),
            _ => Err(RelaisFehler::VeralteteBindung),
        }
    }

    /// Solange true, werden Pakete ohne Takt sofort gesendet
    pub fn vorpuffer_aktiv(&self) -> bool {
        self.paket_zaehler < PRE_BUFFER_COUNT
    }

    fn zugestellt(&mut self) {
        self.paket_zaehler += 1;
        self.sequenz = self.sequenz.wrapping_add(1);
    }
}

/// Relay-Zeitstempel: Wanduhr-Millisekunden modulo 2^32
pub fn relay_zeitstempel() -> u32 {
    (jetzt_ms() % (1u64 << 32)) as u32
}

/// Stellt ein einzelnes Paket zu und zaehlt es
///
/// Ueber das Gateway wird das Paket mit aktueller Sequenz in einen
/// Relay-Frame verpackt, sonst roh gesendet. Transportfehler werden
/// unveraendert an den Aufrufer gegeben; die Zaehler bleiben dann stehen.
pub async fn paket_zustellen(
    verbindung: &Verbindung,
    fluss: &Mutex<FlussKontrolle>,
    paket: &Bytes,
) -> Result<()> {
    let mut fluss = fluss.lock().await;
    verbindung.aktivitaet_vermerken();

    if verbindung.ueber_gateway() {
        let frame = RelayFrame::encode(paket, fluss.sequenz, relay_zeitstempel())?;
        verbindung.binaer_senden(frame).await?;
    } else {
        verbindung.binaer_senden(paket.clone()).await?;
    }

    fluss.zugestellt();
    tracing::trace!(
        session_id = %verbindung.session_id(),
        sequenz = fluss.sequenz.wrapping_sub(1),
        bytes = paket.len(),
        "Audiopaket zugestellt"
    );
    drop(fluss);

    verbindung.spricht_setzen(true);
    Ok(())
}
