//! Audio-Zustellung – Einstiegspunkt fuer alle audio-erzeugenden Aufrufer
//!
//! Waehlt pro Paket den Zustellweg und verzahnt die Steuernachrichten des
//! [`SatzProtokoll`] mit dem Audio:
//!
//! ```text
//! zustellen(pakete, typ, text, modus)
//!   1. start            (erstes Frame des Zugs)
//!   2. sentence_start   (Erster; direkt oder ueber den Rate Controller)
//!   3. Controller binden (fehlt / gestoppt / im Strom-Modus neuer Satz)
//!   4. pro Paket:
//!        Abbruch?          -> Ende (kein Fehler)
//!        Vorpuffer aktiv   -> sofort senden
//!        feste Verzoegerung-> schlafen, dann senden
//!        sonst             -> in den Rate Controller einreihen
//!   5. Letzter: Hinweiston, warten bis leer, Jitter-Zeit, stop, ggf. schliessen
//! ```
//!
//! Transportfehler gehen an den Aufrufer. Ein Client-Abbruch kuerzt die
//! Zustellung, ist aber kein Fehler.

use bytes::Bytes;
use futures_util::FutureExt;
use sprachrelais_core::{RelaisFehler, Result};
use sprachrelais_protocol::control::SprecherText;
use sprachrelais_protocol::text::{emoji_entfernen, ohne_satzzeichen_oder_emoji};
use sprachrelais_protocol::{Steuernachricht, TtsZustand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::flusskontrolle::{paket_zustellen, FlussKontrolle};
use crate::rate_controller::{RateController, TaktZustand, ZustellCallback};
use crate::satz::{ProtokollZustand, SatzProtokoll, SatzTyp, Uebergang};
use crate::verbindung::{HinweisTon, Verbindung};
use crate::PRE_BUFFER_COUNT;

/// Aufrufmuster der Zustellung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZustellModus {
    /// Vorberechneter Stapel von Paketen; der Controller wird nur bei Bedarf neu gebunden
    Stapel,
    /// Einzelnes gestreamtes Paket; ein Wechsel der Satzkennung bindet den Controller neu
    Strom,
}

/// Audio-Zustellung einer Verbindung
pub struct AudioZustellung {
    verbindung: Arc<Verbindung>,
    takt: Option<RateController>,
    fluss: Arc<Mutex<FlussKontrolle>>,
    protokoll: SatzProtokoll,
    hinweis_ton: Option<Arc<dyn HinweisTon>>,
}

impl AudioZustellung {
    pub fn neu(verbindung: Arc<Verbindung>) -> Self {
        Self {
            verbindung,
            takt: None,
            fluss: Arc::new(Mutex::new(FlussKontrolle::default())),
            protokoll: SatzProtokoll::neu(),
            hinweis_ton: None,
        }
    }

    /// Setzt den Anbieter fuer den Hinweiston vor `stop`
    pub fn mit_hinweis_ton(mut self, hinweis_ton: Arc<dyn HinweisTon>) -> Self {
        self.hinweis_ton = Some(hinweis_ton);
        self
    }

    pub fn verbindung(&self) -> &Arc<Verbindung> {
        &self.verbindung
    }

    /// Zustand des Rate Controllers (`None` = noch keiner angelegt)
    pub fn takt_zustand(&self) -> Option<TaktZustand> {
        self.takt.as_ref().map(RateController::zustand)
    }

    pub fn protokoll_zustand(&self) -> ProtokollZustand {
        self.protokoll.zustand()
    }

    /// Momentaufnahme der Flusskontrolle
    pub async fn fluss(&self) -> FlussKontrolle {
        self.fluss.lock().await.clone()
    }

    /// Beginnt einen neuen Zug; das naechste Paket sendet wieder `start`
    pub fn neuer_zug(&mut self) {
        self.protokoll.zuruecksetzen();
    }

    // -----------------------------------------------------------------------
    // Zustellung
    // -----------------------------------------------------------------------

    /// Stellt einen Stapel (oder im Strom-Modus ein einzelnes Paket) zu
    ///
    /// Ein leerer Stapel sendet nur die faelligen Steuernachrichten.
    pub async fn zustellen(
        &mut self,
        pakete: Vec<Bytes>,
        typ: SatzTyp,
        text: Option<&str>,
        modus: ZustellModus,
    ) -> Result<()> {
        let vorher = self.protokoll.clone();
        let uebergang = self.protokoll.frame_empfangen(typ, text);

        // Zug bzw. Satz gilt erst als begonnen, wenn die Nachricht raus ist
        if let Err(e) = self.grenzen_melden(&uebergang, text, modus).await {
            self.protokoll = vorher;
            return Err(e);
        }

        self.audio_senden(&pakete, modus).await?;

        if typ != SatzTyp::Mitte {
            tracing::info!(
                session_id = %self.verbindung.session_id(),
                satz_typ = ?typ,
                text = text.unwrap_or_default(),
                pakete = pakete.len(),
                "Audionachricht gesendet"
            );
        }

        if uebergang.zug_ende {
            self.zug_beenden().await?;
        }
        Ok(())
    }

    /// Sendet die Erkennungsnachricht fuer gesprochenen Text, gefolgt von `start`
    ///
    /// Entspricht der Text dem Abschluss-Prompt, wird nur `start` gesendet.
    /// Sprecher-JSON (`{"speaker":..,"content":..}`) wird entpackt und der
    /// Sprecher an der Verbindung vermerkt.
    pub async fn stt_nachricht_senden(&self, text: &str) -> Result<()> {
        if self.verbindung.config().end_prompt() == Some(text) {
            tracing::debug!(session_id = %self.verbindung.session_id(), "Abschluss-Prompt erkannt");
            return self.tts_senden(TtsZustand::Start, None).await;
        }

        let anzeige = match SprecherText::parsen(text) {
            Some(sprecher_text) => {
                if let Some(sprecher) = sprecher_text.speaker {
                    self.verbindung.sprecher_setzen(Some(sprecher));
                }
                sprecher_text.content
            }
            None => text.to_owned(),
        };

        let stt_text = ohne_satzzeichen_oder_emoji(&anzeige);
        let nachricht = Steuernachricht::stt(stt_text, self.verbindung.session_id().clone());
        self.verbindung.nachricht_senden(&nachricht).await?;
        self.tts_senden(TtsZustand::Start, None).await
    }

    /// Beendet den Rate Controller der Verbindung endgueltig
    pub async fn abbauen(&mut self) {
        if let Some(takt) = self.takt.as_mut() {
            takt.abbauen().await;
        }
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    async fn grenzen_melden(
        &self,
        uebergang: &Uebergang,
        text: Option<&str>,
        modus: ZustellModus,
    ) -> Result<()> {
        if uebergang.zug_start {
            tracing::info!(
                session_id = %self.verbindung.session_id(),
                text = text.unwrap_or_default(),
                "Erste Sprachnachricht des Zugs"
            );
            self.tts_senden(TtsZustand::Start, None).await?;
        }
        if let Some(satz_text) = &uebergang.satz_start {
            self.satz_start_senden(satz_text, modus).await?;
        }
        Ok(())
    }

    async fn tts_senden(&self, zustand: TtsZustand, text: Option<String>) -> Result<()> {
        let nachricht = Steuernachricht::tts(zustand, self.verbindung.session_id().clone(), text);
        self.verbindung.nachricht_senden(&nachricht).await
    }

    /// `sentence_start` muss vor dem ersten Audio des Satzes auf der Leitung liegen.
    /// Liegt noch Audio des vorigen Satzes im Controller, wird die Nachricht dahinter
    /// eingereiht, sonst sofort gesendet.
    async fn satz_start_senden(&self, text: &str, modus: ZustellModus) -> Result<()> {
        let nachricht = Steuernachricht::tts(
            TtsZustand::SentenceStart,
            self.verbindung.session_id().clone(),
            Some(emoji_entfernen(text)),
        );

        let einreihen = !self.neu_binden_noetig(modus).await
            && self.takt.as_ref().is_some_and(|takt| !takt.ist_leer());

        match self.takt.as_ref() {
            Some(takt) if einreihen => {
                tracing::debug!(
                    session_id = %self.verbindung.session_id(),
                    ausstehend = takt.ausstehend(),
                    "sentence_start hinter ausstehendes Audio eingereiht"
                );
                let verbindung = Arc::clone(&self.verbindung);
                takt.steuerung_einreihen(Box::new(move || {
                    async move { verbindung.nachricht_senden(&nachricht).await }.boxed()
                }));
                Ok(())
            }
            _ => self.verbindung.nachricht_senden(&nachricht).await,
        }
    }

    /// Controller fehlt, ist gestoppt oder (Strom-Modus) an einen anderen Satz gebunden
    async fn neu_binden_noetig(&self, modus: ZustellModus) -> bool {
        match &self.takt {
            None => true,
            Some(takt) if takt.zustand() != TaktZustand::Laeuft => true,
            Some(_) => match modus {
                ZustellModus::Stapel => false,
                ZustellModus::Strom => self
                    .fluss
                    .lock()
                    .await
                    .pruefen(&self.verbindung.satz_id())
                    .is_err(),
            },
        }
    }

    fn zustell_callback(&self) -> ZustellCallback {
        let verbindung = Arc::clone(&self.verbindung);
        let fluss = Arc::clone(&self.fluss);
        Arc::new(move |paket: Bytes| {
            let verbindung = Arc::clone(&verbindung);
            let fluss = Arc::clone(&fluss);
            async move {
                if verbindung.client_abbruch() {
                    return Err(RelaisFehler::Abgebrochen);
                }
                paket_zustellen(&verbindung, &fluss, &paket).await
            }
            .boxed()
        })
    }

    /// Bindet Flusskontrolle und Controller an den aktuellen Satz, falls noetig
    async fn takt_vorbereiten(&mut self, modus: ZustellModus) {
        if !self.neu_binden_noetig(modus).await {
            return;
        }

        let satz_id = self.verbindung.satz_id();
        let callback = self.zustell_callback();
        let frame_dauer = self.verbindung.config().frame_dauer();

        let takt = self
            .takt
            .get_or_insert_with(|| RateController::neu(frame_dauer));
        takt.zuruecksetzen().await;
        self.fluss.lock().await.binden(satz_id.clone());
        takt.starten(callback);

        tracing::debug!(
            session_id = %self.verbindung.session_id(),
            satz_id = %satz_id,
            modus = ?modus,
            "Flusskontrolle neu gebunden"
        );
    }

    fn takt_vermerken(&self) {
        if let Some(takt) = &self.takt {
            takt.takt_vermerken();
        }
    }

    async fn audio_senden(&mut self, pakete: &[Bytes], modus: ZustellModus) -> Result<()> {
        if pakete.is_empty() {
            return Ok(());
        }
        self.takt_vorbereiten(modus).await;

        let feste_verzoegerung = self.verbindung.config().feste_verzoegerung();
        for (index, paket) in pakete.iter().enumerate() {
            if self.abgebrochen(index) {
                return Ok(());
            }
            self.verbindung.aktivitaet_vermerken();

            let vorpuffer = self.fluss.lock().await.vorpuffer_aktiv();
            if vorpuffer {
                paket_zustellen(&self.verbindung, &self.fluss, paket).await?;
                self.takt_vermerken();
            } else if let Some(verzoegerung) = feste_verzoegerung {
                tokio::time::sleep(verzoegerung).await;
                if self.abgebrochen(index) {
                    return Ok(());
                }
                paket_zustellen(&self.verbindung, &self.fluss, paket).await?;
                self.takt_vermerken();
            } else if let Some(takt) = &self.takt {
                takt.audio_einreihen(paket.clone());
            }
        }
        Ok(())
    }

    fn abgebrochen(&self, index: usize) -> bool {
        let abbruch = self.verbindung.client_abbruch();
        if abbruch {
            tracing::debug!(
                session_id = %self.verbindung.session_id(),
                index,
                "Client-Abbruch, Zustellung gekuerzt"
            );
        }
        abbruch
    }

    /// Hinweiston, Leerlauf abwarten, `stop` senden, ggf. Verbindung schliessen
    async fn zug_beenden(&mut self) -> Result<()> {
        self.protokoll.zug_beenden();

        let config = self.verbindung.config().clone();
        if config.enable_stop_tts_notify {
            match self.hinweis_ton.clone() {
                Some(hinweis_ton) => {
                    match hinweis_ton.pakete_laden(&config.stop_tts_notify_voice).await {
                        Ok(pakete) => self.audio_senden(&pakete, ZustellModus::Stapel).await?,
                        Err(e) => tracing::warn!(
                            session_id = %self.verbindung.session_id(),
                            pfad = %config.stop_tts_notify_voice,
                            fehler = %e,
                            "Hinweiston konnte nicht geladen werden"
                        ),
                    }
                }
                None => tracing::debug!("Kein Hinweiston-Anbieter gesetzt"),
            }
        }

        self.warten_bis_abgespielt().await;
        self.verbindung.spricht_setzen(false);
        self.tts_senden(TtsZustand::Stop, None).await?;
        self.protokoll.zug_abgeschlossen();

        if self.verbindung.schliessen_nach_chat() {
            self.verbindung.schliessen().await?;
        }
        Ok(())
    }

    /// Wartet bis alles zugestellt ist und der Client den Vorpuffer abgespielt hat
    async fn warten_bis_abgespielt(&self) {
        let Some(takt) = &self.takt else {
            return;
        };
        tracing::debug!(
            session_id = %self.verbindung.session_id(),
            ausstehend = takt.ausstehend(),
            "Warte auf vollstaendige Zustellung"
        );
        takt.warten_bis_leer().await;

        tokio::time::sleep(jitter_wartezeit(takt.frame_dauer())).await;
        tracing::debug!(session_id = %self.verbindung.session_id(), "Audio vollstaendig gesendet");
    }
}

impl std::fmt::Debug for AudioZustellung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioZustellung")
            .field("verbindung", &self.verbindung)
            .field("takt", &self.takt)
            .field("protokoll", &self.protokoll)
            .finish()
    }
}

/// Wartezeit nach dem Leerlauf bis `stop`: Vorpuffer plus zwei Jitter-Pakete
/// liegen dann noch im Client-Puffer
pub fn jitter_wartezeit(frame_dauer: Duration) -> Duration {
    frame_dauer * (PRE_BUFFER_COUNT as u32 + 2)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
