//! Rate Controller – getaktete Audiozustellung pro Verbindung
//!
//! Besitzt die Warteschlange ausstehender Pakete und genau eine
//! Hintergrund-Taktschleife, die sie im Wiedergabetakt leert.
//!
//! ## Architektur
//!
//! ```text
//! audio_einreihen() ----+
//!                       v
//!              VecDeque<Eintrag>  <-- steuerung_einreihen()
//!                       |
//!                       v
//!      Taktschleife (tokio-Task, einziger Leser)
//!          Eintrag::Audio      -> frist abwarten -> callback(paket)
//!          Eintrag::Steuerung  -> sofort ausfuehren (kein Takt)
//!                       |
//!                       v
//!        leer_signal = true sobald die letzte Zustellung durch ist
//! ```
//!
//! Steuer-Aktionen liegen in derselben Warteschlange wie Audio, damit sie
//! relativ zu bereits eingereihtem Audio in Reihenfolge bleiben.
//!
//! ## Takt
//! Ein Audio-Eintrag wird fruehestens eine Frame-Dauer nach der letzten
//! Zustellung gesendet. Direkt (am Controller vorbei) gesendete Pakete
//! melden sich ueber [`RateController::takt_vermerken`], damit das erste
//! getaktete Paket auch nach dem Vorpuffer den Abstand einhaelt.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use sprachrelais_core::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Maximale Wartezeit auf das Ende einer alten Taktschleife beim Zuruecksetzen
pub const RESET_WARTEZEIT: Duration = Duration::from_secs(1);

/// Steuer-Aktion ohne Argumente (z.B. eine Steuernachricht senden)
pub type Aktion = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Zustell-Callback der Taktschleife; fuehrt den eigentlichen Schreibvorgang aus
pub type ZustellCallback = Arc<dyn Fn(Bytes) -> BoxFuture<'static, Result<()>> + Send + Sync>;

enum Eintrag {
    Audio(Bytes),
    Steuerung(Aktion),
}

/// Zustand der Taktschleife
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaktZustand {
    /// Noch nicht gestartet bzw. zurueckgesetzt
    Bereit,
    /// Taktschleife laeuft
    Laeuft,
    /// Taktschleife hat sich beendet (Abbruch oder Fehler) oder Controller abgebaut
    Gestoppt,
}

// ---------------------------------------------------------------------------
// Geteilter Zustand (Controller <-> Taktschleife)
// ---------------------------------------------------------------------------

struct Geteilt {
    warteschlange: Mutex<VecDeque<Eintrag>>,
    neu_eingereiht: Notify,
    /// true = Warteschlange leer und letzte Zustellung abgeschlossen
    leer_tx: watch::Sender<bool>,
    /// Fruehester Zeitpunkt fuer das naechste Audio-Paket
    naechste_frist: Mutex<Option<Instant>>,
    frame_dauer: Duration,
}

impl Geteilt {
    fn einreihen(&self, eintrag: Eintrag) {
        {
            let mut queue = self.warteschlange.lock();
            queue.push_back(eintrag);
            self.leer_tx.send_replace(false);
        }
        self.neu_eingereiht.notify_one();
    }

    fn takt_vermerken(&self) {
        *self.naechste_frist.lock() = Some(Instant::now() + self.frame_dauer);
    }

    /// Setzt das Leer-Signal, falls in der Zwischenzeit nichts eingereiht wurde
    fn leer_melden_falls_leer(&self) {
        let queue = self.warteschlange.lock();
        if queue.is_empty() {
            self.leer_tx.send_replace(true);
        }
    }

    /// Verwirft alle ausstehenden Eintraege und meldet leer
    fn verwerfen(&self) -> usize {
        let mut queue = self.warteschlange.lock();
        let verworfen = queue.len();
        queue.clear();
        self.leer_tx.send_replace(true);
        verworfen
    }
}

// ---------------------------------------------------------------------------
// RateController
// ---------------------------------------------------------------------------

/// Warteschlange mit Hintergrund-Taktschleife (eine pro Verbindung)
pub struct RateController {
    geteilt: Arc<Geteilt>,
    abbruch: CancellationToken,
    task: Option<JoinHandle<()>>,
    abgebaut: bool,
}

impl RateController {
    /// Erstellt einen Controller mit der gegebenen Frame-Dauer (Taktschleife noch nicht gestartet)
    pub fn neu(frame_dauer: Duration) -> Self {
        let (leer_tx, _) = watch::channel(true);
        Self {
            geteilt: Arc::new(Geteilt {
                warteschlange: Mutex::new(VecDeque::new()),
                neu_eingereiht: Notify::new(),
                leer_tx,
                naechste_frist: Mutex::new(None),
                frame_dauer,
            }),
            abbruch: CancellationToken::new(),
            task: None,
            abgebaut: false,
        }
    }

    pub fn frame_dauer(&self) -> Duration {
        self.geteilt.frame_dauer
    }

    /// Aktueller Zustand der Taktschleife
    pub fn zustand(&self) -> TaktZustand {
        if self.abgebaut {
            return TaktZustand::Gestoppt;
        }
        match &self.task {
            None => TaktZustand::Bereit,
            Some(task) if task.is_finished() => TaktZustand::Gestoppt,
            Some(_) => TaktZustand::Laeuft,
        }
    }

    /// Anzahl ausstehender Eintraege (Audio und Steuerung)
    pub fn ausstehend(&self) -> usize {
        self.geteilt.warteschlange.lock().len()
    }

    /// Reiht ein Audio-Paket ein; blockiert nie
    ///
    /// Nach [`RateController::abbauen`] wird das Paket stillschweigend verworfen.
    pub fn audio_einreihen(&self, paket: Bytes) {
        if self.abgebaut {
            tracing::trace!("Controller abgebaut, Audiopaket verworfen");
            return;
        }
        self.geteilt.einreihen(Eintrag::Audio(paket));
    }

    /// Reiht eine Steuer-Aktion ein; sie laeuft ohne Taktverzoegerung,
    /// aber erst nach allen zuvor eingereihten Eintraegen
    pub fn steuerung_einreihen(&self, aktion: Aktion) {
        if self.abgebaut {
            tracing::trace!("Controller abgebaut, Steuer-Aktion verworfen");
            return;
        }
        self.geteilt.einreihen(Eintrag::Steuerung(aktion));
    }

    /// Vermerkt eine direkte Zustellung am Controller vorbei (Vorpuffer, feste Verzoegerung)
    pub fn takt_vermerken(&self) {
        self.geteilt.takt_vermerken();
    }

    /// true wenn nichts mehr aussteht (auch kein gerade laufender Zustellvorgang)
    pub fn ist_leer(&self) -> bool {
        *self.geteilt.leer_tx.borrow()
    }

    /// Empfaenger fuer das Leer-Signal (true = alles zugestellt)
    pub fn leer_signal(&self) -> watch::Receiver<bool> {
        self.geteilt.leer_tx.subscribe()
    }

    /// Wartet bis die Warteschlange vollstaendig zugestellt ist
    ///
    /// Kehrt sofort zurueck, wenn keine Taktschleife laeuft.
    pub async fn warten_bis_leer(&self) {
        if self.zustand() != TaktZustand::Laeuft {
            return;
        }
        let mut rx = self.leer_signal();
        // Sender lebt so lange wie `self`
        let _ = rx.wait_for(|leer| *leer).await;
    }

    /// Startet die Taktschleife, falls sie nicht bereits laeuft (idempotent)
    pub fn starten(&mut self, callback: ZustellCallback) {
        if self.abgebaut || self.zustand() == TaktZustand::Laeuft {
            return;
        }
        if self.abbruch.is_cancelled() {
            self.abbruch = CancellationToken::new();
        }

        let geteilt = Arc::clone(&self.geteilt);
        let abbruch = self.abbruch.clone();
        self.task = Some(tokio::spawn(takt_schleife(geteilt, abbruch, callback)));
        tracing::debug!(
            frame_dauer_ms = self.geteilt.frame_dauer.as_millis() as u64,
            "Taktschleife gestartet"
        );
    }

    /// Beendet die laufende Taktschleife, verwirft ausstehende Eintraege und setzt den Takt zurueck
    ///
    /// Wartet hoechstens `RESET_WARTEZEIT` auf das Ende der alten Schleife und
    /// bricht sie danach hart ab. Danach kann [`RateController::starten`]
    /// erneut aufgerufen werden.
    pub async fn zuruecksetzen(&mut self) {
        self.abbruch.cancel();
        // Vor dem Warten leeren: eine noch laufende Zustellung darf danach nichts mehr entnehmen
        let verworfen = self.geteilt.verwerfen();
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(RESET_WARTEZEIT, &mut task).await.is_err() {
                tracing::warn!("Taktschleife reagiert nicht auf Abbruch, wird hart beendet");
                task.abort();
            }
        }

        self.geteilt.verwerfen();
        *self.geteilt.naechste_frist.lock() = None;
        self.abbruch = CancellationToken::new();
        tracing::debug!(verworfen, "Rate Controller zurueckgesetzt");
    }

    /// Beendet die Taktschleife endgueltig; spaeteres Einreihen wird ignoriert
    pub async fn abbauen(&mut self) {
        self.zuruecksetzen().await;
        self.abgebaut = true;
    }
}

impl Drop for RateController {
    fn drop(&mut self) {
        self.abbruch.cancel();
    }
}

impl std::fmt::Debug for RateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateController")
            .field("frame_dauer", &self.geteilt.frame_dauer)
            .field("zustand", &self.zustand())
            .field("ausstehend", &self.ausstehend())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Taktschleife
// ---------------------------------------------------------------------------

async fn takt_schleife(geteilt: Arc<Geteilt>, abbruch: CancellationToken, callback: ZustellCallback) {
    loop {
        // Auf den naechsten Eintrag oder das Abbruchsignal warten
        let eintrag = loop {
            if let Some(eintrag) = geteilt.warteschlange.lock().pop_front() {
                break eintrag;
            }
            tokio::select! {
                biased;
                _ = abbruch.cancelled() => return,
                _ = geteilt.neu_eingereiht.notified() => {}
            }
        };
        if abbruch.is_cancelled() {
            return;
        }

        let ergebnis = match eintrag {
            Eintrag::Steuerung(aktion) => aktion().await,
            Eintrag::Audio(paket) => {
                let frist = *geteilt.naechste_frist.lock();
                if let Some(frist) = frist {
                    tokio::select! {
                        biased;
                        _ = abbruch.cancelled() => return,
                        _ = tokio::time::sleep_until(frist) => {}
                    }
                }
                let ergebnis = callback(paket).await;
                if abbruch.is_cancelled() {
                    return;
                }
                geteilt.takt_vermerken();
                ergebnis
            }
        };

        if let Err(e) = ergebnis {
            let verworfen = geteilt.verwerfen();
            if e.ist_abbruch() {
                tracing::debug!(verworfen, "Taktschleife nach Client-Abbruch beendet");
            } else {
                tracing::warn!(
                    fehler = %e,
                    wiederholbar = e.ist_wiederholbar(),
                    verworfen,
                    "Taktschleife nach Zustellfehler beendet"
                );
            }
            return;
        }

        geteilt.leer_melden_falls_leer();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ms, paket};
    use futures_util::FutureExt;
    use sprachrelais_core::RelaisFehler;

    type Log = Arc<Mutex<Vec<(Instant, String)>>>;

    /// Callback, der jedes Paket mit Zeitpunkt protokolliert
    fn protokollierender_callback(log: Log) -> ZustellCallback {
        Arc::new(move |paket: Bytes| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push((Instant::now(), format!("audio:{}", paket[0])));
                Ok(())
            }
            .boxed()
        })
    }

    fn steuer_aktion(log: &Log, name: &'static str) -> Aktion {
        let log = Arc::clone(log);
        Box::new(move || {
            async move {
                log.lock().push((Instant::now(), name.to_owned()));
                Ok(())
            }
            .boxed()
        })
    }

    fn namen(log: &Log) -> Vec<String> {
        log.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn zustellung_in_reihenfolge_und_im_takt() {
        let log: Log = Arc::default();
        let mut rc = RateController::neu(ms(60));
        for nr in 0..5 {
            rc.audio_einreihen(paket(nr));
        }
        rc.starten(protokollierender_callback(Arc::clone(&log)));
        rc.warten_bis_leer().await;

        assert_eq!(
            namen(&log),
            vec!["audio:0", "audio:1", "audio:2", "audio:3", "audio:4"]
        );
        let zeiten: Vec<Instant> = log.lock().iter().map(|(t, _)| *t).collect();
        for paar in zeiten.windows(2) {
            assert!(paar[1] - paar[0] >= ms(60), "Takt unterschritten");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn steuerung_ohne_taktverzoegerung_in_reihenfolge() {
        let log: Log = Arc::default();
        let mut rc = RateController::neu(ms(60));
        rc.audio_einreihen(paket(1));
        rc.steuerung_einreihen(steuer_aktion(&log, "sentence_start"));
        rc.audio_einreihen(paket(2));
        rc.starten(protokollierender_callback(Arc::clone(&log)));
        rc.warten_bis_leer().await;

        assert_eq!(namen(&log), vec!["audio:1", "sentence_start", "audio:2"]);
        let eintraege = log.lock().clone();
        assert!(eintraege[1].0 - eintraege[0].0 < ms(5));
        assert!(eintraege[2].0 - eintraege[0].0 >= ms(60));
    }

    #[tokio::test(start_paused = true)]
    async fn vermerkter_takt_verzoegert_erstes_paket() {
        let log: Log = Arc::default();
        let mut rc = RateController::neu(ms(60));
        rc.starten(protokollierender_callback(Arc::clone(&log)));

        let direkt = Instant::now();
        rc.takt_vermerken();
        rc.audio_einreihen(paket(6));
        rc.warten_bis_leer().await;

        assert!(log.lock()[0].0 - direkt >= ms(60));
    }

    #[tokio::test(start_paused = true)]
    async fn leer_signal_folgt_der_warteschlange() {
        let log: Log = Arc::default();
        let mut rc = RateController::neu(ms(60));
        let rx = rc.leer_signal();
        assert!(*rx.borrow(), "neuer Controller gilt als leer");

        rc.audio_einreihen(paket(1));
        assert!(!*rx.borrow(), "Einreihen loescht das Leer-Signal");

        rc.starten(protokollierender_callback(Arc::clone(&log)));
        rc.warten_bis_leer().await;
        assert!(*rx.borrow());
        assert_eq!(rc.ausstehend(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn starten_ist_idempotent() {
        let log: Log = Arc::default();
        let mut rc = RateController::neu(ms(60));
        rc.starten(protokollierender_callback(Arc::clone(&log)));
        rc.starten(protokollierender_callback(Arc::clone(&log)));
        for nr in 0..3 {
            rc.audio_einreihen(paket(nr));
        }
        rc.warten_bis_leer().await;
        assert_eq!(log.lock().len(), 3);
        assert_eq!(rc.zustand(), TaktZustand::Laeuft);
    }

    #[tokio::test(start_paused = true)]
    async fn fehler_im_callback_stoppt_schleife() {
        let zaehler = Arc::new(Mutex::new(0u32));
        let z = Arc::clone(&zaehler);
        let callback: ZustellCallback = Arc::new(move |_paket: Bytes| {
            let z = Arc::clone(&z);
            async move {
                let mut n = z.lock();
                *n += 1;
                if *n == 2 {
                    return Err(RelaisFehler::Abgebrochen);
                }
                Ok(())
            }
            .boxed()
        });

        let mut rc = RateController::neu(ms(60));
        for nr in 0..5 {
            rc.audio_einreihen(paket(nr));
        }
        rc.starten(callback);
        tokio::time::sleep(ms(500)).await;

        assert_eq!(*zaehler.lock(), 2, "nach dem Fehler darf nichts mehr zugestellt werden");
        assert_eq!(rc.zustand(), TaktZustand::Gestoppt);
        assert_eq!(rc.ausstehend(), 0);
        assert!(*rc.leer_signal().borrow());

        // Nach Zuruecksetzen laesst sich der Controller erneut starten
        let log: Log = Arc::default();
        rc.zuruecksetzen().await;
        assert_eq!(rc.zustand(), TaktZustand::Bereit);
        rc.starten(protokollierender_callback(Arc::clone(&log)));
        rc.audio_einreihen(paket(9));
        rc.warten_bis_leer().await;
        assert_eq!(namen(&log), vec!["audio:9"]);
    }

    #[tokio::test(start_paused = true)]
    async fn zuruecksetzen_verwirft_ausstehendes() {
        let log: Log = Arc::default();
        let mut rc = RateController::neu(ms(60));
        for nr in 0..10 {
            rc.audio_einreihen(paket(nr));
        }
        rc.starten(protokollierender_callback(Arc::clone(&log)));
        tokio::time::sleep(ms(100)).await;

        rc.zuruecksetzen().await;
        let zugestellt = log.lock().len();
        assert!(zugestellt <= 2, "nur die ersten Pakete duerfen durch sein");
        assert_eq!(rc.ausstehend(), 0);
        assert_eq!(rc.zustand(), TaktZustand::Bereit);

        tokio::time::sleep(ms(500)).await;
        assert_eq!(log.lock().len(), zugestellt, "alte Schleife darf nicht weiterlaufen");
    }

    /// Callback, der vor dem Protokollieren eine Weile schlaeft
    fn langsamer_callback(log: Log, dauer: Duration) -> ZustellCallback {
        Arc::new(move |paket: Bytes| {
            let log = Arc::clone(&log);
            async move {
                tokio::time::sleep(dauer).await;
                log.lock().push((Instant::now(), format!("audio:{}", paket[0])));
                Ok(())
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn zuruecksetzen_waehrend_zustellung_verwirft_steuerung() {
        let log: Log = Arc::default();
        let mut rc = RateController::neu(ms(60));
        rc.audio_einreihen(paket(1));
        rc.steuerung_einreihen(steuer_aktion(&log, "alter_sentence_start"));
        rc.audio_einreihen(paket(2));
        rc.starten(langsamer_callback(Arc::clone(&log), ms(100)));

        // Paket 1 steckt jetzt im Callback
        tokio::time::sleep(ms(10)).await;
        rc.zuruecksetzen().await;
        tokio::time::sleep(ms(500)).await;

        assert_eq!(namen(&log), vec!["audio:1"]);
        assert_eq!(rc.ausstehend(), 0);
        assert!(rc.ist_leer());
    }

    #[tokio::test(start_paused = true)]
    async fn haengende_schleife_wird_hart_beendet() {
        let log: Log = Arc::default();
        let mut rc = RateController::neu(ms(60));
        rc.starten(langsamer_callback(Arc::clone(&log), Duration::from_secs(5)));
        rc.audio_einreihen(paket(1));
        tokio::time::sleep(ms(10)).await;

        let beginn = Instant::now();
        rc.zuruecksetzen().await;
        let gewartet = beginn.elapsed();
        assert!(gewartet >= RESET_WARTEZEIT);
        assert!(gewartet < Duration::from_secs(2));
        assert_eq!(rc.zustand(), TaktZustand::Bereit);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(log.lock().is_empty(), "abgebrochene Zustellung darf nicht fertig werden");
    }

    #[tokio::test(start_paused = true)]
    async fn abgebauter_controller_ignoriert_einreihen() {
        let log: Log = Arc::default();
        let mut rc = RateController::neu(ms(60));
        rc.starten(protokollierender_callback(Arc::clone(&log)));
        rc.abbauen().await;

        rc.audio_einreihen(paket(1));
        rc.steuerung_einreihen(steuer_aktion(&log, "nie"));
        assert_eq!(rc.ausstehend(), 0);
        assert_eq!(rc.zustand(), TaktZustand::Gestoppt);

        rc.starten(protokollierender_callback(Arc::clone(&log)));
        tokio::time::sleep(ms(200)).await;
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn warten_ohne_schleife_kehrt_sofort_zurueck() {
        let rc = RateController::neu(ms(60));
        rc.audio_einreihen(paket(1));
        rc.warten_bis_leer().await;
        assert_eq!(rc.zustand(), TaktZustand::Bereit);
    }
}
