//! sprachrelais-voice – Echtzeit-Audiozustellung
//!
//! Liefert synthetisierte Sprache im Wiedergabetakt an den Client und
//! verzahnt dabei die Steuernachrichten (Zug- und Satzgrenzen) mit dem Audio.
//!
//! ## Module
//! - [`config`] – Sende-Konfiguration pro Verbindung
//! - [`verbindung`] – Schnittstelle zur Client-Verbindung (Transport, Session-Zustand)
//! - [`flusskontrolle`] – Zaehler, Satz-Bindung und Zustellung eines einzelnen Pakets
//! - [`rate_controller`] – Warteschlange mit Hintergrund-Taktschleife
//! - [`satz`] – Zustandsmaschine fuer Zug- und Satzgrenzen
//! - [`zustellung`] – Einstiegspunkt fuer alle audio-erzeugenden Aufrufer

pub mod config;
pub mod flusskontrolle;
pub mod rate_controller;
pub mod satz;
pub mod verbindung;
pub mod zustellung;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::AudioSendeConfig;
pub use flusskontrolle::FlussKontrolle;
pub use rate_controller::{RateController, TaktZustand};
pub use satz::{SatzProtokoll, SatzTyp};
pub use verbindung::{HinweisTon, Transport, Verbindung};
pub use zustellung::{AudioZustellung, ZustellModus};

/// Dauer eines Opus-Frames in Millisekunden
pub const AUDIO_FRAME_DAUER_MS: u64 = 60;

/// Anzahl der Pakete, die nach einer (Neu-)Bindung ohne Takt gesendet werden
pub const PRE_BUFFER_COUNT: u64 = 5;
