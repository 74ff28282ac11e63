//! Relay-Protokoll (Gateway-Transport)
//!
//! Laeuft eine Verbindung ueber das Gateway, wird jedes Opus-Paket in einen
//! Frame mit festem 16-Byte-Header verpackt. Das Gateway liest die Frames
//! als fortlaufenden Byte-Strom.
//!
//! ## Frame-Format (Header = 16 Bytes, kein serde)
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       1   Typ (1 = Audio)
//!  1       1   reserviert (0)
//!  2       2   Nutzdaten-Laenge (big-endian)
//!  4       4   SequenzNummer (big-endian)
//!  8       4   Zeitstempel (big-endian, Wanduhr-ms mod 2^32)
//! 12       4   Nutzdaten-Laenge, wiederholt (big-endian)
//! 16+      N   Nutzdaten (Opus-Bytes)
//! ```
//!
//! Beide Laengenfelder muessen immer gleich der Nutzdaten-Laenge sein.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use sprachrelais_core::{RelaisFehler, Result};
use tokio_util::codec::{Decoder, Encoder};

/// Frame-Typ fuer Opus-Audio
pub const TYP_AUDIO: u8 = 1;

/// Maximale Nutzdaten-Laenge (begrenzt durch das 2-Byte-Laengenfeld)
pub const MAX_NUTZDATEN_LAENGE: usize = u16::MAX as usize;

// ---------------------------------------------------------------------------
// RelayFrameHeader
// ---------------------------------------------------------------------------

/// 16-Byte Header eines Relay-Frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayFrameHeader {
    /// Frame-Typ (siehe `TYP_AUDIO`)
    pub typ: u8,
    /// Laenge der Nutzdaten in Bytes
    pub nutzdaten_laenge: u16,
    /// Monoton steigende Sequenznummer innerhalb einer Satz-Bindung
    pub sequenz: u32,
    /// Sendezeitpunkt in Wanduhr-Millisekunden modulo 2^32
    pub zeitstempel: u32,
}

impl RelayFrameHeader {
    /// Header-Groesse in Bytes
    pub const SIZE: usize = 16;

    /// Erstellt einen Audio-Header
    pub fn audio(nutzdaten_laenge: u16, sequenz: u32, zeitstempel: u32) -> Self {
        Self {
            typ: TYP_AUDIO,
            nutzdaten_laenge,
            sequenz,
            zeitstempel,
        }
    }

    /// Serialisiert den Header in ein 16-Byte-Array (big-endian)
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.typ;
        buf[2..4].copy_from_slice(&self.nutzdaten_laenge.to_be_bytes());
        buf[4..8].copy_from_slice(&self.sequenz.to_be_bytes());
        buf[8..12].copy_from_slice(&self.zeitstempel.to_be_bytes());
        buf[12..16].copy_from_slice(&(self.nutzdaten_laenge as u32).to_be_bytes());
        buf
    }

    /// Deserialisiert einen Header aus einem Byte-Slice
    ///
    /// # Fehler
    /// - `KorrupterFrame` wenn das Slice kuerzer als 16 Bytes ist
    /// - `KorrupterFrame` wenn die beiden Laengenfelder nicht uebereinstimmen
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(RelaisFehler::KorrupterFrame(format!(
                "Header zu kurz: {} Bytes (erwartet {})",
                buf.len(),
                Self::SIZE
            )));
        }

        let nutzdaten_laenge = u16::from_be_bytes([buf[2], buf[3]]);
        let wiederholt = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);
        if wiederholt != nutzdaten_laenge as u32 {
            return Err(RelaisFehler::KorrupterFrame(format!(
                "Laengenfelder widersprechen sich: {} != {}",
                nutzdaten_laenge, wiederholt
            )));
        }

        Ok(Self {
            typ: buf[0],
            nutzdaten_laenge,
            sequenz: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            zeitstempel: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

// ---------------------------------------------------------------------------
// RelayFrame
// ---------------------------------------------------------------------------

/// Vollstaendiger Relay-Frame (Header + Opus-Nutzdaten)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFrame {
    pub header: RelayFrameHeader,
    pub payload: Bytes,
}

impl RelayFrame {
    /// Verpackt ein Opus-Paket in einen Audio-Frame
    ///
    /// # Fehler
    /// `KorrupterFrame` wenn die Nutzdaten nicht in das 2-Byte-Laengenfeld passen
    pub fn neu_audio(payload: Bytes, sequenz: u32, zeitstempel: u32) -> Result<Self> {
        let laenge = u16::try_from(payload.len()).map_err(|_| {
            RelaisFehler::KorrupterFrame(format!(
                "Nutzdaten zu lang: {} Bytes (Maximum {})",
                payload.len(),
                MAX_NUTZDATEN_LAENGE
            ))
        })?;
        Ok(Self {
            header: RelayFrameHeader::audio(laenge, sequenz, zeitstempel),
            payload,
        })
    }

    /// Erzeugt Header + Nutzdaten als ein zusammenhaengendes Byte-Paket
    ///
    /// Das Ergebnis wird in genau einem Schreibvorgang an die Verbindung gegeben.
    pub fn encode(payload: &[u8], sequenz: u32, zeitstempel: u32) -> Result<Bytes> {
        let frame = Self::neu_audio(Bytes::copy_from_slice(payload), sequenz, zeitstempel)?;
        Ok(frame.to_bytes())
    }

    /// Serialisiert den Frame in einen zusammenhaengenden Puffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.groesse());
        buf.put_slice(&self.header.encode());
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Deserialisiert genau einen Frame und validiert beide Laengenfelder
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = RelayFrameHeader::decode(buf)?;
        let payload = &buf[RelayFrameHeader::SIZE..];

        if payload.len() != header.nutzdaten_laenge as usize {
            return Err(RelaisFehler::KorrupterFrame(format!(
                "Nutzdaten-Laenge {} passt nicht zum Header ({})",
                payload.len(),
                header.nutzdaten_laenge
            )));
        }

        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Gesamtgroesse des Frames in Bytes
    pub fn groesse(&self) -> usize {
        RelayFrameHeader::SIZE + self.payload.len()
    }
}

// ---------------------------------------------------------------------------
// RelayCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer einen Strom aus Relay-Frames
///
/// Wird gatewayseitig mit `FramedRead` verwendet; beim Schreiben entspricht
/// ein `RelayFrame` genau einem Frame auf der Leitung.
#[derive(Debug, Clone, Default)]
pub struct RelayCodec;

impl RelayCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for RelayCodec {
    type Item = RelayFrame;
    type Error = RelaisFehler;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < RelayFrameHeader::SIZE {
            return Ok(None);
        }

        // Header validieren ohne den Buffer zu veraendern
        let header = RelayFrameHeader::decode(&src[..RelayFrameHeader::SIZE])?;
        let gesamt = RelayFrameHeader::SIZE + header.nutzdaten_laenge as usize;
        if src.len() < gesamt {
            src.reserve(gesamt - src.len());
            return Ok(None);
        }

        src.advance(RelayFrameHeader::SIZE);
        let payload = src.split_to(header.nutzdaten_laenge as usize).freeze();
        Ok(Some(RelayFrame { header, payload }))
    }
}

impl Encoder<RelayFrame> for RelayCodec {
    type Error = RelaisFehler;

    fn encode(&mut self, frame: RelayFrame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() != frame.header.nutzdaten_laenge as usize {
            return Err(RelaisFehler::KorrupterFrame(format!(
                "Nutzdaten-Laenge {} passt nicht zum Header ({})",
                frame.payload.len(),
                frame.header.nutzdaten_laenge
            )));
        }
        dst.reserve(frame.groesse());
        dst.put_slice(&frame.header.encode());
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
