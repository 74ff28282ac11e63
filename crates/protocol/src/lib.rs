//! sprachrelais-protocol – Protokoll-Definitionen
//!
//! Dieses Crate definiert alles, was auf der Leitung zum Client bzw. zum
//! Gateway landet: den binaeren Relay-Frame und die JSON-Steuernachrichten.

pub mod control;
pub mod relay;
pub mod text;

pub use control::{Steuernachricht, TtsZustand};
pub use relay::{RelayCodec, RelayFrame, RelayFrameHeader};
