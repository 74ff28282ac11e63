//! Logging-Initialisierung fuer den Server-Prozess

use crate::config::{LogFormat, LoggingEinstellungen};
use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Installiert den globalen Subscriber; `RUST_LOG` hat Vorrang vor der Konfiguration
pub fn initialisieren(einstellungen: &LoggingEinstellungen) -> Result<()> {
    let filter = filter_bauen(
        &einstellungen.level,
        std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
    )?;

    let ergebnis = match einstellungen.format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| anyhow!("Logging bereits initialisiert: {e}"))
}

fn filter_bauen(level: &str, umgebung: Option<&str>) -> Result<EnvFilter> {
    if let Some(direktive) = umgebung.filter(|d| !d.trim().is_empty()) {
        match EnvFilter::try_new(direktive) {
            Ok(filter) => return Ok(filter),
            Err(e) => eprintln!("Ungueltiges RUST_LOG ({e}), nutze Konfiguration"),
        }
    }
    EnvFilter::try_new(level).with_context(|| format!("Ungueltiger Log-Level: {level:?}"))
}
