//! sprachrelais-server – Prozess-Einstieg
//!
//! Aufruf: `sprachrelais-server [CONFIG]`. Ohne Argument gilt
//! `SPRACHRELAIS_CONFIG`, danach `config.toml` im Arbeitsverzeichnis.

use anyhow::Result;
use sprachrelais_server::{config::ServerConfig, logging, Server};

#[tokio::main]
async fn main() -> Result<()> {
    let pfad = ServerConfig::pfad_bestimmen(
        std::env::args().nth(1),
        std::env::var("SPRACHRELAIS_CONFIG").ok(),
    );
    let config = ServerConfig::laden(&pfad)?;
    logging::initialisieren(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %pfad,
        format = ?config.logging.format,
        "Konfiguration geladen"
    );

    Server::neu(config).starten().await
}
