//! Fehlertypen fuer Kurier
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Synchrone Operationen schlagen sofort fehl und lassen den Zustand
//! unveraendert; asynchrone Fehler (Handshake, Transport) erreichen den
//! Aufrufer ausschliesslich ueber Close-Ereignisse.

use thiserror::Error;

/// Globaler Result-Alias fuer Kurier
pub type Result<T> = std::result::Result<T, KurierError>;

/// Alle moeglichen Fehler im Kurier-System
#[derive(Debug, Error)]
pub enum KurierError {
    // --- Konfiguration ---
    #[error("Konfiguration unlesbar oder ungueltig: {0}")]
    UngueltigeKonfiguration(String),

    // --- Argumente ---
    #[error("Ungueltige Identitaet: {0}")]
    UngueltigeIdentitaet(String),

    #[error("Ungueltiges Argument: {0}")]
    UngueltigesArgument(String),

    // --- Flusskontrolle ---
    #[error("Redline ueberschritten: {angefragt} Bytes angefragt, {frei} Bytes frei")]
    Redline { angefragt: usize, frei: usize },

    // --- Verbindung & Transport ---
    #[error("Handshake fehlgeschlagen: {0}")]
    HandshakeFehlgeschlagen(String),

    #[error("Transportfehler: {0}")]
    Transport(String),

    #[error("Verbindung getrennt")]
    Getrennt,

    #[error("Zeitlimit ueberschritten")]
    Zeitlimit,

    // --- Lebenszyklus ---
    #[error("Handle wurde bereits beendet")]
    UngueltigesHandle,

    // --- IO ---
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl KurierError {
    /// Erstellt einen Transportfehler
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Erstellt einen Argumentfehler
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::UngueltigesArgument(msg.into())
    }
}
