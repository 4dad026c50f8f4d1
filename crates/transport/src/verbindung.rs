//! Transport-Verbindung und die Verbinder/Horcher-Traits
//!
//! Eine `TransportVerbindung` ist ein bereits ausgehandelter Kanal:
//! der Multiplexer hat TCP-Connect und (optional) den TLS-Handshake
//! hinter sich, die Session-Schicht sieht nur noch Rahmen-Queues und
//! das Ergebnis der Cipher-Negotiation.

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::rahmen::Rahmen;

/// Queue-Tiefe einer Verbindung in Rahmen (pro Richtung)
pub const KANAL_TIEFE: usize = 64;

// ---------------------------------------------------------------------------
// TransportVerbindung
// ---------------------------------------------------------------------------

/// Ein Ende eines ausgehandelten Kanals
///
/// Das Fallenlassen eines Endes ist ein Transport-Abbruch: die Gegenseite
/// beobachtet eine geschlossene Queue.
pub struct TransportVerbindung {
    /// Ausgehende Rahmen zum Multiplexer
    pub hinaus: mpsc::Sender<Rahmen>,
    /// Eingehende Rahmen vom Multiplexer
    pub herein: mpsc::Receiver<Rahmen>,
    /// Lokale Adresse des Kanals
    pub lokal: SocketAddr,
    /// Entfernte Adresse des Kanals
    pub entfernt: SocketAddr,
    /// Name der ausgehandelten Cipher-Suite, `None` ohne Verschluesselung
    pub ssl_suite: Option<String>,
}

// ---------------------------------------------------------------------------
// Verbinder / Horcher
// ---------------------------------------------------------------------------

/// Client-Seite des Multiplexers: baut Kanaele zu einem Ziel auf
#[async_trait]
pub trait Verbinder: Send + Sync {
    /// Verbindet zum Ziel; `lokale_ip` bindet optional eine lokale Adresse
    ///
    /// Jeder Aufruf liefert einen frischen Kanal mit eigener lokaler
    /// Ephemeral-Portnummer.
    async fn verbinden(
        &self,
        ziel: SocketAddr,
        lokale_ip: Option<IpAddr>,
    ) -> kurier_core::Result<TransportVerbindung>;
}

/// Server-Seite des Multiplexers: nimmt eingehende Kanaele an
#[async_trait]
pub trait Horcher: Send {
    /// Wartet auf den naechsten eingehenden Kanal
    async fn annehmen(&mut self) -> kurier_core::Result<TransportVerbindung>;

    /// Gebundener lokaler Port
    fn lokaler_port(&self) -> u16;
}

/// Vollstaendiger Multiplexer: kann verbinden und Ports binden
///
/// Der Server-Engine bindet seinen Dienst-Port selbst beim Erstellen;
/// ein bereits belegter Port laesst das Erstellen fehlschlagen.
pub trait Netz: Verbinder {
    /// Bindet einen Horcher (Port 0 = automatisch zuteilen)
    fn horchen(&self, port: u16) -> kurier_core::Result<Box<dyn Horcher>>;
}
