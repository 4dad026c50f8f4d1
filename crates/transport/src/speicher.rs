//! SpeicherNetz – In-Memory-Multiplexer
//!
//! Implementiert `Verbinder` und stellt `Horcher` her, ohne einen echten
//! Socket zu oeffnen. Jeder Aufbau liefert einen frischen Kanal mit
//! eigener Ephemeral-Portnummer, damit sich Wiederverbindungen wie am
//! echten Draht an der lokalen Adresse unterscheiden lassen.
//!
//! Die "Cipher-Negotiation" ist hier trivial: ist am Netz eine Suite
//! konfiguriert, bekommen beide Enden deren Namen, sonst `None`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use kurier_core::KurierError;
use tokio::sync::mpsc;

use crate::rahmen::Rahmen;
use crate::verbindung::{Horcher, TransportVerbindung, Verbinder, KANAL_TIEFE};

/// Erster Ephemeral-Port des SpeicherNetzes
const EPHEMERAL_START: u16 = 40000;

// ---------------------------------------------------------------------------
// SpeicherNetz
// ---------------------------------------------------------------------------

/// In-Memory-Multiplexer, thread-safe via Arc + DashMap
///
/// Clone teilt den inneren Zustand: alle Clones sehen dieselben
/// gebundenen Ports.
#[derive(Clone)]
pub struct SpeicherNetz {
    inner: Arc<NetzInner>,
}

struct NetzInner {
    /// Gebundene Horcher, indiziert nach Port
    horcher: DashMap<u16, mpsc::Sender<TransportVerbindung>>,
    /// Naechster Ephemeral-Port
    naechster_port: AtomicU16,
    /// Suite-Name wenn "Verschluesselung" ausgehandelt wird
    ssl_suite: Option<String>,
}

impl SpeicherNetz {
    /// Erstellt ein Netz ohne Verschluesselung
    pub fn neu() -> Self {
        Self::bauen(None)
    }

    /// Erstellt ein Netz das auf allen Kanaelen die angegebene Suite aushandelt
    pub fn mit_ssl(suite: impl Into<String>) -> Self {
        Self::bauen(Some(suite.into()))
    }

    fn bauen(ssl_suite: Option<String>) -> Self {
        Self {
            inner: Arc::new(NetzInner {
                horcher: DashMap::new(),
                naechster_port: AtomicU16::new(EPHEMERAL_START),
                ssl_suite,
            }),
        }
    }

    /// Bindet einen Horcher an den Port (0 = automatisch zuteilen)
    ///
    /// Schlaegt fehl wenn der Port bereits gebunden ist.
    pub fn horchen(&self, port: u16) -> kurier_core::Result<SpeicherHorcher> {
        let port = if port == 0 { self.ephemeral_port() } else { port };

        let (tx, rx) = mpsc::channel(KANAL_TIEFE);
        use dashmap::mapref::entry::Entry;
        match self.inner.horcher.entry(port) {
            Entry::Occupied(_) => {
                return Err(KurierError::transport(format!("Port {port} bereits gebunden")));
            }
            Entry::Vacant(leer) => {
                let _ = leer.insert(tx);
            }
        }

        tracing::debug!(port, "SpeicherNetz: Horcher gebunden");
        Ok(SpeicherHorcher {
            rx,
            port,
            netz: Arc::clone(&self.inner),
        })
    }

    /// Teilt einen freien Ephemeral-Port zu
    fn ephemeral_port(&self) -> u16 {
        loop {
            let port = self.inner.naechster_port.fetch_add(1, Ordering::Relaxed);
            if port != 0 && !self.inner.horcher.contains_key(&port) {
                return port;
            }
        }
    }
}

impl Default for SpeicherNetz {
    fn default() -> Self {
        Self::neu()
    }
}

#[async_trait]
impl Verbinder for SpeicherNetz {
    async fn verbinden(
        &self,
        ziel: SocketAddr,
        lokale_ip: Option<IpAddr>,
    ) -> kurier_core::Result<TransportVerbindung> {
        let annahme_tx = self
            .inner
            .horcher
            .get(&ziel.port())
            .map(|eintrag| eintrag.value().clone())
            .ok_or_else(|| {
                KurierError::transport(format!("Verbindung abgelehnt: Port {} nicht gebunden", ziel.port()))
            })?;

        let lokal = SocketAddr::new(
            lokale_ip.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            self.ephemeral_port(),
        );

        // Zwei gerichtete Queues ergeben einen bidirektionalen Kanal
        let (klient_tx, server_rx) = mpsc::channel::<Rahmen>(KANAL_TIEFE);
        let (server_tx, klient_rx) = mpsc::channel::<Rahmen>(KANAL_TIEFE);

        let server_ende = TransportVerbindung {
            hinaus: server_tx,
            herein: server_rx,
            lokal: ziel,
            entfernt: lokal,
            ssl_suite: self.inner.ssl_suite.clone(),
        };

        annahme_tx
            .send(server_ende)
            .await
            .map_err(|_| KurierError::transport("Verbindung abgelehnt: Horcher geschlossen"))?;

        tracing::debug!(lokal = %lokal, ziel = %ziel, "SpeicherNetz: Kanal aufgebaut");
        Ok(TransportVerbindung {
            hinaus: klient_tx,
            herein: klient_rx,
            lokal,
            entfernt: ziel,
            ssl_suite: self.inner.ssl_suite.clone(),
        })
    }
}

impl crate::verbindung::Netz for SpeicherNetz {
    fn horchen(&self, port: u16) -> kurier_core::Result<Box<dyn Horcher>> {
        Ok(Box::new(SpeicherNetz::horchen(self, port)?))
    }
}

// ---------------------------------------------------------------------------
// SpeicherHorcher
// ---------------------------------------------------------------------------

/// Gebundener Horcher im SpeicherNetz
///
/// Gibt den Port beim Fallenlassen wieder frei.
pub struct SpeicherHorcher {
    rx: mpsc::Receiver<TransportVerbindung>,
    port: u16,
    netz: Arc<NetzInner>,
}

#[async_trait]
impl Horcher for SpeicherHorcher {
    async fn annehmen(&mut self) -> kurier_core::Result<TransportVerbindung> {
        self.rx.recv().await.ok_or(KurierError::Getrennt)
    }

    fn lokaler_port(&self) -> u16 {
        self.port
    }
}

impl Drop for SpeicherHorcher {
    fn drop(&mut self) {
        let _ = self.netz.horcher.remove(&self.port);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
