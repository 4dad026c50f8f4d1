//! SessionKern – eine physische Verbindung
//!
//! Traegt die eingefrorene Identitaet, das Transportprofil, das Ergebnis
//! der Cipher-Negotiation, die FlussKontrolle und die Sende-Queue zum
//! Schreiber-Task. Der Kern gehoert exklusiv dem Engine der ihn erzeugt
//! hat; nach aussen wandern nur Schnappschuesse seiner Attribute.
//!
//! ## Lebenszyklus
//! ```text
//! Verbindet -> Handshake -> Etabliert -> Geschlossen (terminal)
//! ```
//!
//! Das Close-Ereignis einer Session wird genau einmal beansprucht
//! (`schliessen_markieren`) und immer von dem Task ausgeliefert, der
//! auch die uebrigen Ereignisse der Session einreiht — so bleibt die
//! Reihenfolge pro Session strikt und Close ist garantiert das letzte.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use bytes::Bytes;
use kurier_core::{Identitaet, KurierError};
use kurier_transport::{Rahmen, TransportVerbindung};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use crate::fluss::FlussKontrolle;

// ---------------------------------------------------------------------------
// Zustand
// ---------------------------------------------------------------------------

/// Lebenszyklus-Zustand einer Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zustand {
    /// Transport-Aufbau laeuft
    Verbindet,
    /// Identitaets-Handshake laeuft
    Handshake,
    /// Handshake abgeschlossen, Identitaet eingefroren
    Etabliert,
    /// Terminal; wird nie wieder verlassen
    Geschlossen,
}

/// Abbruch-Anforderung an den Leser-Task: (fehler_code, ssl_code)
pub(crate) type Abbruch = Option<(i32, i32)>;

// ---------------------------------------------------------------------------
// SessionKern
// ---------------------------------------------------------------------------

/// Kern einer Session; von Engine-, Leser-, Schreiber- und
/// Herzschlag-Task via Arc geteilt
pub(crate) struct SessionKern {
    ssl_suite: Option<String>,
    lokal: SocketAddr,
    entfernt: SocketAddr,
    identitaet: Mutex<Identitaet>,
    zustand: Mutex<Zustand>,
    pub(crate) fluss: FlussKontrolle,
    hinaus: mpsc::UnboundedSender<Rahmen>,
    letzter_peer_tick: AtomicI64,
    geschlossen: AtomicBool,
    abbruch_tx: watch::Sender<Abbruch>,
    schluss_tx: watch::Sender<bool>,
    start: Instant,
}

impl SessionKern {
    /// Startet den Kern auf einer ausgehandelten Transport-Verbindung
    ///
    /// Spawnt den Schreiber-Task (uebergibt Rahmen an den Multiplexer
    /// und bestaetigt deren Bytes bei der FlussKontrolle) und gibt dem
    /// Aufrufer die Empfangsseite plus den Abbruch-Beobachter fuer
    /// seinen Leser-Task zurueck.
    pub(crate) fn starten(
        handle: &Handle,
        verbindung: TransportVerbindung,
        redline_bytes: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Rahmen>, watch::Receiver<Abbruch>) {
        let TransportVerbindung {
            hinaus,
            herein,
            lokal,
            entfernt,
            ssl_suite,
        } = verbindung;

        let (hinaus_tx, hinaus_rx) = mpsc::unbounded_channel();
        let (abbruch_tx, abbruch_rx) = watch::channel(None);
        let (schluss_tx, _) = watch::channel(false);

        let kern = Arc::new(Self {
            ssl_suite,
            lokal,
            entfernt,
            identitaet: Mutex::new(Identitaet::UNZUGEWIESEN),
            zustand: Mutex::new(Zustand::Verbindet),
            fluss: FlussKontrolle::neu(redline_bytes),
            hinaus: hinaus_tx,
            letzter_peer_tick: AtomicI64::new(0),
            geschlossen: AtomicBool::new(false),
            abbruch_tx,
            schluss_tx,
            start: Instant::now(),
        });

        handle.spawn(schreiber_task(Arc::downgrade(&kern), hinaus_rx, hinaus));

        (kern, herein, abbruch_rx)
    }

    // --- Attribute ---------------------------------------------------------

    pub(crate) fn ssl_suite(&self) -> Option<String> {
        self.ssl_suite.clone()
    }

    pub(crate) fn lokal(&self) -> SocketAddr {
        self.lokal
    }

    pub(crate) fn entfernt(&self) -> SocketAddr {
        self.entfernt
    }

    pub(crate) fn identitaet(&self) -> Identitaet {
        *self.identitaet.lock()
    }

    /// Friert die Identitaet nach dem Handshake ein
    ///
    /// Darf nur einmal aufgerufen werden, solange noch der Sentinel
    /// gespeichert ist.
    pub(crate) fn identitaet_einfrieren(&self, identitaet: Identitaet) {
        let mut aktuell = self.identitaet.lock();
        debug_assert!(aktuell.ist_unzugewiesen(), "Identitaet bereits eingefroren");
        *aktuell = identitaet;
    }

    pub(crate) fn zustand(&self) -> Zustand {
        *self.zustand.lock()
    }

    pub(crate) fn zustand_setzen(&self, zustand: Zustand) {
        let mut aktuell = self.zustand.lock();
        // Geschlossen ist terminal
        if *aktuell != Zustand::Geschlossen {
            *aktuell = zustand;
        }
    }

    // --- Senden ------------------------------------------------------------

    /// Reiht eine Nutzdaten-Nachricht ein (Redline-gebunden)
    pub(crate) fn daten_senden(
        &self,
        zeichensatz: u16,
        quelle: Identitaet,
        daten: Bytes,
    ) -> kurier_core::Result<()> {
        if self.zustand() != Zustand::Etabliert {
            return Err(KurierError::Getrennt);
        }

        let bytes = daten.len();
        self.fluss.einreihen(bytes)?;

        let rahmen = Rahmen::Daten {
            zeichensatz,
            quelle,
            daten,
        };
        if self.hinaus.send(rahmen).is_err() {
            // Schreiber weg: Einreihung zuruecknehmen
            self.fluss.bestaetigen(bytes);
            return Err(KurierError::Getrennt);
        }
        Ok(())
    }

    /// Sendet einen Steuer-Rahmen an der FlussKontrolle vorbei
    pub(crate) fn steuer_rahmen(&self, rahmen: Rahmen) -> kurier_core::Result<()> {
        self.hinaus.send(rahmen).map_err(|_| KurierError::Getrennt)
    }

    // --- Herzschlag --------------------------------------------------------

    pub(crate) fn peer_tick_setzen(&self, tick: i64) {
        self.letzter_peer_tick.store(tick, Ordering::Release);
    }

    pub(crate) fn letzter_peer_tick(&self) -> i64 {
        self.letzter_peer_tick.load(Ordering::Acquire)
    }

    /// Monotoner Tick der Session in Millisekunden seit Start
    pub(crate) fn eigener_tick(&self) -> i64 {
        self.start.elapsed().as_millis() as i64
    }

    // --- Schliessen --------------------------------------------------------

    /// Beansprucht das Close-Ereignis; nur der erste Aufruf gewinnt
    pub(crate) fn schliessen_markieren(&self) -> bool {
        let erster = !self.geschlossen.swap(true, Ordering::AcqRel);
        if erster {
            self.zustand_setzen(Zustand::Geschlossen);
        }
        erster
    }

    pub(crate) fn ist_geschlossen(&self) -> bool {
        self.geschlossen.load(Ordering::Acquire)
    }

    /// Fordert den Leser-Task auf, die Session mit den Codes zu beenden
    pub(crate) fn abbrechen(&self, fehler_code: i32, ssl_code: i32) {
        let _ = self.abbruch_tx.send_replace(Some((fehler_code, ssl_code)));
    }

    /// Meldet dass das Close-Ereignis ausgeliefert (oder unterdrueckt) wurde
    pub(crate) fn schluss_melden(&self) {
        let _ = self.schluss_tx.send_replace(true);
    }

    /// Beobachter auf den Abschluss der Session
    pub(crate) fn schluss_beobachten(&self) -> watch::Receiver<bool> {
        self.schluss_tx.subscribe()
    }

    /// Wartet bis das Close-Ereignis der Session ausgeliefert wurde
    pub(crate) async fn schluss_warten(&self) {
        let mut rx = self.schluss_beobachten();
        // Fehlerfall: schluss_tx lebt im Kern selbst, kann nicht vorher sterben
        let _ = rx.wait_for(|fertig| *fertig).await;
    }
}

/// Fuegt die beiden Teile einer zweiteiligen Sendung zusammen
pub(crate) fn nutzlast_zusammenfuegen(daten1: &[u8], daten2: Option<&[u8]>) -> Bytes {
    match daten2 {
        None | Some(&[]) => Bytes::copy_from_slice(daten1),
        Some(teil2) => {
            let mut puffer = bytes::BytesMut::with_capacity(daten1.len() + teil2.len());
            puffer.extend_from_slice(daten1);
            puffer.extend_from_slice(teil2);
            puffer.freeze()
        }
    }
}

// ---------------------------------------------------------------------------
// Schreiber-Task
// ---------------------------------------------------------------------------

/// Uebergibt eingereihte Rahmen an den Multiplexer und bestaetigt die
/// Bytes bei der FlussKontrolle
async fn schreiber_task(
    kern: Weak<SessionKern>,
    mut hinaus_rx: mpsc::UnboundedReceiver<Rahmen>,
    hinaus: mpsc::Sender<Rahmen>,
) {
    while let Some(rahmen) = hinaus_rx.recv().await {
        let bytes = rahmen.nutzlast_bytes();
        if hinaus.send(rahmen).await.is_err() {
            break;
        }
        if let Some(kern) = kern.upgrade() {
            kern.fluss.bestaetigen(bytes);
        } else {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Herzschlag-Task
// ---------------------------------------------------------------------------

/// Sendet periodisch das eigene Lebenszeichen
///
/// Haelt den Kern nur schwach; endet sobald die Session geschlossen
/// oder der Kern freigegeben ist.
pub(crate) fn herzschlag_starten(handle: &Handle, kern: &Arc<SessionKern>, intervall: Duration) {
    let schwach = Arc::downgrade(kern);
    let _ = handle.spawn(async move {
        let mut takt = tokio::time::interval(intervall);
        takt.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Erster Tick feuert sofort
        takt.tick().await;

        loop {
            takt.tick().await;
            let Some(kern) = schwach.upgrade() else { break };
            if kern.ist_geschlossen() {
                break;
            }
            let tick = kern.eigener_tick();
            if kern.steuer_rahmen(Rahmen::Herzschlag { tick }).is_err() {
                break;
            }
        }
    });
}
