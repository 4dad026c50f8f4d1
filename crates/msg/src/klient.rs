//! MsgClient – Client-Engine
//!
//! Besitzt hoechstens eine Session zu einem Server und treibt deren
//! Verbindungs-Zustandsmaschine:
//!
//! ```text
//! Getrennt -> Verbindet -> Handshake -> Etabliert
//!     ^                                     |
//!     +--------- Geschlossen <--------------+
//!                (wiederverbinden erzeugt eine NEUE Session)
//! ```
//!
//! `neu` beginnt sofort asynchron zu verbinden und blockiert den
//! Aufrufer nie; alle netzabhaengigen Ausgaenge kommen spaeter als
//! Beobachter-Ereignisse auf dem Worker-Pool an.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kurier_core::beobachter::{FEHLER_GETRENNT, FEHLER_HANDSHAKE, FEHLER_ZEITLIMIT};
use kurier_core::{ClientBeobachter, Identitaet, KurierError, MmType, Nachricht};
use kurier_transport::{Rahmen, Verbinder};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use crate::konfig::KlientKonfig;
use crate::laufzeit::Laufzeit;
use crate::session::{herzschlag_starten, nutzlast_zusammenfuegen, Abbruch, SessionKern, Zustand};
use crate::versand::{klient_versand_starten, KlientEreignis};

// ---------------------------------------------------------------------------
// KlientOptionen
// ---------------------------------------------------------------------------

/// Explizite Uebersteuerungen beim Erstellen
///
/// Nicht gesetzte Felder (0 bzw. `None`) nehmen den Wert aus der
/// Konfigurationsdatei, wie die Uebersteuerungs-Leiter des Originals.
#[derive(Debug, Clone, Default)]
pub struct KlientOptionen {
    /// Multiplexing-Typ (0 = aus Konfiguration)
    pub mm_type: u8,
    /// Feste Server-Adresse
    pub server_addr: Option<SocketAddr>,
    /// Vorab zugewiesene Identitaet
    pub identitaet: Option<Identitaet>,
    /// Passwort zur Identitaet
    pub passwort: Option<String>,
    /// Lokale Bind-Adresse
    pub lokale_ip: Option<IpAddr>,
}

// ---------------------------------------------------------------------------
// KlientInner
// ---------------------------------------------------------------------------

pub(crate) struct KlientInner {
    pub(crate) handle: Handle,
    verbinder: Arc<dyn Verbinder>,
    server_addr: SocketAddr,
    lokale_ip: Option<IpAddr>,
    anmelde_identitaet: Identitaet,
    passwort: String,
    mm_type: MmType,
    handshake_timeout: Duration,
    herzschlag_intervall: Duration,
    pub(crate) reconnect_intervall: Duration,
    redline: AtomicUsize,
    ereignisse: mpsc::UnboundedSender<KlientEreignis>,
    aktiv: Mutex<Option<Arc<SessionKern>>>,
    pub(crate) verbindet: AtomicBool,
    pub(crate) beendet: AtomicBool,
}

// ---------------------------------------------------------------------------
// MsgClient
// ---------------------------------------------------------------------------

/// Client-Engine; `beenden` (oder Drop) entspricht delete
pub struct MsgClient {
    inner: Arc<KlientInner>,
}

impl MsgClient {
    /// Erstellt die Engine und beginnt sofort asynchron zu verbinden
    ///
    /// Schlaegt synchron fehl bei ungueltiger Konfiguration oder einem
    /// mm_type ausserhalb von 11–20.
    pub fn neu(
        laufzeit: &Laufzeit,
        beobachter: Arc<dyn ClientBeobachter>,
        verbinder: Arc<dyn Verbinder>,
        konfig: KlientKonfig,
        optionen: KlientOptionen,
    ) -> kurier_core::Result<Self> {
        let mm_type = if optionen.mm_type != 0 {
            MmType::neu(optionen.mm_type)?
        } else {
            MmType::neu(konfig.mm_type)?
        };
        let server_addr = match optionen.server_addr {
            Some(addr) => addr,
            None => konfig.server_addr()?,
        };
        let anmelde_identitaet = match optionen.identitaet {
            Some(id) => id,
            None => konfig.identitaet()?,
        };
        let passwort = optionen.passwort.unwrap_or_else(|| konfig.passwort.clone());
        let lokale_ip = match optionen.lokale_ip {
            Some(ip) => Some(ip),
            None => konfig.lokale_bind_ip()?,
        };

        let handle = laufzeit.handle();
        let ereignisse = klient_versand_starten(&handle, beobachter);

        let inner = Arc::new(KlientInner {
            handle: handle.clone(),
            verbinder,
            server_addr,
            lokale_ip,
            anmelde_identitaet,
            passwort,
            mm_type,
            handshake_timeout: Duration::from_secs(konfig.handshake_timeout_sek),
            herzschlag_intervall: Duration::from_secs(konfig.herzschlag_sek),
            reconnect_intervall: Duration::from_secs(konfig.reconnect_interval_sek),
            redline: AtomicUsize::new(konfig.redline_bytes),
            ereignisse,
            aktiv: Mutex::new(None),
            verbindet: AtomicBool::new(true),
            beendet: AtomicBool::new(false),
        });

        tracing::info!(
            ziel = %inner.server_addr,
            identitaet = %inner.anmelde_identitaet,
            mm_type = %inner.mm_type,
            "Klient erstellt"
        );

        let _ = handle.spawn(verbindungs_versuch(Arc::clone(&inner)));
        Ok(Self { inner })
    }

    // --- Abfragen ----------------------------------------------------------

    /// Eingefrorene Identitaet, Sentinel solange nicht etabliert
    pub fn identitaet(&self) -> Identitaet {
        match self.etablierte_session() {
            Some(kern) => kern.identitaet(),
            None => Identitaet::UNZUGEWIESEN,
        }
    }

    /// Transportprofil der Engine
    pub fn mm_type(&self) -> MmType {
        self.inner.mm_type
    }

    /// Ausgehandelte Cipher-Suite, `None` ohne Verschluesselung oder
    /// solange nicht etabliert
    pub fn ssl_suite(&self) -> Option<String> {
        self.etablierte_session().and_then(|kern| kern.ssl_suite())
    }

    /// Lokale IP der Session, `None` solange nicht etabliert
    pub fn lokale_ip(&self) -> Option<IpAddr> {
        self.etablierte_session().map(|kern| kern.lokal().ip())
    }

    /// Lokaler Port der Session, 0 solange nicht etabliert
    pub fn lokaler_port(&self) -> u16 {
        self.etablierte_session()
            .map(|kern| kern.lokal().port())
            .unwrap_or(0)
    }

    /// Konfigurierte Server-IP
    pub fn entfernte_ip(&self) -> IpAddr {
        self.inner.server_addr.ip()
    }

    /// Konfigurierter Server-Port
    pub fn entfernter_port(&self) -> u16 {
        self.inner.server_addr.port()
    }

    /// Zuletzt beobachteter Lebenszeichen-Tick des Servers,
    /// 0 solange keiner eintraf
    pub fn letzter_peer_tick(&self) -> i64 {
        self.etablierte_session()
            .map(|kern| kern.letzter_peer_tick())
            .unwrap_or(0)
    }

    // --- Flusskontrolle ----------------------------------------------------

    /// Setzt die Redline; wirkt auch auf die laufende Session
    pub fn redline_setzen(&self, redline_bytes: usize) {
        self.inner.redline.store(redline_bytes, Ordering::Release);
        if let Some(kern) = self.inner.aktiv.lock().clone() {
            kern.fluss.redline_setzen(redline_bytes);
        }
    }

    /// Aktuelle Redline in Bytes
    pub fn redline(&self) -> usize {
        self.inner.redline.load(Ordering::Acquire)
    }

    /// Eingereihte, noch nicht an den Multiplexer uebergebene Bytes
    pub fn gesendete_bytes_offen(&self) -> usize {
        self.inner
            .aktiv
            .lock()
            .as_ref()
            .map(|kern| kern.fluss.in_warteschlange())
            .unwrap_or(0)
    }

    // --- Senden ------------------------------------------------------------

    /// Sendet eine Nachricht an den verbundenen Server
    pub fn nachricht_senden(&self, daten: &[u8], zeichensatz: u16) -> kurier_core::Result<()> {
        self.nachricht_senden2(daten, None, zeichensatz)
    }

    /// Zweiteilige Sendung; beide Teile kommen beim Empfaenger
    /// zusammengefuegt an
    pub fn nachricht_senden2(
        &self,
        daten1: &[u8],
        daten2: Option<&[u8]>,
        zeichensatz: u16,
    ) -> kurier_core::Result<()> {
        if self.inner.beendet.load(Ordering::Acquire) {
            return Err(KurierError::UngueltigesHandle);
        }
        let kern = self
            .inner
            .aktiv
            .lock()
            .clone()
            .ok_or(KurierError::Getrennt)?;
        let quelle = kern.identitaet();
        kern.daten_senden(zeichensatz, quelle, nutzlast_zusammenfuegen(daten1, daten2))
    }

    // --- Lebenszyklus ------------------------------------------------------

    /// Verwirft die aktuelle Session und plant einen frischen
    /// Verbindungs-Versuch nach dem Reconnect-Intervall
    ///
    /// Gibt `false` zurueck wenn bereits ein Versuch laeuft oder die
    /// Engine beendet wurde. Die alte Session wird nie wiederbelebt.
    pub fn wiederverbinden(&self) -> bool {
        let inner = &self.inner;
        if inner.beendet.load(Ordering::Acquire) {
            return false;
        }
        if inner.verbindet.swap(true, Ordering::AcqRel) {
            return false;
        }

        let alte = inner.aktiv.lock().take();
        if let Some(kern) = &alte {
            kern.abbrechen(0, 0);
        }
        crate::wiederverbinden::planen(Arc::clone(inner), alte);
        true
    }

    /// Beendet die Engine; idempotent
    ///
    /// Das Close-Ereignis einer laufenden Session feuert asynchron bevor
    /// deren Ressourcen freigegeben werden; der Aufrufer darf nicht
    /// annehmen dass es beim Ruecksprung schon gefeuert hat.
    pub fn beenden(&self) {
        if self.inner.beendet.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(kern) = self.inner.aktiv.lock().clone() {
            kern.abbrechen(0, 0);
        }
        tracing::info!(ziel = %self.inner.server_addr, "Klient beendet");
    }

    fn etablierte_session(&self) -> Option<Arc<SessionKern>> {
        self.inner
            .aktiv
            .lock()
            .clone()
            .filter(|kern| kern.zustand() == Zustand::Etabliert)
    }
}

impl Drop for MsgClient {
    fn drop(&mut self) {
        self.beenden();
    }
}

// ---------------------------------------------------------------------------
// Verbindungs- und Leser-Tasks
// ---------------------------------------------------------------------------

/// Ein kompletter Verbindungs-Versuch: Transport-Aufbau, Handshake,
/// dann Leser-Schleife bis zum Schluss der Session
pub(crate) async fn verbindungs_versuch(inner: Arc<KlientInner>) {
    tracing::debug!(ziel = %inner.server_addr, "Klient: Verbindungsversuch");

    let verbindung = match inner
        .verbinder
        .verbinden(inner.server_addr, inner.lokale_ip)
        .await
    {
        Ok(verbindung) => verbindung,
        Err(fehler) => {
            inner.verbindet.store(false, Ordering::Release);
            tracing::warn!(fehler = %fehler, "Klient: Transport-Aufbau fehlgeschlagen");
            if !inner.beendet.load(Ordering::Acquire) {
                let _ = inner.ereignisse.send(KlientEreignis::Geschlossen {
                    fehler_code: FEHLER_GETRENNT,
                    ssl_code: 0,
                    tcp_verbunden: false,
                });
            }
            return;
        }
    };

    // beenden kam waehrend des Transport-Aufbaus: Versuch still verwerfen
    if inner.beendet.load(Ordering::Acquire) {
        inner.verbindet.store(false, Ordering::Release);
        return;
    }

    let (kern, mut herein, mut abbruch) = SessionKern::starten(
        &inner.handle,
        verbindung,
        inner.redline.load(Ordering::Acquire),
    );
    kern.zustand_setzen(Zustand::Handshake);
    *inner.aktiv.lock() = Some(Arc::clone(&kern));

    // beenden hat das Handle inzwischen geloescht, bevor es die Session
    // sehen konnte: still verwerfen, kein Ereignis
    if inner.beendet.load(Ordering::Acquire) {
        still_verwerfen(&inner, &kern);
        return;
    }

    let anmeldung = Rahmen::Anmeldung {
        identitaet: inner.anmelde_identitaet,
        passwort: inner.passwort.clone(),
        mm_type: inner.mm_type,
    };
    if kern.steuer_rahmen(anmeldung).is_err() {
        inner.verbindet.store(false, Ordering::Release);
        abschliessen(&inner, &kern, FEHLER_GETRENNT, 0, true);
        return;
    }

    // Handshake-Antwort mit Frist abwarten
    let antwort = tokio::select! {
        _ = abbruch.changed() => {
            let (code, ssl) = abbruch.borrow().unwrap_or((0, 0));
            inner.verbindet.store(false, Ordering::Release);
            abschliessen(&inner, &kern, code, ssl, true);
            return;
        }
        ergebnis = tokio::time::timeout(inner.handshake_timeout, herein.recv()) => ergebnis,
    };

    let (identitaet, public_ip) = match antwort {
        Err(_) => {
            inner.verbindet.store(false, Ordering::Release);
            abschliessen(&inner, &kern, FEHLER_ZEITLIMIT, 0, true);
            return;
        }
        Ok(None) => {
            inner.verbindet.store(false, Ordering::Release);
            abschliessen(&inner, &kern, FEHLER_GETRENNT, 0, true);
            return;
        }
        Ok(Some(Rahmen::Willkommen {
            identitaet,
            public_ip,
        })) => (identitaet, public_ip),
        Ok(Some(Rahmen::Abschied {
            fehler_code,
            ssl_code,
        })) => {
            inner.verbindet.store(false, Ordering::Release);
            abschliessen(&inner, &kern, fehler_code, ssl_code, true);
            return;
        }
        Ok(Some(_)) => {
            inner.verbindet.store(false, Ordering::Release);
            abschliessen(&inner, &kern, FEHLER_HANDSHAKE, 0, true);
            return;
        }
    };

    kern.identitaet_einfrieren(identitaet);
    kern.zustand_setzen(Zustand::Etabliert);
    inner.verbindet.store(false, Ordering::Release);
    tracing::info!(
        identitaet = %identitaet,
        public_ip = %public_ip,
        lokal = %kern.lokal(),
        "Klient: Session etabliert"
    );
    let _ = inner.ereignisse.send(KlientEreignis::Ok {
        identitaet,
        public_ip,
    });
    herzschlag_starten(&inner.handle, &kern, inner.herzschlag_intervall);

    leser_schleife(&inner, &kern, &mut herein, &mut abbruch).await;
}

/// Stellt eingehende Rahmen als Ereignisse zu, bis die Session endet
async fn leser_schleife(
    inner: &Arc<KlientInner>,
    kern: &Arc<SessionKern>,
    herein: &mut mpsc::Receiver<Rahmen>,
    abbruch: &mut watch::Receiver<Abbruch>,
) {
    loop {
        tokio::select! {
            rahmen = herein.recv() => match rahmen {
                Some(Rahmen::Daten { zeichensatz, quelle, daten }) => {
                    let _ = inner.ereignisse.send(KlientEreignis::Empfangen(Nachricht {
                        daten,
                        zeichensatz,
                        quelle,
                    }));
                }
                Some(Rahmen::Herzschlag { tick }) => {
                    kern.peer_tick_setzen(tick);
                    let _ = inner.ereignisse.send(KlientEreignis::Herzschlag {
                        peer_alive_tick: tick,
                    });
                }
                Some(Rahmen::Abschied { fehler_code, ssl_code }) => {
                    abschliessen(inner, kern, fehler_code, ssl_code, true);
                    return;
                }
                // Handshake-Rahmen nach Etablierung: ignorieren
                Some(_) => {}
                None => {
                    abschliessen(inner, kern, FEHLER_GETRENNT, 0, true);
                    return;
                }
            },
            _ = abbruch.changed() => {
                let (fehler_code, ssl_code) = abbruch.borrow().unwrap_or((0, 0));
                abschliessen(inner, kern, fehler_code, ssl_code, true);
                return;
            }
        }
    }
}

/// Verwirft eine Session deren Handle bereits beendet wurde, ohne
/// dem Beobachter ein Ereignis zu liefern
fn still_verwerfen(inner: &Arc<KlientInner>, kern: &Arc<SessionKern>) {
    inner.verbindet.store(false, Ordering::Release);
    {
        let mut aktiv = inner.aktiv.lock();
        if aktiv.as_ref().is_some_and(|a| Arc::ptr_eq(a, kern)) {
            *aktiv = None;
        }
    }
    kern.schliessen_markieren();
    let _ = kern.steuer_rahmen(Rahmen::Abschied {
        fehler_code: 0,
        ssl_code: 0,
    });
    kern.schluss_melden();
    tracing::debug!("Klient: Session nach beenden still verworfen");
}

/// Beansprucht und liefert das Close-Ereignis der Session
fn abschliessen(
    inner: &Arc<KlientInner>,
    kern: &Arc<SessionKern>,
    fehler_code: i32,
    ssl_code: i32,
    tcp_verbunden: bool,
) {
    if kern.schliessen_markieren() {
        {
            let mut aktiv = inner.aktiv.lock();
            if aktiv.as_ref().is_some_and(|a| Arc::ptr_eq(a, kern)) {
                *aktiv = None;
            }
        }
        let _ = kern.steuer_rahmen(Rahmen::Abschied {
            fehler_code,
            ssl_code,
        });
        tracing::debug!(fehler_code, ssl_code, tcp_verbunden, "Klient: Session geschlossen");
        let _ = inner.ereignisse.send(KlientEreignis::Geschlossen {
            fehler_code,
            ssl_code,
            tcp_verbunden,
        });
        kern.schluss_melden();
    }
}
