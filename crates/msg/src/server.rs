//! MsgServer – Server-Engine
//!
//! Bindet beim Erstellen den Dienst-Port, nimmt Verbindungen an und
//! fuehrt die Tabelle Identitaet -> Session. Pro angenommener
//! Verbindung laeuft ein Handshake-Task der Klassen-Passwort und
//! mm_type prueft, bei Bedarf eine user_id zuteilt und eine bestehende
//! Session derselben Identitaet verdraengt (deren Close-Ereignis feuert
//! vor dem Ok-Ereignis der neuen Session).
//!
//! `beenden` reisst alle Sessions ab ohne weitere Ereignisse zu
//! liefern; der Beobachter sieht danach nichts mehr.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use kurier_core::beobachter::{
    FEHLER_GETRENNT, FEHLER_HANDSHAKE, FEHLER_KICK, FEHLER_VERDRAENGT, FEHLER_ZEITLIMIT,
};
use kurier_core::identitaet::USER_ID_MAX;
use kurier_core::{Identitaet, KurierError, MmType, Nachricht, ServerBeobachter};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use kurier_transport::{Horcher, Netz, Rahmen, TransportVerbindung};

use crate::konfig::ServerKonfig;
use crate::laufzeit::Laufzeit;
use crate::session::{
    herzschlag_starten, nutzlast_zusammenfuegen, Abbruch, SessionKern, Zustand,
};
use crate::versand::{server_versand_starten, ServerEreignis};

/// Obergrenze an Zielen pro Verteil-Aufruf
pub const MAX_ZIELE: usize = 255;

// ---------------------------------------------------------------------------
// SendeErgebnis
// ---------------------------------------------------------------------------

/// Ergebnis einer Verteil-Sendung an mehrere Ziele
///
/// Jedes Ziel wird unabhaengig zugelassen; ein uebersprungenes Ziel
/// (unbekannt, geschlossen oder ueber der Redline) haelt die uebrigen
/// nicht auf.
#[derive(Debug, Clone, Default)]
pub struct SendeErgebnis {
    /// Anzahl der Ziele deren Sende-Queue die Nachricht angenommen hat
    pub zugestellt: usize,
    /// Ziele die uebersprungen wurden
    pub uebersprungen: Vec<Identitaet>,
}

// ---------------------------------------------------------------------------
// ServerInner
// ---------------------------------------------------------------------------

struct ServerInner {
    handle: Handle,
    konfig: ServerKonfig,
    mm_type: MmType,
    eigene_identitaet: Identitaet,
    dienst_port: u16,
    handshake_timeout: Duration,
    herzschlag_intervall: Duration,
    redline: AtomicUsize,
    sessions: DashMap<Identitaet, Arc<SessionKern>>,
    naechste_user_id: AtomicU64,
    ereignisse: mpsc::UnboundedSender<ServerEreignis>,
    stopp_tx: watch::Sender<bool>,
    beendet: AtomicBool,
}

// ---------------------------------------------------------------------------
// MsgServer
// ---------------------------------------------------------------------------

/// Server-Engine; `beenden` (oder Drop) entspricht delete
pub struct MsgServer {
    inner: Arc<ServerInner>,
}

impl MsgServer {
    /// Bindet den Dienst-Port und beginnt Verbindungen anzunehmen
    ///
    /// Schlaegt synchron fehl wenn der Port belegt, der mm_type
    /// ausserhalb von 11–20 oder `eigene_id` unparsbar ist.
    pub fn neu(
        laufzeit: &Laufzeit,
        beobachter: Arc<dyn ServerBeobachter>,
        netz: &dyn Netz,
        konfig: ServerKonfig,
    ) -> kurier_core::Result<Self> {
        let mm_type = MmType::neu(konfig.mm_type)?;
        let eigene_identitaet = konfig.eigene_identitaet()?;

        let horcher = netz.horchen(konfig.dienst_port)?;
        let dienst_port = horcher.lokaler_port();

        let handle = laufzeit.handle();
        let ereignisse = server_versand_starten(&handle, beobachter);
        let (stopp_tx, stopp_rx) = watch::channel(false);

        let inner = Arc::new(ServerInner {
            handle: handle.clone(),
            handshake_timeout: Duration::from_secs(konfig.handshake_timeout_sek),
            herzschlag_intervall: Duration::from_secs(konfig.herzschlag_sek),
            redline: AtomicUsize::new(konfig.redline_bytes),
            konfig,
            mm_type,
            eigene_identitaet,
            dienst_port,
            sessions: DashMap::new(),
            naechste_user_id: AtomicU64::new(1),
            ereignisse,
            stopp_tx,
            beendet: AtomicBool::new(false),
        });

        tracing::info!(
            dienst_port,
            mm_type = %mm_type,
            eigene_identitaet = %eigene_identitaet,
            "Server gestartet"
        );

        let _ = handle.spawn(annahme_schleife(Arc::clone(&inner), horcher, stopp_rx));
        Ok(Self { inner })
    }

    // --- Abfragen ----------------------------------------------------------

    /// Tatsaechlich gebundener Dienst-Port
    pub fn dienst_port(&self) -> u16 {
        self.inner.dienst_port
    }

    /// Transportprofil der Engine
    pub fn mm_type(&self) -> MmType {
        self.inner.mm_type
    }

    /// Anzahl aktuell gefuehrter Sessions
    pub fn benutzer_anzahl(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Entfernte Adresse der Session, `None` wenn unbekannt
    pub fn benutzer_adresse(&self, identitaet: Identitaet) -> Option<SocketAddr> {
        self.inner
            .sessions
            .get(&identitaet)
            .map(|kern| kern.entfernt())
    }

    /// Ausgehandelte Cipher-Suite der Session, `None` wenn unbekannt
    /// oder unverschluesselt
    pub fn ssl_suite(&self, identitaet: Identitaet) -> Option<String> {
        self.inner
            .sessions
            .get(&identitaet)
            .and_then(|kern| kern.ssl_suite())
    }

    /// Eingereihte, noch nicht uebergebene Bytes der Session
    pub fn gesendete_bytes_offen(&self, identitaet: Identitaet) -> usize {
        self.inner
            .sessions
            .get(&identitaet)
            .map(|kern| kern.fluss.in_warteschlange())
            .unwrap_or(0)
    }

    // --- Flusskontrolle ----------------------------------------------------

    /// Setzt die Redline fuer alle laufenden und kuenftigen Sessions
    pub fn redline_setzen(&self, redline_bytes: usize) {
        self.inner.redline.store(redline_bytes, Ordering::Release);
        for eintrag in self.inner.sessions.iter() {
            eintrag.value().fluss.redline_setzen(redline_bytes);
        }
    }

    /// Aktuelle Redline in Bytes
    pub fn redline(&self) -> usize {
        self.inner.redline.load(Ordering::Acquire)
    }

    // --- Senden ------------------------------------------------------------

    /// Sendet eine servereigene Nachricht an genau ein Ziel
    pub fn nachricht_senden(
        &self,
        ziel: Identitaet,
        daten: &[u8],
        zeichensatz: u16,
    ) -> kurier_core::Result<()> {
        self.nachricht_senden2(ziel, daten, None, zeichensatz)
    }

    /// Zweiteilige servereigene Sendung an genau ein Ziel
    pub fn nachricht_senden2(
        &self,
        ziel: Identitaet,
        daten1: &[u8],
        daten2: Option<&[u8]>,
        zeichensatz: u16,
    ) -> kurier_core::Result<()> {
        if self.inner.beendet.load(Ordering::Acquire) {
            return Err(KurierError::UngueltigesHandle);
        }
        let kern = self
            .inner
            .sessions
            .get(&ziel)
            .map(|eintrag| Arc::clone(eintrag.value()))
            .ok_or(KurierError::Getrennt)?;
        kern.daten_senden(
            zeichensatz,
            self.inner.eigene_identitaet,
            nutzlast_zusammenfuegen(daten1, daten2),
        )
    }

    /// Verteilt eine servereigene Nachricht an bis zu 255 Ziele
    ///
    /// Jedes Ziel wird einzeln an seiner eigenen Redline gemessen;
    /// uebersprungene Ziele landen im Ergebnis statt die Sendung zu
    /// kippen.
    pub fn nachricht_verteilen(
        &self,
        ziele: &[Identitaet],
        daten: &[u8],
        zeichensatz: u16,
    ) -> kurier_core::Result<SendeErgebnis> {
        self.nachricht_verteilen2(ziele, daten, None, zeichensatz)
    }

    /// Zweiteilige Verteil-Sendung an bis zu 255 Ziele
    pub fn nachricht_verteilen2(
        &self,
        ziele: &[Identitaet],
        daten1: &[u8],
        daten2: Option<&[u8]>,
        zeichensatz: u16,
    ) -> kurier_core::Result<SendeErgebnis> {
        if self.inner.beendet.load(Ordering::Acquire) {
            return Err(KurierError::UngueltigesHandle);
        }
        if ziele.len() > MAX_ZIELE {
            return Err(KurierError::argument(format!(
                "{} Ziele, erlaubt sind hoechstens {MAX_ZIELE}",
                ziele.len()
            )));
        }

        let nutzlast = nutzlast_zusammenfuegen(daten1, daten2);
        let mut ergebnis = SendeErgebnis::default();
        for ziel in ziele {
            let kern = self
                .inner
                .sessions
                .get(ziel)
                .map(|eintrag| Arc::clone(eintrag.value()));
            let angenommen = match kern {
                Some(kern) => kern
                    .daten_senden(zeichensatz, self.inner.eigene_identitaet, nutzlast.clone())
                    .is_ok(),
                None => false,
            };
            if angenommen {
                ergebnis.zugestellt += 1;
            } else {
                ergebnis.uebersprungen.push(*ziel);
            }
        }
        Ok(ergebnis)
    }

    // --- Lebenszyklus ------------------------------------------------------

    /// Wirft die Session der Identitaet raus
    ///
    /// Der Beobachter sieht deren Close-Ereignis mit dem Kick-Code.
    /// Gibt `false` zurueck wenn keine Session gefuehrt wird; wiederholte
    /// Aufrufe auf dieselbe Session sind harmlos.
    pub fn benutzer_kicken(&self, identitaet: Identitaet) -> bool {
        if self.inner.beendet.load(Ordering::Acquire) {
            return false;
        }
        match self.inner.sessions.get(&identitaet) {
            Some(kern) => {
                tracing::info!(identitaet = %identitaet, "Server: Benutzer wird gekickt");
                kern.abbrechen(FEHLER_KICK, 0);
                true
            }
            None => false,
        }
    }

    /// Beendet die Engine; idempotent, feuert keine weiteren Ereignisse
    pub fn beenden(&self) {
        if self.inner.beendet.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.inner.stopp_tx.send(true);
        for eintrag in self.inner.sessions.iter() {
            eintrag.value().abbrechen(0, 0);
        }
        tracing::info!(dienst_port = self.inner.dienst_port, "Server beendet");
    }
}

impl Drop for MsgServer {
    fn drop(&mut self) {
        self.beenden();
    }
}

// ---------------------------------------------------------------------------
// Annahme und Handshake
// ---------------------------------------------------------------------------

/// Nimmt Verbindungen an bis `beenden` stoppt
async fn annahme_schleife(
    inner: Arc<ServerInner>,
    mut horcher: Box<dyn Horcher>,
    mut stopp: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = stopp.changed() => break,
            angenommen = horcher.annehmen() => match angenommen {
                Ok(verbindung) => {
                    let _ = inner
                        .handle
                        .spawn(handshake_task(Arc::clone(&inner), verbindung));
                }
                Err(fehler) => {
                    tracing::warn!(fehler = %fehler, "Server: Annahme fehlgeschlagen");
                    break;
                }
            },
        }
    }
}

/// Fuehrt den Handshake einer angenommenen Verbindung und geht bei
/// Erfolg in die Leser-Schleife ueber
async fn handshake_task(inner: Arc<ServerInner>, verbindung: TransportVerbindung) {
    let entfernt = verbindung.entfernt;
    let (kern, mut herein, mut abbruch) = SessionKern::starten(
        &inner.handle,
        verbindung,
        inner.redline.load(Ordering::Acquire),
    );
    kern.zustand_setzen(Zustand::Handshake);

    if inner.konfig.ssl.erzwingen && kern.ssl_suite().is_none() {
        tracing::debug!(entfernt = %entfernt, "Server: unverschluesselter Kanal abgelehnt");
        ablehnen(&kern, FEHLER_HANDSHAKE);
        return;
    }

    let erster = match tokio::time::timeout(inner.handshake_timeout, herein.recv()).await {
        Err(_) => {
            tracing::debug!(entfernt = %entfernt, "Server: Handshake-Frist verstrichen");
            ablehnen(&kern, FEHLER_ZEITLIMIT);
            return;
        }
        Ok(None) => {
            ablehnen(&kern, FEHLER_GETRENNT);
            return;
        }
        Ok(Some(rahmen)) => rahmen,
    };

    let Rahmen::Anmeldung {
        identitaet,
        passwort,
        mm_type,
    } = erster
    else {
        tracing::debug!(entfernt = %entfernt, "Server: erster Rahmen war keine Anmeldung");
        ablehnen(&kern, FEHLER_HANDSHAKE);
        return;
    };

    if mm_type != inner.mm_type
        || identitaet.class_id() == 0
        || passwort != inner.konfig.passwort_fuer(identitaet.class_id())
    {
        tracing::debug!(
            entfernt = %entfernt,
            identitaet = %identitaet,
            "Server: Anmeldung abgelehnt"
        );
        ablehnen(&kern, FEHLER_HANDSHAKE);
        return;
    }

    let Some(endgueltig) = user_id_zuteilen(&inner, identitaet) else {
        ablehnen(&kern, FEHLER_HANDSHAKE);
        return;
    };

    // beenden kam waehrend des Handshakes: still abweisen, kein Ereignis
    if inner.beendet.load(Ordering::Acquire) {
        ablehnen(&kern, 0);
        return;
    }

    kern.identitaet_einfrieren(endgueltig);
    kern.zustand_setzen(Zustand::Etabliert);

    let alt = inner.sessions.insert(endgueltig, Arc::clone(&kern));

    // beenden hat inzwischen die Tabelle geraeumt: eigenen Eintrag
    // zuruecknehmen und still abweisen
    if inner.beendet.load(Ordering::Acquire) {
        inner
            .sessions
            .remove_if(&endgueltig, |_, eintrag| Arc::ptr_eq(eintrag, &kern));
        ablehnen(&kern, 0);
        return;
    }

    // Bestehende Session derselben Identitaet verdraengen; ihr Close
    // muss beim Beobachter vor unserem Ok ankommen
    if let Some(alt) = alt {
        tracing::info!(identitaet = %endgueltig, "Server: bestehende Session verdraengt");
        alt.abbrechen(FEHLER_VERDRAENGT, 0);
        alt.schluss_warten().await;
    }

    let public_ip = entfernt.ip().to_string();
    let _ = kern.steuer_rahmen(Rahmen::Willkommen {
        identitaet: endgueltig,
        public_ip: public_ip.clone(),
    });

    tracing::info!(
        identitaet = %endgueltig,
        entfernt = %entfernt,
        "Server: Session etabliert"
    );
    let _ = inner.ereignisse.send(ServerEreignis::Ok {
        identitaet: endgueltig,
        public_ip,
    });
    herzschlag_starten(&inner.handle, &kern, inner.herzschlag_intervall);

    leser_schleife(&inner, &kern, &mut herein, &mut abbruch).await;
}

/// Teilt bei user_id 0 eine freie Id zu; sonst Durchreichung
fn user_id_zuteilen(inner: &ServerInner, identitaet: Identitaet) -> Option<Identitaet> {
    if identitaet.user_id() != 0 {
        return Some(identitaet);
    }
    loop {
        let roh = inner.naechste_user_id.fetch_add(1, Ordering::Relaxed);
        // 1..=USER_ID_MAX, 0 bleibt der Zuteilungs-Anforderung vorbehalten
        let kandidat = roh % USER_ID_MAX + 1;
        let versuch = identitaet.mit_user_id(kandidat).ok()?;
        if !inner.sessions.contains_key(&versuch) {
            return Some(versuch);
        }
    }
}

/// Weist eine nie veroeffentlichte Verbindung ab (kein Ereignis)
fn ablehnen(kern: &Arc<SessionKern>, fehler_code: i32) {
    let _ = kern.steuer_rahmen(Rahmen::Abschied {
        fehler_code,
        ssl_code: 0,
    });
    kern.schliessen_markieren();
    kern.schluss_melden();
}

// ---------------------------------------------------------------------------
// Leser-Schleife
// ---------------------------------------------------------------------------

/// Stellt eingehende Rahmen als Ereignisse zu, bis die Session endet
///
/// Die Quelle eingehender Nachrichten wird mit der eingefrorenen
/// Identitaet der Session ueberstempelt; ein Client kann keine fremde
/// Absender-Identitaet vortaeuschen.
async fn leser_schleife(
    inner: &Arc<ServerInner>,
    kern: &Arc<SessionKern>,
    herein: &mut mpsc::Receiver<Rahmen>,
    abbruch: &mut watch::Receiver<Abbruch>,
) {
    let identitaet = kern.identitaet();
    loop {
        tokio::select! {
            rahmen = herein.recv() => match rahmen {
                Some(Rahmen::Daten { zeichensatz, daten, .. }) => {
                    let _ = inner.ereignisse.send(ServerEreignis::Empfangen(Nachricht {
                        daten,
                        zeichensatz,
                        quelle: identitaet,
                    }));
                }
                Some(Rahmen::Herzschlag { tick }) => {
                    kern.peer_tick_setzen(tick);
                    let _ = inner.ereignisse.send(ServerEreignis::Herzschlag {
                        identitaet,
                        peer_alive_tick: tick,
                    });
                }
                Some(Rahmen::Abschied { fehler_code, ssl_code }) => {
                    abschliessen(inner, kern, fehler_code, ssl_code);
                    return;
                }
                // Handshake-Rahmen nach Etablierung: ignorieren
                Some(_) => {}
                None => {
                    abschliessen(inner, kern, FEHLER_GETRENNT, 0);
                    return;
                }
            },
            _ = abbruch.changed() => {
                let (fehler_code, ssl_code) = abbruch.borrow().unwrap_or((0, 0));
                abschliessen(inner, kern, fehler_code, ssl_code);
                return;
            }
        }
    }
}

/// Beansprucht das Close-Ereignis, raeumt die Tabelle und liefert es aus
fn abschliessen(inner: &Arc<ServerInner>, kern: &Arc<SessionKern>, fehler_code: i32, ssl_code: i32) {
    if kern.schliessen_markieren() {
        let identitaet = kern.identitaet();
        // Nur den eigenen Eintrag raeumen, nie einen Verdraenger
        inner
            .sessions
            .remove_if(&identitaet, |_, eintrag| Arc::ptr_eq(eintrag, kern));
        let _ = kern.steuer_rahmen(Rahmen::Abschied {
            fehler_code,
            ssl_code,
        });
        tracing::debug!(
            identitaet = %identitaet,
            fehler_code,
            ssl_code,
            "Server: Session geschlossen"
        );
        if !inner.beendet.load(Ordering::Acquire) {
            let _ = inner.ereignisse.send(ServerEreignis::Geschlossen {
                identitaet,
                fehler_code,
                ssl_code,
            });
        }
        kern.schluss_melden();
    }
}
