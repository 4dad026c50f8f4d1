//! Beobachter-Traits – die asynchrone Ereignis-Schnittstelle
//!
//! Client und Server haben getrennte Faehigkeits-Sets. Alle Methoden
//! werden vom Worker-Pool aufgerufen, niemals vom Thread des Aufrufers.
//! Pro Session sind die Aufrufe strikt geordnet; `on_close` bzw.
//! `on_close_user` ist immer das letzte Ereignis einer Session.
//!
//! Alle Methoden haben leere Default-Implementierungen, damit Tests und
//! einfache Anwendungen nur das implementieren was sie beobachten wollen.

use bytes::Bytes;

use crate::identitaet::Identitaet;

// ---------------------------------------------------------------------------
// Fehler-Codes fuer Close-Ereignisse
// ---------------------------------------------------------------------------

/// Verbindung vom Gegenueber oder Transport getrennt
pub const FEHLER_GETRENNT: i32 = -1;
/// Handshake fehlgeschlagen (Passwort, Protokoll)
pub const FEHLER_HANDSHAKE: i32 = -2;
/// Zeitlimit (Handshake oder Heartbeat) ueberschritten
pub const FEHLER_ZEITLIMIT: i32 = -3;
/// Session wurde vom Server gekickt
pub const FEHLER_KICK: i32 = -4;
/// Session wurde durch einen neuen Handshake derselben Identitaet verdraengt
pub const FEHLER_VERDRAENGT: i32 = -5;

// ---------------------------------------------------------------------------
// Nachricht
// ---------------------------------------------------------------------------

/// Eine empfangene Nachricht
///
/// Die Nutzlast ist opak; `zeichensatz` ist ein 16-Bit-Tag den Sender und
/// Empfaenger untereinander vereinbaren. Zweiteilige Sendungen
/// (`nachricht_senden2`) kommen hier bereits zusammengefuegt an.
#[derive(Debug, Clone)]
pub struct Nachricht {
    /// Opake Nutzlast
    pub daten: Bytes,
    /// 16-Bit Zeichensatz-Tag
    pub zeichensatz: u16,
    /// Absender-Identitaet
    pub quelle: Identitaet,
}

// ---------------------------------------------------------------------------
// ClientBeobachter
// ---------------------------------------------------------------------------

/// Ereignis-Schnittstelle eines Client-Engines
pub trait ClientBeobachter: Send + Sync {
    /// Handshake abgeschlossen; traegt die nun eingefrorene Identitaet
    /// und die vom Server beobachtete oeffentliche IP
    fn on_ok(&self, identitaet: Identitaet, public_ip: String) {
        let _ = (identitaet, public_ip);
    }

    /// Eine Nachricht ist eingetroffen
    fn on_recv(&self, nachricht: Nachricht) {
        let _ = nachricht;
    }

    /// Die Session ist geschlossen; letztes Ereignis dieser Session
    ///
    /// `tcp_verbunden` unterscheidet "nie verbunden" von "verbunden,
    /// dann getrennt".
    fn on_close(&self, fehler_code: i32, ssl_code: i32, tcp_verbunden: bool) {
        let _ = (fehler_code, ssl_code, tcp_verbunden);
    }

    /// Periodischer Lebenszeichen-Tick des Gegenuebers
    fn on_heartbeat(&self, peer_alive_tick: i64) {
        let _ = peer_alive_tick;
    }
}

// ---------------------------------------------------------------------------
// ServerBeobachter
// ---------------------------------------------------------------------------

/// Ereignis-Schnittstelle eines Server-Engines
pub trait ServerBeobachter: Send + Sync {
    /// Eine neue Session hat den Handshake abgeschlossen und wurde in die
    /// Identitaets-Tabelle eingetragen
    fn on_ok_user(&self, identitaet: Identitaet, public_ip: String) {
        let _ = (identitaet, public_ip);
    }

    /// Eine Nachricht ist eingetroffen
    fn on_recv_msg(&self, nachricht: Nachricht) {
        let _ = nachricht;
    }

    /// Eine Session wurde entfernt (Fehler, Kick oder Verdraengung);
    /// letztes Ereignis dieser Session
    fn on_close_user(&self, identitaet: Identitaet, fehler_code: i32, ssl_code: i32) {
        let _ = (identitaet, fehler_code, ssl_code);
    }

    /// Periodischer Lebenszeichen-Tick einer Session
    fn on_heartbeat_user(&self, identitaet: Identitaet, peer_alive_tick: i64) {
        let _ = (identitaet, peer_alive_tick);
    }
}
