//! Rahmen – die Einheit die der opake Kanal befoerdert
//!
//! Das Draht-Format (Laengenfelder, Verschluesselung, Neuuebertragung)
//! liegt beim externen Multiplexer; die Session-Schicht sieht nur noch
//! diese strukturierten Rahmen.

use bytes::Bytes;
use kurier_core::{Identitaet, MmType};

/// Ein Rahmen auf dem opaken Kanal
#[derive(Debug, Clone)]
pub enum Rahmen {
    /// Handshake-Anfrage des Clients
    Anmeldung {
        /// Gewuenschte Identitaet (user_id 0 = Server soll zuteilen)
        identitaet: Identitaet,
        /// Klasse-spezifisches Passwort
        passwort: String,
        /// Transportprofil des Clients
        mm_type: MmType,
    },

    /// Handshake-Bestaetigung des Servers
    Willkommen {
        /// Die nun eingefrorene Identitaet
        identitaet: Identitaet,
        /// Oeffentliche IP des Clients aus Sicht des Servers
        public_ip: String,
    },

    /// Eine Nutzdaten-Nachricht
    Daten {
        /// 16-Bit Zeichensatz-Tag
        zeichensatz: u16,
        /// Absender-Identitaet
        quelle: Identitaet,
        /// Opake Nutzlast
        daten: Bytes,
    },

    /// Periodisches Lebenszeichen
    Herzschlag {
        /// Monotoner Tick des Absenders
        tick: i64,
    },

    /// Geordneter Verbindungsabbau
    Abschied {
        /// Fehler-Code (siehe `kurier_core::beobachter`)
        fehler_code: i32,
        /// Sekundaerer Code (SSL/Negotiation, 0 wenn keiner)
        ssl_code: i32,
    },
}

impl Rahmen {
    /// Anzahl Nutzlast-Bytes fuer die Flusskontrolle
    ///
    /// Nur Daten-Rahmen zaehlen gegen die Redline; Handshake, Herzschlag
    /// und Abschied sind von der Flusskontrolle ausgenommen.
    pub fn nutzlast_bytes(&self) -> usize {
        match self {
            Rahmen::Daten { daten, .. } => daten.len(),
            _ => 0,
        }
    }
}
