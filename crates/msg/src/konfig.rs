//! Engine-Konfiguration
//!
//! Wird beim Erstellen aus einer TOML-Datei geladen. Alle Felder haben
//! die Standardwerte der Referenz-Auslieferung, sodass eine leere Datei
//! eine lauffaehige Konfiguration ergibt. Explizite Argumente beim
//! Engine-Erstellen uebersteuern die Dateiwerte (Uebersteuerungs-Leiter
//! wie im Init-Pfad des Originalsystems).

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;

use kurier_core::{Identitaet, KurierError};
use serde::{Deserialize, Serialize};

fn konfig_fehler(kontext: &str, fehler: impl std::fmt::Display) -> KurierError {
    KurierError::UngueltigeKonfiguration(format!("{kontext}: {fehler}"))
}

// ---------------------------------------------------------------------------
// Klient
// ---------------------------------------------------------------------------

/// SSL-Einstellungen des Clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SslKlientEinstellungen {
    /// Verschluesselung aktivieren
    pub aktivieren: bool,
    /// Server Name Indication fuer den TLS-Handshake
    pub sni: String,
    /// AES-256-Suiten statt AES-128 bevorzugen
    pub aes256: bool,
}

impl Default for SslKlientEinstellungen {
    fn default() -> Self {
        Self {
            aktivieren: false,
            sni: "server.libpro.org".into(),
            aes256: false,
        }
    }
}

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KlientKonfig {
    /// Multiplexing-Typ (11–20)
    pub mm_type: u8,
    /// Server-IP
    pub server_ip: String,
    /// Server-Port
    pub server_port: u16,
    /// Gewuenschte Identitaet in Textform, z.B. "2-0-0"
    pub id: String,
    /// Klassen-Passwort
    pub passwort: String,
    /// Lokale Bind-Adresse ("0.0.0.0" = beliebig)
    pub lokale_ip: String,
    /// Handshake-Zeitlimit in Sekunden
    pub handshake_timeout_sek: u64,
    /// Wartezeit vor einem Wiederverbindungs-Versuch in Sekunden
    pub reconnect_interval_sek: u64,
    /// Herzschlag-Intervall in Sekunden
    pub herzschlag_sek: u64,
    /// Redline der Sende-Queue in Bytes
    pub redline_bytes: usize,
    /// SSL-Einstellungen
    pub ssl: SslKlientEinstellungen,
}

impl Default for KlientKonfig {
    fn default() -> Self {
        Self {
            mm_type: 11,
            server_ip: "127.0.0.1".into(),
            server_port: 3000,
            id: "2-0-0".into(),
            passwort: "test".into(),
            lokale_ip: "0.0.0.0".into(),
            handshake_timeout_sek: 20,
            reconnect_interval_sek: 5,
            herzschlag_sek: 20,
            redline_bytes: 1_024_000,
            ssl: SslKlientEinstellungen::default(),
        }
    }
}

impl KlientKonfig {
    /// Laedt die Konfiguration aus einer TOML-Datei
    pub fn laden(pfad: &Path) -> kurier_core::Result<Self> {
        let text = std::fs::read_to_string(pfad)
            .map_err(|e| konfig_fehler(&pfad.display().to_string(), e))?;
        Self::aus_str(&text)
    }

    /// Parst die Konfiguration aus einem TOML-Text
    pub fn aus_str(text: &str) -> kurier_core::Result<Self> {
        toml::from_str(text).map_err(|e| konfig_fehler("klient-konfiguration", e))
    }

    /// Parst das `id`-Feld als Identitaet
    pub fn identitaet(&self) -> kurier_core::Result<Identitaet> {
        Identitaet::from_str(&self.id)
    }

    /// Server-Adresse aus `server_ip` und `server_port`
    pub fn server_addr(&self) -> kurier_core::Result<SocketAddr> {
        let ip: IpAddr = self
            .server_ip
            .parse()
            .map_err(|e| konfig_fehler("server_ip", e))?;
        Ok(SocketAddr::new(ip, self.server_port))
    }

    /// Lokale Bind-Adresse; `None` wenn "0.0.0.0" (beliebig)
    pub fn lokale_bind_ip(&self) -> kurier_core::Result<Option<IpAddr>> {
        let ip: IpAddr = self
            .lokale_ip
            .parse()
            .map_err(|e| konfig_fehler("lokale_ip", e))?;
        Ok(if ip.is_unspecified() { None } else { Some(ip) })
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// SSL-Einstellungen des Servers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SslServerEinstellungen {
    /// Verschluesselung anbieten
    pub aktivieren: bool,
    /// Unverschluesselte Kanaele ablehnen
    pub erzwingen: bool,
}

impl Default for SslServerEinstellungen {
    fn default() -> Self {
        Self {
            aktivieren: true,
            erzwingen: false,
        }
    }
}

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerKonfig {
    /// Multiplexing-Typ (11–20)
    pub mm_type: u8,
    /// Dienst-Port (0 = automatisch zuteilen)
    pub dienst_port: u16,
    /// Passwort fuer Klasse 1
    pub passwort_cid1: String,
    /// Passwort fuer Klasse 2
    pub passwort_cid2: String,
    /// Passwort fuer Klasse 255
    pub passwort_cid255: String,
    /// Passwort fuer alle uebrigen Klassen
    pub passwort_cidx: String,
    /// Handshake-Zeitlimit in Sekunden
    pub handshake_timeout_sek: u64,
    /// Herzschlag-Intervall in Sekunden
    pub herzschlag_sek: u64,
    /// Redline-Standard fuer neue Sessions in Bytes
    pub redline_bytes: usize,
    /// Absender-Identitaet fuer servereigene Sendungen
    pub eigene_id: String,
    /// SSL-Einstellungen
    pub ssl: SslServerEinstellungen,
}

impl Default for ServerKonfig {
    fn default() -> Self {
        Self {
            mm_type: 11,
            dienst_port: 3000,
            passwort_cid1: "test".into(),
            passwort_cid2: "test".into(),
            passwort_cid255: "test".into(),
            passwort_cidx: "test".into(),
            handshake_timeout_sek: 20,
            herzschlag_sek: 20,
            redline_bytes: 1_024_000,
            eigene_id: "1-1-0".into(),
            ssl: SslServerEinstellungen::default(),
        }
    }
}

impl ServerKonfig {
    /// Laedt die Konfiguration aus einer TOML-Datei
    pub fn laden(pfad: &Path) -> kurier_core::Result<Self> {
        let text = std::fs::read_to_string(pfad)
            .map_err(|e| konfig_fehler(&pfad.display().to_string(), e))?;
        Self::aus_str(&text)
    }

    /// Parst die Konfiguration aus einem TOML-Text
    pub fn aus_str(text: &str) -> kurier_core::Result<Self> {
        toml::from_str(text).map_err(|e| konfig_fehler("server-konfiguration", e))
    }

    /// Parst das `eigene_id`-Feld als Identitaet
    pub fn eigene_identitaet(&self) -> kurier_core::Result<Identitaet> {
        Identitaet::from_str(&self.eigene_id)
    }

    /// Klassen-Passwort fuer die angegebene class_id
    pub fn passwort_fuer(&self, class_id: u8) -> &str {
        match class_id {
            1 => &self.passwort_cid1,
            2 => &self.passwort_cid2,
            255 => &self.passwort_cid255,
            _ => &self.passwort_cidx,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
