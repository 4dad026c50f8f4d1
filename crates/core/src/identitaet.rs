//! Identitaetsmodell – (classId, userId, instId)
//!
//! Eine `Identitaet` adressiert genau einen logischen Endpunkt im
//! Kurier-Netz. Sie ist ein unveraenderlicher Werttyp: einmal einer
//! Session zugewiesen, aendert sie sich nie wieder.
//!
//! ## Wertebereiche
//! - `class_id`: 1–255 wenn zugewiesen, 0 nur im Sentinel
//! - `user_id`: 40 Bit (0 = "vom Server zuteilen")
//! - `inst_id`: 0–65535
//!
//! Die Textform ist `"class-user-inst"` (z.B. `"2-0-0"`); die Kurzform
//! `"class-user"` parst mit `inst_id = 0`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KurierError;

/// Obergrenze fuer `user_id` (40 Bit)
pub const USER_ID_MAX: u64 = (1 << 40) - 1;

// ---------------------------------------------------------------------------
// Identitaet
// ---------------------------------------------------------------------------

/// Adressiert einen logischen Endpunkt als Tripel (classId, userId, instId)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identitaet {
    class_id: u8,
    user_id: u64,
    inst_id: u16,
}

impl Identitaet {
    /// Der unzugewiesene Sentinel (0-0-0)
    ///
    /// Wird verwendet bevor eine Session ihren Handshake abgeschlossen hat.
    pub const UNZUGEWIESEN: Identitaet = Identitaet {
        class_id: 0,
        user_id: 0,
        inst_id: 0,
    };

    /// Erstellt eine zugewiesene Identitaet mit Bereichspruefung
    ///
    /// `class_id` muss >= 1 sein, `user_id` muss in 40 Bit passen.
    /// `user_id = 0` ist erlaubt und bedeutet "Server weist beim
    /// Handshake eine Id zu".
    pub fn neu(class_id: u8, user_id: u64, inst_id: u16) -> crate::Result<Self> {
        if class_id == 0 {
            return Err(KurierError::UngueltigeIdentitaet(
                "class_id 0 ist dem Sentinel vorbehalten".into(),
            ));
        }
        if user_id > USER_ID_MAX {
            return Err(KurierError::UngueltigeIdentitaet(format!(
                "user_id {user_id} passt nicht in 40 Bit"
            )));
        }
        Ok(Self {
            class_id,
            user_id,
            inst_id,
        })
    }

    /// Gibt die class_id zurueck
    pub fn class_id(&self) -> u8 {
        self.class_id
    }

    /// Gibt die user_id zurueck (40 Bit)
    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Gibt die inst_id zurueck
    pub fn inst_id(&self) -> u16 {
        self.inst_id
    }

    /// Prueft ob dies der unzugewiesene Sentinel ist
    pub fn ist_unzugewiesen(&self) -> bool {
        self.class_id == 0 && self.user_id == 0 && self.inst_id == 0
    }

    /// Gibt eine Kopie mit anderer user_id zurueck (Server-Zuteilung)
    pub fn mit_user_id(&self, user_id: u64) -> crate::Result<Self> {
        Self::neu(self.class_id, user_id, self.inst_id)
    }
}

impl Default for Identitaet {
    fn default() -> Self {
        Self::UNZUGEWIESEN
    }
}

impl fmt::Display for Identitaet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.class_id, self.user_id, self.inst_id)
    }
}

impl FromStr for Identitaet {
    type Err = KurierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut teile = s.split('-');
        let fehler = || KurierError::UngueltigeIdentitaet(format!("unparsbare Identitaet: {s:?}"));

        let class_id: u8 = teile.next().and_then(|t| t.trim().parse().ok()).ok_or_else(fehler)?;
        let user_id: u64 = teile.next().and_then(|t| t.trim().parse().ok()).ok_or_else(fehler)?;
        let inst_id: u16 = match teile.next() {
            Some(t) => t.trim().parse().map_err(|_| fehler())?,
            None => 0,
        };
        if teile.next().is_some() {
            return Err(fehler());
        }

        if class_id == 0 && user_id == 0 && inst_id == 0 {
            return Ok(Self::UNZUGEWIESEN);
        }
        Self::neu(class_id, user_id, inst_id)
    }
}

// ---------------------------------------------------------------------------
// MmType
// ---------------------------------------------------------------------------

/// Untergrenze des Multiplexing-Typ-Bereichs
pub const MMT_MSG_MIN: u8 = 11;
/// Obergrenze des Multiplexing-Typ-Bereichs
pub const MMT_MSG_MAX: u8 = 20;

/// Multiplexing-Typ einer Session (Transportprofil, 11–20)
///
/// Wird bei der Erstellung gewaehlt und bleibt fuer die Lebensdauer der
/// Session fixiert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MmType(u8);

impl MmType {
    /// Standard-Nachrichtentyp
    pub const STANDARD: MmType = MmType(MMT_MSG_MIN);

    /// Erstellt einen MmType mit Bereichspruefung (11–20)
    pub fn neu(wert: u8) -> crate::Result<Self> {
        if !(MMT_MSG_MIN..=MMT_MSG_MAX).contains(&wert) {
            return Err(KurierError::UngueltigesArgument(format!(
                "mm_type {wert} liegt ausserhalb von {MMT_MSG_MIN}..={MMT_MSG_MAX}"
            )));
        }
        Ok(Self(wert))
    }

    /// Gibt den rohen Wert zurueck
    pub fn wert(&self) -> u8 {
        self.0
    }
}

impl Default for MmType {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl fmt::Display for MmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
