//! FlussKontrolle – Sende-Queue-Budget mit Redline
//!
//! Pro Session ein Byte-Zaehler: `einreihen` erhoeht ihn beim Annehmen
//! einer Sendung, `bestaetigen` senkt ihn sobald die Bytes an den
//! Multiplexer uebergeben wurden. Ueberschreitet eine Sendung die
//! Redline, wird sie komplett abgelehnt — alles-oder-nichts pro Aufruf,
//! kein teilweises Einreihen.
//!
//! Eine zur Laufzeit gesenkte Redline verwirft nie bereits eingereihte
//! Bytes; sie wirkt nur auf kuenftige Zulassungen.

use std::sync::atomic::{AtomicUsize, Ordering};

use kurier_core::KurierError;

/// Byte-Budget der Sende-Queue einer Session
#[derive(Debug)]
pub struct FlussKontrolle {
    redline: AtomicUsize,
    in_warteschlange: AtomicUsize,
}

impl FlussKontrolle {
    /// Erstellt eine FlussKontrolle mit der angegebenen Redline
    pub fn neu(redline_bytes: usize) -> Self {
        Self {
            redline: AtomicUsize::new(redline_bytes),
            in_warteschlange: AtomicUsize::new(0),
        }
    }

    /// Laesst `bytes` zu oder lehnt die gesamte Sendung ab
    pub fn einreihen(&self, bytes: usize) -> kurier_core::Result<()> {
        let redline = self.redline.load(Ordering::Acquire);

        let mut aktuell = self.in_warteschlange.load(Ordering::Acquire);
        loop {
            let neu = aktuell.saturating_add(bytes);
            if neu > redline {
                return Err(KurierError::Redline {
                    angefragt: bytes,
                    frei: redline.saturating_sub(aktuell),
                });
            }
            match self.in_warteschlange.compare_exchange_weak(
                aktuell,
                neu,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(beobachtet) => aktuell = beobachtet,
            }
        }
    }

    /// Bestaetigt `bytes` als an den Multiplexer uebergeben
    pub fn bestaetigen(&self, bytes: usize) {
        let _ = self
            .in_warteschlange
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |aktuell| {
                Some(aktuell.saturating_sub(bytes))
            });
    }

    /// Aktuell eingereihte, noch nicht bestaetigte Bytes
    pub fn in_warteschlange(&self) -> usize {
        self.in_warteschlange.load(Ordering::Acquire)
    }

    /// Aktuelle Redline in Bytes
    pub fn redline(&self) -> usize {
        self.redline.load(Ordering::Acquire)
    }

    /// Setzt die Redline; wirkt nur auf kuenftige Zulassungen
    pub fn redline_setzen(&self, redline_bytes: usize) {
        self.redline.store(redline_bytes, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genau_redline_wird_zugelassen() {
        let fluss = FlussKontrolle::neu(100);
        assert!(fluss.einreihen(100).is_ok());
        assert_eq!(fluss.in_warteschlange(), 100);
    }

    #[test]
    fn redline_plus_eins_wird_abgelehnt() {
        let fluss = FlussKontrolle::neu(100);
        let fehler = fluss.einreihen(101).unwrap_err();
        match fehler {
            KurierError::Redline { angefragt, frei } => {
                assert_eq!(angefragt, 101);
                assert_eq!(frei, 100);
            }
            andere => panic!("unerwarteter Fehler: {andere}"),
        }
        // Ablehnung laesst den Zaehler unveraendert
        assert_eq!(fluss.in_warteschlange(), 0);
    }

    #[test]
    fn nach_bestaetigung_wieder_frei() {
        let fluss = FlussKontrolle::neu(100);
        fluss.einreihen(100).unwrap();
        assert!(fluss.einreihen(1).is_err());

        fluss.bestaetigen(100);
        assert_eq!(fluss.in_warteschlange(), 0);
        assert!(fluss.einreihen(100).is_ok());
    }

    #[test]
    fn leere_sendung_ist_immer_zulaessig() {
        let fluss = FlussKontrolle::neu(0);
        assert!(fluss.einreihen(0).is_ok());
    }

    #[test]
    fn gesenkte_redline_verwirft_nichts() {
        let fluss = FlussKontrolle::neu(100);
        fluss.einreihen(80).unwrap();

        fluss.redline_setzen(10);
        // Bereits eingereihte Bytes bleiben
        assert_eq!(fluss.in_warteschlange(), 80);
        // Neue Sendungen messen an der neuen Redline
        assert!(fluss.einreihen(1).is_err());

        fluss.bestaetigen(80);
        assert!(fluss.einreihen(10).is_ok());
    }

    #[test]
    fn ueberlauf_saturiert() {
        let fluss = FlussKontrolle::neu(usize::MAX);
        fluss.einreihen(usize::MAX).unwrap();
        assert!(fluss.einreihen(1).is_err());
        fluss.bestaetigen(usize::MAX);
        fluss.bestaetigen(1);
        assert_eq!(fluss.in_warteschlange(), 0);
    }
}
