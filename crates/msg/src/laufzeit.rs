//! Laufzeit – prozessweiter Worker-Pool
//!
//! Bildet das init(threadCount)/fini()-Paar des Systems ab: eine
//! `Laufzeit` besitzt den tokio-Worker-Pool, auf dem alle Session-IO-
//! und Versand-Tasks laufen. Engines bekommen die Laufzeit beim
//! Erstellen explizit gereicht (kein versteckter globaler Zustand),
//! damit Tests mehrere unabhaengige Instanzen fahren koennen.
//!
//! Aufrufer-Threads blockieren nie auf Netzwerk-IO: alle Suspension-
//! Punkte liegen in diesem Pool.

use kurier_core::KurierError;
use tokio::runtime::{Builder, Handle, Runtime};

/// Minimale Worker-Anzahl
pub const ARBEITER_MIN: usize = 1;
/// Maximale Worker-Anzahl
pub const ARBEITER_MAX: usize = 100;

/// Gibt die Kurier-Version zurueck (Cargo-Paketversion)
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ---------------------------------------------------------------------------
// Laufzeit
// ---------------------------------------------------------------------------

/// Besitzt den Worker-Pool; Drop entspricht fini()
pub struct Laufzeit {
    runtime: Runtime,
}

impl Laufzeit {
    /// Erstellt eine Laufzeit mit der angegebenen Worker-Anzahl (1–100)
    pub fn neu(arbeiter: usize) -> kurier_core::Result<Self> {
        if !(ARBEITER_MIN..=ARBEITER_MAX).contains(&arbeiter) {
            return Err(KurierError::UngueltigesArgument(format!(
                "arbeiter {arbeiter} liegt ausserhalb von {ARBEITER_MIN}..={ARBEITER_MAX}"
            )));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(arbeiter)
            .thread_name("kurier-arbeiter")
            .enable_all()
            .build()?;

        tracing::debug!(arbeiter, "Laufzeit gestartet");
        Ok(Self { runtime })
    }

    /// Handle zum Spawnen von Tasks auf dem Pool
    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    /// Fuehrt eine Future auf dem Pool aus und blockiert bis zum Ergebnis
    ///
    /// Nur fuer Tests und Einstiegspunkte gedacht, nie aus einem
    /// Beobachter-Callback aufrufen.
    pub fn blockieren<F: std::future::Future>(&self, f: F) -> F::Output {
        self.runtime.block_on(f)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arbeiter_bereich_wird_geprueft() {
        assert!(Laufzeit::neu(0).is_err());
        assert!(Laufzeit::neu(101).is_err());
        assert!(Laufzeit::neu(1).is_ok());
    }

    #[test]
    fn version_nicht_leer() {
        assert!(!version().is_empty());
    }
}
