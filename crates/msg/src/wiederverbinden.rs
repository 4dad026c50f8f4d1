//! Wiederverbinden – verzoegerter Neuaufbau einer Client-Session
//!
//! Der Aufrufer stoesst den Neuaufbau aus seinem Close-Handler an; eine
//! automatische Wiederholungs-Politik gibt es bewusst nicht. Dieser
//! Planer wartet zuerst auf das Close-Ereignis der verworfenen Session
//! (damit deren Close vor dem neuen Ok beim Beobachter ankommt), dann
//! das konfigurierte Reconnect-Intervall, und startet erst danach den
//! frischen Verbindungs-Versuch.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::klient::{verbindungs_versuch, KlientInner};
use crate::session::SessionKern;

/// Plant einen Verbindungs-Versuch nach dem Reconnect-Intervall
///
/// Erwartet dass der Aufrufer das `verbindet`-Flag bereits gesetzt und
/// die alte Session abgebrochen hat.
pub(crate) fn planen(inner: Arc<KlientInner>, alte: Option<Arc<SessionKern>>) {
    let handle = inner.handle.clone();
    let _ = handle.spawn(async move {
        if let Some(kern) = alte {
            // Altes Close zuerst ausliefern lassen
            kern.schluss_warten().await;
        }

        tokio::time::sleep(inner.reconnect_intervall).await;

        if inner.beendet.load(Ordering::Acquire) {
            inner.verbindet.store(false, Ordering::Release);
            return;
        }

        tracing::debug!("Klient: geplanter Wiederverbindungs-Versuch startet");
        verbindungs_versuch(inner).await;
    });
}
