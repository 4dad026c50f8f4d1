//! Versand – geordnete Ereignis-Auslieferung an die Beobachter
//!
//! Pro Engine laeuft genau ein Versand-Task, der eine unbeschraenkte
//! Queue abarbeitet und den Beobachter aufruft. Da alle Ereignisse einer
//! Session von genau einem Task eingereiht werden und das Close-Ereignis
//! exklusiv beansprucht wird, ergibt sich die geforderte Ordnung: pro
//! Session strikt, Close zuletzt, engine-weit zusaetzlich die
//! Verdraengungs-Reihenfolge (altes Close vor neuem Ok).
//!
//! Beobachter-Aufrufe laufen auf dem Worker-Pool, nie auf dem Thread
//! des Aufrufers einer Engine-Operation.

use std::sync::Arc;

use kurier_core::{ClientBeobachter, Identitaet, Nachricht, ServerBeobachter};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Klient-Ereignisse
// ---------------------------------------------------------------------------

/// Ereignisse eines Client-Engines
#[derive(Debug)]
pub(crate) enum KlientEreignis {
    Ok {
        identitaet: Identitaet,
        public_ip: String,
    },
    Empfangen(Nachricht),
    Herzschlag {
        peer_alive_tick: i64,
    },
    Geschlossen {
        fehler_code: i32,
        ssl_code: i32,
        tcp_verbunden: bool,
    },
}

/// Startet den Versand-Task fuer einen Client-Beobachter
pub(crate) fn klient_versand_starten(
    handle: &Handle,
    beobachter: Arc<dyn ClientBeobachter>,
) -> mpsc::UnboundedSender<KlientEreignis> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let _ = handle.spawn(async move {
        while let Some(ereignis) = rx.recv().await {
            match ereignis {
                KlientEreignis::Ok {
                    identitaet,
                    public_ip,
                } => beobachter.on_ok(identitaet, public_ip),
                KlientEreignis::Empfangen(nachricht) => beobachter.on_recv(nachricht),
                KlientEreignis::Herzschlag { peer_alive_tick } => {
                    beobachter.on_heartbeat(peer_alive_tick);
                }
                KlientEreignis::Geschlossen {
                    fehler_code,
                    ssl_code,
                    tcp_verbunden,
                } => beobachter.on_close(fehler_code, ssl_code, tcp_verbunden),
            }
        }
    });

    tx
}

// ---------------------------------------------------------------------------
// Server-Ereignisse
// ---------------------------------------------------------------------------

/// Ereignisse eines Server-Engines
#[derive(Debug)]
pub(crate) enum ServerEreignis {
    Ok {
        identitaet: Identitaet,
        public_ip: String,
    },
    Empfangen(Nachricht),
    Herzschlag {
        identitaet: Identitaet,
        peer_alive_tick: i64,
    },
    Geschlossen {
        identitaet: Identitaet,
        fehler_code: i32,
        ssl_code: i32,
    },
}

/// Startet den Versand-Task fuer einen Server-Beobachter
pub(crate) fn server_versand_starten(
    handle: &Handle,
    beobachter: Arc<dyn ServerBeobachter>,
) -> mpsc::UnboundedSender<ServerEreignis> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let _ = handle.spawn(async move {
        while let Some(ereignis) = rx.recv().await {
            match ereignis {
                ServerEreignis::Ok {
                    identitaet,
                    public_ip,
                } => beobachter.on_ok_user(identitaet, public_ip),
                ServerEreignis::Empfangen(nachricht) => beobachter.on_recv_msg(nachricht),
                ServerEreignis::Herzschlag {
                    identitaet,
                    peer_alive_tick,
                } => beobachter.on_heartbeat_user(identitaet, peer_alive_tick),
                ServerEreignis::Geschlossen {
                    identitaet,
                    fehler_code,
                    ssl_code,
                } => beobachter.on_close_user(identitaet, fehler_code, ssl_code),
            }
        }
    });

    tx
}
