//! End-zu-End-Tests fuer MsgClient und MsgServer ueber das SpeicherNetz

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kurier_core::beobachter::{FEHLER_HANDSHAKE, FEHLER_KICK, FEHLER_VERDRAENGT};
use kurier_core::{ClientBeobachter, Identitaet, KurierError, MmType, Nachricht, ServerBeobachter};
use kurier_msg::{KlientKonfig, KlientOptionen, Laufzeit, MsgClient, MsgServer, ServerKonfig};
use kurier_transport::{Rahmen, SpeicherNetz, TransportVerbindung, Verbinder};

const FRIST: Duration = Duration::from_secs(5);
const STILLE: Duration = Duration::from_millis(300);

// ---------------------------------------------------------------------------
// Sammler
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum KEreignis {
    Ok(Identitaet, String),
    Empfangen(Nachricht),
    Herz(i64),
    Geschlossen(i32, i32, bool),
}

struct KlientSammler(Sender<KEreignis>);

impl ClientBeobachter for KlientSammler {
    fn on_ok(&self, identitaet: Identitaet, public_ip: String) {
        let _ = self.0.send(KEreignis::Ok(identitaet, public_ip));
    }
    fn on_recv(&self, nachricht: Nachricht) {
        let _ = self.0.send(KEreignis::Empfangen(nachricht));
    }
    fn on_heartbeat(&self, peer_alive_tick: i64) {
        let _ = self.0.send(KEreignis::Herz(peer_alive_tick));
    }
    fn on_close(&self, fehler_code: i32, ssl_code: i32, tcp_verbunden: bool) {
        let _ = self
            .0
            .send(KEreignis::Geschlossen(fehler_code, ssl_code, tcp_verbunden));
    }
}

#[derive(Debug)]
enum SEreignis {
    Ok(Identitaet, String),
    Empfangen(Nachricht),
    Herz(Identitaet, i64),
    Geschlossen(Identitaet, i32, i32),
}

struct ServerSammler(Sender<SEreignis>);

impl ServerBeobachter for ServerSammler {
    fn on_ok_user(&self, identitaet: Identitaet, public_ip: String) {
        let _ = self.0.send(SEreignis::Ok(identitaet, public_ip));
    }
    fn on_recv_msg(&self, nachricht: Nachricht) {
        let _ = self.0.send(SEreignis::Empfangen(nachricht));
    }
    fn on_heartbeat_user(&self, identitaet: Identitaet, peer_alive_tick: i64) {
        let _ = self.0.send(SEreignis::Herz(identitaet, peer_alive_tick));
    }
    fn on_close_user(&self, identitaet: Identitaet, fehler_code: i32, ssl_code: i32) {
        let _ = self
            .0
            .send(SEreignis::Geschlossen(identitaet, fehler_code, ssl_code));
    }
}

/// Naechstes Klient-Ereignis, Herzschlaege uebersprungen
fn naechstes_k(rx: &Receiver<KEreignis>) -> KEreignis {
    loop {
        match rx.recv_timeout(FRIST).expect("kein Klient-Ereignis") {
            KEreignis::Herz(_) => continue,
            ereignis => return ereignis,
        }
    }
}

/// Naechstes Server-Ereignis, Herzschlaege uebersprungen
fn naechstes_s(rx: &Receiver<SEreignis>) -> SEreignis {
    loop {
        match rx.recv_timeout(FRIST).expect("kein Server-Ereignis") {
            SEreignis::Herz(..) => continue,
            ereignis => return ereignis,
        }
    }
}

// ---------------------------------------------------------------------------
// Aufbau-Hilfen
// ---------------------------------------------------------------------------

struct Paar {
    laufzeit: Laufzeit,
    netz: SpeicherNetz,
    server: MsgServer,
    server_rx: Receiver<SEreignis>,
}

fn server_starten(netz: SpeicherNetz, konfig: ServerKonfig) -> Paar {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let laufzeit = Laufzeit::neu(2).unwrap();
    let (tx, server_rx) = channel();
    let server = MsgServer::neu(&laufzeit, Arc::new(ServerSammler(tx)), &netz, konfig).unwrap();
    Paar {
        laufzeit,
        netz,
        server,
        server_rx,
    }
}

fn standard_paar() -> Paar {
    server_starten(SpeicherNetz::neu(), ServerKonfig {
        dienst_port: 0,
        ..ServerKonfig::default()
    })
}

fn klient_konfig(paar: &Paar, id: &str) -> KlientKonfig {
    KlientKonfig {
        server_port: paar.server.dienst_port(),
        id: id.into(),
        reconnect_interval_sek: 0,
        ..KlientKonfig::default()
    }
}

fn klient_starten(paar: &Paar, konfig: KlientKonfig) -> (MsgClient, Receiver<KEreignis>) {
    klient_starten_mit(paar, konfig, Arc::new(paar.netz.clone()))
}

fn klient_starten_mit(
    paar: &Paar,
    konfig: KlientKonfig,
    verbinder: Arc<dyn Verbinder>,
) -> (MsgClient, Receiver<KEreignis>) {
    let (tx, rx) = channel();
    let klient = MsgClient::neu(
        &paar.laufzeit,
        Arc::new(KlientSammler(tx)),
        verbinder,
        konfig,
        KlientOptionen::default(),
    )
    .unwrap();
    (klient, rx)
}

/// Verbinder der den Transport-Aufbau kuenstlich verzoegert
struct LangsamerVerbinder {
    netz: SpeicherNetz,
    verzoegerung: Duration,
}

#[async_trait]
impl Verbinder for LangsamerVerbinder {
    async fn verbinden(
        &self,
        ziel: SocketAddr,
        lokale_ip: Option<IpAddr>,
    ) -> kurier_core::Result<TransportVerbindung> {
        tokio::time::sleep(self.verzoegerung).await;
        self.netz.verbinden(ziel, lokale_ip).await
    }
}

/// Verbindet einen Klienten und wartet beidseitig auf Ok
fn klient_verbinden(paar: &Paar, id: &str) -> (MsgClient, Receiver<KEreignis>, Identitaet) {
    let (klient, rx) = klient_starten(paar, klient_konfig(paar, id));
    let KEreignis::Ok(identitaet, _) = naechstes_k(&rx) else {
        panic!("Klient-Ok erwartet");
    };
    let SEreignis::Ok(server_sicht, _) = naechstes_s(&paar.server_rx) else {
        panic!("Server-Ok erwartet");
    };
    assert_eq!(identitaet, server_sicht);
    (klient, rx, identitaet)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn handshake_teilt_user_id_zu_und_nachrichten_fliessen() {
    let paar = standard_paar();
    let (klient, rx, identitaet) = klient_verbinden(&paar, "2-0-0");

    // user_id 0 fordert eine Zuteilung an
    assert_eq!(identitaet.class_id(), 2);
    assert_ne!(identitaet.user_id(), 0);
    assert_eq!(klient.identitaet(), identitaet);
    assert_eq!(paar.server.benutzer_anzahl(), 1);

    klient.nachricht_senden(b"hallo", 1).unwrap();
    klient.nachricht_senden2(b"wel", Some(b"t"), 2).unwrap();

    let SEreignis::Empfangen(m1) = naechstes_s(&paar.server_rx) else {
        panic!("erste Nachricht erwartet");
    };
    assert_eq!(&m1.daten[..], b"hallo");
    assert_eq!(m1.zeichensatz, 1);
    // Quelle ist die eingefrorene Identitaet der Session
    assert_eq!(m1.quelle, identitaet);

    let SEreignis::Empfangen(m2) = naechstes_s(&paar.server_rx) else {
        panic!("zweite Nachricht erwartet");
    };
    assert_eq!(&m2.daten[..], b"welt");
    assert_eq!(m2.zeichensatz, 2);

    paar.server.nachricht_senden(identitaet, b"zurueck", 3).unwrap();
    let KEreignis::Empfangen(antwort) = naechstes_k(&rx) else {
        panic!("Antwort erwartet");
    };
    assert_eq!(&antwort.daten[..], b"zurueck");
    assert_eq!(antwort.quelle.to_string(), "1-1-0");
}

#[test]
fn feste_user_id_wird_durchgereicht() {
    let paar = standard_paar();
    let (_klient, _rx, identitaet) = klient_verbinden(&paar, "3-42-7");
    assert_eq!(identitaet, Identitaet::neu(3, 42, 7).unwrap());
}

#[test]
fn falsches_passwort_wird_abgelehnt() {
    let paar = standard_paar();
    let mut konfig = klient_konfig(&paar, "2-0-0");
    konfig.passwort = "falsch".into();
    let (_klient, rx) = klient_starten(&paar, konfig);

    let KEreignis::Geschlossen(code, _, tcp) = naechstes_k(&rx) else {
        panic!("Ablehnung erwartet");
    };
    assert_eq!(code, FEHLER_HANDSHAKE);
    assert!(tcp);

    // Eine nie etablierte Session erzeugt serverseitig kein Ereignis
    assert!(paar.server_rx.recv_timeout(STILLE).is_err());
    assert_eq!(paar.server.benutzer_anzahl(), 0);
}

#[test]
fn falscher_mm_type_wird_abgelehnt() {
    let paar = standard_paar();
    let mut konfig = klient_konfig(&paar, "2-0-0");
    konfig.mm_type = 12;
    let (_klient, rx) = klient_starten(&paar, konfig);

    let KEreignis::Geschlossen(code, _, _) = naechstes_k(&rx) else {
        panic!("Ablehnung erwartet");
    };
    assert_eq!(code, FEHLER_HANDSHAKE);
}

#[test]
fn ohne_server_kommt_close_ohne_tcp() {
    let laufzeit = Laufzeit::neu(1).unwrap();
    let netz = SpeicherNetz::neu();
    let (tx, rx) = channel();
    let konfig = KlientKonfig {
        server_port: 9,
        ..KlientKonfig::default()
    };
    let _klient = MsgClient::neu(
        &laufzeit,
        Arc::new(KlientSammler(tx)),
        Arc::new(netz),
        konfig,
        KlientOptionen::default(),
    )
    .unwrap();

    let KEreignis::Geschlossen(_, _, tcp) = naechstes_k(&rx) else {
        panic!("Close erwartet");
    };
    assert!(!tcp);
}

#[test]
fn verdraengung_liefert_close_vor_ok() {
    let paar = standard_paar();
    let (_alt, alt_rx, identitaet) = klient_verbinden(&paar, "3-5-0");

    // Zweite Anmeldung unter derselben Identitaet
    let (_neu, neu_rx) = klient_starten(&paar, klient_konfig(&paar, "3-5-0"));

    // Serverseitig: erst das Close des Verdraengten, dann das neue Ok
    let SEreignis::Geschlossen(wer, code, _) = naechstes_s(&paar.server_rx) else {
        panic!("Close des Verdraengten erwartet");
    };
    assert_eq!(wer, identitaet);
    assert_eq!(code, FEHLER_VERDRAENGT);

    let SEreignis::Ok(wer, _) = naechstes_s(&paar.server_rx) else {
        panic!("Ok der neuen Session erwartet");
    };
    assert_eq!(wer, identitaet);

    // Der alte Klient sieht den Verdraengungs-Code
    let KEreignis::Geschlossen(code, _, _) = naechstes_k(&alt_rx) else {
        panic!("Close beim alten Klienten erwartet");
    };
    assert_eq!(code, FEHLER_VERDRAENGT);

    let KEreignis::Ok(wer, _) = naechstes_k(&neu_rx) else {
        panic!("Ok beim neuen Klienten erwartet");
    };
    assert_eq!(wer, identitaet);
    assert_eq!(paar.server.benutzer_anzahl(), 1);
}

#[test]
fn reihenfolge_pro_session_close_zuletzt() {
    let paar = standard_paar();
    let (klient, _rx, identitaet) = klient_verbinden(&paar, "2-8-0");

    klient.nachricht_senden(b"m1", 0).unwrap();
    klient.nachricht_senden(b"m2", 0).unwrap();
    klient.beenden();

    let SEreignis::Empfangen(m1) = naechstes_s(&paar.server_rx) else {
        panic!("m1 erwartet");
    };
    assert_eq!(&m1.daten[..], b"m1");
    let SEreignis::Empfangen(m2) = naechstes_s(&paar.server_rx) else {
        panic!("m2 erwartet");
    };
    assert_eq!(&m2.daten[..], b"m2");
    let SEreignis::Geschlossen(wer, _, _) = naechstes_s(&paar.server_rx) else {
        panic!("Close als letztes erwartet");
    };
    assert_eq!(wer, identitaet);
}

#[test]
fn kick_liefert_beidseitig_den_kick_code() {
    let paar = standard_paar();
    let (_klient, rx, identitaet) = klient_verbinden(&paar, "2-0-0");

    assert!(!paar.server.benutzer_kicken("9-9-9".parse().unwrap()));
    assert!(paar.server.benutzer_kicken(identitaet));

    let SEreignis::Geschlossen(wer, code, _) = naechstes_s(&paar.server_rx) else {
        panic!("Server-Close erwartet");
    };
    assert_eq!(wer, identitaet);
    assert_eq!(code, FEHLER_KICK);

    let KEreignis::Geschlossen(code, _, tcp) = naechstes_k(&rx) else {
        panic!("Klient-Close erwartet");
    };
    assert_eq!(code, FEHLER_KICK);
    assert!(tcp);

    // Nach dem Close ist die Session aus der Tabelle
    assert!(!paar.server.benutzer_kicken(identitaet));
    assert_eq!(paar.server.benutzer_anzahl(), 0);
}

#[test]
fn wiederverbinden_erzeugt_neue_session() {
    let paar = standard_paar();
    let (klient, rx, identitaet) = klient_verbinden(&paar, "4-11-0");
    let erster_port = klient.lokaler_port();
    assert_ne!(erster_port, 0);

    paar.server.benutzer_kicken(identitaet);
    let KEreignis::Geschlossen(..) = naechstes_k(&rx) else {
        panic!("Close nach Kick erwartet");
    };
    let SEreignis::Geschlossen(..) = naechstes_s(&paar.server_rx) else {
        panic!("Server-Close erwartet");
    };

    assert!(klient.wiederverbinden());

    let KEreignis::Ok(wer, _) = naechstes_k(&rx) else {
        panic!("Ok nach Wiederverbinden erwartet");
    };
    assert_eq!(wer, identitaet);
    let SEreignis::Ok(..) = naechstes_s(&paar.server_rx) else {
        panic!("Server-Ok erwartet");
    };

    // Neue Session, neuer lokaler Port
    assert_ne!(klient.lokaler_port(), erster_port);
}

#[test]
fn verteilen_ueberspringt_fehlende_und_verstopfte_ziele() {
    let paar = standard_paar();
    let (_a, a_rx, a_id) = klient_verbinden(&paar, "2-100-0");
    let (_b, _b_rx, b_id) = klient_verbinden(&paar, "2-200-0");
    let fremd: Identitaet = "2-300-0".parse().unwrap();

    let ergebnis = paar
        .server
        .nachricht_verteilen(&[a_id, b_id, fremd], b"rundruf", 0)
        .unwrap();
    assert_eq!(ergebnis.zugestellt, 2);
    assert_eq!(ergebnis.uebersprungen, vec![fremd]);

    let KEreignis::Empfangen(m) = naechstes_k(&a_rx) else {
        panic!("Rundruf bei A erwartet");
    };
    assert_eq!(&m.daten[..], b"rundruf");

    // Unter der Redline wird pro Ziel uebersprungen, nicht gekippt
    paar.server.redline_setzen(4);
    let ergebnis = paar
        .server
        .nachricht_verteilen(&[a_id, b_id], b"zu gross", 0)
        .unwrap();
    assert_eq!(ergebnis.zugestellt, 0);
    assert_eq!(ergebnis.uebersprungen, vec![a_id, b_id]);

    paar.server.redline_setzen(1_024_000);
    let ergebnis = paar
        .server
        .nachricht_verteilen(&[a_id, b_id], b"passt", 0)
        .unwrap();
    assert_eq!(ergebnis.zugestellt, 2);
}

#[test]
fn verteilen_mit_zu_vielen_zielen_schlaegt_fehl() {
    let paar = standard_paar();
    let ziele: Vec<Identitaet> = (1..=256)
        .map(|u| Identitaet::neu(2, u, 0).unwrap())
        .collect();
    assert!(matches!(
        paar.server.nachricht_verteilen(&ziele, b"x", 0),
        Err(KurierError::UngueltigesArgument(_))
    ));
}

#[test]
fn klient_redline_lehnt_zu_grosse_sendung_ab() {
    let paar = standard_paar();
    let (klient, _rx, _id) = klient_verbinden(&paar, "2-0-0");

    klient.redline_setzen(4);
    assert_eq!(klient.redline(), 4);
    assert!(matches!(
        klient.nachricht_senden(b"zu gross", 0),
        Err(KurierError::Redline { .. })
    ));

    klient.redline_setzen(1_024_000);
    klient.nachricht_senden(b"zu gross", 0).unwrap();
}

#[test]
fn herzschlag_erreicht_beide_seiten() {
    let paar = server_starten(SpeicherNetz::neu(), ServerKonfig {
        dienst_port: 0,
        herzschlag_sek: 1,
        ..ServerKonfig::default()
    });
    let mut konfig = klient_konfig(&paar, "2-0-0");
    konfig.herzschlag_sek = 1;
    let (_klient, rx) = klient_starten(&paar, konfig);

    let KEreignis::Ok(identitaet, _) = naechstes_k(&rx) else {
        panic!("Ok erwartet");
    };
    let SEreignis::Ok(..) = naechstes_s(&paar.server_rx) else {
        panic!("Server-Ok erwartet");
    };

    let frist = std::time::Instant::now() + FRIST;
    let tick = loop {
        match rx.recv_timeout(FRIST).expect("Herzschlag erwartet") {
            KEreignis::Herz(tick) => break tick,
            _ => assert!(std::time::Instant::now() < frist),
        }
    };
    assert!(tick >= 0);

    loop {
        match paar
            .server_rx
            .recv_timeout(FRIST)
            .expect("Server-Herzschlag erwartet")
        {
            SEreignis::Herz(wer, _) => {
                assert_eq!(wer, identitaet);
                break;
            }
            _ => assert!(std::time::Instant::now() < frist),
        }
    }
}

#[test]
fn ssl_suite_ist_beidseitig_sichtbar() {
    let paar = server_starten(
        SpeicherNetz::mit_ssl("TLS_AES_128_GCM_SHA256"),
        ServerKonfig {
            dienst_port: 0,
            ..ServerKonfig::default()
        },
    );
    let (klient, rx, identitaet) = klient_verbinden(&paar, "2-0-0");
    let _ = rx;

    assert_eq!(
        klient.ssl_suite().as_deref(),
        Some("TLS_AES_128_GCM_SHA256")
    );
    assert_eq!(
        paar.server.ssl_suite(identitaet).as_deref(),
        Some("TLS_AES_128_GCM_SHA256")
    );
}

#[test]
fn ssl_erzwingen_lehnt_unverschluesselte_kanaele_ab() {
    let paar = server_starten(SpeicherNetz::neu(), ServerKonfig {
        dienst_port: 0,
        ssl: kurier_msg::konfig::SslServerEinstellungen {
            aktivieren: true,
            erzwingen: true,
        },
        ..ServerKonfig::default()
    });
    let (_klient, rx) = klient_starten(&paar, klient_konfig(&paar, "2-0-0"));

    let KEreignis::Geschlossen(code, _, _) = naechstes_k(&rx) else {
        panic!("Ablehnung erwartet");
    };
    assert_eq!(code, FEHLER_HANDSHAKE);
    assert!(paar.server_rx.recv_timeout(STILLE).is_err());
}

#[test]
fn klient_beenden_sperrt_und_ist_idempotent() {
    let paar = standard_paar();
    let (klient, rx, _id) = klient_verbinden(&paar, "2-0-0");

    klient.beenden();
    klient.beenden();

    let KEreignis::Geschlossen(code, ssl, tcp) = naechstes_k(&rx) else {
        panic!("Close beim Beenden erwartet");
    };
    assert_eq!((code, ssl), (0, 0));
    assert!(tcp);

    assert!(matches!(
        klient.nachricht_senden(b"x", 0),
        Err(KurierError::UngueltigesHandle)
    ));
    assert!(!klient.wiederverbinden());
    assert_eq!(klient.identitaet(), Identitaet::UNZUGEWIESEN);
}

#[test]
fn beenden_stoppt_laufenden_verbindungsversuch() {
    let paar = standard_paar();
    let verbinder = Arc::new(LangsamerVerbinder {
        netz: paar.netz.clone(),
        verzoegerung: Duration::from_millis(300),
    });
    let (klient, rx) = klient_starten_mit(&paar, klient_konfig(&paar, "2-0-0"), verbinder);

    // Der Transport-Aufbau ist noch unterwegs
    klient.beenden();

    // Nach dem Aufbau darf keine Session mehr entstehen, auf keiner Seite
    assert!(rx.recv_timeout(Duration::from_millis(800)).is_err());
    assert!(paar.server_rx.recv_timeout(STILLE).is_err());
    assert_eq!(paar.server.benutzer_anzahl(), 0);
    assert_eq!(klient.identitaet(), Identitaet::UNZUGEWIESEN);
}

#[test]
fn server_beenden_verwirft_laufenden_handshake() {
    let paar = standard_paar();
    let ziel = SocketAddr::new(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        paar.server.dienst_port(),
    );
    let verbindung = paar
        .laufzeit
        .blockieren(paar.netz.verbinden(ziel, None))
        .unwrap();

    // Handshake-Task annehmen und auf die Anmeldung warten lassen
    std::thread::sleep(Duration::from_millis(150));
    paar.server.beenden();

    let anmeldung = Rahmen::Anmeldung {
        identitaet: "2-1-0".parse().unwrap(),
        passwort: "test".into(),
        mm_type: MmType::neu(11).unwrap(),
    };
    paar.laufzeit
        .blockieren(verbindung.hinaus.send(anmeldung))
        .unwrap();

    // Die verspaetete Anmeldung darf weder Ereignis noch Eintrag erzeugen
    assert!(paar
        .server_rx
        .recv_timeout(Duration::from_millis(500))
        .is_err());
    assert_eq!(paar.server.benutzer_anzahl(), 0);
}

#[test]
fn wiederverbinden_waehrend_laufendem_versuch_schlaegt_fehl() {
    let paar = standard_paar();
    let verbinder = Arc::new(LangsamerVerbinder {
        netz: paar.netz.clone(),
        verzoegerung: Duration::from_millis(300),
    });
    let (klient, rx) = klient_starten_mit(&paar, klient_konfig(&paar, "2-0-0"), verbinder);

    // Der Erstversuch ist noch unterwegs
    assert!(!klient.wiederverbinden());

    let KEreignis::Ok(identitaet, _) = naechstes_k(&rx) else {
        panic!("Ok erwartet");
    };
    let SEreignis::Ok(..) = naechstes_s(&paar.server_rx) else {
        panic!("Server-Ok erwartet");
    };

    paar.server.benutzer_kicken(identitaet);
    let KEreignis::Geschlossen(..) = naechstes_k(&rx) else {
        panic!("Close nach Kick erwartet");
    };

    // Der erste Aufruf plant den Versuch, der zweite prallt ab
    assert!(klient.wiederverbinden());
    assert!(!klient.wiederverbinden());

    let KEreignis::Ok(..) = naechstes_k(&rx) else {
        panic!("Ok nach Wiederverbinden erwartet");
    };
}

#[test]
fn server_beenden_feuert_keine_ereignisse() {
    let paar = standard_paar();
    let (_klient, rx, _id) = klient_verbinden(&paar, "2-0-0");

    paar.server.beenden();
    paar.server.beenden();

    // Der Klient sieht das Ende seiner Session, der Server-Beobachter nichts
    let KEreignis::Geschlossen(..) = naechstes_k(&rx) else {
        panic!("Klient-Close erwartet");
    };
    assert!(paar.server_rx.recv_timeout(STILLE).is_err());
    assert!(matches!(
        paar.server.nachricht_senden("2-1-0".parse().unwrap(), b"x", 0),
        Err(KurierError::UngueltigesHandle)
    ));
}

#[test]
fn belegter_port_schlaegt_beim_erstellen_fehl() {
    let paar = standard_paar();
    let (tx, _rx) = channel();
    let konfig = ServerKonfig {
        dienst_port: paar.server.dienst_port(),
        ..ServerKonfig::default()
    };
    assert!(MsgServer::neu(
        &paar.laufzeit,
        Arc::new(ServerSammler(tx)),
        &paar.netz,
        konfig
    )
    .is_err());
}
