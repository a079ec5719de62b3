//! E2E regression test suite for the camera event bridge.
//!
//! Spins up scripted fake cameras on loopback TCP and runs the real
//! bridge against them, exercising the full attach → Digest auth →
//! stream → parse → filter → publish pipeline.
//!
//! Run: `cargo test -p vigil-bridge --test e2e`
//!
//! Tests:
//!   1. Events flow end to end and the whitelist filters them
//!   2. A dropped stream is not re-attached before the reconnect delay
//!   3. One camera dropping does not disturb another camera's stream
//!   4. Bad credentials never publish and do not wedge the bridge

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use vigil_bridge::{
    CameraConfig, ChannelPublisher, Multiplexer, MuxConfig, Publication,
};

const USERNAME: &str = "admin";
const PASSWORD: &str = "secret";
const REALM: &str = "Login to CAM";
const NONCE: &str = "0123456789abcdef";

// ============================================================================
// Fake camera
// ============================================================================

/// What one fake camera does after a successful attach.
#[derive(Clone)]
struct CameraScript {
    /// (delay, bytes) pairs written to the stream in order.
    bursts: Vec<(Duration, &'static str)>,
    /// Close the connection after the bursts; otherwise hold it open.
    close_after: bool,
    /// Answer every request with a 401 challenge, valid response or not.
    reject_auth: bool,
}

#[derive(Default)]
struct CameraLog {
    /// When each authorized attach began streaming.
    attaches: Mutex<Vec<Instant>>,
    /// When the camera closed a stream itself.
    closes: Mutex<Vec<Instant>>,
    /// First request line plus headers of every request seen.
    requests: Mutex<Vec<String>>,
}

async fn spawn_fake_camera(script: CameraScript) -> (u16, Arc<CameraLog>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let log = Arc::new(CameraLog::default());

    let accept_log = Arc::clone(&log);
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(serve_connection(
                socket,
                script.clone(),
                Arc::clone(&accept_log),
            ));
        }
    });

    (port, log)
}

async fn serve_connection(mut socket: TcpStream, script: CameraScript, log: Arc<CameraLog>) {
    loop {
        let Some(request) = read_request(&mut socket).await else {
            return;
        };
        log.requests.lock().push(request.clone());

        let authorized = !script.reject_auth && authorization_is_valid(&request);
        if !authorized {
            let challenge = format!(
                "HTTP/1.1 401 Unauthorized\r\n\
                 WWW-Authenticate: Digest realm=\"{REALM}\", qop=\"auth\", nonce=\"{NONCE}\"\r\n\
                 Content-Length: 0\r\n\r\n"
            );
            if socket.write_all(challenge.as_bytes()).await.is_err() {
                return;
            }
            // Keep-alive: the client retries on this connection.
            continue;
        }

        log.attaches.lock().push(Instant::now());
        let head = "HTTP/1.1 200 OK\r\n\
                    Content-Type: multipart/x-mixed-replace; boundary=myboundary\r\n\
                    Connection: close\r\n\r\n";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }

        for (delay, bytes) in &script.bursts {
            tokio::time::sleep(*delay).await;
            if socket.write_all(bytes.as_bytes()).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
        }

        if script.close_after {
            log.closes.lock().push(Instant::now());
            let _ = socket.shutdown().await;
            return;
        }

        // Hold the stream open until the client goes away.
        let mut sink = [0u8; 256];
        loop {
            match socket.read(&mut sink).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut tmp).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
        }
        if buf.len() > 65536 {
            return None;
        }
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}

// ============================================================================
// Digest verification (independent of the bridge's implementation)
// ============================================================================

fn md5_hex(input: &str) -> String {
    use md5::{Digest as _, Md5};
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

fn header_param(header: &str, key: &str) -> Option<String> {
    let start = header.find(&format!("{key}="))? + key.len() + 1;
    let rest = &header[start..];
    if let Some(quoted) = rest.strip_prefix('"') {
        Some(quoted[..quoted.find('"')?].to_string())
    } else {
        let end = rest.find([',', ' ', '\r']).unwrap_or(rest.len());
        Some(rest[..end].to_string())
    }
}

/// Recomputes the expected Digest response from the request and compares.
fn authorization_is_valid(request: &str) -> bool {
    let Some(auth) = request
        .lines()
        .find(|line| line.to_ascii_lowercase().starts_with("authorization:"))
    else {
        return false;
    };

    let (Some(user), Some(uri), Some(response), Some(cnonce), Some(nc)) = (
        header_param(auth, "username"),
        header_param(auth, "uri"),
        header_param(auth, "response"),
        header_param(auth, "cnonce"),
        header_param(auth, "nc"),
    ) else {
        return false;
    };
    if user != USERNAME {
        return false;
    }

    let ha1 = md5_hex(&format!("{USERNAME}:{REALM}:{PASSWORD}"));
    let ha2 = md5_hex(&format!("GET:{uri}"));
    let expected = md5_hex(&format!("{ha1}:{NONCE}:{nc}:{cnonce}:auth:{ha2}"));
    expected == response
}

// ============================================================================
// Bridge helpers
// ============================================================================

fn camera(name: &str, port: u16, events: &[&str]) -> CameraConfig {
    CameraConfig {
        name: name.to_string(),
        host: "127.0.0.1".to_string(),
        port,
        username: USERNAME.to_string(),
        password: PASSWORD.to_string(),
        topic: format!("cameras/{name}"),
        events: events.iter().map(|code| code.to_string()).collect(),
    }
}

async fn collect_publications(
    rx: &Receiver<Publication>,
    want: usize,
    wait: Duration,
) -> Vec<Publication> {
    let mut out = Vec::new();
    let deadline = tokio::time::Instant::now() + wait;
    while out.len() < want && tokio::time::Instant::now() < deadline {
        while let Ok(publication) = rx.try_recv() {
            out.push(publication);
        }
        if out.len() >= want {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    out
}

/// Test 1: Events flow end to end; whitelisted codes publish two
/// messages each, everything else is dropped. Event lines split across
/// TCP writes must still parse.
#[tokio::test(flavor = "multi_thread")]
async fn events_flow_end_to_end_with_filtering() {
    let script = CameraScript {
        bursts: vec![
            (Duration::from_millis(10), "--myboundary\r\nContent-Type: text/plain\r\n\r\n"),
            (Duration::from_millis(20), "Code=VideoMotion;action=Start;index=0\r\n"),
            (Duration::from_millis(20), "Code=VideoBlind;action=Start;index=0\r\n"),
            // One event line split across two writes.
            (Duration::from_millis(20), "Code=Video"),
            (Duration::from_millis(20), "Motion;action=Stop;index=0\r\n"),
        ],
        close_after: false,
        reject_auth: false,
    };
    let (port, log) = spawn_fake_camera(script).await;

    let (publisher, rx) = ChannelPublisher::new();
    let mux = Multiplexer::new(
        vec![camera("porch", port, &["VideoMotion"])],
        Arc::new(publisher),
        MuxConfig::default(),
    )
    .unwrap();
    let handle = mux.start();

    let publications = collect_publications(&rx, 4, Duration::from_secs(10)).await;
    assert_eq!(publications.len(), 4, "two accepted events, two messages each");

    assert_eq!(publications[0].topic, "cameras/porch/VideoMotion");
    assert_eq!(publications[0].payload, "Start");
    assert_eq!(publications[1].topic, "cameras/porch");
    assert_eq!(
        publications[1].payload,
        r#"{"action":"Start","code":"VideoMotion","index":"0"}"#
    );
    assert_eq!(publications[2].topic, "cameras/porch/VideoMotion");
    assert_eq!(publications[2].payload, "Stop");
    assert_eq!(publications[3].topic, "cameras/porch");

    let stats = handle.stop().await.unwrap();
    assert_eq!(stats.events_parsed, 3);
    assert_eq!(stats.events_forwarded, 2);
    assert_eq!(stats.events_filtered, 1, "VideoBlind is not whitelisted");
    assert_eq!(stats.parse_errors, 0);

    let requests = log.requests.lock();
    assert!(
        requests[0].contains("/cgi-bin/eventManager.cgi?action=attach&codes=%5BVideoMotion%5D"),
        "attach URL should carry the encoded code list, got: {}",
        requests[0].lines().next().unwrap_or("")
    );
    assert_eq!(log.attaches.lock().len(), 1);
    eprintln!("Test 1 PASS: 3 events parsed -> 2 forwarded (4 messages), 1 filtered");
}

/// Test 2: After the camera drops the stream, the bridge waits the full
/// reconnect delay before attaching again.
#[tokio::test(flavor = "multi_thread")]
async fn reconnect_waits_the_full_delay() {
    let script = CameraScript {
        bursts: vec![(
            Duration::from_millis(10),
            "Code=VideoMotion;action=Start;index=0\r\n",
        )],
        close_after: true,
        reject_auth: false,
    };
    let (port, log) = spawn_fake_camera(script).await;

    let (publisher, _rx) = ChannelPublisher::new();
    let mux = Multiplexer::new(
        vec![camera("porch", port, &["VideoMotion"])],
        Arc::new(publisher),
        MuxConfig::default(),
    )
    .unwrap();
    let reconnect_delay = Duration::from_secs(5);
    let handle = mux.start();

    // Wait for the second attach (first stream + reconnect cycle).
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    loop {
        if log.attaches.lock().len() >= 2 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for the reconnect attach"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let second_attach = log.attaches.lock()[1];
    let first_close = log.closes.lock()[0];
    let gap = second_attach.duration_since(first_close);
    assert!(
        gap >= reconnect_delay,
        "re-attached after {gap:?}, before the {reconnect_delay:?} delay"
    );

    let stats = handle.stop().await.unwrap();
    assert!(stats.disconnects >= 1);
    assert!(stats.connects >= 2);
    eprintln!("Test 2 PASS: re-attach gap {gap:?} >= {reconnect_delay:?}");
}

/// Test 3: A camera dropping its stream does not disturb another
/// camera's live stream.
#[tokio::test(flavor = "multi_thread")]
async fn a_dropped_camera_does_not_disturb_others() {
    let flaky = CameraScript {
        // Not whitelisted: contributes no publications.
        bursts: vec![(
            Duration::from_millis(10),
            "Code=VideoBlind;action=Start\r\n",
        )],
        close_after: true,
        reject_auth: false,
    };
    let steady = CameraScript {
        bursts: vec![
            (
                Duration::from_millis(150),
                "Code=VideoMotion;action=Start;index=0\r\n",
            );
            10
        ],
        close_after: false,
        reject_auth: false,
    };
    let (flaky_port, _flaky_log) = spawn_fake_camera(flaky).await;
    let (steady_port, _steady_log) = spawn_fake_camera(steady).await;

    let (publisher, rx) = ChannelPublisher::new();
    let mux = Multiplexer::new(
        vec![
            camera("flaky", flaky_port, &["VideoMotion"]),
            camera("steady", steady_port, &["VideoMotion"]),
        ],
        Arc::new(publisher),
        MuxConfig::default(),
    )
    .unwrap();
    let handle = mux.start();

    let publications = collect_publications(&rx, 20, Duration::from_secs(10)).await;
    assert_eq!(publications.len(), 20, "10 steady events, two messages each");
    assert!(
        publications
            .iter()
            .all(|p| p.topic.starts_with("cameras/steady")),
        "only the steady camera may publish"
    );

    let stats = handle.stop().await.unwrap();
    assert_eq!(stats.events_forwarded, 10);
    assert!(stats.disconnects >= 1, "the flaky camera dropped at least once");
    assert!(stats.events_filtered >= 1, "the flaky camera's VideoBlind is dropped");
    eprintln!(
        "Test 3 PASS: steady camera delivered 10/10 events across a peer disconnect ({} disconnects)",
        stats.disconnects
    );
}

/// Test 4: Wrong credentials publish nothing, the failure is counted as
/// a disconnect, and the bridge still stops cleanly.
#[tokio::test(flavor = "multi_thread")]
async fn rejected_credentials_publish_nothing() {
    let script = CameraScript {
        bursts: vec![],
        close_after: false,
        reject_auth: true,
    };
    let (port, log) = spawn_fake_camera(script).await;

    let (publisher, rx) = ChannelPublisher::new();
    let mux = Multiplexer::new(
        vec![camera("porch", port, &["VideoMotion"])],
        Arc::new(publisher),
        MuxConfig::default(),
    )
    .unwrap();
    let handle = mux.start();

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(rx.try_recv().is_err(), "no publications on auth failure");
    {
        let requests = log.requests.lock();
        assert!(requests.len() >= 2, "challenge must be answered once");
        assert!(
            requests
                .last()
                .unwrap()
                .lines()
                .any(|line| line.to_ascii_lowercase().starts_with("authorization: digest")),
            "the retry must carry a Digest authorization"
        );
        assert_eq!(log.attaches.lock().len(), 0);
    }

    let stats = handle.stop().await.unwrap();
    assert_eq!(stats.events_forwarded, 0);
    assert!(stats.disconnects >= 1, "auth rejection ends the attach cycle");
    eprintln!("Test 4 PASS: auth rejected, nothing published, clean stop");
}
