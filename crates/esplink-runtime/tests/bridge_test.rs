//! Integration tests over a serial-over-TCP bridge.
//!
//! A simulated radio listens on a local socket and answers AT commands the
//! way the real firmware does. The link talks to it through `TcpTransport`
//! while a `Ticker` drives the engine.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use esplink_core::{EspLink, LinkConfig, LinkState, Request};
use esplink_runtime::{TcpTransport, Ticker};

const ADDRESS: &str = "5c:cf:7f:00:11:22";
const SSID: &str = "boathouse";
const PASSWORD: &str = "hunter2";

/// What the simulated radio has seen.
#[derive(Debug, Default)]
struct RadioState {
    joined: bool,
    lines: Vec<String>,
    requests: Vec<String>,
}

type Radio = Arc<Mutex<RadioState>>;

/// Start a simulated radio and return its address.
async fn start_radio() -> (SocketAddr, Radio, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let radio = Radio::default();
    let state = Arc::clone(&radio);
    let handle = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let _ = serve(stream, state).await;
        }
    });
    (addr, radio, handle)
}

async fn serve(mut stream: TcpStream, radio: Radio) -> std::io::Result<()> {
    let mut buf: Vec<u8> = Vec::new();
    let mut payload: Option<usize> = None;
    let mut chunk = [0u8; 512];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        loop {
            if let Some(len) = payload {
                if buf.len() < len {
                    break;
                }
                let request: Vec<u8> = buf.drain(..len).collect();
                payload = None;
                let reply = on_payload(&request, &radio);
                stream.write_all(reply.as_bytes()).await?;
                continue;
            }
            let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") else {
                break;
            };
            let line = String::from_utf8_lossy(&buf[..pos]).into_owned();
            buf.drain(..pos + 2);
            let (reply, expect) = on_line(&line, &radio);
            payload = expect;
            stream.write_all(reply.as_bytes()).await?;
        }
    }
}

fn on_line(line: &str, radio: &Radio) -> (String, Option<usize>) {
    let mut state = radio.lock().unwrap();
    state.lines.push(line.to_string());
    let ok = "\r\nOK\r\n".to_string();
    let reply = match line {
        "AT" | "AT+CWAUTOCONN=0" | "AT+CWMODE_DEF=1" => ok,
        "AT+RST" => "\r\nOK\r\n\r\n ets Jan  8 2013,rst cause:2\r\n\r\nready\r\n".to_string(),
        "AT+GMR" => "AT version:1.2.0.0\r\nSDK version:2.0.0\r\n\r\nOK\r\n".to_string(),
        "AT+CIPAPMAC?" => format!("+CIPAPMAC:\"{}\"\r\n\r\nOK\r\n", ADDRESS),
        "AT+CIPSTATUS" if state.joined => "STATUS:2\r\n\r\nOK\r\n".to_string(),
        "AT+CIPSTATUS" => "STATUS:5\r\n\r\nOK\r\n".to_string(),
        "AT+CIPCLOSE" => "CLOSED\r\n\r\nOK\r\n".to_string(),
        _ if line.starts_with("AT+CWJAP_DEF=") => {
            if line == format!("AT+CWJAP_DEF=\"{}\",\"{}\"", SSID, PASSWORD) {
                state.joined = true;
                "WIFI CONNECTED\r\nWIFI GOT IP\r\n\r\nOK\r\n".to_string()
            } else {
                state.joined = false;
                "+CWJAP:1\r\n\r\nFAIL\r\n".to_string()
            }
        }
        _ if line.starts_with("AT+CIPSTART=") => "CONNECT\r\n\r\nOK\r\n".to_string(),
        _ => {
            if let Some(len) = line.strip_prefix("AT+CIPSEND=") {
                if let Ok(len) = len.parse() {
                    return ("\r\nOK\r\n> ".to_string(), Some(len));
                }
            }
            "\r\nERROR\r\n".to_string()
        }
    };
    (reply, None)
}

fn on_payload(request: &[u8], radio: &Radio) -> String {
    let text = String::from_utf8_lossy(request).into_owned();
    let first_line = text.lines().next().unwrap_or_default().to_string();
    radio.lock().unwrap().requests.push(text);
    let body = format!("<html>{}</html>", first_line);
    format!(
        "\r\nRecv {} bytes\r\n\r\nSEND OK\r\n\r\n+IPD,{}:HTTP/1.1 200 OK\r\n\r\n{}\r\nCLOSED\r\n",
        request.len(),
        body.len() + 19,
        body
    )
}

fn fast_config() -> LinkConfig {
    let mut config = LinkConfig::default();
    config.tick_interval_ms = 5;
    config.timeouts.reset_ms = 2_000;
    config
}

async fn connect_link(addr: SocketAddr) -> Arc<EspLink<TcpTransport>> {
    let transport = TcpTransport::connect(addr).unwrap();
    Arc::new(EspLink::with_config(transport, fast_config()))
}

/// Poll `cond` until it holds or five seconds pass.
async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

fn tick_period(link: &EspLink<TcpTransport>) -> Duration {
    Duration::from_millis(link.config().tick_interval_ms)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_begin_over_bridge() {
    let (addr, radio, _server) = start_radio().await;
    let link = connect_link(addr).await;

    let setup = Arc::clone(&link);
    tokio::task::spawn_blocking(move || setup.begin())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(link.address().as_deref(), Some(ADDRESS));
    assert_eq!(
        radio.lock().unwrap().lines,
        vec!["AT", "AT+CWAUTOCONN=0", "AT+CWMODE_DEF=1", "AT+RST", "AT+CIPAPMAC?"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_get_request_over_bridge() {
    let (addr, radio, _server) = start_radio().await;
    let link = connect_link(addr).await;
    let ticker = Ticker::spawn(Arc::clone(&link), tick_period(&link));

    link.set_credentials(SSID, PASSWORD).unwrap();
    link.submit(Request::get("example.com", 80, "/a").with_body("x=1"))
        .unwrap();

    assert!(wait_until(|| link.has_response()).await, "no response");
    let response = link.fetch_response().unwrap();
    assert_eq!(response.into_string(), "<html>GET /a?x=1 HTTP/1.1</html>");

    assert!(link.is_connected());
    assert!(!link.is_busy());
    assert_eq!(link.transmit_count(), 1);
    assert_eq!(link.receive_count(), 1);

    let closed = || radio.lock().unwrap().lines.last().map(String::as_str) == Some("AT+CIPCLOSE");
    assert!(wait_until(closed).await, "connection not closed");
    ticker.stop().await;

    let state = radio.lock().unwrap();
    assert_eq!(
        state.requests,
        vec!["GET /a?x=1 HTTP/1.1\r\nHost: example.com:80\r\n\r\n".to_string()]
    );
    assert!(state.lines.contains(&"AT+CIPSEND=45".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_post_request_over_bridge() {
    let (addr, radio, _server) = start_radio().await;
    let link = connect_link(addr).await;
    let ticker = Ticker::spawn(Arc::clone(&link), tick_period(&link));

    link.set_credentials(SSID, PASSWORD).unwrap();
    link.submit(Request::post("h", 8080, "/p", "a=b")).unwrap();

    assert!(wait_until(|| link.has_response()).await, "no response");
    assert_eq!(
        link.fetch_response().unwrap().into_string(),
        "<html>POST /p HTTP/1.1</html>"
    );
    ticker.stop().await;

    let state = radio.lock().unwrap();
    assert!(state.lines.contains(&"AT+CIPSEND=117".to_string()));
    assert_eq!(state.requests.len(), 1);
    assert_eq!(state.requests[0].len(), 117);
    assert!(state.requests[0].ends_with("\r\n\r\na=b"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wrong_password_then_fix() {
    let (addr, radio, _server) = start_radio().await;
    let link = connect_link(addr).await;
    let ticker = Ticker::spawn(Arc::clone(&link), tick_period(&link));

    link.set_credentials(SSID, "wrong").unwrap();
    link.submit(Request::get("example.com", 80, "/")).unwrap();

    let join_attempted = || {
        radio
            .lock()
            .unwrap()
            .lines
            .iter()
            .any(|l| l.starts_with("AT+CWJAP_DEF="))
    };
    assert!(wait_until(join_attempted).await, "no join attempt");
    assert!(wait_until(|| link.state() == LinkState::Idle).await);
    assert!(!link.is_connected());
    assert!(link.is_busy());

    link.set_credentials(SSID, PASSWORD).unwrap();
    assert!(wait_until(|| link.has_response()).await, "no response");
    assert!(link.is_connected());

    ticker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_diagnostic_command_while_ticking() {
    let (addr, _radio, _server) = start_radio().await;
    let link = connect_link(addr).await;
    let ticker = Ticker::spawn(Arc::clone(&link), tick_period(&link));

    let diag = Arc::clone(&link);
    let out = tokio::task::spawn_blocking(move || diag.send_command("AT+GMR", 200))
        .await
        .unwrap()
        .unwrap();
    assert!(out.starts_with("AT version:1.2.0.0"), "{:?}", out);
    assert!(out.ends_with("OK\r\n"), "{:?}", out);

    assert!(ticker.stop().await > 0);
}
