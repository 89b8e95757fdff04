//! TCP/TLS transport, Telnet + TN3270E negotiation, record framing, and the
//! outbound AID-response builder (§4.5). Certificate verification and
//! hostname checking are intentionally disabled: mainframe TLS endpoints
//! routinely present self-signed or privately-rooted certificates, and
//! supporting them is a compatibility requirement of this domain, not an
//! oversight.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme};

use crate::address;
use crate::codes::{
    AidKey, OrderCode, DO, DONT, FUNC_BIND_IMAGE, FUNC_RESPONSES, FUNC_SYSREQ, OPT_BINARY, OPT_EOR,
    OPT_TERMINAL_TYPE, OPT_TN3270E, TERMINAL_TYPE, TN3270E_DEVICE_TYPE, TN3270E_FUNCTIONS, TN3270E_IS,
    TN3270E_REJECT, TN3270E_REQUEST, TN3270E_SEND, WILL, WONT,
};
use crate::ebcdic::ascii_to_ebcdic_vec;
use crate::error::{ConnectError, Error, Result};
use crate::event::{self, Event, EventReceiver, EventSender};
use crate::screen::Screen;
use crate::stream;
use crate::telnet::{self, Frame};

/// Connect attempts abandon after this long (§6).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-`read` chunk size (§6).
const READ_CHUNK: usize = 64 * 1024;
/// How long a single socket read blocks before the receive thread checks
/// `running` and yields the send mutex again.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    NegotiatingTN3270E,
    TN3270EActive,
}

enum Transport {
    Plain(TcpStream),
    Tls(Box<rustls::StreamOwned<ClientConnection, TcpStream>>),
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(s) => s.read(buf),
            Transport::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(s) => s.write(buf),
            Transport::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Plain(s) => s.flush(),
            Transport::Tls(s) => s.flush(),
        }
    }
}

impl Transport {
    fn shutdown(&self) {
        let sock = match self {
            Transport::Plain(s) => s,
            Transport::Tls(s) => &s.sock,
        };
        let _ = sock.shutdown(std::net::Shutdown::Both);
    }
}

/// Guards both the socket (read by the receive thread, written by senders)
/// and the outbound sequence number, so sequence numbers are issued in the
/// same order records hit the wire (§5).
struct SendState {
    transport: Transport,
    sequence: u16,
}

struct Shared {
    send_state: Mutex<SendState>,
    state: Mutex<ConnectionState>,
    tn3270e_mode: AtomicBool,
    negotiation_complete: AtomicBool,
    negotiated_functions: Mutex<Vec<u8>>,
    running: AtomicBool,
    events: EventSender,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }

    fn send_raw(&self, bytes: &[u8]) {
        let mut guard = self.send_state.lock().unwrap_or_else(|p| p.into_inner());
        if guard.transport.write_all(bytes).is_err() {
            return;
        }
        let _ = guard.transport.flush();
    }

    fn send_query_reply(&self) {
        let tn3270e = self.tn3270e_mode.load(Ordering::Acquire);
        let mut guard = self.send_state.lock().unwrap_or_else(|p| p.into_inner());
        let bytes = build_query_reply(tn3270e, guard.sequence);
        if guard.transport.write_all(&bytes).is_ok() {
            let _ = guard.transport.flush();
            if tn3270e {
                guard.sequence = guard.sequence.wrapping_add(1);
            }
        }
    }

    fn report_error(&self, err: Error) {
        tracing::error!(error = %err, "connection error");
        let _ = self.events.send(Event::Error(err.to_string()));
    }
}

/// A connected (or connecting/disconnecting) TN3270/TN3270E session.
pub struct Connection {
    shared: Arc<Shared>,
    receive_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Connection {
    /// Open a TCP connection to `host:port`, optionally wrapped in TLS with
    /// certificate and hostname verification disabled, and spawn the
    /// receive thread. Returns the connection handle and the event stream
    /// the receive thread publishes to.
    pub fn connect(host: &str, port: u16, use_tls: bool) -> Result<(Connection, EventReceiver)> {
        let tcp = connect_tcp(host, port)?;
        tcp.set_read_timeout(Some(READ_POLL_INTERVAL)).ok();
        tcp.set_nodelay(true).ok();

        let transport = if use_tls {
            Transport::Tls(Box::new(connect_tls(host, tcp)?))
        } else {
            Transport::Plain(tcp)
        };

        let (tx, rx) = event::channel();
        let shared = Arc::new(Shared {
            send_state: Mutex::new(SendState { transport, sequence: 0 }),
            state: Mutex::new(ConnectionState::Connected),
            tn3270e_mode: AtomicBool::new(false),
            negotiation_complete: AtomicBool::new(false),
            negotiated_functions: Mutex::new(Vec::new()),
            running: AtomicBool::new(true),
            events: tx,
        });

        tracing::info!(host, port, use_tls, "connected");

        let thread_shared = Arc::clone(&shared);
        let handle = thread::spawn(move || receive_loop(thread_shared));

        Ok((
            Connection {
                shared,
                receive_thread: Mutex::new(Some(handle)),
            },
            rx,
        ))
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn is_tn3270e(&self) -> bool {
        self.shared.tn3270e_mode.load(Ordering::Acquire)
    }

    pub fn negotiation_complete(&self) -> bool {
        self.shared.negotiation_complete.load(Ordering::Acquire)
    }

    pub fn negotiated_functions(&self) -> Vec<u8> {
        self.shared.negotiated_functions.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Build and send an AID response for `aid` against the current state
    /// of `screen` (§4.5.3), then clear the screen's modified flags.
    pub fn send_aid(&self, aid: AidKey, screen: &mut Screen) -> Result<()> {
        let tn3270e = self.shared.tn3270e_mode.load(Ordering::Acquire);
        let mut guard = self.shared.send_state.lock().unwrap_or_else(|p| p.into_inner());
        let sequence = guard.sequence;
        let bytes = build_aid_response(tn3270e, sequence, aid, screen);
        guard.transport.write_all(&bytes)?;
        guard.transport.flush()?;
        if tn3270e {
            guard.sequence = guard.sequence.wrapping_add(1);
        }
        drop(guard);
        screen.clear_modified_flags();
        Ok(())
    }

    /// Idempotent: half-closes the socket, joins the receive thread, and
    /// leaves the connection in `Disconnected`. A second call is a no-op.
    pub fn disconnect(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        tracing::info!("disconnecting");
        if let Ok(guard) = self.shared.send_state.lock() {
            guard.transport.shutdown();
        }
        if let Some(handle) = self.receive_thread.lock().unwrap_or_else(|p| p.into_inner()).take() {
            let _ = handle.join();
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }
}

fn connect_tcp(host: &str, port: u16) -> Result<TcpStream> {
    let addrs = format!("{host}:{port}")
        .to_socket_addrs()
        .map_err(|_| Error::Connect(ConnectError::Dns { host: host.to_string() }))?;

    let mut last_err: Option<io::Error> = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(match last_err.map(|e| e.kind()) {
        Some(io::ErrorKind::TimedOut) => Error::Connect(ConnectError::Timeout {
            host: host.to_string(),
            port,
        }),
        Some(io::ErrorKind::ConnectionRefused) => Error::Connect(ConnectError::Refused {
            host: host.to_string(),
            port,
        }),
        Some(kind) => Error::Connect(ConnectError::Transport {
            message: format!("{kind:?}"),
        }),
        None => Error::Connect(ConnectError::Dns { host: host.to_string() }),
    })
}

fn connect_tls(host: &str, tcp: TcpStream) -> Result<rustls::StreamOwned<ClientConnection, TcpStream>> {
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoCertificateVerification))
        .with_no_client_auth();
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| Error::Connect(ConnectError::Transport {
            message: format!("invalid server name: {host}"),
        }))?;
    let conn = ClientConnection::new(Arc::new(config), server_name)?;
    Ok(rustls::StreamOwned::new(conn, tcp))
}

/// A verifier that accepts any server certificate and any hostname. The
/// domain this core serves is mainframes with self-signed or internally
/// issued TLS certificates; real verification would make most deployments
/// unreachable.
#[derive(Debug)]
struct NoCertificateVerification;

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA1,
            SignatureScheme::ECDSA_SHA1_Legacy,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

fn receive_loop(shared: Arc<Shared>) {
    let _ = shared.events.send(Event::Connected);
    let mut buffer: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = vec![0u8; READ_CHUNK];

    while shared.running.load(Ordering::Acquire) {
        let read_result = {
            let mut guard = shared.send_state.lock().unwrap_or_else(|p| p.into_inner());
            guard.transport.read(&mut chunk)
        };
        match read_result {
            Ok(0) => {
                shared.report_error(Error::PeerClosed);
                break;
            }
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                drain_frames(&shared, &mut buffer);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock || err.kind() == io::ErrorKind::TimedOut => {
                continue;
            }
            Err(err) => {
                shared.report_error(err.into());
                break;
            }
        }
    }

    shared.running.store(false, Ordering::Release);
    shared.set_state(ConnectionState::Disconnected);
    tracing::info!("receive loop exiting");
    let _ = shared.events.send(Event::Disconnected);
}

fn drain_frames(shared: &Shared, buffer: &mut Vec<u8>) {
    loop {
        match telnet::next_frame(buffer) {
            Some((Frame::Record(record), consumed)) => {
                let record = record.to_vec();
                dispatch_record(shared, &record);
                buffer.drain(0..consumed);
            }
            Some((Frame::Negotiation { command, option }, consumed)) => {
                handle_negotiation(shared, command, option);
                buffer.drain(0..consumed);
            }
            Some((Frame::Subnegotiation(body), consumed)) => {
                let body = body.to_vec();
                handle_subnegotiation(shared, &body);
                buffer.drain(0..consumed);
            }
            Some((Frame::StandaloneEor, consumed)) | Some((Frame::EscapedIac, consumed)) => {
                buffer.drain(0..consumed);
            }
            None => break,
        }
    }
}

/// The Query short-circuit lives here, one level above the stream parser
/// (§4.4.4): a Query request never reaches the observer or the screen.
fn dispatch_record(shared: &Shared, record: &[u8]) {
    let tn3270e = shared.tn3270e_mode.load(Ordering::Acquire);
    if let Some((_, payload)) = stream::strip_tn3270e_header(record, Some(tn3270e)) {
        if stream::is_query_request(payload) {
            shared.send_query_reply();
            return;
        }
    }
    let _ = shared.events.send(Event::DataRecord(record.to_vec()));
}

/// The plain policy decision, decoupled from I/O so it can be tested
/// without a live socket (§4.5.2).
fn negotiation_reply(command: u8, option: u8) -> Option<(u8, u8)> {
    let supported = matches!(option, OPT_BINARY | OPT_TERMINAL_TYPE | OPT_EOR | OPT_TN3270E);
    match command {
        DO => Some(if supported { (WILL, option) } else { (WONT, option) }),
        WILL => Some(if supported { (DO, option) } else { (DONT, option) }),
        DONT => Some((WONT, option)),
        WONT => Some((DONT, option)),
        _ => None,
    }
}

fn handle_negotiation(shared: &Shared, command: u8, option: u8) {
    let reply = negotiation_reply(command, option);
    tracing::debug!(command, option, reply = ?reply, "telnet negotiation");
    if let Some((reply_command, reply_option)) = reply {
        if matches!(reply_command, WONT | DONT) {
            tracing::warn!(command, option, "declining unsupported telnet option");
        }
        shared.send_raw(&telnet::build_negotiation(reply_command, reply_option));
    }
    match (command, option) {
        (DO, OPT_TN3270E) => {
            shared.tn3270e_mode.store(true, Ordering::Release);
            shared.set_state(ConnectionState::NegotiatingTN3270E);
        }
        (DONT, OPT_TN3270E) => {
            tracing::warn!("peer declined TN3270E; staying in plain TN3270");
            shared.tn3270e_mode.store(false, Ordering::Release);
            shared.set_state(ConnectionState::Connected);
        }
        _ => {}
    }
}

fn handle_subnegotiation(shared: &Shared, body: &[u8]) {
    if body.is_empty() {
        return;
    }
    match (body[0], body.get(1), body.get(2)) {
        (OPT_TERMINAL_TYPE, Some(0x01), _) => {
            let mut params = vec![0x00]; // IS
            params.extend_from_slice(TERMINAL_TYPE.as_bytes());
            shared.send_raw(&telnet::build_subnegotiation(OPT_TERMINAL_TYPE, &params));
        }
        (OPT_TN3270E, Some(&TN3270E_SEND), Some(&TN3270E_DEVICE_TYPE)) => {
            let mut params = vec![TN3270E_DEVICE_TYPE, TN3270E_REQUEST];
            params.extend_from_slice(TERMINAL_TYPE.as_bytes());
            shared.send_raw(&telnet::build_subnegotiation(OPT_TN3270E, &params));
        }
        (OPT_TN3270E, Some(&TN3270E_DEVICE_TYPE), Some(&TN3270E_IS)) => {
            let params = vec![
                TN3270E_FUNCTIONS,
                TN3270E_REQUEST,
                FUNC_BIND_IMAGE,
                FUNC_RESPONSES,
                FUNC_SYSREQ,
            ];
            shared.send_raw(&telnet::build_subnegotiation(OPT_TN3270E, &params));
        }
        (OPT_TN3270E, Some(&TN3270E_FUNCTIONS), Some(&TN3270E_IS)) => {
            let functions = body[3..].to_vec();
            tracing::info!(?functions, "TN3270E negotiation complete");
            *shared.negotiated_functions.lock().unwrap_or_else(|p| p.into_inner()) = functions;
            shared.negotiation_complete.store(true, Ordering::Release);
            shared.set_state(ConnectionState::TN3270EActive);
        }
        (OPT_TN3270E, Some(&TN3270E_REJECT), _) => {
            tracing::debug!("peer rejected TN3270E device type");
            shared.tn3270e_mode.store(false, Ordering::Release);
            shared.set_state(ConnectionState::Connected);
        }
        _ => {}
    }
}

/// Build one outbound AID response (§4.5.3). Pure and independent of any
/// live connection, so the wire-exact scenarios in §8 can be checked
/// without a socket.
pub fn build_aid_response(tn3270e_mode: bool, sequence: u16, aid: AidKey, screen: &Screen) -> Vec<u8> {
    let mut out = Vec::new();
    if tn3270e_mode {
        out.extend_from_slice(&[0x00, 0x00, 0x00, (sequence >> 8) as u8, (sequence & 0xFF) as u8]);
    }
    out.push(aid.to_u8());
    let (b1, b2) = address::encode_address(screen.cursor_pos() as u16);
    out.push(b1);
    out.push(b2);
    if !aid.is_short_read() {
        if screen.is_unformatted() {
            out.extend(ascii_to_ebcdic_vec(&screen.unformatted_data()));
        } else {
            for field in screen.modified_fields() {
                out.push(OrderCode::SBA);
                let (sb1, sb2) = address::encode_address(field.start_pos as u16);
                out.push(sb1);
                out.push(sb2);
                out.extend(ascii_to_ebcdic_vec(&field.data));
            }
        }
    }
    out.extend_from_slice(&telnet::build_eor());
    out
}

const QUERY_REPLY_SUMMARY: &[u8] = &[0x00, 0x0E, 0x81, 0x80, 0x80, 0x81, 0x84, 0x85, 0x86, 0x87, 0x88, 0x95, 0xA1, 0xA6];
const QUERY_REPLY_USABLE_AREA: &[u8] = &[
    0x00, 0x17, 0x81, 0x81, 0x01, 0x00, 0x00, 0x50, 0x00, 0x18, 0x01, 0x00, 0x0A, 0x02, 0xE5, 0x00, 0x02, 0x00, 0x6F,
    0x09, 0x0C, 0x0A, 0x00, 0x00,
];
const QUERY_REPLY_ALPHANUMERIC_PARTITIONS: &[u8] = &[0x00, 0x08, 0x81, 0x84, 0x00, 0x0A, 0x00, 0x00];
const QUERY_REPLY_CHARACTER_SETS: &[u8] = &[
    0x00, 0x1B, 0x81, 0x85, 0x82, 0x00, 0x09, 0x0C, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00, 0x10, 0x00, 0x02, 0xB9, 0x00,
    0x25, 0x01, 0x00, 0xF1, 0x03, 0xC3, 0x01, 0x36,
];
const QUERY_REPLY_COLOR: &[u8] = &[
    0x00, 0x26, 0x81, 0x86, 0x00, 0x10, 0x00, 0xF4, 0xF1, 0xF1, 0xF2, 0xF2, 0xF3, 0xF3, 0xF4, 0xF4, 0xF5, 0xF5, 0xF6,
    0xF6, 0xF7, 0xF7, 0xF8, 0xF8, 0xF9, 0xF9, 0xFA, 0xFA, 0xFB, 0xFB, 0xFC, 0xFC, 0xFD, 0xFD, 0xFE, 0xFE, 0xFF, 0xFF,
    0xFF, 0xFF,
];
const QUERY_REPLY_HIGHLIGHTING: &[u8] = &[0x00, 0x0F, 0x81, 0x87, 0x05, 0x00, 0xF0, 0xF1, 0xF1, 0xF2, 0xF2, 0xF4, 0xF4, 0xF8, 0xF8];
const QUERY_REPLY_REPLY_MODES: &[u8] = &[0x00, 0x07, 0x81, 0x88, 0x00, 0x01, 0x02];
const QUERY_REPLY_IMPLICIT_PARTITION: &[u8] = &[
    0x00, 0x11, 0x81, 0xA6, 0x00, 0x00, 0x0B, 0x01, 0x00, 0x00, 0x50, 0x00, 0x18, 0x00, 0x50, 0x00, 0x20,
];

fn build_query_reply(tn3270e_mode: bool, sequence: u16) -> Vec<u8> {
    let mut out = Vec::new();
    if tn3270e_mode {
        out.extend_from_slice(&[0x00, 0x00, 0x00, (sequence >> 8) as u8, (sequence & 0xFF) as u8]);
    }
    out.push(0x88);
    for sf in [
        QUERY_REPLY_SUMMARY,
        QUERY_REPLY_USABLE_AREA,
        QUERY_REPLY_ALPHANUMERIC_PARTITIONS,
        QUERY_REPLY_CHARACTER_SETS,
        QUERY_REPLY_COLOR,
        QUERY_REPLY_HIGHLIGHTING,
        QUERY_REPLY_REPLY_MODES,
        QUERY_REPLY_IMPLICIT_PARTITION,
    ] {
        out.extend_from_slice(sf);
    }
    out.extend_from_slice(&telnet::build_eor());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aid_short_read_matches_scenario_four() {
        let mut screen = Screen::new();
        screen.set_cursor_pos(5);
        let bytes = build_aid_response(true, 0, AidKey::Pa(2), &screen);
        assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x6E, 0x40, 0xC5, 0xFF, 0xEF]);
    }

    #[test]
    fn aid_with_modified_field_matches_scenario_five() {
        let mut screen = Screen::new();
        screen.start_field(10, 0x00); // unprotected
        screen.put_char(11, 'H');
        screen.put_char(12, 'I');
        screen.mark_modified(11);
        screen.set_cursor_pos(13);
        let bytes = build_aid_response(false, 0, AidKey::Enter, &screen);
        assert_eq!(
            bytes,
            vec![0x7D, 0x40, 0x4D, OrderCode::SBA, 0x40, 0x4B, 0xC8, 0xC9, 0xFF, 0xEF]
        );
    }

    #[test]
    fn query_reply_is_prefixed_and_terminated_correctly() {
        let bytes = build_query_reply(false, 0);
        assert_eq!(bytes[0], 0x88);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xEF]);
        assert!(bytes.windows(3).any(|w| w == [0x81, 0x80, 0x80]));
    }

    #[test]
    fn negotiation_reply_matches_supported_option_policy() {
        assert_eq!(negotiation_reply(DO, OPT_TN3270E), Some((WILL, OPT_TN3270E)));
        assert_eq!(negotiation_reply(DO, 0x99), Some((WONT, 0x99)));
        assert_eq!(negotiation_reply(WILL, OPT_EOR), Some((DO, OPT_EOR)));
        assert_eq!(negotiation_reply(DONT, OPT_TN3270E), Some((WONT, OPT_TN3270E)));
        assert_eq!(negotiation_reply(WONT, OPT_BINARY), Some((DONT, OPT_BINARY)));
    }
}
