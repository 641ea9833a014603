//! UDP messenger.
//!
//! A request is raced across every address the host resolves to. Each
//! address gets its own connected socket and up to three sends; between
//! sends, every socket opened so far is swept for a readable reply. The
//! first datagram that decodes wins, whichever address it came from.
//!
//! Replies are positional: the i-th output corresponds to the i-th
//! request. All sockets are closed on every exit path (they are owned by
//! the call frame), and the per-attempt timeout never drops below 5 ms.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::msg::Message;
use crate::pkt::{self, MAX_DATAGRAM};

const SEND_ATTEMPTS: u32 = 3;
const RESOLVE_ATTEMPTS: u32 = 3;
const MIN_ATTEMPT_MS: u64 = 5;

/// Send each request to `host:service` and collect one reply per request,
/// in request order.
pub fn exchange(
    requests: &[Message],
    host: &str,
    service: &str,
    deadline: Duration,
) -> Result<Vec<Message>> {
    let addrs = resolve(host, service)?;
    requests
        .iter()
        .map(|req| request_over(req, &addrs, deadline))
        .collect()
}

/// Resolve a host and numeric service to candidate addresses, retrying
/// transient resolver failures.
fn resolve(host: &str, service: &str) -> Result<Vec<SocketAddr>> {
    let port: u16 = service
        .parse()
        .map_err(|_| Error::InvalidService(service.to_string()))?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        match (host, port).to_socket_addrs() {
            Ok(iter) => {
                let addrs: Vec<SocketAddr> = iter.collect();
                if addrs.is_empty() {
                    return Err(Error::NoAddresses);
                }
                return Ok(addrs);
            }
            Err(err) if attempt < RESOLVE_ATTEMPTS => {
                debug!("resolving {host}: {err}, retrying");
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Race one encoded request across all addresses.
fn request_over(request: &Message, addrs: &[SocketAddr], deadline: Duration) -> Result<Message> {
    if addrs.is_empty() {
        return Err(Error::NoAddresses);
    }

    let out = pkt::encode(request)?;
    let attempt_ms = (deadline.as_millis() as u64 / addrs.len() as u64 / u64::from(SEND_ATTEMPTS))
        .max(MIN_ATTEMPT_MS);
    let attempt_timeout = Duration::from_millis(attempt_ms);

    let mut sockets: Vec<UdpSocket> = Vec::with_capacity(addrs.len());

    for addr in addrs {
        let socket = match connect(*addr) {
            Ok(socket) => socket,
            Err(err) => {
                warn!("skipping {addr}: {err}");
                continue;
            }
        };
        sockets.push(socket);

        for _ in 0..SEND_ATTEMPTS {
            if let Some(socket) = sockets.last() {
                if let Err(err) = socket.send(&out) {
                    debug!("send to {addr} failed: {err}");
                }
            }
            if let Some(reply) = sweep(&sockets, attempt_timeout) {
                return Ok(reply);
            }
        }
    }

    Err(Error::Timeout)
}

fn connect(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let local = if addr.is_ipv4() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
    };
    let socket = UdpSocket::bind(local)?;
    socket.connect(addr)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Poll every socket for a decodable reply until the timeout lapses.
/// Datagrams that fail to decode are dropped and the sweep continues.
fn sweep(sockets: &[UdpSocket], timeout: Duration) -> Option<Message> {
    let until = Instant::now() + timeout;
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        for socket in sockets {
            match socket.recv(&mut buf) {
                Ok(n) => match pkt::decode(&buf[..n]) {
                    Ok(msg) => return Some(msg),
                    Err(err) => debug!("discarding undecodable datagram: {err}"),
                },
                // WouldBlock means nothing pending; anything else
                // (ICMP refusals surface here) abandons that address
                // for this pass.
                Err(_) => {}
            }
        }
        if Instant::now() >= until {
            return None;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

// MARK: - Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adv::build_adv_request;
    use crate::msg::WireError;
    use std::thread::JoinHandle;

    fn canned_reply() -> Message {
        Message::Error(WireError::NotFoundKey)
    }

    /// A one-shot server that replies after ignoring `drop_first` datagrams.
    fn spawn_responder(drop_first: usize) -> (SocketAddr, JoinHandle<()>) {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind responder");
        let addr = socket.local_addr().expect("local addr");
        let handle = thread::spawn(move || {
            let mut buf = [0u8; MAX_DATAGRAM];
            for _ in 0..drop_first {
                socket.recv_from(&mut buf).expect("recv");
            }
            let (n, peer) = socket.recv_from(&mut buf).expect("recv");
            pkt::decode(&buf[..n]).expect("request decodes");
            let reply = pkt::encode(&canned_reply()).expect("encode reply");
            socket.send_to(&reply, peer).expect("send reply");
        });
        (addr, handle)
    }

    #[test]
    fn reply_from_any_address_wins() {
        // The first address never answers; the reply must still come back
        // in position 0.
        let silent = UdpSocket::bind("127.0.0.1:0").expect("bind silent");
        let (live, handle) = spawn_responder(0);
        let addrs = vec![silent.local_addr().expect("local addr"), live];

        let req = build_adv_request(None);
        let reply = request_over(&req, &addrs, Duration::from_secs(2)).expect("reply");
        assert_eq!(reply, canned_reply());
        handle.join().expect("responder");
    }

    #[test]
    fn lost_datagrams_are_retried() {
        let (addr, handle) = spawn_responder(2);
        let req = build_adv_request(None);
        let reply = request_over(&req, &[addr], Duration::from_secs(3)).expect("reply");
        assert_eq!(reply, canned_reply());
        handle.join().expect("responder");
    }

    #[test]
    fn silence_times_out() {
        let silent = UdpSocket::bind("127.0.0.1:0").expect("bind silent");
        let addrs = vec![silent.local_addr().expect("local addr")];
        let req = build_adv_request(None);
        let err = request_over(&req, &addrs, Duration::from_millis(120)).unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[test]
    fn undecodable_datagrams_are_skipped() {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind responder");
        let addr = socket.local_addr().expect("local addr");
        let handle = thread::spawn(move || {
            let mut buf = [0u8; MAX_DATAGRAM];
            let (_, peer) = socket.recv_from(&mut buf).expect("recv");
            socket.send_to(&[0xde, 0xad], peer).expect("send junk");
            let reply = pkt::encode(&canned_reply()).expect("encode reply");
            socket.send_to(&reply, peer).expect("send reply");
        });

        let req = build_adv_request(None);
        let reply = request_over(&req, &[addr], Duration::from_secs(2)).expect("reply");
        assert_eq!(reply, canned_reply());
        handle.join().expect("responder");
    }

    #[test]
    fn non_numeric_service_is_refused() {
        let err = resolve("localhost", "tang").unwrap_err();
        assert!(matches!(err, Error::InvalidService(_)));
    }

    #[test]
    fn replies_preserve_request_order() {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind responder");
        let port = socket.local_addr().expect("local addr").port();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; MAX_DATAGRAM];
            for _ in 0..2 {
                let (n, peer) = socket.recv_from(&mut buf).expect("recv");
                // Echo whatever arrives so order is observable.
                socket.send_to(&buf[..n], peer).expect("send echo");
            }
        });

        let first = Message::Error(WireError::Internal);
        let second = Message::Error(WireError::NotFoundKey);
        let replies = exchange(
            &[first.clone(), second.clone()],
            "127.0.0.1",
            &port.to_string(),
            Duration::from_secs(2),
        )
        .expect("exchange");
        assert_eq!(replies, vec![first, second]);
        handle.join().expect("responder");
    }
}
