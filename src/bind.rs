//! The top-level bind operation.
//!
//! Ties the pieces together: fetch an advertisement, validate it, run the
//! blinding exchange, and package the result for persistence. The caller
//! supplies the secret sink (typically a disk-encryption keyslot) and
//! stores the returned record.

use std::time::Duration;

use crate::adv::{build_adv_request, process_adv_reply};
use crate::crypto::SecretBuf;
use crate::error::{Error, Result};
use crate::msg::{AdvReply, Message};
use crate::net::exchange;
use crate::store::BindRecord;

/// Default UDP service when the caller does not name one.
pub const DEFAULT_SERVICE: &str = "5700";

/// Where and how to reach the server.
#[derive(Clone, Debug)]
pub struct BindOptions {
    pub host: String,
    pub service: String,
    /// Overall transport deadline for one request.
    pub deadline: Duration,
    /// Wait for the server to connect instead of dialing out.
    pub listen: bool,
}

impl BindOptions {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: DEFAULT_SERVICE.to_string(),
            deadline: Duration::from_secs(10),
            listen: false,
        }
    }
}

/// Fetch and decode the server's advertisement.
pub fn fetch_advertisement(opts: &BindOptions) -> Result<AdvReply> {
    if opts.listen {
        return Err(Error::ListenUnsupported);
    }

    let request = build_adv_request(None);
    let mut replies = exchange(&[request], &opts.host, &opts.service, opts.deadline)?;
    match replies.pop() {
        Some(Message::AdvRep(reply)) => Ok(reply),
        Some(Message::Error(code)) => Err(Error::Server(code)),
        _ => Err(Error::UnexpectedReply),
    }
}

/// Bind against a server: fetch the advertisement and derive a secret.
///
/// `min_keysize` is the byte length of the secret being protected and
/// must be at least 16 (a 128-bit floor). Returns the record to persist
/// and the derived secret for the passphrase sink.
pub fn bind(opts: &BindOptions, min_keysize: usize) -> Result<(BindRecord, SecretBuf)> {
    let reply = fetch_advertisement(opts)?;
    bind_with_advertisement(opts, &reply, min_keysize)
}

/// Bind using an advertisement obtained out-of-band (a trusted file, say).
pub fn bind_with_advertisement(
    opts: &BindOptions,
    reply: &AdvReply,
    min_keysize: usize,
) -> Result<(BindRecord, SecretBuf)> {
    if min_keysize < 16 {
        return Err(Error::KeyTooSmall(min_keysize));
    }

    let (rec, secret) = process_adv_reply(reply, min_keysize)?;
    let record = BindRecord {
        rec,
        host: opts.host.clone(),
        service: opts.service.clone(),
        listen: opts.listen,
    };
    Ok((record, secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_filled_in() {
        let opts = BindOptions::new("tang.example.net");
        assert_eq!(opts.service, DEFAULT_SERVICE);
        assert_eq!(opts.deadline, Duration::from_secs(10));
        assert!(!opts.listen);
    }

    #[test]
    fn listening_is_not_supported() {
        let mut opts = BindOptions::new("tang.example.net");
        opts.listen = true;
        assert!(matches!(
            fetch_advertisement(&opts),
            Err(Error::ListenUnsupported)
        ));
    }
}
