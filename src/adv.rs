//! Client-side advertisement handling.
//!
//! Fetching is the messenger's job; this module builds the request,
//! decides whether a reply can be trusted, and turns a trusted reply into
//! a recovery request plus the derived secret.
//!
//! Trust rule: every signature attached to the reply must verify, under
//! the signed body bytes, against at least one SIG-tagged key contained in
//! that same body. An attacker who swaps a signature must then also swap a
//! key inside the signed region, which changes the bytes being verified.

use der::Encode;
use log::debug;

use crate::crypto::{CurveId, EcKeyPair, EcPublicKey, SecretBuf, SigAlg};
use crate::error::{Error, Result};
use crate::msg::{AdvReply, AdvReqBody, AdvRequest, KeyUse, Message, RecRequest, TangKey};

/// Build an advertisement request.
///
/// With `keys`, the request names those server keys by value and accepts
/// any signature algorithm. Without, it lists every registry curve and the
/// full supported algorithm set.
pub fn build_adv_request(keys: Option<Vec<TangKey>>) -> Message {
    let (types, body) = match keys {
        Some(keys) => (Vec::new(), AdvReqBody::Keys(keys)),
        None => (
            SigAlg::ALL.iter().map(|a| a.oid()).collect(),
            AdvReqBody::Grps(CurveId::REGISTRY.iter().map(|c| c.oid()).collect()),
        ),
    };
    Message::AdvReq(AdvRequest { types, body })
}

/// Check that an advertisement reply is properly self-signed.
pub fn validate_reply(reply: &AdvReply) -> Result<()> {
    if reply.sigs.is_empty() || reply.body.keys.len() < 2 {
        debug!(
            "advertisement rejected: {} signatures over {} keys",
            reply.sigs.len(),
            reply.body.keys.len()
        );
        return Err(Error::BadAdvertisement);
    }

    let body = reply.body.to_der().map_err(Error::from)?;

    let signers = reply
        .body
        .keys
        .iter()
        .filter(|k| k.usage == KeyUse::Sig)
        .map(EcPublicKey::from_tang_key)
        .collect::<Result<Vec<_>>>()?;

    for sig in &reply.sigs {
        let Some(alg) = SigAlg::from_oid(&sig.alg) else {
            debug!("advertisement rejected: unknown algorithm {}", sig.alg);
            return Err(Error::BadAdvertisement);
        };
        let hash = alg.digest(&body);

        if !signers
            .iter()
            .any(|key| key.verify_prehash(&hash, sig.sig.as_bytes()))
        {
            debug!("advertisement rejected: signature verified under no body key");
            return Err(Error::BadAdvertisement);
        }
    }

    Ok(())
}

/// Validate a reply, pick a recovery key and run the blinding exchange.
///
/// `min_keysize` is the length in bytes of the secret the caller intends
/// to protect; a recovery key qualifies when its curve degree is at least
/// twice that many bits. Keys are tried in advertisement order and the
/// first match wins, so the server stays in control of preference.
///
/// Returns the recovery request to persist and the derived secret. The
/// ephemeral scalar lives only inside this call.
pub fn process_adv_reply(
    reply: &AdvReply,
    min_keysize: usize,
) -> Result<(RecRequest, SecretBuf)> {
    validate_reply(reply)?;

    let required_degree = min_keysize * 8 * 2;

    for key in &reply.body.keys {
        if key.usage != KeyUse::Rec {
            continue;
        }
        let Ok(server_key) = EcPublicKey::from_tang_key(key) else {
            continue;
        };
        if server_key.curve().degree() < required_degree {
            debug!(
                "skipping {} recovery key, degree below {}",
                server_key.curve(),
                required_degree
            );
            continue;
        }

        let ephemeral = EcKeyPair::generate(server_key.curve());
        let secret = ephemeral.diffie_hellman(&server_key)?;
        let request = RecRequest {
            key: key.clone(),
            x: der::asn1::OctetString::new(ephemeral.public_key().point_octets())?,
        };
        return Ok((request, secret));
    }

    Err(Error::NotFound)
}
