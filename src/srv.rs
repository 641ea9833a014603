//! Server-side mirror of the advertisement and recovery operations.
//!
//! A server keeps a database of EC keypairs, each tagged with its use and
//! an advertise flag. From that database the [`Advertiser`] caches the
//! advertisement body and one signature per (signing key, algorithm) pair.
//! Serving a request is then pure selection: pick the cached signatures
//! the request accepts and attach them to the cached body.
//!
//! The recovery operation is the other half of the blinding exchange:
//! multiply the client's ephemeral point by the recovery key's secret
//! scalar. Both sides arrive at the same point without it ever crossing
//! the wire.

use der::asn1::{ObjectIdentifier, OctetString};
use der::Encode;
use log::debug;

use crate::crypto::{decode_point, EcKeyPair, SecretBuf, SigAlg};
use crate::error::{Error, Result};
use crate::msg::{AdvBody, AdvReply, AdvReqBody, AdvRequest, KeyUse, RecReply, RecRequest, TangKey, TangSig};

/// One keypair in the server's database.
#[derive(Debug)]
pub struct DbEntry {
    pub pair: EcKeyPair,
    pub usage: KeyUse,
    /// Whether the key appears in unsolicited advertisements.
    pub advertise: bool,
}

/// The server's key database.
#[derive(Debug, Default)]
pub struct KeyDb {
    pub entries: Vec<DbEntry>,
}

impl KeyDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pair: EcKeyPair, usage: KeyUse, advertise: bool) {
        self.entries.push(DbEntry {
            pair,
            usage,
            advertise,
        });
    }
}

struct CachedSig {
    sig: TangSig,
    key: TangKey,
    advertised: bool,
}

/// Precomputed advertisement state: body plus all signature combinations.
pub struct Advertiser {
    body: AdvBody,
    sigs: Vec<CachedSig>,
}

impl Advertiser {
    /// Build the advertisement body from every advertised key and sign it
    /// with every (signing key, algorithm) combination.
    pub fn new(db: &KeyDb) -> Result<Self> {
        let keys = db
            .entries
            .iter()
            .filter(|e| e.advertise)
            .map(|e| e.pair.public_key().to_tang_key(e.usage))
            .collect::<Result<Vec<_>>>()?;
        let body = AdvBody { keys };
        let encoded = body.to_der().map_err(Error::from)?;

        let mut sigs = Vec::new();
        for alg in SigAlg::ALL {
            let hash = alg.digest(&encoded);
            for entry in db.entries.iter().filter(|e| e.usage == KeyUse::Sig) {
                let der = entry.pair.sign_prehash(&hash)?;
                sigs.push(CachedSig {
                    sig: TangSig {
                        alg: alg.oid(),
                        sig: OctetString::new(der)?,
                    },
                    key: entry.pair.public_key().to_tang_key(KeyUse::Sig)?,
                    advertised: entry.advertise,
                });
            }
        }

        Ok(Self { body, sigs })
    }

    /// The cached advertisement body.
    pub fn body(&self) -> &AdvBody {
        &self.body
    }

    /// Answer an advertisement request.
    ///
    /// Selection never touches the cache, so concurrent or repeated
    /// requests each get a fresh signature list.
    pub fn sign(&self, req: &AdvRequest) -> Result<AdvReply> {
        let mut selected = Vec::new();

        for cached in &self.sigs {
            match &req.body {
                AdvReqBody::Keys(keys) => {
                    if !keys.iter().any(|k| *k == cached.key) {
                        continue;
                    }
                }
                AdvReqBody::Grps(grps) => {
                    if !cached.advertised {
                        continue;
                    }
                    if !accepts(grps, &cached.key.grp) {
                        continue;
                    }
                }
            }
            if !accepts(&req.types, &cached.sig.alg) {
                continue;
            }
            selected.push(cached.sig.clone());
        }

        if selected.is_empty() {
            debug!("advertisement request matched no cached signature");
            return Err(Error::NotFound);
        }

        Ok(AdvReply {
            body: self.body.clone(),
            sigs: selected,
        })
    }
}

// An empty accept set means no restriction.
fn accepts(set: &[ObjectIdentifier], oid: &ObjectIdentifier) -> bool {
    set.is_empty() || set.contains(oid)
}

/// Serve a recovery request: find the named recovery key and multiply the
/// client's point by its secret scalar.
pub fn recover(db: &KeyDb, req: &RecRequest) -> Result<RecReply> {
    for entry in &db.entries {
        if entry.usage != KeyUse::Rec {
            continue;
        }
        if entry.pair.public_key().to_tang_key(KeyUse::Rec)? != req.key {
            continue;
        }

        let point = decode_point(entry.pair.curve(), req.x.as_bytes())?;
        let secret = entry.pair.diffie_hellman(&point)?;
        return Ok(RecReply {
            y: OctetString::new(secret.as_bytes().to_vec())?,
        });
    }

    Err(Error::NotFound)
}

/// Decode a recovery reply into secret material.
pub fn secret_from_rec_reply(reply: &RecReply) -> SecretBuf {
    SecretBuf::from_bytes(reply.y.as_bytes())
}
