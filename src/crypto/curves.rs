//! Elliptic-curve registry and conversions.
//!
//! The registry covers the NIST prime-field curves: P-256, P-384 and P-521.
//! Conversions between wire keys and live keys are validating, so anything
//! that comes out of this module is a real point on its named curve. Also
//! here: the blinding multiplication `[l]·R`, which produces the whole
//! shared point (not just its x coordinate, which is why the plain ECDH
//! helpers of the curve crates are not enough), and ECDSA over the body
//! digest for each supported hash.

use std::fmt;

use der::asn1::{ObjectIdentifier, OctetString};
use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use rand::rngs::OsRng;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use zeroize::Zeroize;

use crate::crypto::skey::SecretBuf;
use crate::error::{Error, Result};
use crate::msg::{KeyUse, TangKey};
use crate::oid;

/// A curve from the built-in registry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CurveId {
    P256,
    P384,
    P521,
}

impl CurveId {
    /// Every curve this implementation will advertise or accept.
    pub const REGISTRY: [CurveId; 3] = [CurveId::P256, CurveId::P384, CurveId::P521];

    /// The named-curve object identifier.
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            Self::P256 => oid::SECP256R1,
            Self::P384 => oid::SECP384R1,
            Self::P521 => oid::SECP521R1,
        }
    }

    /// Look a curve up by identifier.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::REGISTRY.into_iter().find(|c| c.oid() == *oid)
    }

    /// Bit length of the underlying prime field.
    pub fn degree(self) -> usize {
        match self {
            Self::P256 => 256,
            Self::P384 => 384,
            Self::P521 => 521,
        }
    }

    /// Byte length of a serialized field element.
    pub(crate) fn field_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::P256 => "secp256r1",
            Self::P384 => "secp384r1",
            Self::P521 => "secp521r1",
        }
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A supported signature algorithm.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SigAlg {
    EcdsaSha224,
    EcdsaSha256,
    EcdsaSha384,
    EcdsaSha512,
}

impl SigAlg {
    pub const ALL: [SigAlg; 4] = [
        SigAlg::EcdsaSha224,
        SigAlg::EcdsaSha256,
        SigAlg::EcdsaSha384,
        SigAlg::EcdsaSha512,
    ];

    pub fn oid(self) -> ObjectIdentifier {
        match self {
            Self::EcdsaSha224 => oid::ECDSA_WITH_SHA224,
            Self::EcdsaSha256 => oid::ECDSA_WITH_SHA256,
            Self::EcdsaSha384 => oid::ECDSA_WITH_SHA384,
            Self::EcdsaSha512 => oid::ECDSA_WITH_SHA512,
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.oid() == *oid)
    }

    /// Hash the signed region with the algorithm's digest.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::EcdsaSha224 => Sha224::digest(data).to_vec(),
            Self::EcdsaSha256 => Sha256::digest(data).to_vec(),
            Self::EcdsaSha384 => Sha384::digest(data).to_vec(),
            Self::EcdsaSha512 => Sha512::digest(data).to_vec(),
        }
    }
}

// ECDSA treats the digest as a left-aligned integer. Digests shorter than
// the field element are widened with leading zeros, which leaves the
// integer value unchanged but keeps the backend's length check happy.
fn align_prehash(prehash: &[u8], width: usize) -> Vec<u8> {
    if prehash.len() >= width {
        return prehash.to_vec();
    }
    let mut out = vec![0u8; width];
    out[width - prehash.len()..].copy_from_slice(prehash);
    out
}

macro_rules! dispatch_pk {
    ($self:expr, $pk:ident => $body:expr) => {
        match $self {
            EcPublicKey::P256($pk) => $body,
            EcPublicKey::P384($pk) => $body,
            EcPublicKey::P521($pk) => $body,
        }
    };
}

macro_rules! shared_point {
    ($sk:expr, $pk:expr) => {{
        let mut scalar = *$sk.to_nonzero_scalar();
        let point = ($pk.to_projective() * scalar).to_affine();
        scalar.zeroize();
        SecretBuf::from_bytes(point.to_encoded_point(false).as_bytes())
    }};
}

/// A validated public key on a registry curve.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EcPublicKey {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
    P521(p521::PublicKey),
}

impl EcPublicKey {
    pub fn curve(&self) -> CurveId {
        match self {
            Self::P256(_) => CurveId::P256,
            Self::P384(_) => CurveId::P384,
            Self::P521(_) => CurveId::P521,
        }
    }

    /// Convert a wire key into a live key, validating the point.
    pub fn from_tang_key(key: &TangKey) -> Result<Self> {
        let curve = CurveId::from_oid(&key.grp).ok_or(Error::UnknownCurve(key.grp))?;
        decode_point(curve, key.key.as_bytes())
    }

    /// Convert back into a wire key under the given use tag.
    pub fn to_tang_key(&self, usage: KeyUse) -> Result<TangKey> {
        Ok(TangKey {
            grp: self.curve().oid(),
            key: OctetString::new(self.point_octets())?,
            usage,
        })
    }

    /// Uncompressed SEC1 octets of the point.
    pub fn point_octets(&self) -> Vec<u8> {
        dispatch_pk!(self, pk => pk.to_encoded_point(false).as_bytes().to_vec())
    }

    /// Verify a DER-encoded ECDSA signature over an already-hashed message.
    pub fn verify_prehash(&self, prehash: &[u8], signature: &[u8]) -> bool {
        let hash = align_prehash(prehash, self.curve().field_len());
        dispatch_pk!(self, pk => {
            match ecdsa::Signature::from_der(signature) {
                Ok(sig) => ecdsa::VerifyingKey::from(pk)
                    .verify_prehash(&hash, &sig)
                    .is_ok(),
                Err(_) => false,
            }
        })
    }
}

/// An EC keypair on a registry curve. The secret scalar is zeroized when
/// the pair is dropped.
#[derive(Clone)]
pub enum EcKeyPair {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

impl EcKeyPair {
    /// Generate a fresh keypair with the operating-system RNG.
    pub fn generate(curve: CurveId) -> Self {
        match curve {
            CurveId::P256 => Self::P256(p256::SecretKey::random(&mut OsRng)),
            CurveId::P384 => Self::P384(p384::SecretKey::random(&mut OsRng)),
            CurveId::P521 => Self::P521(p521::SecretKey::random(&mut OsRng)),
        }
    }

    pub fn curve(&self) -> CurveId {
        match self {
            Self::P256(_) => CurveId::P256,
            Self::P384(_) => CurveId::P384,
            Self::P521(_) => CurveId::P521,
        }
    }

    pub fn public_key(&self) -> EcPublicKey {
        match self {
            Self::P256(sk) => EcPublicKey::P256(sk.public_key()),
            Self::P384(sk) => EcPublicKey::P384(sk.public_key()),
            Self::P521(sk) => EcPublicKey::P521(sk.public_key()),
        }
    }

    /// Produce a DER-encoded ECDSA signature over an already-hashed message.
    pub fn sign_prehash(&self, prehash: &[u8]) -> Result<Vec<u8>> {
        let hash = align_prehash(prehash, self.curve().field_len());
        match self {
            Self::P256(sk) => {
                let sig: ecdsa::Signature<_> = ecdsa::SigningKey::from(sk).sign_prehash(&hash)?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            Self::P384(sk) => {
                let sig: ecdsa::Signature<_> = ecdsa::SigningKey::from(sk).sign_prehash(&hash)?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            Self::P521(sk) => {
                let sig: p521::ecdsa::Signature =
                    p521::ecdsa::SigningKey::from(ecdsa::SigningKey::from(sk))
                        .sign_prehash(&hash)?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
        }
    }

    /// Multiply the peer's point by this pair's secret scalar and return
    /// the uncompressed octets of the resulting point.
    pub fn diffie_hellman(&self, peer: &EcPublicKey) -> Result<SecretBuf> {
        match (self, peer) {
            (Self::P256(sk), EcPublicKey::P256(pk)) => Ok(shared_point!(sk, pk)),
            (Self::P384(sk), EcPublicKey::P384(pk)) => Ok(shared_point!(sk, pk)),
            (Self::P521(sk), EcPublicKey::P521(pk)) => Ok(shared_point!(sk, pk)),
            _ => Err(Error::CurveMismatch),
        }
    }
}

impl fmt::Debug for EcKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcKeyPair")
            .field("curve", &self.curve().name())
            .finish()
    }
}

/// Decode uncompressed (or compressed) SEC1 octets into a validated point.
pub fn decode_point(curve: CurveId, octets: &[u8]) -> Result<EcPublicKey> {
    match curve {
        CurveId::P256 => {
            let point = p256::EncodedPoint::from_bytes(octets).map_err(|_| Error::InvalidPoint)?;
            let key = Option::from(p256::PublicKey::from_encoded_point(&point))
                .ok_or(Error::InvalidPoint)?;
            Ok(EcPublicKey::P256(key))
        }
        CurveId::P384 => {
            let point = p384::EncodedPoint::from_bytes(octets).map_err(|_| Error::InvalidPoint)?;
            let key = Option::from(p384::PublicKey::from_encoded_point(&point))
                .ok_or(Error::InvalidPoint)?;
            Ok(EcPublicKey::P384(key))
        }
        CurveId::P521 => {
            let point = p521::EncodedPoint::from_bytes(octets).map_err(|_| Error::InvalidPoint)?;
            let key = Option::from(p521::PublicKey::from_encoded_point(&point))
                .ok_or(Error::InvalidPoint)?;
            Ok(EcPublicKey::P521(key))
        }
    }
}

// MARK: - Tests
