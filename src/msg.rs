//! Wire message model and DER codec.
//!
//! Every protocol message is DER-encoded ASN.1. The structures here mirror
//! the wire shapes one-to-one: records are `SEQUENCE`s, the two sum types
//! ([`Message`] and [`AdvReqBody`]) are `CHOICE`s with explicit
//! context-specific tags, and enumerations go out as `ENUMERATED`.
//!
//! The advertisement body is the signed region: signatures cover the DER
//! bytes of [`AdvBody`] alone, so both peers must produce identical bytes
//! for structurally equal bodies. DER guarantees that.

use der::asn1::{ContextSpecific, ContextSpecificRef, ObjectIdentifier, OctetString};
use der::{Decode, Encode, Enumerated, Length, Reader, Sequence, Tag, TagMode, TagNumber, Writer};

/// What a server key is for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Enumerated)]
#[repr(u32)]
pub enum KeyUse {
    /// Signs advertisements.
    Sig = 0,
    /// Participates in the blinding exchange.
    Rec = 1,
}

/// A server public key: named curve, point octets, use tag.
#[derive(Clone, Debug, Sequence)]
pub struct TangKey {
    pub grp: ObjectIdentifier,
    pub key: OctetString,
    pub usage: KeyUse,
}

// Keys compare by curve and point only. A request may echo a key it saw
// under a different use tag and must still match.
impl PartialEq for TangKey {
    fn eq(&self, other: &Self) -> bool {
        self.grp == other.grp && self.key == other.key
    }
}

impl Eq for TangKey {}

/// A detached signature over the advertisement body.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TangSig {
    /// Signature-algorithm identifier (one of the `ecdsa-with-SHA2` set).
    pub alg: ObjectIdentifier,
    /// DER-encoded ECDSA signature value `(r, s)`.
    pub sig: OctetString,
}

/// The signed region of an advertisement.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct AdvBody {
    pub keys: Vec<TangKey>,
}

/// An advertisement reply: body plus at least one signature over it.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct AdvReply {
    pub body: AdvBody,
    pub sigs: Vec<TangSig>,
}

/// Body of an advertisement request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdvReqBody {
    /// Name specific server keys by value.
    Keys(Vec<TangKey>),
    /// List acceptable curves by identifier.
    Grps(Vec<ObjectIdentifier>),
}

/// An advertisement request.
///
/// `types` is the accepted-signature-algorithm set; empty means anything.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct AdvRequest {
    pub types: Vec<ObjectIdentifier>,
    pub body: AdvReqBody,
}

/// A recovery request: the chosen server key and the client's blinded point.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct RecRequest {
    /// The server's recovery key, echoed verbatim.
    pub key: TangKey,
    /// Uncompressed octets of the client's ephemeral public point.
    pub x: OctetString,
}

/// A recovery reply: the server's half of the exchange.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct RecReply {
    pub y: OctetString,
}

/// Protocol error codes carried on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Enumerated)]
#[repr(u32)]
pub enum WireError {
    None = 0,
    Internal = 1,
    Malformed = 2,
    NotFoundKey = 3,
}

/// The outer protocol message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Message {
    Error(WireError),
    AdvReq(AdvRequest),
    AdvRep(AdvReply),
    RecReq(RecRequest),
    RecRep(RecReply),
}

const TAG_ERROR: u8 = 0;
const TAG_ADV_REQ: u8 = 1;
const TAG_ADV_REP: u8 = 2;
const TAG_REC_REQ: u8 = 3;
const TAG_REC_REP: u8 = 4;

const TAG_BODY_KEYS: u8 = 0;
const TAG_BODY_GRPS: u8 = 1;

fn explicit<T>(number: u8, value: &T) -> ContextSpecificRef<'_, T> {
    ContextSpecificRef {
        tag_number: TagNumber::new(number),
        tag_mode: TagMode::Explicit,
        value,
    }
}

fn choice_tag<'a, R: Reader<'a>>(reader: &mut R) -> der::Result<u8> {
    let tag = reader.peek_tag()?;
    match tag {
        Tag::ContextSpecific { number, .. } => Ok(number.value()),
        _ => Err(tag.unexpected_error(None)),
    }
}

fn decode_explicit<'a, R: Reader<'a>, T: Decode<'a>>(reader: &mut R) -> der::Result<T> {
    Ok(ContextSpecific::<T>::decode(reader)?.value)
}

impl<'a> Decode<'a> for AdvReqBody {
    fn decode<R: Reader<'a>>(reader: &mut R) -> der::Result<Self> {
        match choice_tag(reader)? {
            TAG_BODY_KEYS => Ok(Self::Keys(decode_explicit(reader)?)),
            TAG_BODY_GRPS => Ok(Self::Grps(decode_explicit(reader)?)),
            _ => Err(reader.peek_tag()?.unexpected_error(None)),
        }
    }
}

impl Encode for AdvReqBody {
    fn encoded_len(&self) -> der::Result<Length> {
        match self {
            Self::Keys(keys) => explicit(TAG_BODY_KEYS, keys).encoded_len(),
            Self::Grps(grps) => explicit(TAG_BODY_GRPS, grps).encoded_len(),
        }
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        match self {
            Self::Keys(keys) => explicit(TAG_BODY_KEYS, keys).encode(writer),
            Self::Grps(grps) => explicit(TAG_BODY_GRPS, grps).encode(writer),
        }
    }
}

impl<'a> Decode<'a> for Message {
    fn decode<R: Reader<'a>>(reader: &mut R) -> der::Result<Self> {
        match choice_tag(reader)? {
            TAG_ERROR => Ok(Self::Error(decode_explicit(reader)?)),
            TAG_ADV_REQ => Ok(Self::AdvReq(decode_explicit(reader)?)),
            TAG_ADV_REP => Ok(Self::AdvRep(decode_explicit(reader)?)),
            TAG_REC_REQ => Ok(Self::RecReq(decode_explicit(reader)?)),
            TAG_REC_REP => Ok(Self::RecRep(decode_explicit(reader)?)),
            _ => Err(reader.peek_tag()?.unexpected_error(None)),
        }
    }
}

impl Encode for Message {
    fn encoded_len(&self) -> der::Result<Length> {
        match self {
            Self::Error(e) => explicit(TAG_ERROR, e).encoded_len(),
            Self::AdvReq(m) => explicit(TAG_ADV_REQ, m).encoded_len(),
            Self::AdvRep(m) => explicit(TAG_ADV_REP, m).encoded_len(),
            Self::RecReq(m) => explicit(TAG_REC_REQ, m).encoded_len(),
            Self::RecRep(m) => explicit(TAG_REC_REP, m).encoded_len(),
        }
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        match self {
            Self::Error(e) => explicit(TAG_ERROR, e).encode(writer),
            Self::AdvReq(m) => explicit(TAG_ADV_REQ, m).encode(writer),
            Self::AdvRep(m) => explicit(TAG_ADV_REP, m).encode(writer),
            Self::RecReq(m) => explicit(TAG_REC_REQ, m).encode(writer),
            Self::RecRep(m) => explicit(TAG_REC_REP, m).encode(writer),
        }
    }
}

// MARK: - Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use der::{Decode, Encode};
    use proptest::prelude::*;

    fn octets(bytes: &[u8]) -> OctetString {
        OctetString::new(bytes.to_vec()).unwrap()
    }

    fn sample_key(usage: KeyUse) -> TangKey {
        TangKey {
            grp: oid::SECP256R1,
            key: octets(&[0x04, 0xAA, 0xBB]),
            usage,
        }
    }

    #[test]
    fn key_equality_ignores_use_tag() {
        let sig = sample_key(KeyUse::Sig);
        let rec = sample_key(KeyUse::Rec);
        assert_eq!(sig, rec);

        let mut other = sample_key(KeyUse::Sig);
        other.grp = oid::SECP384R1;
        assert_ne!(sig, other);
    }

    #[test]
    fn adv_reply_roundtrip() {
        let msg = Message::AdvRep(AdvReply {
            body: AdvBody {
                keys: vec![sample_key(KeyUse::Sig), sample_key(KeyUse::Rec)],
            },
            sigs: vec![TangSig {
                alg: oid::ECDSA_WITH_SHA256,
                sig: octets(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]),
            }],
        });

        let der = msg.to_der().unwrap();
        assert_eq!(Message::from_der(&der).unwrap(), msg);
    }

    #[test]
    fn request_body_variants_roundtrip() {
        let keys = Message::AdvReq(AdvRequest {
            types: vec![],
            body: AdvReqBody::Keys(vec![sample_key(KeyUse::Rec)]),
        });
        let grps = Message::AdvReq(AdvRequest {
            types: vec![oid::ECDSA_WITH_SHA384],
            body: AdvReqBody::Grps(vec![oid::SECP256R1, oid::SECP521R1]),
        });

        for msg in [keys, grps] {
            let der = msg.to_der().unwrap();
            assert_eq!(Message::from_der(&der).unwrap(), msg);
        }
    }

    #[test]
    fn error_and_recovery_roundtrip() {
        let messages = [
            Message::Error(WireError::NotFoundKey),
            Message::RecReq(RecRequest {
                key: sample_key(KeyUse::Rec),
                x: octets(&[0x04, 0x01, 0x02]),
            }),
            Message::RecRep(RecReply {
                y: octets(&[0x04, 0x03, 0x04]),
            }),
        ];

        for msg in messages {
            let der = msg.to_der().unwrap();
            assert_eq!(Message::from_der(&der).unwrap(), msg);
        }
    }

    #[test]
    fn rejects_unknown_choice_tag() {
        // Context tag [9] is not a message kind.
        let bogus = [0xA9, 0x03, 0x0A, 0x01, 0x00];
        assert!(Message::from_der(&bogus).is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut der = Message::Error(WireError::None).to_der().unwrap();
        der.push(0x00);
        assert!(Message::from_der(&der).is_err());
    }

    #[test]
    fn body_encoding_is_deterministic() {
        let body = AdvBody {
            keys: vec![sample_key(KeyUse::Sig), sample_key(KeyUse::Rec)],
        };
        assert_eq!(body.to_der().unwrap(), body.clone().to_der().unwrap());
    }

    fn any_oid() -> impl Strategy<Value = ObjectIdentifier> + Clone {
        prop_oneof![
            Just(oid::SECP256R1),
            Just(oid::SECP384R1),
            Just(oid::SECP521R1),
            Just(oid::ECDSA_WITH_SHA224),
            Just(oid::ECDSA_WITH_SHA256),
            Just(oid::ECDSA_WITH_SHA384),
            Just(oid::ECDSA_WITH_SHA512),
        ]
    }

    fn any_octets() -> impl Strategy<Value = OctetString> + Clone {
        prop::collection::vec(any::<u8>(), 0..96)
            .prop_map(|bytes| OctetString::new(bytes).unwrap())
    }

    fn any_key() -> impl Strategy<Value = TangKey> + Clone {
        (any_oid(), any_octets(), any::<bool>()).prop_map(|(grp, key, rec)| TangKey {
            grp,
            key,
            usage: if rec { KeyUse::Rec } else { KeyUse::Sig },
        })
    }

    fn any_message() -> impl Strategy<Value = Message> {
        let sig = (any_oid(), any_octets())
            .prop_map(|(alg, sig)| TangSig { alg, sig });
        let keys = prop::collection::vec(any_key(), 1..5);
        let sigs = prop::collection::vec(sig, 1..4);

        prop_oneof![
            (keys.clone(), sigs).prop_map(|(keys, sigs)| Message::AdvRep(AdvReply {
                body: AdvBody { keys },
                sigs,
            })),
            (prop::collection::vec(any_oid(), 0..4), keys.clone()).prop_map(|(types, keys)| {
                Message::AdvReq(AdvRequest {
                    types,
                    body: AdvReqBody::Keys(keys),
                })
            }),
            (
                prop::collection::vec(any_oid(), 0..4),
                prop::collection::vec(any_oid(), 0..4)
            )
                .prop_map(|(types, grps)| Message::AdvReq(AdvRequest {
                    types,
                    body: AdvReqBody::Grps(grps),
                })),
            (any_key(), any_octets())
                .prop_map(|(key, x)| Message::RecReq(RecRequest { key, x })),
            any_octets().prop_map(|y| Message::RecRep(RecReply { y })),
        ]
    }

    proptest! {
        #[test]
        fn message_roundtrips(msg in any_message()) {
            let der = msg.to_der().unwrap();
            let back = Message::from_der(&der).unwrap();
            prop_assert_eq!(&back, &msg);
            // Byte-level check too, since key equality ignores the use tag.
            prop_assert_eq!(back.to_der().unwrap(), der);
        }
    }
}
