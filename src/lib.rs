//! Client side of the Tang network binding protocol.
//!
//! A client seals a local secret against a remote key server without the
//! server ever learning it. The server advertises long-lived EC keys in a
//! self-signed document; the client validates the signatures, picks a
//! recovery key of sufficient strength, and runs an ephemeral blinding
//! exchange against it. What gets persisted is only a recovery request,
//! which later lets the server help recompute the same shared point.
//!
//! # Architecture
//!
//! - **msg** / **pkt**: the DER wire model and the bounded datagram codec
//! - **crypto**: curve registry, validating key conversion, the blinding
//!   multiplication, and the zeroizing secret container
//! - **adv**: advertisement request building, verification, and the
//!   recovery-request builder
//! - **srv**: the server-side mirror (advertisement signing, recovery)
//! - **net**: the UDP messenger with multi-address racing and retry
//! - **store** / **bind**: record persistence and the top-level operation
//!
//! # Security
//!
//! Derived secrets live in [`SecretBuf`], which zeroizes on drop and never
//! prints its contents. Ephemeral scalars are confined to the recovery-
//! request builder and destroyed on every path. The transport is plaintext
//! UDP on purpose: nothing secret ever crosses the wire.
//!
//! # Example
//!
//! ```rust,ignore
//! use tang_client::{bind, BindOptions};
//!
//! let opts = BindOptions::new("tang.example.net");
//! let (record, secret) = bind(&opts, 32)?;
//! record.save(path)?;
//! keyslot.add(&secret.to_hex_upper())?;
//! ```

pub mod adv;
pub mod bind;
pub mod crypto;
pub mod error;
pub mod msg;
pub mod net;
pub mod oid;
pub mod pkt;
pub mod srv;
pub mod store;

pub use adv::{build_adv_request, process_adv_reply, validate_reply};
pub use bind::{bind, bind_with_advertisement, fetch_advertisement, BindOptions, DEFAULT_SERVICE};
pub use crypto::{CurveId, EcKeyPair, EcPublicKey, SecretBuf, SigAlg};
pub use error::{Error, Result};
pub use msg::{
    AdvBody, AdvReply, AdvReqBody, AdvRequest, KeyUse, Message, RecReply, RecRequest, TangKey,
    TangSig, WireError,
};
pub use net::exchange;
pub use pkt::{decode, encode, MAX_DATAGRAM};
pub use store::BindRecord;
