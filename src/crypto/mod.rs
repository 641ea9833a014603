//! Cryptographic primitives for the binding protocol.
//!
//! - `curves`: the NIST prime-curve registry, wire/live key conversion and
//!   the blinding scalar multiplication
//! - `skey`: the zeroizing container for derived secret material

pub mod curves;
pub mod skey;

pub use curves::{decode_point, CurveId, EcKeyPair, EcPublicKey, SigAlg};
pub use skey::SecretBuf;
