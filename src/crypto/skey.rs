//! Secret-key material container.
//!
//! [`SecretBuf`] owns derived shared-secret bytes. The backing memory is
//! overwritten when the buffer is dropped, comparison is constant-time, and
//! `Debug` never prints contents.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// A byte buffer for secret material, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBuf {
    data: Vec<u8>,
}

impl SecretBuf {
    /// Allocate a zero-filled buffer of the given size.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size],
        }
    }

    /// Copy existing bytes into a fresh secret buffer.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Uppercase hex form, suitable for a passphrase sink.
    ///
    /// The returned string zeroizes with the same guarantee as the buffer.
    pub fn to_hex_upper(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode_upper(&self.data))
    }
}

impl PartialEq for SecretBuf {
    fn eq(&self, other: &Self) -> bool {
        self.data.ct_eq(&other.data).into()
    }
}

impl Eq for SecretBuf {}

impl fmt::Debug for SecretBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBuf")
            .field("len", &self.data.len())
            .finish()
    }
}
