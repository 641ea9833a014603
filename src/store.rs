//! Persistence of bind records and raw messages.
//!
//! A bind record holds everything needed to later ask the server for help
//! recomputing the secret: the recovery request, where the server lives,
//! and whether the connection is reversed. It is stored as one opaque DER
//! blob. File writes go through a temporary name and a rename so readers
//! never observe a half-written blob.

use std::fs;
use std::path::Path;

use der::{Decode, Encode, Sequence};

use crate::error::Result;
use crate::msg::{Message, RecRequest};
use crate::pkt;

/// Everything persisted by a successful bind.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct BindRecord {
    pub rec: RecRequest,
    pub host: String,
    pub service: String,
    /// Wait for the server to connect instead of dialing out.
    pub listen: bool,
}

impl BindRecord {
    /// Serialize to the opaque blob form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.to_der()?)
    }

    /// Parse a previously stored blob.
    pub fn from_bytes(blob: &[u8]) -> Result<Self> {
        Ok(Self::from_der(blob)?)
    }

    /// Write the record to a file, atomically at the blob level.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_bytes()?)
    }

    /// Read a record back from a file.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }
}

/// Store a wire message (an advertisement fetched out-of-band, say) as a file.
pub fn save_message(path: &Path, msg: &Message) -> Result<()> {
    write_atomic(path, &pkt::encode(msg)?)
}

/// Read a wire message back from a file.
pub fn load_message(path: &Path) -> Result<Message> {
    pkt::decode(&fs::read(path)?)
}

fn write_atomic(path: &Path, blob: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    fs::write(&tmp, blob)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
