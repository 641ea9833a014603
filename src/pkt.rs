//! Datagram packet codec.
//!
//! Messages travel in single UDP datagrams, so encoding is bounded by the
//! UDP payload ceiling. Nothing partial ever escapes: an oversize message
//! fails before any bytes are produced and a bad datagram fails before any
//! message is built.

use der::{Decode, Encode};

use crate::error::{Error, Result};
use crate::msg::Message;

/// Largest UDP payload a datagram can carry.
pub const MAX_DATAGRAM: usize = 65_507;

/// Encode a message for transmission or persistence.
pub fn encode(msg: &Message) -> Result<Vec<u8>> {
    let len = u32::from(msg.encoded_len()?) as usize;
    if len > MAX_DATAGRAM {
        return Err(Error::Oversize(len));
    }
    Ok(msg.to_der()?)
}

/// Decode one received datagram into a message.
pub fn decode(buf: &[u8]) -> Result<Message> {
    if buf.len() > MAX_DATAGRAM {
        return Err(Error::Oversize(buf.len()));
    }
    Ok(Message::from_der(buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::{Message, RecReply, WireError};
    use der::asn1::OctetString;

    #[test]
    fn roundtrip() {
        let msg = Message::Error(WireError::Internal);
        let bytes = encode(&msg).unwrap();
        assert_eq!(decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn oversize_message_is_rejected() {
        let msg = Message::RecRep(RecReply {
            y: OctetString::new(vec![0u8; MAX_DATAGRAM]).unwrap(),
        });
        assert!(matches!(encode(&msg), Err(Error::Oversize(_))));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode(&[0xFF, 0x00, 0x01]).is_err());
        assert!(decode(&[]).is_err());
    }
}
