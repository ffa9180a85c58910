use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

/// SYNC body (§6.2): a single origin timestamp, meaningful only in one-step
/// mode (§4.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncMessage {
    pub origin_timestamp: WireTimestamp,
}

impl SyncMessage {
    pub fn content_size(&self) -> usize {
        10
    }

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.origin_timestamp.serialize(buffer)
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        Ok(Self {
            origin_timestamp: WireTimestamp::deserialize(buffer)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let message = SyncMessage {
            origin_timestamp: WireTimestamp {
                seconds: 1169232218,
                nanos: 174389936,
            },
        };
        let mut buf = [0u8; 10];
        message.serialize_content(&mut buf).unwrap();
        assert_eq!(SyncMessage::deserialize_content(&buf).unwrap(), message);
    }
}
