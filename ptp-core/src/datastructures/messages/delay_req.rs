use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

/// DELAY_REQ body (§6.3): identical wire shape to SYNC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DelayReqMessage {
    pub origin_timestamp: WireTimestamp,
}

impl DelayReqMessage {
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
        let message = DelayReqMessage {
            origin_timestamp: WireTimestamp {
                seconds: 42,
                nanos: 7,
            },
        };
        let mut buf = [0u8; 10];
        message.serialize_content(&mut buf).unwrap();
        assert_eq!(DelayReqMessage::deserialize_content(&buf).unwrap(), message);
    }
}
