use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

/// FOLLOW_UP body (§6.4): the precise transmit timestamp of the SYNC it
/// accompanies, used only in two-step mode (§4.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FollowUpMessage {
    pub precise_origin_timestamp: WireTimestamp,
}

impl FollowUpMessage {
    pub fn content_size(&self) -> usize {
        10
    }

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.precise_origin_timestamp.serialize(buffer)
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        Ok(Self {
            precise_origin_timestamp: WireTimestamp::deserialize(buffer)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let message = FollowUpMessage {
            precise_origin_timestamp: WireTimestamp {
                seconds: 1169232218,
                nanos: 174389936,
            },
        };
        let mut buf = [0u8; 10];
        message.serialize_content(&mut buf).unwrap();
        assert_eq!(FollowUpMessage::deserialize_content(&buf).unwrap(), message);
    }
}
