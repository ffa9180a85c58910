use crate::datastructures::{
    common::{PortIdentity, WireTimestamp},
    WireFormat, WireFormatError,
};

/// DELAY_RESP body (§6.5): the receive timestamp of a DELAY_REQ, addressed
/// back to its sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DelayRespMessage {
    pub receive_timestamp: WireTimestamp,
    pub requesting_port_identity: PortIdentity,
}

impl DelayRespMessage {
    pub fn content_size(&self) -> usize {
        20
    }

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 20 {
            return Err(WireFormatError::BufferTooShort);
        }
        self.receive_timestamp.serialize(&mut buffer[0..10])?;
        self.requesting_port_identity
            .serialize(&mut buffer[10..20])?;
        Ok(())
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 20 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            receive_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
            requesting_port_identity: PortIdentity::deserialize(&buffer[10..20])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    #[test]
    fn roundtrip() {
        let message = DelayRespMessage {
            receive_timestamp: WireTimestamp {
                seconds: 1169232218,
                nanos: 174389936,
            },
            requesting_port_identity: PortIdentity {
                clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
                port_number: 1,
            },
        };
        let mut buf = [0u8; 20];
        message.serialize_content(&mut buf).unwrap();
        assert_eq!(DelayRespMessage::deserialize_content(&buf).unwrap(), message);
    }
}
