use crate::datastructures::{
    common::{PortIdentity, TimeInterval},
    WireFormat, WireFormatError,
};

use super::MessageType;

pub const HEADER_LEN: usize = 34;

/// Flag bits carried in header octets 6-7 (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderFlags {
    pub alternate_master: bool,
    pub two_step: bool,
    pub unicast: bool,
    pub leap61: bool,
    pub leap59: bool,
    pub utc_offset_valid: bool,
    pub ptp_timescale: bool,
    pub time_traceable: bool,
    pub frequency_traceable: bool,
}

impl HeaderFlags {
    fn to_bytes(self) -> [u8; 2] {
        let mut octet6 = 0u8;
        octet6 |= (self.alternate_master as u8) << 0;
        octet6 |= (self.two_step as u8) << 1;
        octet6 |= (self.unicast as u8) << 2;

        let mut octet7 = 0u8;
        octet7 |= (self.leap61 as u8) << 0;
        octet7 |= (self.leap59 as u8) << 1;
        octet7 |= (self.utc_offset_valid as u8) << 2;
        octet7 |= (self.ptp_timescale as u8) << 3;
        octet7 |= (self.time_traceable as u8) << 4;
        octet7 |= (self.frequency_traceable as u8) << 5;

        [octet6, octet7]
    }

    fn from_bytes(bytes: [u8; 2]) -> Self {
        let (octet6, octet7) = (bytes[0], bytes[1]);
        Self {
            alternate_master: octet6 & 0x01 != 0,
            two_step: octet6 & 0x02 != 0,
            unicast: octet6 & 0x04 != 0,
            leap61: octet7 & 0x01 != 0,
            leap59: octet7 & 0x02 != 0,
            utc_offset_valid: octet7 & 0x04 != 0,
            ptp_timescale: octet7 & 0x08 != 0,
            time_traceable: octet7 & 0x10 != 0,
            frequency_traceable: octet7 & 0x20 != 0,
        }
    }
}

/// The 34-octet header shared by every PTP message (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub message_type: MessageType,
    pub version: u8,
    pub message_length: u16,
    pub domain_number: u8,
    pub flags: HeaderFlags,
    pub correction_field: TimeInterval,
    pub source_port_identity: PortIdentity,
    pub sequence_id: u16,
    pub log_message_interval: i8,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            message_type: MessageType::Sync,
            version: 2,
            message_length: HEADER_LEN as u16,
            domain_number: 0,
            flags: HeaderFlags::default(),
            correction_field: TimeInterval::default(),
            source_port_identity: PortIdentity::default(),
            sequence_id: 0,
            log_message_interval: 0,
        }
    }
}

impl Header {
    /// Control field value for this message's type (octet 32): SYNC=0,
    /// DELAY_REQ=1, FOLLOW_UP=2, DELAY_RESP=3, else 5 (§6.1).
    fn control_field(&self) -> u8 {
        match self.message_type {
            MessageType::Sync => 0,
            MessageType::DelayReq => 1,
            MessageType::FollowUp => 2,
            MessageType::DelayResp => 3,
            _ => 5,
        }
    }
}

impl WireFormat for Header {
    fn wire_size(&self) -> usize {
        HEADER_LEN
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < HEADER_LEN {
            return Err(WireFormatError::BufferTooShort);
        }

        buffer[0] = 0x80 | (self.message_type.to_primitive() & 0x0f);
        buffer[1] = 0x20 | (self.version & 0x0f);
        buffer[2..4].copy_from_slice(&self.message_length.to_be_bytes());
        buffer[4] = self.domain_number;
        buffer[5] = 0;
        buffer[6..8].copy_from_slice(&self.flags.to_bytes());
        self.correction_field.serialize(&mut buffer[8..16])?;
        buffer[16..20].fill(0);
        self.source_port_identity
            .serialize(&mut buffer[20..30])?;
        buffer[30..32].copy_from_slice(&self.sequence_id.to_be_bytes());
        buffer[32] = self.control_field();
        buffer[33] = self.log_message_interval as u8;

        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let buffer = buffer
            .get(0..HEADER_LEN)
            .ok_or(WireFormatError::BufferTooShort)?;

        Ok(Self {
            message_type: MessageType::from_primitive(buffer[0] & 0x0f),
            version: buffer[1] & 0x0f,
            message_length: u16::from_be_bytes(buffer[2..4].try_into().unwrap()),
            domain_number: buffer[4],
            flags: HeaderFlags::from_bytes(buffer[6..8].try_into().unwrap()),
            correction_field: TimeInterval::deserialize(&buffer[8..16])?,
            source_port_identity: PortIdentity::deserialize(&buffer[20..30])?,
            sequence_id: u16::from_be_bytes(buffer[30..32].try_into().unwrap()),
            log_message_interval: buffer[33] as i8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    #[test]
    fn header_wireformat_roundtrip() {
        let header = Header {
            message_type: MessageType::Announce,
            version: 2,
            message_length: 64,
            domain_number: 0,
            flags: HeaderFlags {
                two_step: true,
                ptp_timescale: true,
                ..Default::default()
            },
            correction_field: TimeInterval::default(),
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
                port_number: 1,
            },
            sequence_id: 42,
            log_message_interval: 1,
        };

        let mut buf = [0u8; HEADER_LEN];
        header.serialize(&mut buf).unwrap();
        assert_eq!(buf[0] & 0xf0, 0x80);
        assert_eq!(buf[32], 5); // control field for non {sync,delay_req,follow_up,delay_resp}

        let deserialized = Header::deserialize(&buf).unwrap();
        assert_eq!(deserialized, header);
    }
}
