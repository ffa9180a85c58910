//! Synchronous `NetworkPort` over IPv4, IPv6 or raw Ethernet multicast
//! sockets (§4.5). Sockets are opened non-blocking; a `recv` with nothing
//! queued surfaces as `Ok(None)` rather than parking the caller, matching
//! [`ptp_core::network::NetworkPort`]'s cooperative-poll contract.

use std::io;

use ptp_core::{network::NetworkPort, time::Time};
use timestamped_socket::{
    interface::InterfaceName,
    networkaddress::EthernetAddress,
    socket::{InterfaceTimestampMode, Open, Socket},
};

use crate::socket::{
    open_ethernet_socket, open_ipv4_event_socket, open_ipv4_general_socket, open_ipv6_event_socket,
    open_ipv6_general_socket, PtpTargetAddress,
};

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// One port's pair of event/general sockets (§4.5), generic over the three
/// address families a port can be configured with.
pub struct LinuxNetworkPort<A: PtpTargetAddress> {
    event: Socket<A, Open>,
    general: Socket<A, Open>,
}

impl<A: PtpTargetAddress> LinuxNetworkPort<A> {
    fn new(event: Socket<A, Open>, general: Socket<A, Open>) -> io::Result<Self> {
        event.set_nonblocking(true)?;
        general.set_nonblocking(true)?;
        Ok(Self { event, general })
    }
}

impl LinuxNetworkPort<std::net::SocketAddrV4> {
    pub fn open_ipv4(
        interface: InterfaceName,
        timestamping: InterfaceTimestampMode,
        bind_phc: Option<u32>,
    ) -> io::Result<Self> {
        let event = open_ipv4_event_socket(interface, timestamping, bind_phc)?;
        let general = open_ipv4_general_socket(interface)?;
        Self::new(event, general)
    }
}

impl LinuxNetworkPort<std::net::SocketAddrV6> {
    pub fn open_ipv6(
        interface: InterfaceName,
        timestamping: InterfaceTimestampMode,
        bind_phc: Option<u32>,
    ) -> io::Result<Self> {
        let event = open_ipv6_event_socket(interface, timestamping, bind_phc)?;
        let general = open_ipv6_general_socket(interface)?;
        Self::new(event, general)
    }
}

impl LinuxNetworkPort<EthernetAddress> {
    pub fn open_ethernet(
        interface: InterfaceName,
        timestamping: InterfaceTimestampMode,
        bind_phc: Option<u32>,
    ) -> io::Result<Self> {
        let event = open_ethernet_socket(interface, timestamping, bind_phc)?;
        let general = open_ethernet_socket(interface, InterfaceTimestampMode::None, None)?;
        Self::new(event, general)
    }
}

/// Turns a would-block error into `Ok(None)` for the cooperative poll loop.
fn recv_nonblocking<A: PtpTargetAddress>(
    socket: &mut Socket<A, Open>,
    buffer: &mut [u8],
) -> io::Result<Option<(usize, Time)>> {
    match socket.recv(buffer) {
        Ok(result) => Ok(Some((
            result.bytes_read,
            result
                .timestamp
                .map(|ts| Time::new(ts.seconds.max(0) as u64, ts.nanos))
                .unwrap_or(Time::EPOCH),
        ))),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(e),
    }
}

impl<A: PtpTargetAddress> NetworkPort for LinuxNetworkPort<A> {
    type Error = NetworkError;

    fn recv_event(&mut self, buffer: &mut [u8]) -> Result<Option<(usize, Time)>, Self::Error> {
        Ok(recv_nonblocking(&mut self.event, buffer)?)
    }

    fn recv_general(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, Self::Error> {
        match recv_nonblocking(&mut self.general, buffer)? {
            Some((len, _)) => Ok(Some(len)),
            None => Ok(None),
        }
    }

    fn send_event(&mut self, buffer: &[u8]) -> Result<Time, Self::Error> {
        let ts = self.event.send_to(buffer, A::PRIMARY_EVENT)?;
        Ok(ts
            .map(|ts| Time::new(ts.seconds.max(0) as u64, ts.nanos))
            .unwrap_or(Time::EPOCH))
    }

    fn send_peer_event(&mut self, buffer: &[u8]) -> Result<Time, Self::Error> {
        let ts = self.event.send_to(buffer, A::PDELAY_EVENT)?;
        Ok(ts
            .map(|ts| Time::new(ts.seconds.max(0) as u64, ts.nanos))
            .unwrap_or(Time::EPOCH))
    }

    fn send_general(&mut self, buffer: &[u8]) -> Result<(), Self::Error> {
        self.general.send_to(buffer, A::PRIMARY_GENERAL)?;
        Ok(())
    }

    fn send_peer_general(&mut self, buffer: &[u8]) -> Result<(), Self::Error> {
        self.general.send_to(buffer, A::PDELAY_GENERAL)?;
        Ok(())
    }
}

/// Derive a clock identity from the MAC address of `interface` (§7.5.2.3's
/// EUI-64 recommendation), read straight from sysfs rather than an
/// interface-enumeration crate.
pub fn get_clock_id(interface: &str) -> io::Result<[u8; 6]> {
    let raw = std::fs::read_to_string(format!("/sys/class/net/{interface}/address"))?;
    parse_mac_address(raw.trim()).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{interface}: not a MAC address"),
        )
    })
}

fn parse_mac_address(s: &str) -> Option<[u8; 6]> {
    let mut out = [0u8; 6];
    let mut parts = s.split(':');
    for byte in out.iter_mut() {
        *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_separated_mac() {
        assert_eq!(
            parse_mac_address("aa:bb:cc:dd:ee:ff"),
            Some([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])
        );
    }

    #[test]
    fn rejects_short_input() {
        assert_eq!(parse_mac_address("aa:bb:cc"), None);
    }
}
