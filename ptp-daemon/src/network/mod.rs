//! PTP-NET (§4.5) on Linux: synchronous `ptp_core::network::NetworkPort`
//! implementations over IPv4/IPv6 multicast or raw Ethernet, built on the
//! `timestamped-socket` sockets opened in [`crate::socket`].

pub mod linux;

pub use linux::{get_clock_id, LinuxNetworkPort, NetworkError};
