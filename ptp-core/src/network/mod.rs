//! PTP-NET (§4.5): the synchronous network abstraction the engine polls
//! cooperatively, rather than `await`ing. Six operations split along two
//! axes: event vs. general messages, and (for P2P) peer vs. non-peer
//! multicast groups.

use crate::time::Time;

/// A single PTP port's network connection: one event socket (hardware
/// timestamped, 224.0.1.129:319 for E2E or the peer-delay group for P2P) and
/// one general socket (224.0.1.129:320).
///
/// All operations are non-blocking: a `recv_*` with nothing queued returns
/// `Ok(None)` rather than parking the caller, so the engine's cooperative
/// scheduler (§5) can poll many ports and timers from one thread.
pub trait NetworkPort {
    type Error: core::fmt::Debug;

    /// Poll the event socket. Returns the packet length and the hardware
    /// receive timestamp, or `None` if nothing is queued.
    fn recv_event(&mut self, buffer: &mut [u8]) -> Result<Option<(usize, Time)>, Self::Error>;

    /// Poll the general socket. Returns the packet length, or `None` if
    /// nothing is queued. General messages carry no useful receive
    /// timestamp (§4.2.2).
    fn recv_general(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, Self::Error>;

    /// Send on the event socket to the main multicast group (or the
    /// configured unicast peer). Returns the hardware transmit timestamp,
    /// needed by two-step SYNC/PDELAY_RESP (§4.2.2).
    fn send_event(&mut self, buffer: &[u8]) -> Result<Time, Self::Error>;

    /// Send on the event socket to the peer-delay multicast group
    /// (224.0.0.107), used only by P2P delay mechanism messages (§4.2.8).
    fn send_peer_event(&mut self, buffer: &[u8]) -> Result<Time, Self::Error>;

    /// Send on the general socket to the main multicast group.
    fn send_general(&mut self, buffer: &[u8]) -> Result<(), Self::Error>;

    /// Send on the general socket to the peer-delay multicast group.
    fn send_peer_general(&mut self, buffer: &[u8]) -> Result<(), Self::Error>;
}
