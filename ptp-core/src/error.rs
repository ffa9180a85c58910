//! Error types surfaced across the crate's public API (§7).

use crate::datastructures::WireFormatError;

/// Errors a [`crate::port::PtpPort`] can report from its `do_state`/`handle_*`
/// entry points. Network and clock errors are generic over the caller's own
/// error types so this crate never has to know about sockets or `/dev/ptp*`.
#[derive(Debug)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum PortError<N, C> {
    #[cfg_attr(feature = "std", error("malformed message: {0:?}"))]
    Decode(WireFormatError),
    #[cfg_attr(feature = "std", error("network error"))]
    Network(N),
    #[cfg_attr(feature = "std", error("clock error"))]
    Clock(C),
    /// A message arrived that this port cannot act on in its current state
    /// (§4.2.6) — not a hard failure, just discarded.
    #[cfg_attr(feature = "std", error("message not applicable in current port state"))]
    NotApplicable,
}

impl<N, C> From<WireFormatError> for PortError<N, C> {
    fn from(value: WireFormatError) -> Self {
        Self::Decode(value)
    }
}
