//! Controller link transport trait

/// Errors reported by a link transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// No reply within the transport's time bound
    Timeout,
    /// Bus or chip-select error
    Bus,
}

/// Full-duplex frame exchange with one bank's controller
///
/// Implementations must return within a bounded time. A controller that
/// does not answer is reported as [`TransportError::Timeout`], never by
/// blocking the caller.
pub trait LinkTransport {
    /// Send `tx` to `bank` and fill `rx` with its reply
    fn transfer(&mut self, bank: u8, tx: &[u8], rx: &mut [u8]) -> Result<(), TransportError>;
}
