//! Bank links over SPI
//!
//! All bank controllers share one SPI bus, each behind its own active-low
//! chip select. One exchange keeps the bank selected throughout: the
//! command frame is written, the controller gets a short turnaround, then
//! the reply is clocked in. The reply buffer may carry idle bytes ahead of
//! the frame; the frame decoder skips them.

use embedded_hal::digital::OutputPin;
use smartmotor_core::traits::{LinkTransport, TransportError};

/// Gap between command and reply for the controller to build its answer (ns)
pub const DEFAULT_TURNAROUND_NS: u32 = 50_000;

/// Blocking SPI link to `N` banks
pub struct SpiLink<B, CS, D, const N: usize> {
    bus: B,
    chip_selects: [CS; N],
    delay: D,
    turnaround_ns: u32,
}

impl<B, CS, D, const N: usize> SpiLink<B, CS, D, N>
where
    B: embedded_hal::spi::SpiBus,
    CS: OutputPin,
    D: embedded_hal::delay::DelayNs,
{
    /// Chip selects are indexed by bank number and start deselected
    pub fn new(bus: B, mut chip_selects: [CS; N], delay: D) -> Self {
        for cs in chip_selects.iter_mut() {
            let _ = cs.set_high();
        }
        Self {
            bus,
            chip_selects,
            delay,
            turnaround_ns: DEFAULT_TURNAROUND_NS,
        }
    }

    pub fn with_turnaround(mut self, turnaround_ns: u32) -> Self {
        self.turnaround_ns = turnaround_ns;
        self
    }

    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), B::Error> {
        self.bus.write(tx)?;
        self.bus.flush()?;
        self.delay.delay_ns(self.turnaround_ns);
        self.bus.read(rx)?;
        self.bus.flush()
    }
}

impl<B, CS, D, const N: usize> LinkTransport for SpiLink<B, CS, D, N>
where
    B: embedded_hal::spi::SpiBus,
    CS: OutputPin,
    D: embedded_hal::delay::DelayNs,
{
    fn transfer(&mut self, bank: u8, tx: &[u8], rx: &mut [u8]) -> Result<(), TransportError> {
        let index = bank as usize;
        if index >= N {
            return Err(TransportError::Bus);
        }
        self.chip_selects[index]
            .set_low()
            .map_err(|_| TransportError::Bus)?;
        let result = self.exchange(tx, rx);
        let deselected = self.chip_selects[index].set_high();
        result.map_err(|_| TransportError::Bus)?;
        deselected.map_err(|_| TransportError::Bus)
    }
}

/// Async SPI link to `N` banks
///
/// Timeouts are the caller's business; wrap [`AsyncSpiLink::transfer`]
/// in a timer and report [`TransportError::Timeout`] when it fires.
pub struct AsyncSpiLink<B, CS, D, const N: usize> {
    bus: B,
    chip_selects: [CS; N],
    delay: D,
    turnaround_ns: u32,
}

impl<B, CS, D, const N: usize> AsyncSpiLink<B, CS, D, N>
where
    B: embedded_hal_async::spi::SpiBus,
    CS: OutputPin,
    D: embedded_hal_async::delay::DelayNs,
{
    pub fn new(bus: B, mut chip_selects: [CS; N], delay: D) -> Self {
        for cs in chip_selects.iter_mut() {
            let _ = cs.set_high();
        }
        Self {
            bus,
            chip_selects,
            delay,
            turnaround_ns: DEFAULT_TURNAROUND_NS,
        }
    }

    pub fn with_turnaround(mut self, turnaround_ns: u32) -> Self {
        self.turnaround_ns = turnaround_ns;
        self
    }

    /// Write `tx` to `bank` and read its reply into `rx`
    pub async fn transfer(&mut self, bank: u8, tx: &[u8], rx: &mut [u8]) -> Result<(), TransportError> {
        let index = bank as usize;
        if index >= N {
            return Err(TransportError::Bus);
        }
        self.chip_selects[index]
            .set_low()
            .map_err(|_| TransportError::Bus)?;
        let result = self.exchange(tx, rx).await;
        let deselected = self.chip_selects[index].set_high();
        result.map_err(|_| TransportError::Bus)?;
        deselected.map_err(|_| TransportError::Bus)
    }

    async fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), B::Error> {
        self.bus.write(tx).await?;
        self.bus.flush().await?;
        self.delay.delay_ns(self.turnaround_ns).await;
        self.bus.read(rx).await?;
        self.bus.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    /// Records writes and answers reads with a canned reply
    struct MockBus {
        written: heapless::Vec<u8, 64>,
        reply: [u8; 8],
        fail: bool,
    }

    #[derive(Debug)]
    struct MockError;

    impl embedded_hal::spi::Error for MockError {
        fn kind(&self) -> embedded_hal::spi::ErrorKind {
            embedded_hal::spi::ErrorKind::Other
        }
    }

    impl MockBus {
        fn new(reply: [u8; 8]) -> Self {
            Self {
                written: heapless::Vec::new(),
                reply,
                fail: false,
            }
        }

        fn do_write(&mut self, data: &[u8]) -> Result<(), MockError> {
            if self.fail {
                return Err(MockError);
            }
            self.written.extend_from_slice(data).map_err(|_| MockError)
        }

        fn do_read(&mut self, buf: &mut [u8]) -> Result<(), MockError> {
            let n = buf.len().min(self.reply.len());
            buf[..n].copy_from_slice(&self.reply[..n]);
            Ok(())
        }
    }

    impl embedded_hal::spi::ErrorType for MockBus {
        type Error = MockError;
    }

    impl embedded_hal::spi::SpiBus for MockBus {
        fn read(&mut self, words: &mut [u8]) -> Result<(), MockError> {
            self.do_read(words)
        }

        fn write(&mut self, words: &[u8]) -> Result<(), MockError> {
            self.do_write(words)
        }

        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), MockError> {
            self.do_write(write)?;
            self.do_read(read)
        }

        fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), MockError> {
            self.do_read(words)
        }

        fn flush(&mut self) -> Result<(), MockError> {
            Ok(())
        }
    }

    impl embedded_hal_async::spi::SpiBus for MockBus {
        async fn read(&mut self, words: &mut [u8]) -> Result<(), MockError> {
            self.do_read(words)
        }

        async fn write(&mut self, words: &[u8]) -> Result<(), MockError> {
            self.do_write(words)
        }

        async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), MockError> {
            self.do_write(write)?;
            self.do_read(read)
        }

        async fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), MockError> {
            self.do_read(words)
        }

        async fn flush(&mut self) -> Result<(), MockError> {
            Ok(())
        }
    }

    /// Counts select/deselect edges
    #[derive(Default)]
    struct MockPin {
        high: bool,
        selections: u32,
    }

    impl embedded_hal::digital::ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            self.selections += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockDelay {
        total_ns: u32,
    }

    impl embedded_hal::delay::DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns;
        }
    }

    impl embedded_hal_async::delay::DelayNs for MockDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns;
        }
    }

    fn pins() -> [MockPin; 2] {
        [MockPin::default(), MockPin::default()]
    }

    #[test]
    fn test_selected_bank_only() {
        let mut link = SpiLink::new(MockBus::new([7; 8]), pins(), MockDelay::default());
        let mut rx = [0u8; 8];
        link.transfer(1, &[1, 2, 3], &mut rx).unwrap();

        assert_eq!(rx, [7; 8]);
        assert_eq!(link.bus.written.as_slice(), &[1, 2, 3]);
        assert_eq!(link.chip_selects[1].selections, 1);
        assert_eq!(link.chip_selects[0].selections, 0);
        assert!(link.chip_selects.iter().all(|cs| cs.high));
        assert_eq!(link.delay.total_ns, DEFAULT_TURNAROUND_NS);
    }

    #[test]
    fn test_unknown_bank_is_bus_error() {
        let mut link = SpiLink::new(MockBus::new([0; 8]), pins(), MockDelay::default());
        let mut rx = [0u8; 8];
        assert_eq!(link.transfer(3, &[1], &mut rx), Err(TransportError::Bus));
    }

    #[test]
    fn test_bus_error_still_deselects() {
        let mut bus = MockBus::new([0; 8]);
        bus.fail = true;
        let mut link = SpiLink::new(bus, pins(), MockDelay::default());
        let mut rx = [0u8; 8];
        assert_eq!(link.transfer(0, &[1], &mut rx), Err(TransportError::Bus));
        assert!(link.chip_selects[0].high);
    }

    #[test]
    fn test_async_transfer() {
        let mut link = AsyncSpiLink::new(MockBus::new([5; 8]), pins(), MockDelay::default())
            .with_turnaround(10);
        let mut rx = [0u8; 4];
        embassy_futures::block_on(link.transfer(0, &[9], &mut rx)).unwrap();
        assert_eq!(rx, [5; 4]);
        assert_eq!(link.delay.total_ns, 10);
    }
}
