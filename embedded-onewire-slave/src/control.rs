use portable_atomic::{AtomicBool, AtomicU8, Ordering};

/// State shared between application context and the interrupt-driven core.
///
/// This is the only mutable state the application touches while the core is
/// running: the staged transmit byte and the alarm condition. Both are
/// single-byte atomics, so staging from thread context while the core reads
/// from interrupt context needs no critical section.
///
/// The block is borrowed by both the [`OneWireSlave`](crate::OneWireSlave)
/// engine and the application's [`OneWireHandler`](crate::OneWireHandler),
/// which is how callbacks running inside the engine can stage the next
/// transmit byte.
#[derive(Debug)]
pub struct OneWireControl {
    txbyte: AtomicU8,
    alarm: AtomicBool,
}

impl OneWireControl {
    /// Creates a control block with no alarm and 0xff staged, which reads
    /// as all-ones if the master polls before the application stages
    /// anything.
    pub const fn new() -> Self {
        OneWireControl {
            txbyte: AtomicU8::new(0xff),
            alarm: AtomicBool::new(false),
        }
    }

    /// Stages the next byte to transmit. The byte is latched at the next
    /// byte boundary, so calling this from inside a callback affects the
    /// immediately following transmit byte and never a byte in flight.
    pub fn set_txbyte(&self, byte: u8) {
        self.txbyte.store(byte, Ordering::Relaxed);
    }

    /// The currently staged transmit byte.
    pub fn txbyte(&self) -> u8 {
        self.txbyte.load(Ordering::Relaxed)
    }

    /// Sets the alarm condition consulted by the Alarm Search command.
    pub fn set_alarm(&self, active: bool) {
        self.alarm.store(active, Ordering::Relaxed);
    }

    /// Whether the alarm condition is active.
    pub fn alarm(&self) -> bool {
        self.alarm.load(Ordering::Relaxed)
    }
}

impl Default for OneWireControl {
    fn default() -> Self {
        Self::new()
    }
}

mod test {
    #[test]
    fn test_stage_and_alarm() {
        use super::OneWireControl;
        let ctrl = OneWireControl::new();
        assert_eq!(ctrl.txbyte(), 0xff);
        assert!(!ctrl.alarm());
        ctrl.set_txbyte(0x42);
        ctrl.set_alarm(true);
        assert_eq!(ctrl.txbyte(), 0x42);
        assert!(ctrl.alarm());
    }
}
