/// Trait for driving the open-drain 1-Wire line.
///
/// The bus is wired-OR: any participant may pull the line low, and the line
/// floats back high through the pull-up once every participant has released
/// it. The slave core is the only user of this capability; no other code may
/// touch the pin while the core is running.
///
/// All three operations run in interrupt context and are infallible.
pub trait OneWireLine {
    /// Actively drive the line low.
    fn pull_low(&mut self);
    /// Stop driving the line, letting the pull-up return it high unless
    /// another participant holds it low.
    fn release(&mut self);
    /// Read the current line level without affecting it. `true` is high.
    fn sample(&mut self) -> bool;
}

/// Trait for the microsecond one-shot compare channel used to shape and
/// sample bit slots.
///
/// Reset pulses are detected by summing [`elapsed_us`](OneWireTimer::elapsed_us)
/// readings across successive fires and edges, so a single channel is
/// sufficient; the core re-arms it continuously while the line is busy.
pub trait OneWireTimer {
    /// Schedule a one-shot fire `delay_us` microseconds from now. Arming
    /// supersedes any pending fire and restarts the elapsed-time reference.
    fn arm(&mut self, delay_us: u16);
    /// Suppress the pending fire, if any. The elapsed-time reference is
    /// unaffected.
    fn cancel(&mut self);
    /// Microseconds since the most recent [`arm`](OneWireTimer::arm),
    /// saturating at `u16::MAX`. Keeps counting after the fire.
    fn elapsed_us(&mut self) -> u16;
}

/// Function-layer callbacks, invoked from interrupt context once the ROM
/// layer has selected this slave.
///
/// Implementations must be non-blocking, finite and free of allocation; the
/// whole timer-fire handler, callback included, has to complete well before
/// the next bus event (~30 µs away).
///
/// Both methods have no-op defaults: a slave that never talks at the
/// function layer silently drops received bytes and repeats the previously
/// staged transmit byte. `()` implements the trait with exactly that
/// behavior.
pub trait OneWireHandler {
    /// A complete byte was received from the master. Return `true` to
    /// switch the bus direction and start transmitting; the byte staged on
    /// the [`OneWireControl`](crate::OneWireControl) block at the time this
    /// method returns becomes the first transmitted byte.
    fn on_byte_received(&mut self, _byte: u8) -> bool {
        false
    }

    /// A complete byte was transmitted to the master. Stage the next byte
    /// via [`OneWireControl::set_txbyte`](crate::OneWireControl::set_txbyte)
    /// here; if nothing new is staged the previous byte repeats.
    fn on_byte_sent(&mut self) {}
}

impl OneWireHandler for () {}
