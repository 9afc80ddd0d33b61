use crate::OneWireControl;
use crate::consts::*;
use crate::error::OneWireSlaveError;
use crate::traits::{OneWireHandler, OneWireLine, OneWireTimer};

/// Protocol state of the slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveState {
    /// Deselected, or idle between transactions; waiting for a reset pulse.
    WaitReset,
    /// A reset pulse was detected; the presence pulse is scheduled but the
    /// line is not driven yet.
    StartPresence,
    /// The presence pulse is being driven low.
    EndPresence,
    /// The master is writing to the bus; the slave samples each slot.
    Write,
    /// The slave is writing to the bus; it drives each slot the master
    /// initiates.
    Read,
}

/// The interrupt-driven 1-Wire slave core.
///
/// Owns the line driver, the slot timer and the function-layer handler, and
/// runs the whole protocol from three interrupt entry points the hardware
/// shim routes in: [`on_falling_edge`], [`on_rising_edge`] and
/// [`on_timer`]. There is no foreground loop; every handler runs to
/// completion in a few microseconds.
///
/// The 8-byte ROM code is transmitted byte 7 first, bit 0 of each byte
/// first, matching the conventional layout (byte 0 = CRC-8, bytes 1-6 =
/// serial number, byte 7 = family code). It is copied in at construction
/// and immutable afterwards.
///
/// The application only shares the [`OneWireControl`] block with the core;
/// everything else is owned here and touched exclusively from interrupt
/// context. Wrap the core in a [`SlaveCell`](crate::SlaveCell) to hand it
/// to the interrupt handlers.
///
/// [`on_falling_edge`]: OneWireSlave::on_falling_edge
/// [`on_rising_edge`]: OneWireSlave::on_rising_edge
/// [`on_timer`]: OneWireSlave::on_timer
pub struct OneWireSlave<'a, L, T, H> {
    pub(crate) line: L,
    pub(crate) timer: T,
    pub(crate) handler: H,
    pub(crate) control: &'a OneWireControl,
    pub(crate) id: [u8; 8],
    pub(crate) state: SlaveState,
    /// Microseconds of low accumulated since the last falling edge; the
    /// slot timer's elapsed reading supplies the remainder past the last
    /// arm.
    pub(crate) us_count: u16,
    /// Delay the slot timer was last armed with, credited to `us_count`
    /// when the fire arrives.
    pub(crate) armed_us: u16,
    /// Whether the pending fire shapes an actual slot, as opposed to an
    /// idle reload that only keeps the low-time accounting alive.
    pub(crate) slot_armed: bool,
    pub(crate) bit_count: u8,
    pub(crate) id_index: u8,
    pub(crate) current_byte: u8,
    pub(crate) rom_command: u8,
    /// Next bit to drive in a read slot, in the LSB.
    pub(crate) read_val: u8,
    /// Transmit byte latched at the last byte boundary.
    pub(crate) tx_shift: u8,
    /// Search ROM phase marker: the complement slot is in progress.
    pub(crate) search_complement: bool,
    pub(crate) rom_matched: bool,
    started: bool,
}

impl<'a, L, T, H> OneWireSlave<'a, L, T, H>
where
    L: OneWireLine,
    T: OneWireTimer,
    H: OneWireHandler,
{
    /// Creates a stopped slave core.
    ///
    /// # Arguments
    /// * `line` - The open-drain line driver.
    /// * `timer` - The microsecond one-shot compare channel.
    /// * `handler` - The function-layer callbacks; pass `()` for a slave
    ///   that only answers the ROM layer.
    /// * `id` - The 64-bit ROM code, byte 7 = family code. Supplied
    ///   pre-computed, CRC included.
    /// * `control` - The shared control block, typically in static storage
    ///   and also borrowed by the handler.
    pub fn new(line: L, timer: T, handler: H, id: [u8; 8], control: &'a OneWireControl) -> Self {
        OneWireSlave {
            line,
            timer,
            handler,
            control,
            id,
            state: SlaveState::WaitReset,
            us_count: 0,
            armed_us: 0,
            slot_armed: false,
            bit_count: 0,
            id_index: 7,
            current_byte: 0,
            rom_command: ONEWIRE_ROM_NONE,
            read_val: 0,
            tx_shift: 0xff,
            search_complement: false,
            rom_matched: false,
            started: false,
        }
    }

    /// Releases the line, arms the idle reload and begins waiting for a
    /// reset pulse.
    ///
    /// The hardware shim enables the pin-change and timer-compare
    /// interrupts after this returns.
    ///
    /// # Errors
    /// Returns [`OneWireSlaveError::AlreadyStarted`] if called twice.
    pub fn start(&mut self) -> Result<(), OneWireSlaveError> {
        if self.started {
            return Err(OneWireSlaveError::AlreadyStarted);
        }
        self.started = true;
        self.state = SlaveState::WaitReset;
        self.us_count = 0;
        self.line.release();
        self.arm_idle();
        Ok(())
    }

    /// Stages the next byte to transmit; see
    /// [`OneWireControl::set_txbyte`].
    pub fn set_txbyte(&self, byte: u8) {
        self.control.set_txbyte(byte);
    }

    /// The current protocol state.
    pub fn state(&self) -> SlaveState {
        self.state
    }

    /// Whether the ROM layer has selected this slave in the current
    /// transaction.
    pub fn rom_matched(&self) -> bool {
        self.rom_matched
    }

    /// The ROM code this slave answers to.
    pub fn id(&self) -> &[u8; 8] {
        &self.id
    }

    /// The shared control block.
    pub fn control(&self) -> &OneWireControl {
        self.control
    }

    /// The function-layer handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The function-layer handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Entry point for the falling-edge interrupt on the bus pin.
    ///
    /// Every slot starts here: the master (or the slave's own presence
    /// pulldown) pulled the line low. Restarts the low-time accounting and
    /// arms the slot timer for whatever the current state calls for. In
    /// state `Read` the line is driven right away; waiting for the timer
    /// would miss the master's sample point.
    pub fn on_falling_edge(&mut self) {
        self.us_count = 0;
        match self.state {
            SlaveState::StartPresence => {
                // Our own pulldown; time the end of the presence pulse.
                self.arm_slot(ONEWIRE_PRESENCE_PULSE_US);
                self.state = SlaveState::EndPresence;
            }
            SlaveState::Write => self.arm_slot(ONEWIRE_WRITE_SAMPLE_US),
            SlaveState::Read => {
                self.arm_slot(ONEWIRE_READ_HOLD_US);
                if self.read_val & 0x01 != 0 {
                    self.line.release();
                } else {
                    self.line.pull_low();
                }
            }
            _ => self.arm_idle(),
        }
    }

    /// Entry point for the rising-edge interrupt on the bus pin.
    ///
    /// Checks the accumulated low time first: at or beyond 480 µs this was
    /// a reset pulse, which preempts whatever was in progress and restarts
    /// the transaction. Otherwise the only state with business on a rising
    /// edge is the tail of the presence pulse.
    pub fn on_rising_edge(&mut self) {
        let low_us = u32::from(self.us_count) + u32::from(self.timer.elapsed_us());
        if low_us >= u32::from(ONEWIRE_RESET_MIN_US) {
            self.begin_transaction();
        } else if self.state == SlaveState::EndPresence {
            self.state = SlaveState::Write;
            self.timer.cancel();
            self.slot_armed = false;
        }
    }

    /// Entry point for the slot-timer compare interrupt.
    ///
    /// Samples the pin first so the reading reflects the slot, then acts on
    /// the state: drive the presence pulse, end it, sample a write slot or
    /// close out a read slot. Idle reloads only keep the low-time
    /// accounting moving. Always leaves the timer armed so a reset pulse is
    /// measurable from any state.
    pub fn on_timer(&mut self) {
        let pin = self.line.sample();
        self.us_count = self.us_count.saturating_add(self.armed_us);
        if self.slot_armed {
            match self.state {
                SlaveState::StartPresence => self.line.pull_low(),
                SlaveState::EndPresence => self.line.release(),
                SlaveState::Write => self.process_bit(pin),
                SlaveState::Read => {
                    self.line.release();
                    self.process_bit(pin);
                }
                SlaveState::WaitReset => {}
            }
        }
        self.arm_idle();
    }

    /// Re-initializes the transaction state after a reset pulse and
    /// schedules the presence pulse. The re-initialization is atomic with
    /// respect to the bus: nothing runs between the rising edge and here.
    fn begin_transaction(&mut self) {
        self.bit_count = 0;
        self.current_byte = 0;
        self.rom_command = ONEWIRE_ROM_NONE;
        self.id_index = 7;
        self.read_val = 0;
        self.search_complement = false;
        self.rom_matched = false;
        self.state = SlaveState::StartPresence;
        self.arm_slot(ONEWIRE_PRESENCE_DELAY_US);
    }

    fn arm_slot(&mut self, delay_us: u16) {
        self.armed_us = delay_us;
        self.slot_armed = true;
        self.timer.arm(delay_us);
    }

    fn arm_idle(&mut self) {
        self.armed_us = ONEWIRE_IDLE_RELOAD_US;
        self.slot_armed = false;
        self.timer.arm(ONEWIRE_IDLE_RELOAD_US);
    }

    /// One function-layer bit, after the ROM layer has selected us.
    pub(crate) fn function_bit(&mut self, val: bool) {
        match self.state {
            SlaveState::Write => {
                self.current_byte = (self.current_byte >> 1) | if val { 0x80 } else { 0x00 };
                self.bit_count += 1;
                if self.bit_count == 8 {
                    let byte = self.current_byte;
                    self.bit_count = 0;
                    self.current_byte = 0;
                    if self.handler.on_byte_received(byte) {
                        self.begin_transmit();
                    }
                }
            }
            SlaveState::Read => {
                self.bit_count += 1;
                if self.bit_count == 8 {
                    self.handler.on_byte_sent();
                    self.begin_transmit();
                } else {
                    self.read_val = (self.tx_shift >> self.bit_count) & 0x01;
                }
            }
            _ => {}
        }
    }

    /// Latches the staged transmit byte and turns the bus around. Reading
    /// the control block after the callbacks ran is what makes a
    /// `set_txbyte` from inside them effective for the very next byte.
    fn begin_transmit(&mut self) {
        self.tx_shift = self.control.txbyte();
        self.bit_count = 0;
        self.read_val = self.tx_shift & 0x01;
        self.state = SlaveState::Read;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    extern crate std;

    use super::{OneWireSlave, SlaveState};
    use crate::consts::*;
    use crate::{OneWireControl, OneWireHandler, OneWireLine, OneWireSlaveError, OneWireTimer};
    use std::vec::Vec;

    pub(crate) struct TestLine {
        pub driving_low: bool,
        /// Level the engine will see on its next sample, set by the test to
        /// mimic the master's side of the wired-OR.
        pub sample_level: bool,
    }

    impl OneWireLine for TestLine {
        fn pull_low(&mut self) {
            self.driving_low = true;
        }

        fn release(&mut self) {
            self.driving_low = false;
        }

        fn sample(&mut self) -> bool {
            self.sample_level && !self.driving_low
        }
    }

    pub(crate) struct TestTimer {
        pub armed: Option<u16>,
        pub elapsed: u16,
    }

    impl OneWireTimer for TestTimer {
        fn arm(&mut self, delay_us: u16) {
            self.armed = Some(delay_us);
            self.elapsed = 0;
        }

        fn cancel(&mut self) {
            self.armed = None;
        }

        fn elapsed_us(&mut self) -> u16 {
            self.elapsed
        }
    }

    #[derive(Default)]
    pub(crate) struct Recorder {
        pub received: Vec<u8>,
        pub sent: usize,
        pub reply: Option<u8>,
    }

    /// Echoes a canned reply to every received byte when one is set.
    pub(crate) struct RecorderHandler<'a> {
        pub control: &'a OneWireControl,
        pub rec: Recorder,
    }

    impl OneWireHandler for RecorderHandler<'_> {
        fn on_byte_received(&mut self, byte: u8) -> bool {
            self.rec.received.push(byte);
            if let Some(reply) = self.rec.reply {
                self.control.set_txbyte(reply);
                true
            } else {
                false
            }
        }

        fn on_byte_sent(&mut self) {
            self.rec.sent += 1;
        }
    }

    pub(crate) type TestSlave<'a> = OneWireSlave<'a, TestLine, TestTimer, RecorderHandler<'a>>;

    pub(crate) fn test_slave<'a>(id: [u8; 8], control: &'a OneWireControl) -> TestSlave<'a> {
        let line = TestLine {
            driving_low: false,
            sample_level: true,
        };
        let timer = TestTimer {
            armed: None,
            elapsed: 0,
        };
        let handler = RecorderHandler {
            control,
            rec: Recorder::default(),
        };
        let mut slave = OneWireSlave::new(line, timer, handler, id, control);
        slave.start().unwrap();
        slave
    }

    /// Issues a reset pulse and walks the slave through its presence pulse.
    pub(crate) fn reset_pulse(s: &mut TestSlave) {
        s.on_falling_edge();
        s.timer.elapsed = 500; // continuous low, no intervening fire
        s.on_rising_edge();
        assert_eq!(s.state(), SlaveState::StartPresence);
        s.on_timer(); // presence delay expires, slave pulls low
        assert!(s.line.driving_low);
        s.on_falling_edge(); // its own pulldown
        assert_eq!(s.state(), SlaveState::EndPresence);
        s.on_timer(); // presence pulse ends
        assert!(!s.line.driving_low);
        s.timer.elapsed = 0;
        s.on_rising_edge();
        assert_eq!(s.state(), SlaveState::Write);
    }

    /// One master write slot carrying `bit`.
    pub(crate) fn write_slot(s: &mut TestSlave, bit: bool) {
        s.on_falling_edge();
        s.line.sample_level = bit;
        s.on_timer();
        s.line.sample_level = true;
        s.timer.elapsed = 0;
        s.on_rising_edge();
    }

    pub(crate) fn write_byte(s: &mut TestSlave, byte: u8) {
        for i in 0..8 {
            write_slot(s, (byte >> i) & 0x01 != 0);
        }
    }

    /// One master read slot; returns the bit the slave drove.
    pub(crate) fn read_slot(s: &mut TestSlave) -> bool {
        s.on_falling_edge();
        let bit = !s.line.driving_low;
        s.line.sample_level = true;
        s.on_timer();
        s.timer.elapsed = 0;
        if bit {
            s.on_rising_edge();
        }
        bit
    }

    pub(crate) fn read_byte(s: &mut TestSlave) -> u8 {
        let mut byte = 0;
        for i in 0..8 {
            if read_slot(s) {
                byte |= 1 << i;
            }
        }
        byte
    }

    pub(crate) const ID: [u8; 8] = [0x37, 0x00, 0x08, 0x02, 0x0a, 0xa9, 0x50, 0x10];

    #[test]
    fn start_twice_is_an_error() {
        let control = OneWireControl::new();
        let mut slave = test_slave(ID, &control);
        assert_eq!(slave.start(), Err(OneWireSlaveError::AlreadyStarted));
    }

    #[test]
    fn presence_pulse_follows_reset() {
        let control = OneWireControl::new();
        let mut slave = test_slave(ID, &control);
        reset_pulse(&mut slave);
        assert_eq!(slave.timer.armed, None);
        assert!(!slave.rom_matched());
    }

    #[test]
    fn skip_rom_selects_and_dispatches_bytes() {
        let control = OneWireControl::new();
        let mut slave = test_slave(ID, &control);
        reset_pulse(&mut slave);
        write_byte(&mut slave, ONEWIRE_SKIP_ROM_CMD);
        assert!(slave.rom_matched());
        write_byte(&mut slave, 0xa5);
        assert_eq!(slave.handler().rec.received, [0xa5]);
        assert_eq!(slave.state(), SlaveState::Write);
    }

    #[test]
    fn unknown_rom_command_deselects() {
        let control = OneWireControl::new();
        let mut slave = test_slave(ID, &control);
        reset_pulse(&mut slave);
        write_byte(&mut slave, 0x5a);
        assert_eq!(slave.state(), SlaveState::WaitReset);
        assert!(!slave.rom_matched());
        // Deselected: subsequent read slots stay released.
        for _ in 0..8 {
            assert!(read_slot(&mut slave));
        }
    }

    #[test]
    fn echo_switches_direction_and_repeats_txbyte() {
        let control = OneWireControl::new();
        let mut slave = test_slave(ID, &control);
        slave.handler_mut().rec.reply = Some(0x42);
        reset_pulse(&mut slave);
        write_byte(&mut slave, ONEWIRE_SKIP_ROM_CMD);
        write_byte(&mut slave, 0xbe);
        assert_eq!(slave.state(), SlaveState::Read);
        assert_eq!(read_byte(&mut slave), 0x42);
        assert_eq!(slave.handler().rec.sent, 1);
        // Nothing re-staged: the byte repeats.
        assert_eq!(read_byte(&mut slave), 0x42);
        assert_eq!(slave.handler().rec.sent, 2);
    }

    #[test]
    fn reset_mid_byte_reinitializes_counters() {
        let control = OneWireControl::new();
        let mut slave = test_slave(ID, &control);
        reset_pulse(&mut slave);
        write_slot(&mut slave, true);
        write_slot(&mut slave, true);
        write_slot(&mut slave, false);
        assert_eq!(slave.bit_count, 3);
        reset_pulse(&mut slave);
        assert_eq!(slave.bit_count, 0);
        assert_eq!(slave.rom_command, ONEWIRE_ROM_NONE);
        assert_eq!(slave.id_index, 7);
        // The next 8 slots decode as a fresh command byte.
        write_byte(&mut slave, ONEWIRE_SKIP_ROM_CMD);
        assert!(slave.rom_matched());
    }

    #[test]
    fn long_low_mid_slot_still_reads_as_reset() {
        let control = OneWireControl::new();
        let mut slave = test_slave(ID, &control);
        reset_pulse(&mut slave);
        // Master pulls low as if starting a write slot and just holds it.
        slave.on_falling_edge();
        slave.line.sample_level = false;
        slave.on_timer(); // sample fire, spurious 0 bit
        slave.on_timer(); // idle reloads keep the accounting alive
        slave.timer.elapsed = 200;
        slave.on_rising_edge();
        // 30 + 255 + 200 ≥ 480: recognised as a reset.
        assert_eq!(slave.state(), SlaveState::StartPresence);
    }
}
