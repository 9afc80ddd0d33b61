use std::cell::RefCell;
use std::rc::Rc;

use embedded_onewire_slave::consts::{ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SKIP_ROM_CMD};
use embedded_onewire_slave::{
    OneWireHandler, OneWireLine, OneWireSlave, OneWireSlaveResult, OneWireTimer,
};

// Master-side timings, all in microseconds. The reset low and the recovery
// period bracket the 480 µs minimum; write slots hold low for 60 µs (zero)
// or 6 µs (one) and the line is sampled by the slaves 30 µs in; read slots
// are released after 3 µs and sampled by the master at 12 µs, before the
// slave lets go of a transmitted zero at 15 µs.
const RESET_LOW_US: u64 = 500;
const RESET_RECOVERY_US: u64 = 480;
const PRESENCE_SAMPLE_US: u64 = 70;
const SLOT_US: u64 = 70;
const WRITE_ZERO_LOW_US: u64 = 60;
const WRITE_ONE_LOW_US: u64 = 6;
const READ_LOW_US: u64 = 3;
const MASTER_SAMPLE_US: u64 = 12;

struct TimerSlot {
    deadline: Option<u64>,
    armed_at: u64,
}

struct NetState {
    now: u64,
    /// Last settled line level; edges are dispatched when the computed
    /// level diverges from it.
    level: bool,
    master_low: bool,
    node_low: Vec<bool>,
    timers: Vec<TimerSlot>,
}

impl NetState {
    fn line_level(&self) -> bool {
        !(self.master_low || self.node_low.iter().any(|&low| low))
    }
}

/// One slave's handle on the shared line.
pub struct SimLine {
    net: Rc<RefCell<NetState>>,
    node: usize,
}

impl OneWireLine for SimLine {
    fn pull_low(&mut self) {
        self.net.borrow_mut().node_low[self.node] = true;
    }

    fn release(&mut self) {
        self.net.borrow_mut().node_low[self.node] = false;
    }

    fn sample(&mut self) -> bool {
        self.net.borrow().line_level()
    }
}

/// One slave's one-shot compare channel on the shared clock.
pub struct SimTimer {
    net: Rc<RefCell<NetState>>,
    node: usize,
}

impl OneWireTimer for SimTimer {
    fn arm(&mut self, delay_us: u16) {
        let mut net = self.net.borrow_mut();
        let now = net.now;
        let timer = &mut net.timers[self.node];
        timer.deadline = Some(now + u64::from(delay_us));
        timer.armed_at = now;
    }

    fn cancel(&mut self) {
        self.net.borrow_mut().timers[self.node].deadline = None;
    }

    fn elapsed_us(&mut self) -> u16 {
        let net = self.net.borrow();
        (net.now - net.timers[self.node].armed_at).min(u64::from(u16::MAX)) as u16
    }
}

/// A simulated bus: the wired-OR line, the µs clock, the attached slave
/// cores and the master side of the protocol.
///
/// Build it empty, [`attach`](SimBus::attach) each slave, then
/// [`start_all`](SimBus::start_all) before driving master operations. All
/// master operations advance virtual time and deliver edges and timer
/// fires to every slave along the way.
pub struct SimBus<'a, H> {
    net: Rc<RefCell<NetState>>,
    slaves: Vec<OneWireSlave<'a, SimLine, SimTimer, H>>,
}

impl<'a, H: OneWireHandler> SimBus<'a, H> {
    /// An idle bus with no slaves; the line floats high.
    pub fn new() -> Self {
        SimBus {
            net: Rc::new(RefCell::new(NetState {
                now: 0,
                level: true,
                master_low: false,
                node_low: Vec::new(),
                timers: Vec::new(),
            })),
            slaves: Vec::new(),
        }
    }

    /// Adds a slave to the bus. The closure receives the new node's line
    /// and timer handles and returns the built core.
    pub fn attach<F>(&mut self, build: F)
    where
        F: FnOnce(SimLine, SimTimer) -> OneWireSlave<'a, SimLine, SimTimer, H>,
    {
        let node = {
            let mut net = self.net.borrow_mut();
            net.node_low.push(false);
            net.timers.push(TimerSlot {
                deadline: None,
                armed_at: 0,
            });
            net.node_low.len() - 1
        };
        let line = SimLine {
            net: Rc::clone(&self.net),
            node,
        };
        let timer = SimTimer {
            net: Rc::clone(&self.net),
            node,
        };
        self.slaves.push(build(line, timer));
    }

    /// Starts every attached slave.
    pub fn start_all(&mut self) -> OneWireSlaveResult<()> {
        for slave in &mut self.slaves {
            slave.start()?;
        }
        self.settle();
        Ok(())
    }

    /// Virtual time, in microseconds.
    pub fn now_us(&self) -> u64 {
        self.net.borrow().now
    }

    /// The current line level.
    pub fn level(&self) -> bool {
        self.net.borrow().line_level()
    }

    /// Number of attached slaves.
    pub fn num_slaves(&self) -> usize {
        self.slaves.len()
    }

    /// The `index`-th attached slave.
    pub fn slave(&self, index: usize) -> &OneWireSlave<'a, SimLine, SimTimer, H> {
        &self.slaves[index]
    }

    /// The `index`-th attached slave, mutably.
    pub fn slave_mut(&mut self, index: usize) -> &mut OneWireSlave<'a, SimLine, SimTimer, H> {
        &mut self.slaves[index]
    }

    /// Dispatches edges until the line level is stable: a slave reacting to
    /// an edge may drive or release the line itself.
    fn settle(&mut self) {
        loop {
            let level = {
                let net = self.net.borrow();
                if net.line_level() == net.level {
                    return;
                }
                !net.level
            };
            self.net.borrow_mut().level = level;
            log::trace!(
                "t={}us line {}",
                self.net.borrow().now,
                if level { "rises" } else { "falls" }
            );
            for slave in &mut self.slaves {
                if level {
                    slave.on_rising_edge();
                } else {
                    slave.on_falling_edge();
                }
            }
        }
    }

    /// Advances virtual time by `dt` microseconds, delivering every timer
    /// fire that comes due along the way, in deadline order.
    pub fn advance(&mut self, dt: u64) {
        let target = self.net.borrow().now + dt;
        loop {
            let next = {
                let net = self.net.borrow();
                net.timers
                    .iter()
                    .enumerate()
                    .filter_map(|(node, timer)| timer.deadline.map(|deadline| (deadline, node)))
                    .min()
            };
            match next {
                Some((deadline, node)) if deadline <= target => {
                    {
                        let mut net = self.net.borrow_mut();
                        net.now = deadline;
                        net.timers[node].deadline = None;
                    }
                    self.slaves[node].on_timer();
                    self.settle();
                }
                _ => break,
            }
        }
        self.net.borrow_mut().now = target;
    }

    fn set_master_low(&mut self, low: bool) {
        self.net.borrow_mut().master_low = low;
        self.settle();
    }

    /// Issues a reset pulse and reports whether any slave answered with a
    /// presence pulse. Leaves the bus at the end of the recovery period,
    /// ready for the ROM command.
    pub fn reset(&mut self) -> bool {
        self.set_master_low(true);
        self.advance(RESET_LOW_US);
        self.set_master_low(false);
        self.advance(PRESENCE_SAMPLE_US);
        let presence = !self.level();
        self.advance(RESET_RECOVERY_US - PRESENCE_SAMPLE_US);
        log::debug!("reset: presence={presence}");
        presence
    }

    /// One master write slot carrying `bit`.
    pub fn write_bit(&mut self, bit: bool) {
        let low = if bit { WRITE_ONE_LOW_US } else { WRITE_ZERO_LOW_US };
        self.set_master_low(true);
        self.advance(low);
        self.set_master_low(false);
        self.advance(SLOT_US - low);
    }

    /// One master read slot; returns the bit the bus carried at the sample
    /// point.
    pub fn read_bit(&mut self) -> bool {
        self.set_master_low(true);
        self.advance(READ_LOW_US);
        self.set_master_low(false);
        self.advance(MASTER_SAMPLE_US - READ_LOW_US);
        let bit = self.level();
        self.advance(SLOT_US - MASTER_SAMPLE_US);
        bit
    }

    /// Writes a byte, bit 0 first.
    pub fn write_byte(&mut self, byte: u8) {
        for i in 0..8 {
            self.write_bit((byte >> i) & 0x01 != 0);
        }
        log::debug!("master wrote {byte:#04x}");
    }

    /// Reads a byte, bit 0 first.
    pub fn read_byte(&mut self) -> u8 {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit() {
                byte |= 1 << i;
            }
        }
        log::debug!("master read {byte:#04x}");
        byte
    }

    /// Resets the bus and addresses devices: Match ROM for `Some(rom)`
    /// (wire order, low byte first), Skip ROM for `None`. Returns the
    /// presence result of the reset.
    pub fn address(&mut self, rom: Option<u64>) -> bool {
        let presence = self.reset();
        match rom {
            Some(rom) => {
                self.write_byte(ONEWIRE_MATCH_ROM_CMD);
                for byte in rom.to_le_bytes() {
                    self.write_byte(byte);
                }
            }
            None => self.write_byte(ONEWIRE_SKIP_ROM_CMD),
        }
        presence
    }
}

impl<H: OneWireHandler> Default for SimBus<'_, H> {
    fn default() -> Self {
        Self::new()
    }
}

/// The 64-bit ROM code of a slave ID array, in wire order: the low byte of
/// the result is ID byte 7 (the family code), which is first on the wire.
/// This is the form [`SimBus::address`] and
/// [`RomSearch`](crate::RomSearch) use.
pub fn rom_code(id: &[u8; 8]) -> u64 {
    let mut wire = [0u8; 8];
    for (wire_byte, id_byte) in wire.iter_mut().zip(id.iter().rev()) {
        *wire_byte = *id_byte;
    }
    u64::from_le_bytes(wire)
}
