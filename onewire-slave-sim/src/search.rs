use crate::SimBus;
use embedded_onewire_slave::OneWireHandler;
use embedded_onewire_slave::consts::{ONEWIRE_ALARM_SEARCH_CMD, ONEWIRE_SEARCH_ROM_CMD};

/// Which search command the walk issues.
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum SearchKind {
    /// Search ROM: every slave participates.
    Normal = ONEWIRE_SEARCH_ROM_CMD,
    /// Alarm Search: only slaves with an active alarm participate.
    Alarmed = ONEWIRE_ALARM_SEARCH_CMD,
}

/// Master-side ROM search walk over a simulated bus.
///
/// Each [`next`](RomSearch::next) call runs one full 64-triplet pass and
/// returns one device's ROM code (low byte = family code, wire order), or
/// `None` once the bus is exhausted. The discrepancy bookkeeping steers
/// successive passes down the remaining branches.
pub struct RomSearch {
    cmd: u8,
    last_discrepancy: u8,
    last_device: bool,
    rom: [u8; 8],
}

impl RomSearch {
    /// A fresh search of the given kind.
    pub fn new(kind: SearchKind) -> Self {
        RomSearch {
            cmd: kind as u8,
            last_discrepancy: 0,
            last_device: false,
            rom: [0; 8],
        }
    }

    /// Discovers the next device. Returns `None` when no device answers the
    /// reset, no slave participates in the search, or every branch has been
    /// visited.
    pub fn next<H: OneWireHandler>(&mut self, bus: &mut SimBus<'_, H>) -> Option<u64> {
        if self.last_device {
            return None;
        }
        if !bus.reset() {
            return None;
        }
        bus.write_byte(self.cmd);
        let mut last_zero = 0u8;
        for bit_num in 1..=64u8 {
            let idx = usize::from((bit_num - 1) / 8);
            let mask = 1u8 << ((bit_num - 1) % 8);
            let id_bit = bus.read_bit();
            let complement = bus.read_bit();
            if id_bit && complement {
                // No slave drove either slot: nothing left on this branch.
                return None;
            }
            let dir = if id_bit != complement {
                id_bit
            } else {
                // Discrepancy: slaves disagree on this bit. Retrace the
                // previous pass up to the last branch point, then take the
                // 1-branch there and the 0-branch beyond it.
                let dir = if bit_num < self.last_discrepancy {
                    self.rom[idx] & mask != 0
                } else {
                    bit_num == self.last_discrepancy
                };
                if !dir {
                    last_zero = bit_num;
                }
                dir
            };
            if dir {
                self.rom[idx] |= mask;
            } else {
                self.rom[idx] &= !mask;
            }
            bus.write_bit(dir);
        }
        self.last_discrepancy = last_zero;
        self.last_device = last_zero == 0;
        log::debug!("search found {:#018x}", u64::from_le_bytes(self.rom));
        Some(u64::from_le_bytes(self.rom))
    }
}
