//! ROM-layer sub-protocols: command decode, Search ROM, Match ROM, Skip
//! ROM, Read ROM and Alarm Search.
//!
//! The first byte after every reset pulse is a ROM command; it selects the
//! addressing sub-protocol that runs until this slave is either selected
//! (further bits go to the function dispatcher) or deselected (the core
//! parks in `WaitReset` and ignores the bus until the next reset pulse).
//!
//! Addressing order on the wire: ID byte 7 first, byte 0 last, bit 0 of
//! each byte first. `id_index` walks 7 down to 0 while `bit_count` runs 0
//! to 7 inside each byte.

use crate::consts::*;
use crate::slave::{OneWireSlave, SlaveState};
use crate::traits::{OneWireHandler, OneWireLine, OneWireTimer};

impl<L, T, H> OneWireSlave<'_, L, T, H>
where
    L: OneWireLine,
    T: OneWireTimer,
    H: OneWireHandler,
{
    /// Routes one sampled or driven bit to the ROM layer, or to the
    /// function dispatcher once the slave is selected.
    pub(crate) fn process_bit(&mut self, val: bool) {
        if self.rom_matched {
            self.function_bit(val);
            return;
        }
        match self.rom_command {
            ONEWIRE_ROM_NONE => self.rom_command_bit(val),
            ONEWIRE_SEARCH_ROM_CMD => self.search_bit(val),
            ONEWIRE_ALARM_SEARCH_CMD => {
                if self.control.alarm() {
                    self.search_bit(val)
                } else {
                    self.deselect()
                }
            }
            ONEWIRE_MATCH_ROM_CMD => self.match_bit(val),
            ONEWIRE_READ_ROM_CMD => self.read_rom_bit(),
            _ => self.deselect(),
        }
    }

    /// Accumulates the ROM command byte and dispatches on its completion.
    fn rom_command_bit(&mut self, val: bool) {
        self.current_byte = (self.current_byte >> 1) | if val { 0x80 } else { 0x00 };
        self.bit_count += 1;
        if self.bit_count < 8 {
            return;
        }
        self.rom_command = self.current_byte;
        self.current_byte = 0;
        self.bit_count = 0;
        self.id_index = 7;
        match self.rom_command {
            ONEWIRE_SEARCH_ROM_CMD => self.search_begin(),
            ONEWIRE_ALARM_SEARCH_CMD => {
                // Participate only while the alarm is active.
                if self.control.alarm() {
                    self.search_begin()
                } else {
                    self.deselect()
                }
            }
            ONEWIRE_MATCH_ROM_CMD => {} // stay in Write; the master sends 64 bits
            ONEWIRE_SKIP_ROM_CMD => self.select(),
            ONEWIRE_READ_ROM_CMD => {
                self.read_val = self.id_bit();
                self.state = SlaveState::Read;
            }
            _ => self.deselect(),
        }
    }

    /// Starts the three-slot sequence for the current ID bit: transmit the
    /// bit, transmit its complement, then read the master's choice.
    fn search_begin(&mut self) {
        self.search_complement = false;
        self.read_val = self.id_bit();
        self.state = SlaveState::Read;
    }

    /// One Search ROM slot. In `Read` the two transmit slots alternate via
    /// the complement marker; in `Write` the master's chosen direction
    /// either confirms this bit or deselects us.
    fn search_bit(&mut self, val: bool) {
        if self.state == SlaveState::Read {
            if !self.search_complement {
                self.search_complement = true;
                self.read_val ^= 0x01;
            } else {
                self.search_complement = false;
                self.state = SlaveState::Write;
            }
        } else if u8::from(val) == self.id_bit() {
            if self.advance_id_cursor() {
                self.select();
            } else {
                self.search_begin();
            }
        } else {
            self.deselect();
        }
    }

    /// One Match ROM bit written by the master, compared against the ID.
    fn match_bit(&mut self, val: bool) {
        if u8::from(val) == self.id_bit() {
            if self.advance_id_cursor() {
                self.select();
            }
        } else {
            self.deselect();
        }
    }

    /// One Read ROM bit just transmitted; stage the next, select after the
    /// last.
    fn read_rom_bit(&mut self) {
        if self.advance_id_cursor() {
            self.select();
        } else {
            self.read_val = self.id_bit();
        }
    }

    /// The ID bit under the cursor, in the LSB.
    fn id_bit(&self) -> u8 {
        (self.id[usize::from(self.id_index)] >> self.bit_count) & 0x01
    }

    /// Moves the cursor one bit towards the end of the ID. Returns true
    /// once all 64 bits have passed.
    fn advance_id_cursor(&mut self) -> bool {
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.bit_count = 0;
            if self.id_index == 0 {
                return true;
            }
            self.id_index -= 1;
        }
        false
    }

    /// This slave has been addressed: latch the match and hand every
    /// further bit of the transaction to the function dispatcher.
    fn select(&mut self) {
        self.rom_matched = true;
        self.bit_count = 0;
        self.current_byte = 0;
        self.state = SlaveState::Write;
    }

    /// Ignore the bus until the next reset pulse.
    fn deselect(&mut self) {
        self.state = SlaveState::WaitReset;
    }
}
