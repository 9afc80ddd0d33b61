#![no_std]

//! A DS18B20-style temperature sensor personality for the
//! `embedded-onewire-slave` core: scratchpad read/write, temperature
//! conversion and TH/TL alarm thresholds, all implemented on the
//! function-layer handler trait.

use embedded_onewire_slave::{OneWireControl, OneWireHandler};
use fixed::types::I12F4;

pub const FAMILY_CODE: u8 = 0x28;

const CMD_CONVERT_T: u8 = 0x44;
const CMD_WRITE_SCRATCHPAD: u8 = 0x4e;
const CMD_READ_SCRATCHPAD: u8 = 0xbe;

const SCRATCHPAD_LEN: usize = 9;

/// The emulated sensor. Borrows the same control block as the slave core it
/// is attached to, which is how it stages scratchpad bytes and the alarm
/// condition.
pub struct Ds18b20Emu<'a> {
    control: &'a OneWireControl,
    /// Temperature LSB/MSB, TH, TL, configuration, three reserved bytes,
    /// CRC over the first eight.
    scratchpad: [u8; SCRATCHPAD_LEN],
    /// Next scratchpad byte to stage while a read is streaming.
    cursor: usize,
    /// Remaining bytes of a Write Scratchpad payload (TH, TL, configuration).
    pending: u8,
    conversions: u32,
}

impl<'a> Ds18b20Emu<'a> {
    pub fn new(control: &'a OneWireControl, temperature: I12F4) -> Self {
        let mut emu = Ds18b20Emu {
            control,
            scratchpad: [0; SCRATCHPAD_LEN],
            cursor: SCRATCHPAD_LEN,
            pending: 0,
            conversions: 0,
        };
        emu.scratchpad[2] = 85i8 as u8; // TH
        emu.scratchpad[3] = -40i8 as u8; // TL
        emu.scratchpad[4] = 0x7f; // configuration: 12-bit resolution
        emu.scratchpad[5] = 0xff;
        emu.scratchpad[7] = 0x10;
        emu.set_temperature(temperature);
        emu
    }

    /// Sets the TL/TH alarm window, in whole degrees.
    pub fn with_thresholds(mut self, low: i8, high: i8) -> Self {
        self.scratchpad[2] = high as u8;
        self.scratchpad[3] = low as u8;
        self.refresh();
        self
    }

    /// Updates the measured temperature and re-evaluates the alarm.
    pub fn set_temperature(&mut self, temperature: I12F4) {
        let raw = temperature.to_bits().to_le_bytes();
        self.scratchpad[0] = raw[0];
        self.scratchpad[1] = raw[1];
        self.refresh();
    }

    pub fn temperature(&self) -> I12F4 {
        I12F4::from_bits(i16::from_le_bytes([self.scratchpad[0], self.scratchpad[1]]))
    }

    /// How many Convert T commands this sensor has seen.
    pub fn conversions(&self) -> u32 {
        self.conversions
    }

    /// Recomputes the scratchpad CRC and the alarm condition.
    fn refresh(&mut self) {
        self.scratchpad[8] = crc8(&self.scratchpad[..8]);
        let temperature = self.temperature();
        let high = I12F4::from_num(self.scratchpad[2] as i8);
        let low = I12F4::from_num(self.scratchpad[3] as i8);
        self.control
            .set_alarm(temperature > high || temperature < low);
    }
}

impl OneWireHandler for Ds18b20Emu<'_> {
    fn on_byte_received(&mut self, byte: u8) -> bool {
        if self.pending > 0 {
            // TH, TL, configuration, in that order.
            let index = 2 + usize::from(3 - self.pending);
            self.scratchpad[index] = byte;
            self.pending -= 1;
            if self.pending == 0 {
                self.refresh();
            }
            return false;
        }
        match byte {
            CMD_READ_SCRATCHPAD => {
                self.control.set_txbyte(self.scratchpad[0]);
                self.cursor = 1;
                true
            }
            CMD_WRITE_SCRATCHPAD => {
                self.pending = 3;
                false
            }
            CMD_CONVERT_T => {
                self.conversions += 1;
                false
            }
            _ => false,
        }
    }

    fn on_byte_sent(&mut self) {
        if self.cursor < SCRATCHPAD_LEN {
            self.control.set_txbyte(self.scratchpad[self.cursor]);
            self.cursor += 1;
        }
    }
}

/// CRC-8 as used across the 1-Wire family (x^8 + x^5 + x^4 + 1, reflected).
fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x01 != 0 {
                crc = (crc >> 1) ^ 0x8c;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::{Ds18b20Emu, crc8};
    use embedded_onewire_slave::{OneWireControl, OneWireHandler};
    use fixed::types::I12F4;

    #[test]
    fn crc8_matches_known_values() {
        assert_eq!(crc8(&[]), 0x00);
        assert_eq!(crc8(&[0x01]), 0x5e);
        // A sequence followed by its own CRC checks to zero.
        let data = [0x28, 0xff, 0x4b, 0x11, 0x22, 0x33, 0x44];
        let crc = crc8(&data);
        let mut framed = [0u8; 8];
        framed[..7].copy_from_slice(&data);
        framed[7] = crc;
        assert_eq!(crc8(&framed), 0x00);
    }

    #[test]
    fn power_on_scratchpad_layout() {
        let control = OneWireControl::new();
        let emu = Ds18b20Emu::new(&control, I12F4::from_num(85));
        // 85 °C is 0x0550 in sixteenths.
        assert_eq!(emu.scratchpad[0], 0x50);
        assert_eq!(emu.scratchpad[1], 0x05);
        assert_eq!(emu.scratchpad[8], crc8(&emu.scratchpad[..8]));
        assert!(!control.alarm());
    }

    #[test]
    fn alarm_follows_thresholds() {
        let control = OneWireControl::new();
        let mut emu = Ds18b20Emu::new(&control, I12F4::from_num(20)).with_thresholds(10, 30);
        assert!(!control.alarm());
        emu.set_temperature(I12F4::from_num(35));
        assert!(control.alarm());
        emu.set_temperature(I12F4::from_num(5));
        assert!(control.alarm());
        emu.set_temperature(I12F4::from_num(25));
        assert!(!control.alarm());
    }

    #[test]
    fn write_scratchpad_consumes_three_bytes() {
        let control = OneWireControl::new();
        let mut emu = Ds18b20Emu::new(&control, I12F4::from_num(50));
        assert!(!emu.on_byte_received(0x4e));
        assert!(!emu.on_byte_received(40)); // TH
        assert!(!emu.on_byte_received(0i8 as u8)); // TL
        assert!(!emu.on_byte_received(0x7f)); // configuration
        assert!(control.alarm(), "50 degrees exceeds the new TH of 40");
        // The payload bytes were data, not commands.
        assert_eq!(emu.conversions(), 0);
    }

    #[test]
    fn read_scratchpad_streams_all_nine_bytes() {
        let control = OneWireControl::new();
        let mut emu = Ds18b20Emu::new(&control, I12F4::from_num(21.5));
        assert!(emu.on_byte_received(0xbe));
        let mut streamed = [0u8; 9];
        streamed[0] = control.txbyte();
        for slot in streamed.iter_mut().skip(1) {
            emu.on_byte_sent();
            *slot = control.txbyte();
        }
        assert_eq!(streamed, emu.scratchpad);
        let temperature = I12F4::from_bits(i16::from_le_bytes([streamed[0], streamed[1]]));
        assert_eq!(temperature, I12F4::from_num(21.5));
    }
}
