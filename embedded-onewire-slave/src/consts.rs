//! Command codes and slot timings for 1-Wire slave operation.

/// ROM command value meaning no command has been received in this transaction.
pub const ONEWIRE_ROM_NONE: u8 = 0x00;

/// Command to enumerate the ROM codes of all devices on the bus.
pub const ONEWIRE_SEARCH_ROM_CMD: u8 = 0xf0;

/// Command to address one device by its full 64-bit ROM code.
pub const ONEWIRE_MATCH_ROM_CMD: u8 = 0x55;

/// Command to address every device on the bus without a ROM exchange.
pub const ONEWIRE_SKIP_ROM_CMD: u8 = 0xcc;

/// Command to read the ROM code of the device. Only well-defined on a
/// single-drop bus.
pub const ONEWIRE_READ_ROM_CMD: u8 = 0x33;

/// Command to enumerate only the devices whose alarm condition is active.
pub const ONEWIRE_ALARM_SEARCH_CMD: u8 = 0xec;

/// Minimum duration of a continuous low level that counts as a reset pulse,
/// in microseconds.
pub const ONEWIRE_RESET_MIN_US: u16 = 480;

/// Delay between the master releasing the bus after a reset pulse and the
/// start of the presence pulse, in microseconds. Must fall in the 15-60 µs
/// recovery window.
pub const ONEWIRE_PRESENCE_DELAY_US: u16 = 20;

/// Duration of the presence pulse, in microseconds. Must fall in the
/// 60-240 µs window.
pub const ONEWIRE_PRESENCE_PULSE_US: u16 = 120;

/// Sample point of a master write slot, measured from the falling edge, in
/// microseconds. The valid window is 15-60 µs; sampling at 30 µs leaves
/// margin against slow pull-ups.
pub const ONEWIRE_WRITE_SAMPLE_US: u16 = 30;

/// How long a transmitted 0 is held low after the falling edge of a read
/// slot, in microseconds. The master samples no later than 15 µs into the
/// slot.
pub const ONEWIRE_READ_HOLD_US: u16 = 15;

/// Timer reload used while no slot is in progress, in microseconds. Keeps
/// the elapsed-low accounting alive so a reset pulse is recognised from any
/// state, even mid-slot.
pub const ONEWIRE_IDLE_RELOAD_US: u16 = 255;
