use clap::Parser;
use ds18b20_emu::Ds18b20Emu;
use embedded_onewire_slave::{OneWireControl, OneWireSlave};
use fixed::types::I12F4;
use onewire_slave_sim::{RomSearch, SearchKind, SimBus};

/// Run a simulated 1-Wire bus of emulated temperature sensors.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of sensors on the bus
    #[arg(short, long, default_value_t = 3)]
    sensors: usize,
    /// Temperature every sensor reports, in degrees Celsius
    #[arg(short, long, default_value_t = 21.5)]
    temperature: f32,
    /// Alarm threshold (TH) programmed into every sensor
    #[arg(long, default_value_t = 30)]
    alarm_high: i8,
}

/// A plausible ROM for the n-th sensor: family code first on the wire,
/// a serial derived from the index, CRC left at zero.
fn sensor_id(n: usize) -> [u8; 8] {
    let serial = (n as u8).wrapping_mul(0x3d).wrapping_add(0x11);
    [
        0x00,
        serial,
        serial ^ 0xa5,
        0x02,
        0x0a,
        serial,
        0x50,
        ds18b20_emu::FAMILY_CODE,
    ]
}

fn main() {
    // Initialize the logger
    env_logger::init();
    // Parse command line arguments
    let args = Args::parse();
    let temperature = I12F4::from_num(args.temperature);

    // One control block per sensor, shared between the core and its handler
    let controls: Vec<OneWireControl> = (0..args.sensors).map(|_| OneWireControl::new()).collect();

    // Build the bus and attach the emulated sensors
    let mut bus = SimBus::new();
    for (n, control) in controls.iter().enumerate() {
        bus.attach(|line, timer| {
            let sensor =
                Ds18b20Emu::new(control, temperature).with_thresholds(-40, args.alarm_high);
            OneWireSlave::new(line, timer, sensor, sensor_id(n), control)
        });
    }
    bus.start_all().expect("Failed to start the slave cores");

    // Enumerate devices on the bus
    let mut roms = Vec::new();
    let mut search = RomSearch::new(SearchKind::Normal);
    while let Some(rom) = search.next(&mut bus) {
        log::info!("found ROM {rom:#018x}");
        roms.push(rom);
    }
    log::info!("Found {} devices", roms.len());

    // Read each sensor's scratchpad and decode the temperature
    for rom in &roms {
        bus.address(Some(*rom));
        bus.write_byte(0xbe);
        let mut scratchpad = [0u8; 9];
        for byte in scratchpad.iter_mut() {
            *byte = bus.read_byte();
        }
        let temp = I12F4::from_bits(i16::from_le_bytes([scratchpad[0], scratchpad[1]]));
        log::info!("ROM: {:x}, Temperature: {}", rom, temp);
    }

    // Sensors above TH answer the alarm search
    let mut alarmed = 0;
    let mut search = RomSearch::new(SearchKind::Alarmed);
    while let Some(rom) = search.next(&mut bus) {
        log::info!("ROM {rom:#018x} is alarming");
        alarmed += 1;
    }
    log::info!("{alarmed} devices in alarm state");
}
