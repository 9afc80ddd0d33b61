use embedded_onewire_slave::{OneWireControl, OneWireHandler};

/// The ID used throughout the wire-level tests, byte 0 first; byte 7 (0x10)
/// is the first byte on the wire.
pub const ID: [u8; 8] = [0x37, 0x00, 0x08, 0x02, 0x0a, 0xa9, 0x50, 0x10];

/// Records function-layer traffic; when a reply byte is configured, answers
/// every received byte by staging the reply and turning the bus around.
pub struct Echo<'a> {
    pub control: &'a OneWireControl,
    pub reply: Option<u8>,
    pub received: Vec<u8>,
    pub sent: usize,
}

impl<'a> Echo<'a> {
    #[allow(dead_code)]
    pub fn new(control: &'a OneWireControl) -> Self {
        Echo {
            control,
            reply: None,
            received: Vec::new(),
            sent: 0,
        }
    }

    #[allow(dead_code)]
    pub fn with_reply(control: &'a OneWireControl, reply: u8) -> Self {
        Echo {
            control,
            reply: Some(reply),
            received: Vec::new(),
            sent: 0,
        }
    }
}

impl OneWireHandler for Echo<'_> {
    fn on_byte_received(&mut self, byte: u8) -> bool {
        self.received.push(byte);
        if let Some(reply) = self.reply {
            self.control.set_txbyte(reply);
            true
        } else {
            false
        }
    }

    fn on_byte_sent(&mut self) {
        self.sent += 1;
    }
}
