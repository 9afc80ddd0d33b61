use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::OneWireLine;

fn infallible<T>(res: Result<T, Infallible>) -> T {
    match res {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// Adapter from an `embedded-hal` pin to [`OneWireLine`].
///
/// The pin must be configured open-drain with the bus pull-up doing the
/// work of returning the line high: `set_low` drives the line, `set_high`
/// releases it. The pin has to be readable while configured as an output,
/// which every HAL with a flex/in-out pin type provides.
///
/// Only infallible pins are accepted; the line driver runs in interrupt
/// context where there is no error path.
pub struct OpenDrainLine<P> {
    pin: P,
}

impl<P> OpenDrainLine<P>
where
    P: InputPin + OutputPin + ErrorType<Error = Infallible>,
{
    /// Wraps an open-drain configured pin and releases the line.
    pub fn new(mut pin: P) -> Self {
        infallible(pin.set_high());
        OpenDrainLine { pin }
    }

    /// Releases the line and returns the pin.
    pub fn free(mut self) -> P {
        infallible(self.pin.set_high());
        self.pin
    }
}

impl<P> OneWireLine for OpenDrainLine<P>
where
    P: InputPin + OutputPin + ErrorType<Error = Infallible>,
{
    fn pull_low(&mut self) {
        infallible(self.pin.set_low());
    }

    fn release(&mut self) {
        infallible(self.pin.set_high());
    }

    fn sample(&mut self) -> bool {
        infallible(self.pin.is_high())
    }
}

#[cfg(test)]
mod tests {
    use super::OpenDrainLine;
    use crate::OneWireLine;
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

    /// An open-drain pin double: high unless either this pin or the rest of
    /// the bus drives low.
    struct FlexPin {
        driving_low: bool,
        bus_low: bool,
    }

    impl ErrorType for FlexPin {
        type Error = Infallible;
    }

    impl OutputPin for FlexPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.driving_low = true;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.driving_low = false;
            Ok(())
        }
    }

    impl InputPin for FlexPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(!(self.driving_low || self.bus_low))
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(self.driving_low || self.bus_low)
        }
    }

    #[test]
    fn drive_release_sample() {
        let pin = FlexPin {
            driving_low: true,
            bus_low: false,
        };
        // Construction releases the line.
        let mut line = OpenDrainLine::new(pin);
        assert!(line.sample());
        line.pull_low();
        assert!(!line.sample());
        line.release();
        assert!(line.sample());
        // A low driven elsewhere on the bus is visible but not sticky.
        let mut line = OpenDrainLine::new(FlexPin {
            driving_low: false,
            bus_low: true,
        });
        assert!(!line.sample());
        assert!(!line.free().driving_low);
    }
}
