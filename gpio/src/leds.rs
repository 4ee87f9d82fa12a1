use std::fmt::{Debug, Formatter};
use crate::{GpioBusOutput, GpioResult};

/// A bank of on/off indicator LEDs, LED `n` lit when bit `n` is set.
pub trait LedSink: Debug {
    fn show(&mut self, bits: u8) -> GpioResult<()>;
}

/// Four LEDs on a GPIO bus.
pub struct GpioLeds<'a> {
    bus: &'a dyn GpioBusOutput<4>,
}

impl Debug for GpioLeds<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpioLeds({:?})", self.bus)
    }
}

impl<'a> GpioLeds<'a> {
    pub fn new(bus: &'a dyn GpioBusOutput<4>) -> Self {
        GpioLeds { bus }
    }
}

impl LedSink for GpioLeds<'_> {
    /// # Errors
    /// - `GpioError::InvalidArgument` if `bits` does not fit in four LEDs.
    fn show(&mut self, bits: u8) -> GpioResult<()> {
        self.bus.write_bits(bits)
    }
}
