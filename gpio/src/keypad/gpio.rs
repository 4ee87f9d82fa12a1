use std::fmt::{Debug, Formatter};
use log::trace;
use crate::delay::Delay;
use crate::keypad::{ColumnSample, KeypadPins, RowMask};
use crate::{GpioBus, GpioResult};

/// Keypad pins backed by two 4-line GPIO buses.
///
/// The row bus is written to strobe rows, the column bus is read to sense which switches
/// close. Electrical settings (drive mode, bias, active level) are left to whoever claimed the
/// buses.
pub struct GpioKeypadPins<'a, D: Delay> {
    rows: &'a mut dyn GpioBus<4>,
    cols: &'a mut dyn GpioBus<4>,
    delay: D,
}

impl<D: Delay> Debug for GpioKeypadPins<'_, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpioKeypadPins({:?}, {:?})", self.rows, self.cols)
    }
}

impl<'a, D: Delay> GpioKeypadPins<'a, D> {
    pub fn new(rows: &'a mut dyn GpioBus<4>, cols: &'a mut dyn GpioBus<4>, delay: D) -> Self {
        GpioKeypadPins { rows, cols, delay }
    }
}

impl<D: Delay> KeypadPins for GpioKeypadPins<'_, D> {
    fn configure_rows_as_output(&mut self) -> GpioResult<()> {
        self.rows.as_output()?.write_bits(RowMask::NONE.bits())
    }

    fn configure_columns_as_input(&mut self) -> GpioResult<()> {
        self.cols.as_input()?;
        Ok(())
    }

    fn drive_rows(&mut self, mask: RowMask) -> GpioResult<()> {
        trace!("Driving rows: {:04b}", mask.bits());
        self.rows.as_output()?.write_bits(mask.bits())
    }

    fn read_columns(&mut self) -> GpioResult<ColumnSample> {
        let bits = self.cols.as_input()?.read_bits()?;
        trace!("Read columns: {:04b}", bits);
        Ok(ColumnSample::new(bits))
    }

    fn delay_microseconds(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}
