//! In-memory stand-ins for the keypad and LED hardware.
//!
//! These run the same code paths as the GPIO-backed implementations without touching any
//! registers, and keep a log of everything that was done to them.
use std::fmt::Debug;
use log::trace;
use crate::GpioResult;
use crate::keypad::{ColumnSample, KeypadPins, RowMask, MATRIX_SIZE};
use crate::leds::LedSink;

/// An electrical model of a diode-less 4x4 switch matrix.
///
/// Asserted rows are driven, de-asserted rows float. A closed switch connects its row and
/// column, so current from a driven row can reach a column through any chain of closed switches
/// and floating rows, which is what makes ghost keys appear on real hardware.
#[derive(Debug, Default, Clone)]
pub struct SimKeyMatrix {
    /// Bit `row * 4 + column` set when that switch is closed.
    pressed: u16,
    rows: RowMask,
    rows_configured: bool,
    columns_configured: bool,
    row_drives: Vec<RowMask>,
    column_reads: usize,
    delays: Vec<u32>,
}

impl SimKeyMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    fn switch_bit(row: u8, column: u8) -> u16 {
        assert!(row < MATRIX_SIZE && column < MATRIX_SIZE, "switch off the matrix");
        1 << (row * MATRIX_SIZE + column)
    }

    /// Closes the switch at `(row, column)`.
    pub fn press(&mut self, row: u8, column: u8) {
        self.pressed |= Self::switch_bit(row, column);
    }

    /// Opens the switch at `(row, column)`.
    pub fn release(&mut self, row: u8, column: u8) {
        self.pressed &= !Self::switch_bit(row, column);
    }

    pub fn release_all(&mut self) {
        self.pressed = 0;
    }

    fn is_closed(&self, row: u8, column: u8) -> bool {
        self.pressed & Self::switch_bit(row, column) != 0
    }

    /// Gets the columns reached from the currently driven rows.
    fn sense(&self) -> u8 {
        let mut rows = self.rows.bits();
        let mut columns = 0u8;
        loop {
            let mut next_rows = rows;
            let mut next_columns = columns;
            for row in 0..MATRIX_SIZE {
                for column in 0..MATRIX_SIZE {
                    if !self.is_closed(row, column) {
                        continue;
                    }
                    if rows & (1 << row) != 0 {
                        next_columns |= 1 << column;
                    }
                    if columns & (1 << column) != 0 {
                        next_rows |= 1 << row;
                    }
                }
            }
            if next_rows == rows && next_columns == columns {
                return columns;
            }
            rows = next_rows;
            columns = next_columns;
        }
    }

    /// Gets the current row drive pattern.
    pub fn rows(&self) -> RowMask {
        self.rows
    }

    pub fn rows_configured(&self) -> bool {
        self.rows_configured
    }

    pub fn columns_configured(&self) -> bool {
        self.columns_configured
    }

    /// Every row pattern driven since the log was last cleared, oldest first.
    pub fn row_drives(&self) -> &[RowMask] {
        &self.row_drives
    }

    pub fn column_reads(&self) -> usize {
        self.column_reads
    }

    /// Every delay requested since the log was last cleared, in microseconds.
    pub fn delays(&self) -> &[u32] {
        &self.delays
    }

    pub fn clear_log(&mut self) {
        self.row_drives.clear();
        self.column_reads = 0;
        self.delays.clear();
    }
}

impl KeypadPins for SimKeyMatrix {
    fn configure_rows_as_output(&mut self) -> GpioResult<()> {
        self.rows_configured = true;
        self.drive_rows(RowMask::NONE)
    }

    fn configure_columns_as_input(&mut self) -> GpioResult<()> {
        self.columns_configured = true;
        Ok(())
    }

    fn drive_rows(&mut self, mask: RowMask) -> GpioResult<()> {
        debug_assert!(self.rows_configured, "rows driven before being configured");
        self.rows = mask;
        self.row_drives.push(mask);
        Ok(())
    }

    fn read_columns(&mut self) -> GpioResult<ColumnSample> {
        debug_assert!(self.columns_configured, "columns read before being configured");
        self.column_reads += 1;
        let sample = ColumnSample::new(self.sense());
        trace!("Simulated rows {:04b} -> columns {:04b}", self.rows.bits(), sample.bits());
        Ok(sample)
    }

    fn delay_microseconds(&mut self, us: u32) {
        self.delays.push(us);
    }
}

/// A bank of LEDs that remembers every pattern it was shown.
#[derive(Debug, Default, Clone)]
pub struct SimLeds {
    history: Vec<u8>,
}

impl SimLeds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the pattern currently lit, all off before the first update.
    pub fn current(&self) -> u8 {
        self.history.last().copied().unwrap_or_default()
    }

    pub fn history(&self) -> &[u8] {
        &self.history
    }
}

impl LedSink for SimLeds {
    fn show(&mut self, bits: u8) -> GpioResult<()> {
        self.history.push(bits);
        Ok(())
    }
}
