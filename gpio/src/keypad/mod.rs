//! 4x4 matrix keypad support: key codes, the pin capability a scanner needs, and the scanner.
mod gpio;
mod scanner;

use std::fmt::{Debug, Display, Formatter};
use crate::GpioResult;
pub use gpio::*;
pub use scanner::*;

/// Number of row lines, and of column lines, of the keypad matrix.
pub const MATRIX_SIZE: u8 = 4;

/// The `Keypad` trait defines the interface for keypad input devices.
pub trait Keypad: Debug {
    /// Resolves the currently pressed key, or [KeyCode::NONE] if no single key is pressed.
    fn scan(&mut self) -> GpioResult<KeyCode>;
}

/// The result of one keypad scan.
///
/// `0` means no key is pressed, `1..=16` identify the keys row-major: `row * 4 + column + 1`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct KeyCode(u8);

impl KeyCode {
    pub const NONE: KeyCode = KeyCode(0);
    pub const MAX: KeyCode = KeyCode(MATRIX_SIZE * MATRIX_SIZE);

    /// Gets the code of the key at the given position, or `None` if the position is off the matrix.
    pub const fn from_position(row: u8, column: u8) -> Option<KeyCode> {
        if row < MATRIX_SIZE && column < MATRIX_SIZE {
            Some(KeyCode(row * MATRIX_SIZE + column + 1))
        } else {
            None
        }
    }

    /// Gets the `(row, column)` of the key, or `None` for [KeyCode::NONE].
    pub const fn position(self) -> Option<(u8, u8)> {
        match self.0 {
            0 => None,
            code => Some(((code - 1) / MATRIX_SIZE, (code - 1) % MATRIX_SIZE)),
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn is_pressed(self) -> bool {
        self.0 != 0
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = crate::GpioError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= Self::MAX.0 {
            Ok(KeyCode(value))
        } else {
            Err(crate::GpioError::InvalidArgument)
        }
    }
}

impl Display for KeyCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Drive pattern for the row lines, bit `n` asserting row `n`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RowMask(u8);

impl RowMask {
    pub const NONE: RowMask = RowMask(0);
    pub const ALL: RowMask = RowMask(0b1111);

    /// Gets the mask asserting only `row`.
    ///
    /// # Panics
    /// If `row` is not a row of the matrix.
    pub const fn single(row: u8) -> RowMask {
        assert!(row < MATRIX_SIZE, "row index out of range");
        RowMask(1 << row)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// One sample of the column lines, bit `n` set when column `n` reads active.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ColumnSample(u8);

impl ColumnSample {
    /// Wraps a raw sample. Bits above the matrix width are dropped.
    pub const fn new(bits: u8) -> ColumnSample {
        ColumnSample(bits & 0b1111)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Gets the single active column.
    ///
    /// Columns are matched in increasing order against their own bit. Any other pattern, no
    /// column or several at once, yields `None`.
    pub fn column(self) -> Option<u8> {
        (0..MATRIX_SIZE).find(|&column| self.0 == 1 << column)
    }
}

/// The pin capability a matrix scanner drives.
///
/// Implementations own the row and column lines exclusively. Errors only come from the
/// underlying GPIO backend.
pub trait KeypadPins: Debug {
    /// Makes the row lines outputs and leaves them de-asserted.
    fn configure_rows_as_output(&mut self) -> GpioResult<()>;

    /// Makes the column lines inputs.
    fn configure_columns_as_input(&mut self) -> GpioResult<()>;

    /// Sets the row lines to `mask`. The change is visible to the next column read.
    fn drive_rows(&mut self, mask: RowMask) -> GpioResult<()>;

    /// Samples the column lines.
    fn read_columns(&mut self) -> GpioResult<ColumnSample>;

    /// Blocks for at least `us` microseconds.
    fn delay_microseconds(&mut self, us: u32);
}
