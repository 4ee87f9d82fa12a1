use log::debug;
use crate::GpioResult;
use crate::keypad::{ColumnSample, KeyCode, Keypad, KeypadPins, RowMask, MATRIX_SIZE};

/// Scans a diode-less matrix keypad one row at a time.
///
/// A scan first asserts every row at once and gives up immediately if no column reacts, so an
/// idle keypad costs a single column read. Otherwise the rows are strobed one by one, waiting
/// [settle_delay_us](Self::settle_delay_us) after each before sampling, until a row shows a
/// closed switch. Rows are always left de-asserted when the scan returns.
///
/// Anything that does not resolve to exactly one column in the first active row, including
/// ghosting in the matrix, is reported as [KeyCode::NONE] rather than a guess.
#[derive(Debug)]
pub struct MatrixScanner<P: KeypadPins> {
    pins: P,
    settle_delay_us: u32,
}

impl<P: KeypadPins> MatrixScanner<P> {
    pub const DEFAULT_SETTLE_DELAY_US: u32 = 1;

    /// Creates a scanner over pins that are already configured.
    pub fn new(pins: P) -> Self {
        MatrixScanner {
            pins,
            settle_delay_us: Self::DEFAULT_SETTLE_DELAY_US,
        }
    }

    /// Configures the row and column lines, then creates a scanner over them.
    pub fn init(mut pins: P) -> GpioResult<Self> {
        pins.configure_rows_as_output()?;
        pins.configure_columns_as_input()?;
        Ok(Self::new(pins))
    }

    pub fn with_settle_delay(mut self, us: u32) -> Self {
        self.settle_delay_us = us;
        self
    }

    pub fn settle_delay_us(&self) -> u32 {
        self.settle_delay_us
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    /// Drives the rows and reports what the columns showed. Leaves rows asserted.
    fn strobe(&mut self) -> GpioResult<Strobe> {
        self.pins.drive_rows(RowMask::ALL)?;
        let any = self.pins.read_columns()?;
        if any.is_empty() {
            return Ok(Strobe::Idle);
        }

        self.pins.drive_rows(RowMask::NONE)?;
        for row in 0..MATRIX_SIZE {
            self.pins.drive_rows(RowMask::single(row))?;
            self.pins.delay_microseconds(self.settle_delay_us);
            let sample = self.pins.read_columns()?;
            if !sample.is_empty() {
                return Ok(Strobe::Row(row, sample));
            }
        }

        Ok(Strobe::Unmatched(any))
    }
}

enum Strobe {
    /// No column reacted with every row asserted.
    Idle,
    /// Some column reacted with every row asserted, but with none of them alone.
    Unmatched(ColumnSample),
    /// The first row, in scan order, with a reacting column.
    Row(u8, ColumnSample),
}

impl<P: KeypadPins> Keypad for MatrixScanner<P> {
    fn scan(&mut self) -> GpioResult<KeyCode> {
        let strobe = self.strobe();
        let released = self.pins.drive_rows(RowMask::NONE);
        let strobe = strobe?;
        released?;

        match strobe {
            Strobe::Idle => Ok(KeyCode::NONE),
            Strobe::Unmatched(any) => {
                debug!("Columns {:04b} active with all rows, but with no single row", any.bits());
                Ok(KeyCode::NONE)
            }
            Strobe::Row(row, sample) => match sample.column() {
                Some(column) => Ok(KeyCode::from_position(row, column).unwrap_or(KeyCode::NONE)),
                None => {
                    debug!("Ambiguous columns {:04b} on row {}", sample.bits(), row);
                    Ok(KeyCode::NONE)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimKeyMatrix;
    use proptest::prelude::*;

    fn scanner_with(pressed: &[(u8, u8)]) -> MatrixScanner<SimKeyMatrix> {
        let mut matrix = SimKeyMatrix::new();
        for &(row, column) in pressed {
            matrix.press(row, column);
        }
        let mut scanner = MatrixScanner::init(matrix).unwrap();
        scanner.pins_mut().clear_log();
        scanner
    }

    #[test]
    fn init_configures_lines_and_idles_rows() {
        let scanner = MatrixScanner::init(SimKeyMatrix::new()).unwrap();
        let matrix = scanner.pins();
        assert!(matrix.rows_configured());
        assert!(matrix.columns_configured());
        assert_eq!(matrix.rows(), RowMask::NONE);
    }

    #[test]
    fn every_key_scans_to_its_own_code() {
        let mut seen = Vec::new();
        for row in 0..4 {
            for column in 0..4 {
                let mut scanner = scanner_with(&[(row, column)]);
                let code = scanner.scan().unwrap();
                assert_eq!(code.value(), row * 4 + column + 1);
                assert_eq!(code.position(), Some((row, column)));
                seen.push(code.value());
            }
        }
        seen.sort();
        assert_eq!(seen, (1..=16).collect::<Vec<u8>>());
    }

    #[test]
    fn idle_keypad_takes_the_fast_path() {
        let mut scanner = scanner_with(&[]);
        assert_eq!(scanner.scan().unwrap(), KeyCode::NONE);

        let matrix = scanner.pins();
        assert_eq!(matrix.row_drives(), [RowMask::ALL, RowMask::NONE]);
        assert_eq!(matrix.column_reads(), 1);
        assert!(matrix.delays().is_empty());
    }

    #[test]
    fn two_keys_in_one_row_are_ambiguous() {
        let mut scanner = scanner_with(&[(2, 0), (2, 3)]);
        assert_eq!(scanner.scan().unwrap(), KeyCode::NONE);
        assert_eq!(scanner.pins().rows(), RowMask::NONE);
    }

    #[test]
    fn ghosted_key_is_not_guessed() {
        // (0, 1), (1, 1) and (1, 0) close a path from row 0 to column 0.
        let mut scanner = scanner_with(&[(0, 1), (1, 1), (1, 0)]);
        assert_eq!(scanner.scan().unwrap(), KeyCode::NONE);
    }

    #[test]
    fn first_row_wins_when_columns_differ() {
        let mut scanner = scanner_with(&[(3, 2), (1, 0)]);
        assert_eq!(scanner.scan().unwrap(), KeyCode::from_position(1, 0).unwrap());
    }

    #[test]
    fn press_on_last_row_waits_for_every_row() {
        let mut scanner = scanner_with(&[(3, 1)]).with_settle_delay(5);
        assert_eq!(scanner.scan().unwrap().value(), 14);

        let matrix = scanner.pins();
        assert_eq!(matrix.delays(), [5, 5, 5, 5]);
        assert_eq!(
            matrix.row_drives(),
            [
                RowMask::ALL,
                RowMask::NONE,
                RowMask::single(0),
                RowMask::single(1),
                RowMask::single(2),
                RowMask::single(3),
                RowMask::NONE,
            ]
        );
    }

    #[test]
    fn press_on_first_row_stops_strobing_early() {
        let mut scanner = scanner_with(&[(0, 2)]);
        assert_eq!(scanner.scan().unwrap().value(), 3);
        assert_eq!(scanner.pins().delays(), [MatrixScanner::<SimKeyMatrix>::DEFAULT_SETTLE_DELAY_US]);
        assert_eq!(scanner.pins().column_reads(), 2);
    }

    #[test]
    fn repeated_scans_agree_and_release_rows() {
        let mut scanner = scanner_with(&[(1, 3)]);
        let first = scanner.scan().unwrap();
        assert_eq!(scanner.pins().rows(), RowMask::NONE);
        let second = scanner.scan().unwrap();
        assert_eq!(scanner.pins().rows(), RowMask::NONE);
        assert_eq!(first, second);
        assert_eq!(first.value(), 8);
    }

    #[test]
    fn release_is_seen_on_the_next_scan() {
        let mut scanner = scanner_with(&[(2, 2)]);
        assert_eq!(scanner.scan().unwrap().value(), 11);
        scanner.pins_mut().release_all();
        assert_eq!(scanner.scan().unwrap(), KeyCode::NONE);
    }

    proptest! {
        #[test]
        fn single_press_never_costs_more_than_four_settles(row in 0u8..4, column in 0u8..4, settle in 0u32..100) {
            let mut scanner = scanner_with(&[(row, column)]).with_settle_delay(settle);
            let code = scanner.scan().unwrap();
            prop_assert_eq!(code, KeyCode::from_position(row, column).unwrap());

            let delays = scanner.pins().delays();
            prop_assert_eq!(delays.len(), usize::from(row) + 1);
            prop_assert!(delays.iter().all(|&us| us == settle));
            prop_assert_eq!(scanner.pins().rows(), RowMask::NONE);
        }

        #[test]
        fn same_row_chords_always_read_as_no_key(row in 0u8..4, a in 0u8..4, b in 0u8..4) {
            prop_assume!(a != b);
            let mut scanner = scanner_with(&[(row, a), (row, b)]);
            prop_assert_eq!(scanner.scan().unwrap(), KeyCode::NONE);
        }
    }
}
