use std::num::ParseIntError;
use thiserror::Error;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PinListError {
    #[error("invalid pin number {0:?}: {1}")]
    InvalidNumber(String, ParseIntError),
    #[error("expected {expected} pins, got {actual}")]
    WrongCount { expected: usize, actual: usize },
}

/// Parses a list of pin numbers separated by commas, semicolons or spaces, e.g. `"5, 6, 13, 19"`.
pub fn parse_pin_bus<const N: usize>(pin_str: &str) -> Result<[usize; N], PinListError> {
    let pins = pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|err| PinListError::InvalidNumber(s.to_string(), err)))
        .collect::<Result<Vec<usize>, _>>()?;

    let actual = pins.len();
    pins.try_into()
        .map_err(|_| PinListError::WrongCount { expected: N, actual })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_mixed_separators() {
        assert_eq!(parse_pin_bus::<4>("5, 6;13 19"), Ok([5, 6, 13, 19]));
        assert_eq!(parse_pin_bus::<4>(" 1,2,3,4 "), Ok([1, 2, 3, 4]));
    }

    #[test]
    fn rejects_wrong_count() {
        assert_eq!(
            parse_pin_bus::<4>("1, 2, 3"),
            Err(PinListError::WrongCount { expected: 4, actual: 3 })
        );
        assert!(matches!(
            parse_pin_bus::<4>(""),
            Err(PinListError::WrongCount { actual: 0, .. })
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_pin_bus::<4>("1, 2, x, 4"),
            Err(PinListError::InvalidNumber(s, _)) if s == "x"
        ));
    }
}
