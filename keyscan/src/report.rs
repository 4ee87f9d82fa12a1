//! Turning key codes into LED patterns and text lines.
use std::fmt::{Debug, Formatter};
use std::io::Write;
use log::warn;
use serde::{Deserialize, Serialize};
use keyscan_gpio::GpioResult;
use keyscan_gpio::keypad::KeyCode;
use keyscan_gpio::leds::LedSink;

/// The text written for each key, indexed by `code - 1`.
pub const KEY_LABELS: [&str; 16] = [
    "KEY0 Pressed",
    "KEY1 Pressed",
    "KEY2 Pressed",
    "KEY3 Pressed",
    "KEY4 Pressed",
    "KEY5 Pressed",
    "KEY6 Pressed",
    "KEY7 Pressed",
    "KEY8 Pressed",
    "KEY9 Pressed",
    "KEY10 Pressed",
    "KEY11 Pressed",
    "KEY12 Pressed",
    "KEY13 Pressed",
    "KEY14 Pressed",
    "KEY15 Pressed",
];

/// Gets the label for a key code, `None` when no key is pressed.
pub fn label(code: KeyCode) -> Option<&'static str> {
    let index = code.value().checked_sub(1)?;
    KEY_LABELS.get(usize::from(index)).copied()
}

/// How a key code is squeezed into the 4-bit LED bank.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedOverflow {
    /// Keep the low four bits, so code 16 shows as all LEDs off.
    #[default]
    Wrap,
    /// Saturate at 15, so code 16 shows as all LEDs on.
    Clamp,
}

impl LedOverflow {
    pub fn apply(self, code: KeyCode) -> u8 {
        match self {
            LedOverflow::Wrap => code.value() & 0b1111,
            LedOverflow::Clamp => code.value().min(0b1111),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Echoes key codes onto the LEDs and writes a label line for every pressed key.
pub struct Reporter<'a> {
    leds: &'a mut dyn LedSink,
    out: &'a mut dyn Write,
    led_overflow: LedOverflow,
    line_ending: LineEnding,
}

impl Debug for Reporter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reporter({:?}, {:?}, {:?})", self.leds, self.led_overflow, self.line_ending)
    }
}

impl<'a> Reporter<'a> {
    pub fn new(leds: &'a mut dyn LedSink, out: &'a mut dyn Write) -> Self {
        Reporter {
            leds,
            out,
            led_overflow: LedOverflow::default(),
            line_ending: LineEnding::default(),
        }
    }

    pub fn with_led_overflow(mut self, led_overflow: LedOverflow) -> Self {
        self.led_overflow = led_overflow;
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Reports one scan result.
    ///
    /// The text output is best-effort: a failed write is logged and otherwise ignored. LED
    /// failures come from the GPIO backend and are returned.
    pub fn report(&mut self, code: KeyCode) -> GpioResult<()> {
        self.leds.show(self.led_overflow.apply(code))?;

        let Some(label) = label(code) else {
            return Ok(());
        };
        let written = self.out
            .write_all(label.as_bytes())
            .and_then(|()| self.out.write_all(self.line_ending.as_str().as_bytes()))
            .and_then(|()| self.out.flush());
        if let Err(err) = written {
            warn!("Failed to write {:?}: {}", label, err);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyscan_gpio::sim::SimLeds;
    use std::io;

    fn code(value: u8) -> KeyCode {
        KeyCode::try_from(value).unwrap()
    }

    #[test]
    fn labels_count_from_zero() {
        assert_eq!(label(KeyCode::NONE), None);
        assert_eq!(label(code(1)), Some("KEY0 Pressed"));
        assert_eq!(label(code(11)), Some("KEY10 Pressed"));
        assert_eq!(label(code(16)), Some("KEY15 Pressed"));
    }

    #[test]
    fn overflow_policies() {
        assert_eq!(LedOverflow::Wrap.apply(code(5)), 0b0101);
        assert_eq!(LedOverflow::Clamp.apply(code(5)), 0b0101);
        assert_eq!(LedOverflow::Wrap.apply(code(16)), 0);
        assert_eq!(LedOverflow::Clamp.apply(code(16)), 0b1111);
        assert_eq!(LedOverflow::Wrap.apply(KeyCode::NONE), 0);
    }

    #[test]
    fn pressed_key_writes_a_line() {
        let mut leds = SimLeds::new();
        let mut out = Vec::<u8>::new();
        let mut reporter = Reporter::new(&mut leds, &mut out);

        reporter.report(code(1)).unwrap();
        drop(reporter);

        assert_eq!(out, b"KEY0 Pressed\n");
        assert_eq!(leds.current(), 1);
    }

    #[test]
    fn no_key_only_updates_leds() {
        let mut leds = SimLeds::new();
        let mut out = Vec::<u8>::new();
        let mut reporter = Reporter::new(&mut leds, &mut out);

        reporter.report(code(3)).unwrap();
        reporter.report(KeyCode::NONE).unwrap();
        drop(reporter);

        assert_eq!(out, b"KEY2 Pressed\n");
        assert_eq!(leds.history(), [3, 0]);
    }

    #[test]
    fn crlf_line_ending() {
        let mut leds = SimLeds::new();
        let mut out = Vec::<u8>::new();
        let mut reporter = Reporter::new(&mut leds, &mut out).with_line_ending(LineEnding::CrLf);
        reporter.report(code(16)).unwrap();
        drop(reporter);

        assert_eq!(out, b"KEY15 Pressed\r\n");
        assert_eq!(leds.current(), 0);
    }

    #[derive(Debug)]
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn text_failures_do_not_stop_reporting() {
        let mut leds = SimLeds::new();
        let mut out = BrokenPipe;
        let mut reporter = Reporter::new(&mut leds, &mut out).with_led_overflow(LedOverflow::Clamp);
        assert!(reporter.report(code(16)).is_ok());
        drop(reporter);
        assert_eq!(leds.current(), 0b1111);
    }
}
