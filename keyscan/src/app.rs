//! The polling loop tying the keypad to the report outputs.

use std::convert::Infallible;
use log::debug;
use keyscan_gpio::GpioResult;
use keyscan_gpio::keypad::{KeyCode, Keypad};
use crate::report::Reporter;

/// The main app state struct.
#[derive(Debug)]
pub struct App<'a> {
    /// The keypad polled on every update.
    keypad: &'a mut dyn Keypad,
    /// Where each scan result goes.
    reporter: Reporter<'a>,
    /// The code seen on the previous update, only used for logging transitions.
    last_code: KeyCode,
}

impl<'a> App<'a> {
    pub fn new(keypad: &'a mut dyn Keypad, reporter: Reporter<'a>) -> App<'a> {
        App {
            keypad,
            reporter,
            last_code: KeyCode::NONE,
        }
    }

    /// Scans the keypad once and reports the result.
    pub fn update(&mut self) -> GpioResult<KeyCode> {
        let code = self.keypad.scan()?;
        if code != self.last_code {
            debug!("Key code {} -> {}", self.last_code, code);
            self.last_code = code;
        }
        self.reporter.report(code)?;
        Ok(code)
    }

    /// Updates forever. Only returns if the GPIO backend fails.
    pub fn run(&mut self) -> GpioResult<Infallible> {
        loop {
            self.update()?;
        }
    }
}
