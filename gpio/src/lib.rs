pub mod delay;
pub mod keypad;
pub mod leds;
pub mod raw;
pub mod sim;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Claims the GPIO pins at the given indices as a single bus.
    ///
    /// Line `i` of the bus is `indices[i]`, so bit `i` of any packed value refers to it.
    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>>;
}

/// Specifies the active level of a GPIO line.
///
/// By default, the active level is high.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default] High,
    Low,
}

impl GpioActiveLevel {
    /// Gets the electrical level for a logical value, or the logical value for an electrical level.
    pub fn get_state(&self, value: bool) -> bool {
        match self {
            GpioActiveLevel::High => value,
            GpioActiveLevel::Low => !value,
        }
    }
}

/// Specifies the bias of a GPIO line.
///
/// Column lines of a matrix keypad need one so that an open switch reads as inactive.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

/// Specifies the drive mode of a GPIO line in output mode.
///
/// Push-pull drives both levels. Open-drain and open-source leave the line floating when it is
/// high or low, respectively, which backends may implement by switching the line to input.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioDriveMode {
    /// The line is driven high or low with low impedance.
    #[default] PushPull,
    /// The line is driven low or left floating when high.
    OpenDrain,
    /// The line is driven high or left floating when low.
    OpenSource,
}

impl GpioDriveMode {
    /// Gets the real state of the line for the given electrical level.
    ///
    /// # Returns
    /// - `Some(true)` if the line will be driven high.
    /// - `Some(false)` if the line will be driven low.
    /// - `None` if the line will be left floating.
    pub fn get_state(&self, value: bool) -> Option<bool> {
        match self {
            GpioDriveMode::PushPull => Some(value),
            GpioDriveMode::OpenDrain => if value { None } else { Some(false) },
            GpioDriveMode::OpenSource => if value { Some(true) } else { None },
        }
    }
}

/// A group of `N` GPIO lines that switch direction together.
pub trait GpioBus<const N: usize>: Debug {
    /// Sets every line of the bus to input. Calling it again is harmless.
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>>;
    /// Sets every line of the bus to output. Calling it again is harmless.
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>>;

    fn active_level(&self) -> GpioActiveLevel {
        GpioActiveLevel::High
    }
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    fn bias(&self) -> GpioBias {
        GpioBias::None
    }
    fn set_bias(&mut self, _bias: GpioBias) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    fn drive_mode(&self) -> GpioDriveMode {
        GpioDriveMode::PushPull
    }
    fn set_drive_mode(&mut self, _mode: GpioDriveMode) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

pub trait GpioBusInput<const N: usize>: Debug {
    /// Samples every line of the bus at call time.
    fn read(&self) -> GpioResult<[bool; N]>;
}

impl<const N: usize> dyn GpioBusInput<N> + '_ {
    /// Reads the lines of the bus packed into a byte, LSb first.
    pub fn read_bits(&self) -> GpioResult<u8> {
        if N > 8 {
            return Err(GpioError::InvalidArgument);
        }
        Ok(pack_bits(&self.read()?))
    }
}

pub trait GpioBusOutput<const N: usize>: Debug {
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;
}

impl<const N: usize> dyn GpioBusOutput<N> + '_ {
    /// Writes a byte to the lines of the bus, LSb first.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if `value` does not fit in `N` bits.
    pub fn write_bits(&self, value: u8) -> GpioResult<()> {
        if N > 8 || (N < 8 && value >> N != 0) {
            return Err(GpioError::InvalidArgument);
        }
        self.write(&unpack_bits(value))
    }
}

pub(crate) fn pack_bits<const N: usize>(values: &[bool; N]) -> u8 {
    values
        .iter()
        .enumerate()
        .filter(|&(_, &value)| value)
        .fold(0u8, |bits, (i, _)| bits | 1 << i)
}

pub(crate) fn unpack_bits<const N: usize>(value: u8) -> [bool; N] {
    let mut values = [false; N];
    for (i, line) in values.iter_mut().enumerate() {
        *line = value & (1 << i) != 0;
    }
    values
}
