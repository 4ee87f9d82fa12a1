//! Memory-mapped driver for the BCM2711 GPIO block found on the Raspberry Pi 4.
use crate::{
    GpioActiveLevel, GpioBias, GpioBus, GpioBusInput, GpioBusOutput, GpioDriveMode, GpioDriver,
    GpioError, GpioResult,
};
use bitvec::vec::BitVec;
use log::trace;
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU8;

/// Function select value of a line. Only the two plain GPIO functions are used here.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
enum PinFunction {
    Input = 0b000,
    Output = 0b001,
}

/// Drives GPIO lines by writing the BCM2711 registers directly.
///
/// Bias is set through `GPIO_PUP_PDN_CNTRL`, which only the BCM2711 has. Older SoCs (Pi 3 and
/// earlier) use a different pull-up/down sequence, and on them `set_bias` would leave the lines
/// floating, so this driver must not be used there.
pub struct RawGpioDriver {
    mmap: MmapRaw,
    used_pins: BitVec<AtomicU8>,
}

impl RawGpioDriver {
    /// Peripheral base of the GPIO block as seen through `/dev/mem` (BCM2711, low peripheral mode).
    const GPIO_BASE: u64 = 0xFE20_0000;
    const BLOCK_LEN: usize = 4096;

    const PIN_COUNT: usize = 58;

    // Word offsets into the register block.
    const GPFSEL: usize = 0x00 / 4;
    const GPSET: usize = 0x1C / 4;
    const GPCLR: usize = 0x28 / 4;
    const GPLEV: usize = 0x34 / 4;
    const GPIO_PUP_PDN_CNTRL: usize = 0xE4 / 4;

    fn create(path: &str, offset: u64) -> GpioResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let mmap = MmapOptions::new()
            .offset(offset)
            .len(Self::BLOCK_LEN)
            .map_raw(&file)?;

        Ok(Self::from_mmap(mmap))
    }

    fn from_mmap(mmap: MmapRaw) -> Self {
        debug_assert!(mmap.len() >= Self::BLOCK_LEN);
        RawGpioDriver {
            mmap,
            used_pins: BitVec::repeat(false, Self::PIN_COUNT),
        }
    }

    /// Maps the GPIO block through `/dev/gpiomem`, which exposes only that block and does not
    /// require root.
    pub fn new_gpiomem() -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0)
    }

    /// Maps the GPIO block through `/dev/mem`.
    pub fn new_mem() -> GpioResult<Self> {
        Self::create("/dev/mem", Self::GPIO_BASE)
    }

    fn check_pin(pin_index: usize) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }
        Ok(())
    }

    fn register(&self, word: usize) -> *mut u32 {
        debug_assert!(word * 4 < Self::BLOCK_LEN);
        // SAFETY: every word offset used by this driver lies inside the mapped block.
        unsafe { (self.mmap.as_mut_ptr() as *mut u32).add(word) }
    }

    fn read_register(&self, word: usize) -> u32 {
        // SAFETY: see `register`; the block is device memory and must be accessed volatilely.
        unsafe { self.register(word).read_volatile() }
    }

    fn write_register(&self, word: usize, value: u32) {
        // SAFETY: see `register`.
        unsafe { self.register(word).write_volatile(value) }
    }

    fn set_pin_function(&self, pin_index: usize, function: PinFunction) -> GpioResult<()> {
        Self::check_pin(pin_index)?;

        let word = Self::GPFSEL + pin_index / 10;
        let shift = (pin_index % 10) * 3;

        let mut value = self.read_register(word);
        value &= !(0b111 << shift);
        value |= (function as u32) << shift;
        self.write_register(word, value);

        Ok(())
    }

    /// Drives the given pins in one go, at most one GPSET and one GPCLR write per bank.
    fn set_levels(&self, pins: impl IntoIterator<Item = (usize, bool)>) -> GpioResult<()> {
        let mut set = [0u32; 2];
        let mut clear = [0u32; 2];
        for (pin_index, high) in pins {
            Self::check_pin(pin_index)?;
            let masks = if high { &mut set } else { &mut clear };
            masks[pin_index / 32] |= 1 << (pin_index % 32);
        }

        for bank in 0..2 {
            if set[bank] != 0 {
                self.write_register(Self::GPSET + bank, set[bank]);
            }
            if clear[bank] != 0 {
                self.write_register(Self::GPCLR + bank, clear[bank]);
            }
        }

        Ok(())
    }

    /// Samples the level registers once and picks the given pins out of them.
    fn get_levels<const N: usize>(&self, pin_indices: &[usize; N]) -> GpioResult<[bool; N]> {
        for &pin_index in pin_indices {
            Self::check_pin(pin_index)?;
        }

        let banks = [
            self.read_register(Self::GPLEV),
            self.read_register(Self::GPLEV + 1),
        ];

        let mut levels = [false; N];
        for (level, &pin_index) in levels.iter_mut().zip(pin_indices) {
            *level = (banks[pin_index / 32] >> (pin_index % 32)) & 1 != 0;
        }
        Ok(levels)
    }

    fn set_bias(&self, pin_index: usize, bias: GpioBias) -> GpioResult<()> {
        Self::check_pin(pin_index)?;

        let bias_value = match bias {
            GpioBias::None => 0b00,
            GpioBias::PullUp => 0b01,
            GpioBias::PullDown => 0b10,
        };

        let word = Self::GPIO_PUP_PDN_CNTRL + pin_index / 16;
        let shift = (pin_index % 16) * 2;
        let mut value = self.read_register(word);
        value &= !(0b11 << shift);
        value |= bias_value << shift;
        self.write_register(word, value);

        Ok(())
    }

    fn get_bias(&self, pin_index: usize) -> GpioResult<GpioBias> {
        Self::check_pin(pin_index)?;

        let word = Self::GPIO_PUP_PDN_CNTRL + pin_index / 16;
        let shift = (pin_index % 16) * 2;
        match (self.read_register(word) >> shift) & 0b11 {
            0b00 => Ok(GpioBias::None),
            0b01 => Ok(GpioBias::PullUp),
            0b10 => Ok(GpioBias::PullDown),
            _ => Err(GpioError::NotSupported),
        }
    }

    fn reset(&self, pin_index: usize) -> GpioResult<()> {
        self.set_pin_function(pin_index, PinFunction::Input)?;
        self.set_bias(pin_index, GpioBias::None)?;
        self.set_levels([(pin_index, false)])?;
        Ok(())
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?})", self.mmap.as_ptr().addr())
    }
}

impl GpioDriver for RawGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(Self::PIN_COUNT)
    }

    fn get_pin_bus<const N: usize>(&self, indices: [usize; N]) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        let n = self.count()?;

        if indices.iter().any(|&index| index >= n) {
            return Err(GpioError::InvalidArgument);
        }

        if indices.iter().any(|&index| self.used_pins[index]) {
            return Err(GpioError::AlreadyInUse);
        }

        for &index in &indices {
            self.used_pins.set_aliased(index, true);
            self.reset(index)?;
        }

        Ok(Box::new(RawGpioBus {
            driver: self,
            pin_indices: indices,
            active_level: GpioActiveLevel::High,
            drive_mode: GpioDriveMode::PushPull,
        }))
    }
}

struct RawGpioBus<'a, const N: usize> {
    driver: &'a RawGpioDriver,
    pin_indices: [usize; N],
    active_level: GpioActiveLevel,
    drive_mode: GpioDriveMode,
}

impl<const N: usize> Debug for RawGpioBus<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.pin_indices)
    }
}

impl<const N: usize> GpioBus<N> for RawGpioBus<'_, N> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>> {
        for &pin_index in &self.pin_indices {
            self.driver.set_pin_function(pin_index, PinFunction::Input)?;
        }
        Ok(Box::new(RawGpioBusInput { bus: self }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        // Floating modes pick the function per line on every write instead.
        if self.drive_mode == GpioDriveMode::PushPull {
            for &pin_index in &self.pin_indices {
                self.driver.set_pin_function(pin_index, PinFunction::Output)?;
            }
        }
        Ok(Box::new(RawGpioBusOutput { bus: self }))
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        Ok(())
    }

    fn bias(&self) -> GpioBias {
        self.driver.get_bias(self.pin_indices[0]).unwrap_or(GpioBias::None)
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        for &pin_index in &self.pin_indices {
            self.driver.set_bias(pin_index, bias)?;
        }
        Ok(())
    }

    fn drive_mode(&self) -> GpioDriveMode {
        self.drive_mode
    }

    fn set_drive_mode(&mut self, mode: GpioDriveMode) -> GpioResult<()> {
        self.drive_mode = mode;
        Ok(())
    }
}

impl<const N: usize> Drop for RawGpioBus<'_, N> {
    fn drop(&mut self) {
        for &pin_index in &self.pin_indices {
            _ = self.driver.set_pin_function(pin_index, PinFunction::Input);
            self.driver.used_pins.set_aliased(pin_index, false);
        }
    }
}

struct RawGpioBusInput<'a, const N: usize> {
    bus: &'a RawGpioBus<'a, N>,
}

impl<const N: usize> Debug for RawGpioBusInput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.bus)
    }
}

impl<const N: usize> GpioBusInput<N> for RawGpioBusInput<'_, N> {
    fn read(&self) -> GpioResult<[bool; N]> {
        let levels = self.bus.driver.get_levels(&self.bus.pin_indices)?;
        Ok(levels.map(|level| self.bus.active_level.get_state(level)))
    }
}

struct RawGpioBusOutput<'a, const N: usize> {
    bus: &'a RawGpioBus<'a, N>,
}

impl<const N: usize> Debug for RawGpioBusOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.bus)
    }
}

impl<const N: usize> GpioBusOutput<N> for RawGpioBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        let bus = self.bus;
        let states = (*values).map(|value| bus.drive_mode.get_state(bus.active_level.get_state(value)));
        trace!("{:?} <- {:?}", bus, states);

        if bus.drive_mode == GpioDriveMode::PushPull {
            return bus.driver.set_levels(
                bus.pin_indices
                    .iter()
                    .zip(states)
                    .map(|(&pin_index, state)| (pin_index, state.unwrap_or_default())),
            );
        }

        // Release floating lines first so two lines are never driven against each other.
        for (&pin_index, state) in bus.pin_indices.iter().zip(states) {
            if state.is_none() {
                bus.driver.set_pin_function(pin_index, PinFunction::Input)?;
            }
        }
        bus.driver.set_levels(
            bus.pin_indices
                .iter()
                .zip(states)
                .filter_map(|(&pin_index, state)| state.map(|high| (pin_index, high))),
        )?;
        for (&pin_index, state) in bus.pin_indices.iter().zip(states) {
            if state.is_some() {
                bus.driver.set_pin_function(pin_index, PinFunction::Output)?;
            }
        }

        Ok(())
    }
}
