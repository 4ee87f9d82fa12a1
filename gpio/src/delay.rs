use std::fmt::Debug;
use std::time::Duration;
use spin_sleep::SpinSleeper;

/// A blocking delay source.
pub trait Delay: Debug {
    /// Blocks for at least `us` microseconds.
    fn delay_us(&self, us: u32);
}

/// Busy-waits on the calling thread, accurate down to single microseconds.
#[derive(Copy, Clone, Debug, Default)]
pub struct SpinDelay;

impl Delay for SpinDelay {
    fn delay_us(&self, us: u32) {
        if us == 0 {
            return;
        }
        SpinSleeper::default().sleep(Duration::from_micros(u64::from(us)));
    }
}
