mod app;
mod config;
mod report;
mod utils;

use std::env::var;
use std::fs::OpenOptions;
use std::io::{self, LineWriter, Write};
use dotenv::dotenv;
use eyre::WrapErr;
use log::{debug, error, info};
use keyscan_gpio::GpioBias::PullDown;
use keyscan_gpio::GpioDriveMode::OpenSource;
use keyscan_gpio::GpioDriver;
use keyscan_gpio::delay::SpinDelay;
use keyscan_gpio::keypad::{GpioKeypadPins, MatrixScanner};
use keyscan_gpio::leds::{GpioLeds, LedSink};
use keyscan_gpio::raw::RawGpioDriver;
use crate::app::App;
use crate::config::Config;
use crate::report::Reporter;
use crate::utils::parse_pin_bus;

fn pin_bus_from_env(name: &str) -> eyre::Result<[usize; 4]> {
    let pins = var(name).wrap_err_with(|| format!("{} is not set", name))?;
    parse_pin_bus(&pins).wrap_err_with(|| format!("{} is invalid", name))
}

fn open_driver() -> eyre::Result<RawGpioDriver> {
    let driver = match var("KEYSCAN_GPIO_DEVICE").as_deref() {
        Ok("mem") => RawGpioDriver::new_mem()?,
        Ok("gpiomem") | Err(_) => RawGpioDriver::new_gpiomem()?,
        Ok(other) => eyre::bail!("Unknown GPIO device {:?}, expected gpiomem or mem", other),
    };
    Ok(driver)
}

fn open_output(config: &Config) -> eyre::Result<Box<dyn Write>> {
    match &config.serial_port {
        Some(path) => {
            let port = OpenOptions::new()
                .write(true)
                .open(path)
                .wrap_err_with(|| format!("Cannot open serial port {}", path.display()))?;
            Ok(Box::new(LineWriter::new(port)))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("keyscan starting...");

    let row_pin_nos = pin_bus_from_env("KEYSCAN_KEYPAD_PINS_ROWS")?;
    let col_pin_nos = pin_bus_from_env("KEYSCAN_KEYPAD_PINS_COLS")?;
    let led_pin_nos = pin_bus_from_env("KEYSCAN_LED_PINS")?;

    info!("Keypad @ Rows: {:?}, Cols: {:?}", row_pin_nos, col_pin_nos);
    info!("LEDs @ {:?}", led_pin_nos);

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load()? {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    debug!("{:?}", config);

    debug!("Initializing GPIO driver...");
    let gpio = open_driver()?;
    debug!("{:?} initialized.", gpio);

    debug!("Initializing LEDs...");
    let mut led_bus = gpio.get_pin_bus(led_pin_nos)?;
    let led_out = led_bus.as_output()?;
    let mut leds = GpioLeds::new(&*led_out);
    leds.show(0)?;
    debug!("{:?} initialized.", leds);

    debug!("Initializing keypad driver...");
    let mut row_bus = gpio.get_pin_bus(row_pin_nos)?;
    let mut col_bus = gpio.get_pin_bus(col_pin_nos)?;
    // De-asserted rows float, like the column side of an open switch.
    row_bus.set_drive_mode(OpenSource)?;
    col_bus.set_bias(PullDown)?;
    let pins = GpioKeypadPins::new(&mut *row_bus, &mut *col_bus, SpinDelay);
    let mut keypad = MatrixScanner::init(pins)?.with_settle_delay(config.settle_delay_us);
    debug!("{:?} initialized.", keypad);

    let mut out = open_output(&config)?;
    let reporter = Reporter::new(&mut leds, &mut *out)
        .with_led_overflow(config.led_overflow)
        .with_line_ending(config.line_ending);

    let mut app = App::new(&mut keypad, reporter);

    info!("Starting main loop...");

    let Err(err) = app.run();
    error!("Keypad loop stopped: {}", err);
    Err(err.into())
}
