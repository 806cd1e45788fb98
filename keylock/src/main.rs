use std::env::var;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use dotenv::dotenv;
use log::{debug, error, info, warn};
use keylock::config::Config;
use keylock::orchestrator::UnlockOrchestrator;
use keylock::validator::ConfigPasscodes;
use keylock_gpio::gpiod::GpiodInterruptLine;
use keylock_gpio::keypad::Sx1509Keypad;
use keylock_gpio::sx1509::DEFAULT_ADDRESS;
use keylock_gpio::{I2cRegisterBus, InterruptLine, SharedBus, Signal};

/// Parses an I²C address, either hexadecimal (`0x3E`) or decimal (`62`).
fn parse_address(address: &str) -> eyre::Result<u8> {
    let address = address.trim();
    let parsed = match address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16)?,
        None => address.parse()?,
    };
    if parsed > 0x7F {
        eyre::bail!("I2C address 0x{:02X} is out of the 7-bit range", parsed);
    }
    Ok(parsed)
}

/// Watches a forced unlock button, treating each press as a remote unlock.
fn spawn_forced_unlock(chip: &str, pin: u32, remote: Arc<Signal>) -> eyre::Result<()> {
    let mut line = GpiodInterruptLine::open(chip, pin)?;
    debug!("{:?} initialized.", line);

    thread::Builder::new()
        .name("forced-unlock".to_string())
        .spawn(move || loop {
            if let Err(err) = line.wait_falling_edge() {
                error!("Forced unlock line failed: {}", err);
                return;
            }
            info!("Forced unlock requested.");
            remote.set();
        })?;
    Ok(())
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    // Every setting has a default, so a missing `.env` is fine.
    dotenv().ok();
    pretty_env_logger::init();

    info!("KeyLock starting...");

    // Get bus and pin settings from env
    let i2c_device = var("KEYLOCK_I2C_DEVICE").unwrap_or_else(|_| "/dev/i2c-1".to_string());
    let i2c_address = match var("KEYLOCK_I2C_ADDRESS") {
        Ok(address) => parse_address(&address)?,
        Err(_) => DEFAULT_ADDRESS,
    };
    let gpio_chip = var("KEYLOCK_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
    let interrupt_pin: u32 = match var("KEYLOCK_INTERRUPT_PIN") {
        Ok(pin) => pin.parse()?,
        Err(_) => 4,
    };
    let forced_unlock_pin: Option<u32> = var("KEYLOCK_FORCED_UNLOCK_PIN")
        .ok()
        .map(|pin| pin.parse())
        .transpose()?;

    info!("SX1509 @ {} 0x{:02X}, interrupt: {}[{}]", i2c_device, i2c_address, gpio_chip, interrupt_pin);

    debug!("Trying to load config...");
    let config_path = Config::path();
    let config = if let Some(config) = Config::try_load(&config_path)? {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save(&config_path)?;
        info!("Default config saved.");
        config
    };
    debug!("{} passcodes configured.", config.passcodes.len());

    debug!("Initializing keypad driver...");
    let bus = SharedBus::new(I2cRegisterBus::open(&i2c_device, i2c_address)?);
    let keypad = Sx1509Keypad::init(bus, config.keypad())?;
    debug!("{:?} initialized.", keypad);

    let interrupt_line = GpiodInterruptLine::open(&gpio_chip, interrupt_pin)?;
    debug!("{:?} initialized.", interrupt_line);
    let _keypad_worker = keypad.spawn_interrupt_worker(interrupt_line)?;

    let remote = Arc::new(Signal::new());
    match forced_unlock_pin {
        Some(pin) => spawn_forced_unlock(&gpio_chip, pin, Arc::clone(&remote))?,
        None => warn!("No forced unlock pin configured; remote unlocks only."),
    }

    let mut orchestrator = UnlockOrchestrator::new(
        keypad,
        ConfigPasscodes::new(config.passcodes.clone()),
        remote,
        config.orchestrator(),
    );
    let handle = orchestrator.handle();
    let orchestrator_thread = thread::Builder::new()
        .name("orchestrator".to_string())
        .spawn(move || orchestrator.run())?;

    info!("KeyLock initialized.");

    // Act as the door: release on unlock, then acknowledge so the next cycle can start.
    while !orchestrator_thread.is_finished() {
        if !handle.wait_unlocked(Duration::from_secs(15)) {
            continue;
        }
        info!("Door released.");
        thread::sleep(config.consumer_hold());
        handle.clear_unlock_hold()?;
        info!("Door locked.");
    }

    match orchestrator_thread.join() {
        Ok(result) => Ok(result?),
        Err(_) => eyre::bail!("orchestrator thread panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_decimal_addresses() {
        assert_eq!(parse_address("0x3E").unwrap(), 0x3E);
        assert_eq!(parse_address("0X3f").unwrap(), 0x3F);
        assert_eq!(parse_address(" 62 ").unwrap(), 62);
    }

    #[test]
    fn rejects_invalid_addresses() {
        assert!(parse_address("0x80").is_err());
        assert!(parse_address("0xZZ").is_err());
        assert!(parse_address("").is_err());
    }
}
