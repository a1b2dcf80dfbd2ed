use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use log::{debug, error, trace};
use thiserror::Error;

use crate::chip::{
    chip8::Chip8,
    config::{Config, ConfigError},
    Chip, ChipError, LoadProgramError,
};

/// The one-shot signal emitted when the sound timer runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beep;

/// Receives the beeps of the timer driver.
pub trait Audio: Send + Sync + 'static {
    fn beep(&self);
}

/// Swallows all beeps.
pub struct Mute;

impl Audio for Mute {
    fn beep(&self) {}
}

impl Audio for Sender<Beep> {
    fn beep(&self) {
        if self.send(Beep).is_err() {
            trace!("beep without listener");
        }
    }
}

/// Error type for errors that occur while controlling a [`Machine`].
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("could not spawn driver thread")]
    Spawn(#[from] io::Error),

    #[error(transparent)]
    Load(#[from] LoadProgramError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The running driver threads and the channel that stops them.
struct Drivers {
    /// Never sent on. Dropping it disconnects the channel and stops the drivers.
    stop: Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

/// Drives a chip with two threads: the instruction driver runs one cycle per
/// cycle period and the timer driver runs one timer tick per timer period.
/// The chip sits behind a single mutex, so cycles, ticks and renderer reads
/// are never interleaved.
pub struct Machine<C>
where
    C: Chip + Send + 'static,
{
    chip: Arc<Mutex<C>>,
    config: Config,
    audio: Arc<dyn Audio>,
    fault_sender: Sender<ChipError>,
    fault_receiver: Receiver<ChipError>,
    drivers: Option<Drivers>,
}

impl Machine<Chip8> {
    /// Creates a machine around a fresh CHIP-8 set up according to `config`.
    pub fn chip8(config: Config) -> Result<Self, MachineError> {
        Machine::new(Chip8::new(), config)
    }
}

impl<C> Machine<C>
where
    C: Chip + Send + 'static,
{
    /// Creates a machine with muted audio. The drivers are not started.
    pub fn new(chip: C, config: Config) -> Result<Self, MachineError> {
        Self::with_audio(chip, config, Mute)
    }

    /// Creates a machine that sends beeps to `audio`. The opcode policy of
    /// `config` is applied to the chip. The drivers are not started.
    pub fn with_audio<A: Audio>(
        mut chip: C,
        config: Config,
        audio: A,
    ) -> Result<Self, MachineError> {
        config.validate()?;
        chip.set_strict_opcodes(config.strict_opcodes);
        let (fault_sender, fault_receiver) = unbounded();
        Ok(Machine {
            chip: Arc::new(Mutex::new(chip)),
            config,
            audio: Arc::new(audio),
            fault_sender,
            fault_receiver,
            drivers: None,
        })
    }

    /// Spawns the instruction and the timer driver. Does nothing if they are
    /// already running.
    pub fn start(&mut self) -> Result<(), MachineError> {
        if self.drivers.is_some() {
            return Ok(());
        }

        let (stop, stop_receiver) = bounded::<()>(0);

        let chip = Arc::clone(&self.chip);
        let faults = self.fault_sender.clone();
        let instruction_driver = spawn_driver(
            "instruction-driver",
            self.config.cycle_period(),
            stop_receiver.clone(),
            move || {
                let result = lock(&chip).cycle();
                if let Err(fault) = result {
                    if faults.send(fault).is_err() {
                        trace!("fault without listener");
                    }
                }
            },
        )?;

        let chip = Arc::clone(&self.chip);
        let audio = Arc::clone(&self.audio);
        let timer_driver = spawn_driver(
            "timer-driver",
            self.config.timer_period(),
            stop_receiver,
            move || {
                let beep = lock(&chip).tick_timers();
                if beep {
                    audio.beep();
                }
            },
        );

        let timer_driver = match timer_driver {
            Ok(handle) => handle,
            Err(e) => {
                drop(stop);
                join(instruction_driver);
                return Err(e.into());
            }
        };

        debug!(
            "started drivers at {} Hz and {} Hz",
            self.config.cycles_per_second, self.config.timers_per_second
        );
        self.drivers = Some(Drivers {
            stop,
            handles: vec![instruction_driver, timer_driver],
        });
        Ok(())
    }

    /// Stops both drivers and waits for them to finish their current cycle
    /// or tick. Does nothing if they are not running.
    pub fn stop(&mut self) {
        if let Some(Drivers { stop, handles }) = self.drivers.take() {
            drop(stop);
            handles.into_iter().for_each(join);
            debug!("stopped drivers");
        }
    }

    /// Returns whether the drivers are running.
    pub fn is_started(&self) -> bool {
        self.drivers.is_some()
    }

    /// Loads `program` into the chip and (re)starts the drivers.
    pub fn load_program(&mut self, program: &[u8]) -> Result<usize, MachineError> {
        self.reload(|chip| chip.load_program_bytes(program))
    }

    /// Loads the program stored at `path` into the chip and (re)starts the drivers.
    pub fn load_program_file(&mut self, path: &str) -> Result<usize, MachineError> {
        self.reload(|chip| chip.load_program(path))
    }

    /// Runs `load` with the drivers stopped. The drivers are started on
    /// success; on failure they are only restarted if they were running.
    fn reload<F>(&mut self, load: F) -> Result<usize, MachineError>
    where
        F: FnOnce(&mut C) -> Result<usize, LoadProgramError>,
    {
        let started = self.is_started();
        self.stop();
        let loaded = load(&mut *lock(&self.chip));
        match loaded {
            Ok(size) => {
                self.start()?;
                Ok(size)
            }
            Err(e) => {
                if started {
                    self.start()?;
                }
                Err(e.into())
            }
        }
    }

    /// Restarts the loaded program.
    pub fn soft_reset(&mut self) -> Result<(), MachineError> {
        let started = self.is_started();
        self.stop();
        lock(&self.chip).soft_reset();
        if started {
            self.start()?;
        }
        Ok(())
    }

    /// Unloads the program and halts the chip. The drivers stay stopped until
    /// the next program is loaded.
    pub fn hard_reset(&mut self) {
        self.stop();
        lock(&self.chip).hard_reset();
    }

    /// Changes the instruction rate, restarting the drivers if they are running.
    pub fn set_cycles_per_second(&mut self, cycles_per_second: u32) -> Result<(), MachineError> {
        let config = self.config.with_cycles_per_second(cycles_per_second);
        config.validate()?;

        let started = self.is_started();
        self.stop();
        self.config = config;
        if started {
            self.start()?;
        }
        Ok(())
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn set_key(&self, key: C::PinAddress, pressed: bool) -> Result<(), ChipError> {
        lock(&self.chip).set_input_pin(key, pressed)
    }

    pub fn release_keys(&self) {
        lock(&self.chip).reset_input_pins();
    }

    /// Returns a copy of the output pins if they changed since the last call.
    pub fn take_frame(&self) -> Option<Vec<bool>> {
        let mut chip = lock(&self.chip);
        if !chip.draw_flag() {
            return None;
        }
        chip.set_draw_flag(false);
        Some(chip.read_output_pins().to_vec())
    }

    /// Runs `f` with exclusive access to the chip.
    pub fn with_chip<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut C) -> R,
    {
        f(&mut *lock(&self.chip))
    }

    /// Fatal faults raised by the instruction driver.
    pub fn faults(&self) -> &Receiver<ChipError> {
        &self.fault_receiver
    }
}

impl<C> Drop for Machine<C>
where
    C: Chip + Send + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawns a thread that calls `f` once per `period` until `stop` disconnects.
fn spawn_driver<F>(
    name: &str,
    period: Duration,
    stop: Receiver<()>,
    mut f: F,
) -> io::Result<JoinHandle<()>>
where
    F: FnMut() + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(move || {
        let ticker = tick(period);
        loop {
            select! {
                recv(stop) -> _ => break,
                recv(ticker) -> _ => f(),
            }
        }
    })
}

fn join(handle: JoinHandle<()>) {
    let name = handle.thread().name().unwrap_or("driver").to_string();
    if handle.join().is_err() {
        error!("{} panicked", name);
    }
}

/// Locks the chip. A driver that panicked while holding the lock leaves the
/// chip in the state of its last completed step, so poisoning is ignored.
fn lock<C>(chip: &Mutex<C>) -> MutexGuard<'_, C> {
    chip.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn machine() -> Machine<Chip8> {
        Machine::chip8(Config::default().with_cycles_per_second(1000)).unwrap()
    }

    #[test]
    fn test_new_machine_is_stopped() {
        let m = machine();
        assert!(!m.is_started());
        assert!(!m.with_chip(|chip| chip.is_running()));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = Machine::chip8(Config::default().with_timers_per_second(0));
        assert!(matches!(
            result,
            Err(MachineError::Config(ConfigError::ZeroRate("timers_per_second")))
        ));

        let mut m = machine();
        assert!(m.set_cycles_per_second(0).is_err());
        assert_eq!(m.config().cycles_per_second, 1000);
    }

    #[test]
    fn test_runs_program_and_stops() {
        let mut m = machine();
        // V0 += 1, jump back
        m.load_program(&[0x70, 0x01, 0x12, 0x00]).unwrap();
        assert!(m.is_started());
        thread::sleep(Duration::from_millis(100));
        m.stop();

        let registers = m.with_chip(|chip| *chip.registers());
        assert!(registers[0] > 0);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(m.with_chip(|chip| *chip.registers()), registers);
    }

    #[test]
    fn test_delay_timer_counts_down() {
        let mut m = machine();
        // V0 = 60, DT = V0, loop
        m.load_program(&[0x60, 0x3C, 0xF0, 0x15, 0x12, 0x04]).unwrap();
        thread::sleep(Duration::from_millis(300));
        m.stop();
        let delay = m.with_chip(|chip| chip.delay_timer());
        assert!(delay < 60, "delay timer is still {}", delay);
    }

    #[test]
    fn test_timers_run_while_waiting_for_key() {
        let mut m = machine();
        // V0 = 0x10, DT = V0, wait for a key
        m.load_program(&[0x60, 0x10, 0xF0, 0x15, 0xF0, 0x0A]).unwrap();
        thread::sleep(Duration::from_millis(300));
        m.stop();

        let (delay, pc, running) =
            m.with_chip(|chip| (chip.delay_timer(), chip.program_counter(), chip.is_running()));
        assert!(delay < 0x10, "delay timer is still {}", delay);
        assert_eq!(pc, 0x204);
        assert!(running);
    }

    #[test]
    fn test_beeps_when_sound_timer_runs_out() {
        let (sender, receiver) = unbounded::<Beep>();
        let mut m = Machine::with_audio(Chip8::new(), Config::default(), sender).unwrap();
        // V0 = 2, ST = V0, loop
        m.load_program(&[0x60, 0x02, 0xF0, 0x18, 0x12, 0x04]).unwrap();
        assert_eq!(receiver.recv_timeout(TIMEOUT), Ok(Beep));
    }

    #[test]
    fn test_reports_faults() {
        let mut m = machine();
        m.load_program(&[0x00, 0xEE]).unwrap();
        assert_eq!(
            m.faults().recv_timeout(TIMEOUT),
            Ok(ChipError::StackUnderflow)
        );
        assert!(!m.with_chip(|chip| chip.is_running()));
        assert_eq!(m.with_chip(|chip| chip.program_counter()), 0x200);
    }

    #[test]
    fn test_applies_strict_opcodes_from_config() {
        let mut m =
            Machine::new(Chip8::new(), Config::default().with_strict_opcodes(true)).unwrap();
        m.load_program(&[0xFF, 0xFF, 0x12, 0x02]).unwrap();
        assert_eq!(
            m.faults().recv_timeout(TIMEOUT),
            Ok(ChipError::UnknownOpcode(0xFFFF))
        );
        assert!(!m.with_chip(|chip| chip.is_running()));
    }

    #[test]
    fn test_take_frame_clears_draw_flag() {
        let mut m = machine();
        m.load_program(&[0x12, 0x00]).unwrap();

        let frame = m.take_frame().unwrap();
        assert_eq!(frame.len(), 64 * 32);
        assert!(frame.iter().all(|p| !p));
        assert_eq!(m.take_frame(), None);
    }

    #[test]
    fn test_keys() {
        let m = machine();
        m.set_key(0x4, true).unwrap();
        assert!(m.with_chip(|chip| chip.keypad().is_pressed(0x4)));
        assert_eq!(m.set_key(0x10, true), Err(ChipError::KeyOutOfRange(0x10)));
        m.release_keys();
        assert!(!m.with_chip(|chip| chip.keypad().is_pressed(0x4)));
    }

    #[test]
    fn test_resets() {
        let mut m = machine();
        m.load_program(&[0x12, 0x00]).unwrap();

        m.soft_reset().unwrap();
        assert!(m.is_started());

        m.hard_reset();
        assert!(!m.is_started());
        assert!(!m.with_chip(|chip| chip.is_running()));
        assert_eq!(m.with_chip(|chip| chip.memory().read(0x200)), Ok(0));
    }

    #[test]
    fn test_change_speed_restarts_drivers() {
        let mut m = machine();
        m.load_program(&[0x12, 0x00]).unwrap();
        m.set_cycles_per_second(200).unwrap();
        assert!(m.is_started());
        assert_eq!(m.config().cycles_per_second, 200);
    }

    #[test]
    fn test_failed_load_keeps_drivers_running() {
        let mut m = machine();
        m.load_program(&[0x12, 0x00]).unwrap();

        assert!(matches!(
            m.load_program(&vec![0; 3585]),
            Err(MachineError::Load(LoadProgramError::ProgramTooLarge(3585)))
        ));
        assert!(m.is_started());
        assert!(m.with_chip(|chip| chip.is_running()));

        assert!(m.load_program_file("/this/path/does/not/exist.ch8").is_err());
        assert!(m.is_started());
    }

    #[test]
    fn test_load_missing_file() {
        let mut m = machine();
        assert!(matches!(
            m.load_program_file("/this/path/does/not/exist.ch8"),
            Err(MachineError::Load(LoadProgramError::CouldNotOpenFile { .. }))
        ));
        assert!(!m.is_started());
    }
}
