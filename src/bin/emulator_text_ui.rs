use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use cursive::{
    traits::Nameable,
    views::{LinearLayout, TextView},
    CbSink, Cursive,
};
use log::{error, info, warn, LevelFilter};
use std::env;
use std::error::Error as _;
use std::process;
use std::time::Duration;
use thiserror::Error;

use chip8_vm::chip::{
    chip8::{
        cursive_display::{ChipWithCursiveDisplay, Screen, SCREEN_NAME},
        Chip8,
    },
    config::Config,
    machine::{Beep, Machine, MachineError},
    Chip,
};

const STATUS_NAME: &str = "status";

/// Step by which the instruction rate changes on Up / Down.
const SPEED_STEP: u32 = 100;

/// The slowest selectable instruction rate.
const MIN_SPEED: u32 = 100;

/// How often the event loop pushes new frames to the UI.
const REFRESH_PERIOD: Duration = Duration::from_millis(16);

/// Error type for errors that occur during parsing the command line arguments
/// and loading the program based on the arguments.
#[derive(Debug, Error)]
enum Error {
    #[error("Usage: emulator_text_ui <program> [--speed HZ] [--strict] [--verbose]\n{0}")]
    InvalidUsage(String),

    #[error(transparent)]
    InvalidProgram(#[from] MachineError),
}

/// The parsed command line.
#[derive(Debug, PartialEq)]
struct Args {
    program: String,
    config: Config,
    verbose: bool,
}

/// Represents an event to be processed by the event loop. It is generic
/// over the type representing the pressed key.
#[derive(Clone, Copy)]
enum Event<T> {
    /// Occurs when the key passed in the enum value was pressed.
    Key(T),

    /// Indicates that all keys are released. Note that this is a
    /// hack because OS X currently requires extra permissions to
    /// listen to key down/up events. To get around this we simply
    /// read the stdin (indirectly via registering for cursive
    /// events) and assign one key to trigger releasing all keys.
    KeyRelease,

    /// Raises the instruction rate.
    SpeedUp,

    /// Lowers the instruction rate.
    SlowDown,

    /// Restarts the loaded program.
    Reset,

    /// Unloads the program and halts the chip.
    Stop,

    /// Shut down.
    Quit,
}

/// Represents the channels available to the event loop. It is generic
/// over the type representing the pressed keys.
struct EventLoopChannels<T> {
    /// The channel to send the UI refresh messages to.
    gfx_sender: CbSink,

    /// The channel on which the Events are received.
    key_receiver: Receiver<Event<T>>,

    /// Beeps of the sound timer.
    beep_receiver: Receiver<Beep>,

    /// A channel to report that the thread has completed
    /// shutdown.
    shutdown_sender: Sender<()>,
}

/// The event loop. Applies key events to the machine, pushes changed frames
/// to the UI at the refresh rate, and reports faults and beeps in the status
/// line. The machine's own drivers run the chip in the meantime.
fn event_loop<C, P>(mut machine: Machine<C>, io_channels: EventLoopChannels<P>)
where
    C: Chip<PinAddress = P> + Send + 'static,
{
    let refresh = tick(REFRESH_PERIOD);
    let faults = machine.faults().clone();

    set_status(&io_channels.gfx_sender, status_line(&machine, ""));

    loop {
        select! {
            recv(io_channels.key_receiver) -> event => match event {
                Ok(event) => {
                    if !handle_event(&mut machine, event, &io_channels.gfx_sender) {
                        break;
                    }
                }
                Err(_) => break,
            },
            recv(refresh) -> _ => {
                if !machine.update_ui(&io_channels.gfx_sender) {
                    break;
                }
            }
            recv(faults) -> fault => {
                if let Ok(fault) = fault {
                    set_status(&io_channels.gfx_sender, status_line(&machine, &format!("halted: {}", fault)));
                }
            }
            recv(io_channels.beep_receiver) -> _ => {
                set_status(&io_channels.gfx_sender, status_line(&machine, "beep"));
            }
        }
    }

    machine.stop();
    if io_channels.shutdown_sender.send(()).is_err() {
        warn!("UI is gone before shutdown completed");
    }
}

/// Applies one UI event to the machine. Returns `false` on quit.
fn handle_event<C, P>(machine: &mut Machine<C>, event: Event<P>, gfx_sender: &CbSink) -> bool
where
    C: Chip<PinAddress = P> + Send + 'static,
{
    match event {
        Event::Key(key) => {
            if let Err(e) = machine.set_key(key, true) {
                warn!("{}", e);
            }
        }
        Event::KeyRelease => machine.release_keys(),
        Event::SpeedUp => change_speed(machine, true, gfx_sender),
        Event::SlowDown => change_speed(machine, false, gfx_sender),
        Event::Reset => match machine.soft_reset() {
            Ok(()) => set_status(gfx_sender, status_line(machine, "reset")),
            Err(e) => error!("reset failed: {}", e),
        },
        Event::Stop => {
            machine.hard_reset();
            set_status(gfx_sender, status_line(machine, "stopped"));
        }
        Event::Quit => return false,
    }
    true
}

/// Hands `event` to the event loop. Returns `false` if the loop is gone.
fn forward<T>(sender: &Sender<Event<T>>, event: Event<T>) -> bool {
    let sent = sender.send(event).is_ok();
    if !sent {
        warn!("event loop is gone");
    }
    sent
}

fn change_speed<C>(machine: &mut Machine<C>, faster: bool, gfx_sender: &CbSink)
where
    C: Chip + Send + 'static,
{
    let current = machine.config().cycles_per_second;
    let target = if faster {
        current.saturating_add(SPEED_STEP)
    } else {
        current.saturating_sub(SPEED_STEP).max(MIN_SPEED)
    };

    match machine.set_cycles_per_second(target) {
        Ok(()) => {
            info!("running at {} Hz", target);
            set_status(gfx_sender, status_line(machine, ""));
        }
        Err(e) => error!("could not change speed: {}", e),
    }
}

fn status_line<C>(machine: &Machine<C>, message: &str) -> String
where
    C: Chip + Send + 'static,
{
    format!(
        "{} Hz | Up/Down speed, space release keys, F5 reset, F6 stop, ~ log, Esc quit | {}",
        machine.config().cycles_per_second,
        message
    )
}

fn set_status(gfx_sender: &CbSink, text: String) {
    let sent = gfx_sender.send(Box::new(move |s: &mut Cursive| {
        s.call_on_name(STATUS_NAME, |view: &mut TextView| view.set_content(text));
    }));
    if sent.is_err() {
        warn!("UI is gone");
    }
}

/// Parses `<program> [--speed HZ] [--strict] [--verbose]`.
fn parse_args<I>(args: I) -> Result<Args, Error>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut program = None;
    let mut config = Config::default();
    let mut verbose = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--speed" => {
                let value = args
                    .next()
                    .ok_or_else(|| Error::InvalidUsage("--speed expects a value".to_string()))?;
                let speed = value
                    .parse::<u32>()
                    .map_err(|_| Error::InvalidUsage(format!("invalid speed {}", value)))?;
                config = config.with_cycles_per_second(speed);
            }
            "--strict" => config = config.with_strict_opcodes(true),
            "--verbose" => verbose = true,
            _ if arg.starts_with("--") => {
                return Err(Error::InvalidUsage(format!("unknown option {}", arg)))
            }
            _ if program.is_none() => program = Some(arg.clone()),
            _ => return Err(Error::InvalidUsage(format!("unexpected argument {}", arg))),
        }
    }

    config
        .validate()
        .map_err(|e| Error::InvalidUsage(e.to_string()))?;
    let program = program.ok_or_else(|| {
        Error::InvalidUsage(
            "Expecting path to the program to load as command line argument.".to_string(),
        )
    })?;

    Ok(Args {
        program,
        config,
        verbose,
    })
}

/// Creates the machine and loads the program given on the command line.
fn load_machine(args: &Args, beep_sender: Sender<Beep>) -> Result<Machine<Chip8>, Error> {
    let mut machine = Machine::with_audio(Chip8::new(), args.config, beep_sender)?;
    let size = machine.load_program_file(&args.program)?;
    info!("loaded {} ({} bytes)", args.program, size);
    Ok(machine)
}

fn report(e: &Error) {
    eprintln!("{}", e);
    let mut source = e.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
}

/// Constructs the UI and spawns the event loop and the UI thread.
fn main() {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            report(&e);
            process::exit(2);
        }
    };

    cursive::logger::init();
    log::set_max_level(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    let (beep_sender, beep_receiver) = unbounded();
    let machine = match load_machine(&args, beep_sender) {
        Ok(machine) => machine,
        Err(e) => {
            report(&e);
            process::exit(1);
        }
    };

    let mut siv = cursive::default();

    let cb_sink = siv.cb_sink().clone();
    let (key_sender, key_receiver) = bounded::<Event<u8>>(10);
    let (shutdown_sender, shutdown_receiver) = bounded::<()>(1);

    let spawned = std::thread::Builder::new()
        .name("event-loop".to_string())
        .spawn(move || {
            event_loop(
                machine,
                EventLoopChannels {
                    gfx_sender: cb_sink,
                    key_receiver,
                    beep_receiver,
                    shutdown_sender,
                },
            );
        });
    if let Err(e) = spawned {
        eprintln!("could not spawn event loop: {}", e);
        process::exit(1);
    }

    let sender = key_sender.clone();
    siv.add_global_callback(cursive::event::Key::Esc, move |s| {
        if sender.send(Event::Quit).is_ok() && shutdown_receiver.recv().is_err() {
            error!("event loop did not shut down orderly");
        }
        s.quit();
    });

    for (i, j) in &[
        ('1', 0x1),
        ('2', 0x2),
        ('3', 0x3),
        ('4', 0xC),
        ('q', 0x4),
        ('w', 0x5),
        ('e', 0x6),
        ('r', 0xD),
        ('a', 0x7),
        ('s', 0x8),
        ('d', 0x9),
        ('f', 0xE),
        ('z', 0xA),
        ('x', 0x0),
        ('c', 0xB),
        ('v', 0xF),
    ] {
        let sender = key_sender.clone();
        let key = *j as u8;
        siv.add_global_callback(*i, move |_s| {
            forward(&sender, Event::Key(key));
        });
    }

    for (trigger, event) in vec![
        (cursive::event::Event::Char(' '), Event::KeyRelease),
        (cursive::event::Event::Key(cursive::event::Key::Up), Event::SpeedUp),
        (cursive::event::Event::Key(cursive::event::Key::Down), Event::SlowDown),
        (cursive::event::Event::Key(cursive::event::Key::F5), Event::Reset),
        (cursive::event::Event::Key(cursive::event::Key::F6), Event::Stop),
    ] {
        let sender = key_sender.clone();
        siv.add_global_callback(trigger, move |_s| {
            forward(&sender, event);
        });
    }

    siv.add_global_callback('~', Cursive::toggle_debug_console);

    siv.add_layer(
        LinearLayout::vertical()
            .child(Screen::default().with_name(SCREEN_NAME))
            .child(TextView::new("").with_name(STATUS_NAME)),
    );

    siv.run();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Result<Args, Error> {
        parse_args(line.split_whitespace().map(str::to_string))
    }

    #[test]
    fn test_parse_program_only() {
        let parsed = args("pong.ch8").unwrap();
        assert_eq!(parsed.program, "pong.ch8");
        assert_eq!(parsed.config, Config::default());
        assert!(!parsed.verbose);
    }

    #[test]
    fn test_parse_options() {
        let parsed = args("--speed 1200 pong.ch8 --strict --verbose").unwrap();
        assert_eq!(parsed.program, "pong.ch8");
        assert_eq!(parsed.config.cycles_per_second, 1200);
        assert!(parsed.config.strict_opcodes);
        assert!(parsed.verbose);
    }

    fn running_machine() -> Machine<Chip8> {
        let mut machine = Machine::chip8(Config::default()).unwrap();
        machine.load_program(&[0x12, 0x00]).unwrap();
        machine
    }

    #[test]
    fn test_stop_event_unloads_program() {
        let (gfx_sender, gfx_receiver) = unbounded();
        let mut machine = running_machine();

        assert!(handle_event(&mut machine, Event::Stop, &gfx_sender));
        assert!(!machine.is_started());
        assert!(!machine.with_chip(|chip| chip.is_running()));
        assert_eq!(machine.with_chip(|chip| chip.memory().read(0x200)), Ok(0));
        // the status line is updated
        assert!(gfx_receiver.try_recv().is_ok());
    }

    #[test]
    fn test_reset_and_quit_events() {
        let (gfx_sender, _gfx_receiver) = unbounded();
        let mut machine = running_machine();

        assert!(handle_event(&mut machine, Event::Key(0x3), &gfx_sender));
        assert!(machine.with_chip(|chip| chip.keypad().is_pressed(0x3)));
        assert!(handle_event(&mut machine, Event::KeyRelease, &gfx_sender));
        assert!(!machine.with_chip(|chip| chip.keypad().is_pressed(0x3)));

        assert!(handle_event(&mut machine, Event::Reset, &gfx_sender));
        assert!(machine.is_started());
        assert!(!handle_event(&mut machine, Event::Quit, &gfx_sender));
    }

    #[test]
    fn test_forward_reports_missing_event_loop() {
        let (sender, receiver) = bounded::<Event<u8>>(1);
        assert!(forward(&sender, Event::Stop));
        assert!(matches!(receiver.try_recv(), Ok(Event::Stop)));

        drop(receiver);
        assert!(!forward(&sender, Event::Key(0x1)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(args(""), Err(Error::InvalidUsage(_))));
        assert!(matches!(args("pong.ch8 --speed"), Err(Error::InvalidUsage(_))));
        assert!(matches!(args("pong.ch8 --speed fast"), Err(Error::InvalidUsage(_))));
        assert!(matches!(args("pong.ch8 --speed 0"), Err(Error::InvalidUsage(_))));
        assert!(matches!(args("pong.ch8 tetris.ch8"), Err(Error::InvalidUsage(_))));
        assert!(matches!(args("pong.ch8 --turbo"), Err(Error::InvalidUsage(_))));
    }
}
