use mmi_drums::connection::ReconnectionStrategy;
use mmi_drums::generation::{
    GenerationBackend, GeneratorWorker, ProcessGenerator, UnavailableBackend,
};
use mmi_drums::messaging::command::{BassCommand, Command};
use mmi_drums::midi::{
    BASS_CHANNEL, MidiDeviceManager, MidiSoundTrigger, SilentTrigger, SoundTrigger,
};
use mmi_drums::sequencer::StepClock;
use mmi_drums::{
    BassSequencer, BridgeClient, PlaybackSession, SessionConfig, TransportController,
    TransportManager, UdpChannel, create_command_channel, create_notification_channel,
    create_tick_channel,
};
use ringbuf::traits::{Consumer, Producer};
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

// Ringbuffer capacity constants
// Ticks arrive at most every ~94 ms (160 BPM sixteenths); 64 covers long stalls
const TICK_RINGBUFFER_CAPACITY: usize = 64;
const COMMAND_RINGBUFFER_CAPACITY: usize = 64;
const NOTIFICATION_RINGBUFFER_CAPACITY: usize = 256;

const LOOP_SLEEP: Duration = Duration::from_millis(2);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== MMI Drums ===");
    println!("Version {} - step sequencer with generated continuations\n", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let mut config = match SessionConfig::load_or_default(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return;
        }
    };

    let (listen_addr, player_addr) = match (config.listen_addr(), config.player_addr()) {
        (Ok(listen), Ok(player)) => (listen, player),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("ERROR: {}", e);
            return;
        }
    };

    // Create the communication channels
    let (tick_tx, mut tick_rx) = create_tick_channel(TICK_RINGBUFFER_CAPACITY);
    let (command_tx, mut command_rx) = create_command_channel(COMMAND_RINGBUFFER_CAPACITY);
    let (notification_tx, mut notification_rx) =
        create_notification_channel(NOTIFICATION_RINGBUFFER_CAPACITY);

    let clock = StepClock::new(config.sequence_len, tick_tx);
    // Drums and bass share the clock; starting one stops the other
    let shared_transport = TransportManager::shared(Box::new(clock));
    let transport = TransportController::new(shared_transport.clone());
    let bass_transport = TransportController::new(shared_transport);

    let bridge = BridgeClient::new(UdpChannel::new(listen_addr, player_addr))
        .with_settle_delay(config.settle_delay());

    let worker = match &config.generator_command {
        Some(command) => match ProcessGenerator::from_command_line(command) {
            Ok(generator) => {
                println!("Generator: {}", generator.program());
                Some(GeneratorWorker::spawn(Box::new(generator)))
            }
            Err(e) => {
                eprintln!("WARNING: {}", e);
                None
            }
        },
        None => None,
    };
    let backend: Box<dyn GenerationBackend> = match worker {
        Some(worker) => Box::new(worker),
        None => {
            if config.fall_back_to_random() {
                println!("No generator configured, using random generation");
            }
            Box::new(UnavailableBackend)
        }
    };

    let sound: Box<dyn SoundTrigger> = match MidiSoundTrigger::connect(config.midi_port.as_deref())
    {
        Ok(trigger) => {
            println!("MIDI output: {}", trigger.port_name());
            Box::new(trigger)
        }
        Err(e) => {
            println!("No MIDI output ({}), running silent", e);
            let ports = MidiDeviceManager::new().list_output_ports();
            if !ports.is_empty() {
                println!("Available MIDI outputs:");
                for port in ports {
                    let marker = if port.is_default { " (default)" } else { "" };
                    println!("  {}: {}{}", port.id, port.name, marker);
                }
            }
            Box::new(SilentTrigger)
        }
    };

    let bass_sound: Box<dyn SoundTrigger> =
        match MidiSoundTrigger::connect_on_channel(config.midi_port.as_deref(), BASS_CHANNEL) {
            Ok(trigger) => Box::new(trigger),
            Err(_) => Box::new(SilentTrigger),
        };
    let mut bass = BassSequencer::new(bass_transport, bass_sound, &config);

    let now = Instant::now();
    let mut session =
        match PlaybackSession::new(config, transport, bridge, backend, sound, now) {
            Ok(session) => session.with_notifications(notification_tx),
            Err(e) => {
                eprintln!("ERROR: {}", e);
                return;
            }
        };

    let mut reconnection = ReconnectionStrategy::new();
    if session.bridge_mut().connect(now).is_err() {
        reconnection.schedule(now);
    }

    spawn_stdin_reader(command_tx);

    println!("\n=== Session started ! ===");
    println!("Commands: play | stop | p | t <drum> <step> | g | r | c | bpm <n> | s | q");
    println!("Bass:     b p | b t <note> <step> | b r | b m | b c | b s\n");
    println!("{}", session.grid());

    loop {
        let now = Instant::now();

        while let Some(command) = command_rx.try_pop() {
            match command {
                Command::Quit => {
                    session.stop(now);
                    println!("Bye");
                    return;
                }
                Command::Show => println!("{}", session.grid()),
                Command::Bass(command) => handle_bass_command(&mut bass, command, now),
                command => {
                    if let Err(e) = session.handle_command(command, now) {
                        println!("{}", e);
                    }
                }
            }
        }

        while let Some(tick) = tick_rx.try_pop() {
            session.on_clock_tick(tick);
            bass.on_clock_tick(tick);
        }

        session.poll(now);
        bass.poll();

        if session.bridge().is_connected() {
            reconnection.reset();
        } else if reconnection.is_due(now) {
            if session.bridge_mut().connect(now).is_err() && !reconnection.schedule(now) {
                log::error!(
                    "Giving up on the bridge after {} attempts",
                    reconnection.current_attempt()
                );
            }
        } else if !reconnection.is_scheduled() && reconnection.should_retry() {
            reconnection.schedule(now);
        }

        while let Some(notification) = notification_rx.try_pop() {
            println!("{}", notification);
        }

        thread::sleep(LOOP_SLEEP);
    }
}

fn handle_bass_command(bass: &mut BassSequencer, command: BassCommand, now: Instant) {
    match command {
        BassCommand::Toggle { voice, step } => {
            if let Err(e) = bass.user_toggle(voice, step, now) {
                println!("{}", e);
            }
        }
        BassCommand::TogglePlay => bass.toggle_play(),
        BassCommand::Random => {
            bass.generate_random();
        }
        BassCommand::Markov => {
            bass.generate_markov();
        }
        BassCommand::Clear => bass.clear(),
        BassCommand::Show => println!("{}", bass.grid()),
    }
}

fn spawn_stdin_reader(mut command_tx: mmi_drums::messaging::channels::CommandProducer) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match Command::parse(&line) {
                Ok(command) => {
                    if command_tx.try_push(command).is_err() {
                        eprintln!("Command queue full, dropped");
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
        }
        // EOF behaves like quit
        let _ = command_tx.try_push(Command::Quit);
    });
}
