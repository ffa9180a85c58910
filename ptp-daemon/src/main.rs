use std::path::PathBuf;

use arrayvec::ArrayVec;
use clap::Parser;
use ptp_core::{
    clock::Clock,
    config::{InstanceConfig, PortConfig as CorePortConfig},
    datastructures::common::{ClockAccuracy, ClockIdentity, ClockQuality, TimeSource},
    datastructures::datasets::TimePropertiesDS,
    network::NetworkPort,
    port::PtpPort,
    timers::Timers,
    Event,
};
use ptp_daemon::{
    clock::LinuxClock,
    config::{Config, NetworkMode},
    extref::GpsDiscipline,
    network::{get_clock_id, LinuxNetworkPort, NetworkError},
    observer::{self, ObservableState},
    setup_logger,
    timers::LinuxTimers,
};
use rand::{rngs::StdRng, SeedableRng};
use timestamped_socket::socket::InterfaceTimestampMode;
use tokio::{io::AsyncReadExt, sync::watch};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file (§6.4).
    #[clap(short, long)]
    config: PathBuf,
}

/// A slave-only clock never wins BMC (§3.1) and advertises the lowest
/// possible quality, matching the unreachable-grandmaster defaults of an
/// ordinary clock that only ever consumes time.
fn default_clock_quality() -> ClockQuality {
    ClockQuality {
        clock_class: 248,
        clock_accuracy: ClockAccuracy::Unknown,
        offset_scaled_log_variance: 0xffff,
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = Config::from_file(&args.config).unwrap_or_else(|e| {
        eprintln!("Could not load configuration from {:?}: {e}", args.config);
        std::process::exit(1);
    });

    setup_logger(config.loglevel.into()).expect("could not set up logging");

    let Some(port_config) = config.ports.first().cloned() else {
        log::error!("no [[port]] configured, nothing to do");
        std::process::exit(1);
    };

    let clock_identity = match config.identity {
        Some(identity) => identity,
        None => {
            let mac = get_clock_id(port_config.interface.as_str())
                .expect("could not derive a clock identity from the interface MAC address");
            ClockIdentity::from_mac_address(mac)
        }
    };

    let instance_config = InstanceConfig {
        clock_identity,
        clock_quality: default_clock_quality(),
        priority_1: config.priority1,
        priority_2: config.priority2,
        domain_number: config.domain,
        slave_only: config.slave_only,
        two_step_flag: true,
    };

    let time_properties =
        TimePropertiesDS::new_arbitrary(false, false, TimeSource::InternalOscillator);

    let clock = match port_config.hardware_clock {
        Some(index) => {
            LinuxClock::phc(index).unwrap_or_else(|e| panic!("could not open PHC {index}: {e}"))
        }
        None => LinuxClock::system(),
    };

    let timestamping = if port_config.hardware_clock.is_some() {
        InterfaceTimestampMode::Hardware
    } else {
        InterfaceTimestampMode::Software
    };

    let (state_tx, state_rx) = watch::channel(ObservableState::default());

    let observer_handle = observer::spawn(&config.observability, state_rx);

    let extref_handle = match config.extref.clone() {
        Some(extref_config) => {
            let extref_clock = match port_config.hardware_clock {
                Some(index) => LinuxClock::phc(index)
                    .unwrap_or_else(|e| panic!("could not open PHC {index}: {e}")),
                None => LinuxClock::system(),
            };
            Some(tokio::spawn(run_extref(extref_config, extref_clock)))
        }
        None => None,
    };

    let engine = match port_config.network_mode {
        NetworkMode::Ipv4 => {
            let network =
                LinuxNetworkPort::open_ipv4(port_config.interface, timestamping, port_config.hardware_clock)
                    .expect("could not open IPv4 event/general sockets");
            let port = PtpPort::new(
                instance_config,
                CorePortConfig::from(port_config),
                time_properties,
                clock,
                network,
                LinuxTimers::new(),
                StdRng::from_entropy(),
            );
            tokio::task::spawn_blocking(move || run_port(port, state_tx))
        }
        NetworkMode::Ipv6 => {
            let network =
                LinuxNetworkPort::open_ipv6(port_config.interface, timestamping, port_config.hardware_clock)
                    .expect("could not open IPv6 event/general sockets");
            let port = PtpPort::new(
                instance_config,
                CorePortConfig::from(port_config),
                time_properties,
                clock,
                network,
                LinuxTimers::new(),
                StdRng::from_entropy(),
            );
            tokio::task::spawn_blocking(move || run_port(port, state_tx))
        }
        NetworkMode::Ethernet => {
            let network =
                LinuxNetworkPort::open_ethernet(port_config.interface, timestamping, port_config.hardware_clock)
                    .expect("could not open raw Ethernet event/general sockets");
            let port = PtpPort::new(
                instance_config,
                CorePortConfig::from(port_config),
                time_properties,
                clock,
                network,
                LinuxTimers::new(),
                StdRng::from_entropy(),
            );
            tokio::task::spawn_blocking(move || run_port(port, state_tx))
        }
    };

    let result = engine.await;
    if let Err(e) = result {
        log::error!("port engine task panicked: {e}");
    }

    observer_handle.abort();
    if let Some(handle) = extref_handle {
        handle.abort();
    }
}

/// Synchronous poll loop (§5): repeatedly step the port engine, publish the
/// resulting observable state and sleep until the next armed timer.
fn run_port<C, N, T, R>(mut port: PtpPort<C, N, T, R>, state_tx: watch::Sender<ObservableState>)
where
    C: Clock,
    N: NetworkPort<Error = NetworkError>,
    T: Timers,
    R: rand::Rng,
{
    const MIN_POLL: std::time::Duration = std::time::Duration::from_millis(5);
    const MAX_POLL: std::time::Duration = std::time::Duration::from_millis(200);

    loop {
        let mut events: ArrayVec<Event, 4> = ArrayVec::new();
        if let Err(e) = port.do_state(&mut events) {
            log::warn!("port engine error: {e:?}");
        }

        for event in &events {
            log::info!("{event}");
        }

        if !events.is_empty() {
            let current = port.current_ds();
            let snapshot = ObservableState {
                port_state: port.state().to_string(),
                offset_from_master_ns: Some(current.offset_from_master.total_nanos()),
                mean_path_delay_ns: Some(current.mean_path_delay.total_nanos()),
                clock_identity: format!("{:?}", port.port_identity().clock_identity),
            };
            let _ = state_tx.send(snapshot);
        }

        let wait = port
            .timers()
            .next_deadline()
            .map(|d| d.clamp(MIN_POLL, MAX_POLL))
            .unwrap_or(MAX_POLL);
        std::thread::sleep(wait);
    }
}

/// Read bytes off the configured GPS serial device and drive a
/// [`GpsDiscipline`] from them (§4.7), coarse-setting `target_clock` from the
/// first `$GPZDA` sentence once data starts flowing. `stty`/termios
/// configuration is left to the operator (a udev rule sets the baud rate
/// before the daemon starts), matching the original's reliance on a
/// pre-configured USART.
///
/// 1PPS-edge discipline ([`GpsDiscipline::on_pps_edge`]) needs a hardware
/// PPS timestamp source (a `/dev/ppsN` device) that has no equivalent in
/// [`ptp_daemon::config::ExtRefConfig`]; only the coarse NMEA-only path is
/// wired up here.
async fn run_extref(config: ptp_daemon::config::ExtRefConfig, mut target_clock: LinuxClock) {
    log::info!(
        "opening external reference device {:?} at {} baud",
        config.device,
        config.baud_rate
    );

    let mut file = match tokio::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(&config.device)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            log::error!("could not open external reference device: {e}");
            return;
        }
    };

    let mut discipline = GpsDiscipline::new();
    let mut buf = [0u8; 256];

    let start = target_clock
        .get()
        .expect("could not read the clock to be disciplined");

    let mut config_tick = tokio::time::interval(std::time::Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = config_tick.tick(), if !discipline.is_configured() => {
                if let Some(message) = discipline.on_config_tick() {
                    if let Err(e) = tokio::io::AsyncWriteExt::write_all(&mut file, &message).await {
                        log::warn!("could not write to external reference device: {e}");
                    }
                }
            }
            result = file.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        log::warn!("external reference device reached EOF");
                        return;
                    }
                    Ok(n) => {
                        for &byte in &buf[..n] {
                            discipline.on_byte(byte);
                        }
                        let now = match target_clock.get() {
                            Ok(now) => now,
                            Err(e) => {
                                log::warn!("could not read the clock to be disciplined: {e}");
                                continue;
                            }
                        };
                        if let Err(e) = discipline.coarse_init(&mut target_clock, start, now) {
                            log::warn!("could not coarse-set the clock: {e}");
                        }
                    }
                    Err(e) => {
                        log::error!("external reference device read error: {e}");
                        return;
                    }
                }
            }
        }
    }
}
