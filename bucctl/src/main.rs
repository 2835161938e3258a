//! bucctl -- command-line control for ATOM block upconverters.
//!
//! Every device command goes through the same `BucDriver` the library
//! exposes: the command is queued, executed, and its result printed by the
//! result callback as `Command <Kind>: <result>`.
//!
//! Usage examples:
//!
//!   bucctl --host 192.168.1.50 sn
//!   bucctl --serial /dev/ttyUSB0 --baud 9600 atten set 20
//!   bucctl --com 3 power --reverse
//!   bucctl --mock demo
//!   bucctl --host 192.168.1.50 --com 3 demo
//!   bucctl --mock --fixture responses.json --host sim faults

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use buclib::{BucBuilder, BucDriver, PowerDirection, TransportKind};
use buclib_test_harness::{SampleResponses, SimulatedTransport};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

const DEFAULT_TCP_PORT: u16 = 5353;

/// Serial port number the demo uses under `--mock` when none is given.
const MOCK_DEMO_COM: u32 = 1;

/// Simulated round-trip latency for `--mock`.
const MOCK_LATENCY: Duration = Duration::from_millis(20);

#[derive(Debug, Parser)]
#[command(name = "bucctl", version, about)]
struct Cli {
    /// Device IP address or host name (Ethernet link).
    #[arg(long)]
    host: Option<String>,

    /// Device TCP port.
    #[arg(long, default_value_t = DEFAULT_TCP_PORT)]
    tcp_port: u16,

    /// Serial device path (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, conflicts_with = "com")]
    serial: Option<String>,

    /// Serial port number, mapped to the platform device name
    /// (COM<n> on Windows, /dev/ttyS<n> elsewhere).
    #[arg(long)]
    com: Option<u32>,

    /// Serial baud rate.
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Response timeout in milliseconds.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Use simulated adapters that answer with canned responses instead of
    /// talking to a device.
    #[arg(long)]
    mock: bool,

    /// JSON file of canned responses for --mock (command name -> response).
    #[arg(long, requires = "mock")]
    fixture: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set (e.g. info, buclib_dispatch=debug).
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read a temperature sensor.
    Temp {
        /// Sensor id (1-5).
        #[arg(long)]
        id: Option<u8>,
    },

    /// Mute the BUC.
    Mute,

    /// Unmute the BUC.
    Unmute,

    /// Read the mute gate state.
    MuteState,

    /// Attenuation operations.
    Atten {
        #[command(subcommand)]
        action: AttenAction,
    },

    /// Read the serial number.
    Sn,

    /// Read RF power in dBm.
    Power {
        /// Read reverse instead of forward power.
        #[arg(long)]
        reverse: bool,
    },

    /// Read the status of all fault flags.
    Faults,

    /// Run the demo sequence: a command with no link, a batch over the
    /// Ethernet link (--host), then a batch over the serial link
    /// (--serial/--com). Under --mock, missing links are simulated.
    Demo,
}

#[derive(Debug, Subcommand)]
enum AttenAction {
    /// Read the current attenuation.
    Get,
    /// Set the attenuation (0-63).
    Set { value: u16 },
}

/// The physical link requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Link {
    Network { host: String, port: u16 },
    SerialDevice(String),
    SerialPort(u32),
}

impl Cli {
    fn network_link(&self) -> Option<Link> {
        self.host.as_ref().map(|host| Link::Network {
            host: host.clone(),
            port: self.tcp_port,
        })
    }

    fn serial_link(&self) -> Option<Link> {
        match (&self.serial, self.com) {
            (Some(path), _) => Some(Link::SerialDevice(path.clone())),
            (None, Some(port)) => Some(Link::SerialPort(port)),
            (None, None) => None,
        }
    }

    /// The single link used by every command except `demo`.
    fn link(&self) -> Option<Link> {
        self.network_link().or_else(|| self.serial_link())
    }
}

fn validate_options(cli: &Cli) -> Result<()> {
    if matches!(cli.command, Command::Demo) {
        return Ok(());
    }
    if cli.host.is_some() && (cli.serial.is_some() || cli.com.is_some()) {
        bail!("choose one link: --host or --serial/--com (both are only valid for `demo`)");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn init_logging(default_filter: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .with_context(|| format!("invalid log filter '{default_filter}'"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

fn load_responses(fixture: Option<&Path>) -> Result<SampleResponses> {
    match fixture {
        Some(path) => SampleResponses::load(path)
            .with_context(|| format!("failed to load fixture {}", path.display())),
        None => Ok(SampleResponses::builtin()),
    }
}

fn build_driver(cli: &Cli) -> Result<BucDriver> {
    let timeout = Duration::from_millis(cli.timeout_ms);
    let mut builder = BucBuilder::new().baud_rate(cli.baud).read_timeout(timeout);

    if cli.mock {
        let responses = Arc::new(load_responses(cli.fixture.as_deref())?);
        tracing::info!(entries = responses.len(), "Using simulated adapters");
        builder = builder
            .network_transport(Box::new(
                SimulatedTransport::new("network", Arc::clone(&responses))
                    .with_latency(MOCK_LATENCY),
            ))
            .serial_transport(Box::new(
                SimulatedTransport::new("serial", responses).with_latency(MOCK_LATENCY),
            ));
    }

    Ok(builder.build(|result, kind| println!("Command {kind}: {result}")))
}

async fn select_link(driver: &BucDriver, link: &Link) -> Result<()> {
    match link {
        Link::Network { host, port } => driver
            .select_network(host, *port)
            .await
            .with_context(|| format!("failed to connect to {host}:{port}")),
        Link::SerialDevice(path) => driver
            .select_serial_device(path)
            .await
            .with_context(|| format!("failed to open serial device {path}")),
        Link::SerialPort(port) => driver
            .select_serial(*port)
            .await
            .with_context(|| format!("failed to open serial port {port}")),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn queue_command(driver: &BucDriver, command: &Command) -> Result<()> {
    match command {
        Command::Temp { id: None } => driver.get_temperature(),
        Command::Temp { id: Some(id) } => driver.get_temperature_of(*id),
        Command::Mute => driver.mute(),
        Command::Unmute => driver.unmute(),
        Command::MuteState => driver.get_mute_state(),
        Command::Atten { action } => match action {
            AttenAction::Get => driver.get_attenuation(),
            AttenAction::Set { value } => driver.set_attenuation(*value),
        },
        Command::Sn => driver.get_serial_number(),
        Command::Power { reverse: false } => driver.get_power(),
        Command::Power { reverse: true } => driver.get_power_direction(PowerDirection::Reverse),
        Command::Faults => driver.get_all_faults(),
        Command::Demo => bail!("demo is a sequence, not a single command"),
    }
    Ok(())
}

fn queue_network_demo(driver: &BucDriver) {
    driver.set_attenuation(1);
    driver.get_attenuation();
    driver.get_serial_number();
    driver.get_power();
    driver.mute();
    driver.get_mute_state();
    driver.unmute();
    driver.get_temperature();
}

fn queue_serial_demo(driver: &BucDriver) {
    driver.get_all_faults();
    driver.get_serial_number();
    driver.get_power();
    driver.mute();
    driver.get_mute_state();
}

async fn run_demo(driver: &BucDriver, cli: &Cli) -> Result<()> {
    println!("Communication type: {}", driver.communication_type());
    // Nothing is selected yet, so this reports "Error: No connection".
    driver.get_serial_number();

    let network = cli.network_link().or_else(|| {
        cli.mock.then(|| Link::Network {
            host: "127.0.0.1".into(),
            port: cli.tcp_port,
        })
    });
    match network {
        Some(link) => {
            select_link(driver, &link).await?;
            println!("Communication type: {}", driver.communication_type());
            queue_network_demo(driver);
            driver.wait_idle().await;
            println!();
        }
        None => tracing::warn!("no --host given, skipping the Ethernet part of the demo"),
    }

    let serial = cli
        .serial_link()
        .or_else(|| cli.mock.then_some(Link::SerialPort(MOCK_DEMO_COM)));
    match serial {
        Some(link) => {
            select_link(driver, &link).await?;
            println!("Communication type: {}", driver.communication_type());
            queue_serial_demo(driver);
            driver.wait_idle().await;
        }
        None => tracing::warn!("no --serial or --com given, skipping the serial part of the demo"),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let driver = build_driver(&cli)?;

    if matches!(cli.command, Command::Demo) {
        run_demo(&driver, &cli).await?;
    } else {
        match cli.link() {
            Some(link) => select_link(&driver, &link).await?,
            None => tracing::warn!("no link selected; use --host, --serial or --com"),
        }
        queue_command(&driver, &cli.command)?;
        driver.wait_idle().await;
    }

    if driver.communication_type() != TransportKind::None {
        driver.disconnect().await.context("failed to disconnect")?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    validate_options(&cli)?;
    init_logging(&cli.log_level)?;
    run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bucctl").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn network_link_uses_default_port() {
        let cli = parse(&["--host", "10.0.0.5", "sn"]);
        assert_eq!(
            cli.link(),
            Some(Link::Network {
                host: "10.0.0.5".into(),
                port: DEFAULT_TCP_PORT,
            })
        );
        assert!(matches!(cli.command, Command::Sn));
    }

    #[test]
    fn serial_link_by_path_and_number() {
        let cli = parse(&["--serial", "/dev/ttyUSB0", "--baud", "19200", "faults"]);
        assert_eq!(cli.link(), Some(Link::SerialDevice("/dev/ttyUSB0".into())));
        assert_eq!(cli.baud, 19200);

        let cli = parse(&["--com", "3", "power", "--reverse"]);
        assert_eq!(cli.link(), Some(Link::SerialPort(3)));
        assert!(matches!(cli.command, Command::Power { reverse: true }));
    }

    #[test]
    fn no_link_is_allowed() {
        let cli = parse(&["mute-state"]);
        assert_eq!(cli.link(), None);
        assert_eq!(cli.log_level, "warn");
        assert_eq!(cli.timeout_ms, 1000);
    }

    #[test]
    fn atten_subcommands() {
        let cli = parse(&["--host", "h", "atten", "set", "20"]);
        assert!(matches!(
            cli.command,
            Command::Atten {
                action: AttenAction::Set { value: 20 }
            }
        ));
        let cli = parse(&["--host", "h", "atten", "get"]);
        assert!(matches!(
            cli.command,
            Command::Atten {
                action: AttenAction::Get
            }
        ));
    }

    #[test]
    fn conflicting_links_are_rejected() {
        let cli = parse(&["--host", "h", "--com", "1", "sn"]);
        assert!(validate_options(&cli).is_err());
        let result = Cli::try_parse_from(["bucctl", "--serial", "/dev/ttyS0", "--com", "1", "sn"]);
        assert!(result.is_err());
    }

    #[test]
    fn com_help_matches_device_naming() {
        use clap::CommandFactory;

        let command = Cli::command();
        let com = command
            .get_arguments()
            .find(|arg| arg.get_id() == "com")
            .unwrap();
        let help = com.get_help().unwrap().to_string();
        let name = buclib::transport::default_device_name(3);
        if cfg!(windows) {
            assert!(help.contains("COM<n>"));
            assert_eq!(name, "COM3");
        } else {
            assert!(help.contains("/dev/ttyS<n> "));
            assert_eq!(name, "/dev/ttyS3");
        }
    }

    #[test]
    fn demo_accepts_both_links() {
        let cli = parse(&["--host", "10.0.0.5", "--com", "2", "demo"]);
        validate_options(&cli).unwrap();
        assert_eq!(
            cli.network_link(),
            Some(Link::Network {
                host: "10.0.0.5".into(),
                port: DEFAULT_TCP_PORT,
            })
        );
        assert_eq!(cli.serial_link(), Some(Link::SerialPort(2)));
    }

    #[test]
    fn serial_path_wins_over_port_number() {
        let cli = Cli {
            serial: Some("/dev/ttyUSB1".into()),
            com: Some(4),
            ..parse(&["sn"])
        };
        assert_eq!(cli.serial_link(), Some(Link::SerialDevice("/dev/ttyUSB1".into())));
    }

    #[test]
    fn fixture_requires_mock() {
        let result = Cli::try_parse_from(["bucctl", "--fixture", "r.json", "sn"]);
        assert!(result.is_err());
        let cli = parse(&["--mock", "--fixture", "r.json", "--host", "sim", "sn"]);
        assert_eq!(cli.fixture, Some(PathBuf::from("r.json")));
    }

    #[test]
    fn missing_fixture_is_reported() {
        let err = load_responses(Some(Path::new("/nonexistent/responses.json"))).unwrap_err();
        assert!(err.to_string().contains("failed to load fixture"));
    }

    #[test]
    fn builtin_responses_without_fixture() {
        let responses = load_responses(None).unwrap();
        assert_eq!(responses.len(), 9);
    }

    #[tokio::test]
    async fn single_command_on_mock_link() {
        let cli = parse(&["--mock", "--host", "sim", "atten", "set", "20"]);
        let driver = build_driver(&cli).unwrap();
        select_link(&driver, &cli.link().unwrap()).await.unwrap();
        assert_eq!(driver.communication_type(), TransportKind::Network);
        queue_command(&driver, &cli.command).unwrap();
        driver.wait_idle().await;
        assert!(driver.is_idle());
        driver.disconnect().await.unwrap();
        assert_eq!(driver.communication_type(), TransportKind::None);
    }

    #[tokio::test]
    async fn demo_is_not_a_single_command() {
        let cli = parse(&["--mock", "demo"]);
        let driver = build_driver(&cli).unwrap();
        assert!(queue_command(&driver, &cli.command).is_err());
    }

    #[tokio::test]
    async fn mock_demo_switches_from_network_to_serial() {
        let cli = parse(&["--mock", "demo"]);
        let driver = build_driver(&cli).unwrap();
        let mut results = driver.subscribe();

        run_demo(&driver, &cli).await.unwrap();
        assert_eq!(driver.communication_type(), TransportKind::Serial);
        assert!(driver.is_idle());

        let mut kinds = Vec::new();
        while let Ok(result) = results.try_recv() {
            kinds.push(result.kind);
        }
        use buclib::CommandKind::*;
        assert_eq!(
            kinds,
            [
                GetSerialNumber,
                SetAttenuation,
                GetAttenuation,
                GetSerialNumber,
                GetPower,
                MuteBUC,
                GetMuteState,
                UnmuteBUC,
                GetTemperature,
                GetStatusOfAllFaults,
                GetSerialNumber,
                GetPower,
                MuteBUC,
                GetMuteState,
            ]
        );
    }
}
