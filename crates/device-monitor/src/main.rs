//! Device Monitor entry point.
//!
//! Starts the monitor, waits until the target number of readings has
//! arrived (or Ctrl+C is pressed), stops the session and prints how many
//! readings each device sent.
//!
//! # Usage
//!
//! ```text
//! device-monitor [OPTIONS]
//!
//! Options:
//!   --config   <PATH>    TOML config file
//!   --bind     <IP>      Address to listen on [config default: 127.0.0.1]
//!   --host     <NAME>    Host name to resolve and listen on (overrides --bind)
//!   --port     <PORT>    Port to listen on [config default: 6666]
//!   --readings <N>       Readings to collect before stopping [config default: 11]
//!   --dedup    <POLICY>  last-seen | first-seen [config default: last-seen]
//!   --format   <FMT>     xml | json [default: xml]
//!   --write-config <PATH>  Write the effective config as TOML and exit
//! ```
//!
//! # Precedence
//!
//! CLI flag (or its `DEVICE_MONITOR_*` environment variable) > config file >
//! built-in default.  The log filter comes from `RUST_LOG` when set, else
//! from the config file's `log.level`.
//!
//! Logs go to stderr so the summary on stdout can be piped.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use device_monitor::application::{render, DeviceMonitor, ReportFormat};
use device_monitor::infrastructure::storage::{load_config, save_config, MonitorConfig};
use telemetry_core::DedupPolicy;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Single-device telemetry monitor.
///
/// Listens for one device, acknowledges its frames, drops retransmissions
/// and reports the number of readings per device.
#[derive(Debug, Parser)]
#[command(
    name = "device-monitor",
    about = "Single-client TCP telemetry monitor",
    version
)]
struct Cli {
    /// Path to a TOML config file.  A missing file means built-in defaults.
    #[arg(long, env = "DEVICE_MONITOR_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on.
    #[arg(long, env = "DEVICE_MONITOR_BIND")]
    bind: Option<String>,

    /// Host name to resolve and listen on.  The first IPv4 address wins.
    #[arg(long, env = "DEVICE_MONITOR_HOST")]
    host: Option<String>,

    /// TCP port the device connects to.
    #[arg(long, env = "DEVICE_MONITOR_PORT")]
    port: Option<u16>,

    /// Number of readings to collect before stopping.
    #[arg(long, env = "DEVICE_MONITOR_READINGS")]
    readings: Option<usize>,

    /// How a repeated sequence byte is detected.
    #[arg(long, value_enum, env = "DEVICE_MONITOR_DEDUP")]
    dedup: Option<DedupArg>,

    /// Summary output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Xml, env = "DEVICE_MONITOR_FORMAT")]
    format: OutputFormat,

    /// Write the effective configuration (file + flags) to PATH and exit.
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DedupArg {
    /// Compare with the device's most recent frame.
    LastSeen,
    /// Compare with the device's first frame only.
    FirstSeen,
}

impl From<DedupArg> for DedupPolicy {
    fn from(arg: DedupArg) -> Self {
        match arg {
            DedupArg::LastSeen => DedupPolicy::LastSeen,
            DedupArg::FirstSeen => DedupPolicy::FirstSeen,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Xml,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Xml => ReportFormat::Xml,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

impl Cli {
    /// Overrides `config` with every flag that was given.
    fn apply_to(&self, config: &mut MonitorConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(readings) = self.readings {
            config.session.target_readings = readings;
        }
        if let Some(dedup) = self.dedup {
            config.session.dedup_policy = dedup.into();
        }
    }

    /// Loads the config file (if any) and applies the CLI overrides.
    fn resolve_config(&self) -> anyhow::Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => MonitorConfig::default(),
        };
        self.apply_to(&mut config);
        Ok(config)
    }
}

/// Saves `config` so it can be edited and passed back with `--config`.
fn export_config(path: &Path, config: &MonitorConfig) -> anyhow::Result<()> {
    config.validate().context("refusing to write an invalid configuration")?;
    save_config(path, config)
        .with_context(|| format!("failed to write config to {}", path.display()))
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    if let Some(path) = &cli.write_config {
        export_config(path, &config)?;
        println!("wrote configuration to {}", path.display());
        return Ok(());
    }

    init_logging(&config.log.level);
    config.validate().context("invalid configuration")?;

    let mut monitor = match &cli.host {
        Some(host) => DeviceMonitor::resolve(host, config.listener.port, config.settings())
            .await
            .with_context(|| format!("cannot listen on host '{host}'"))?,
        None => DeviceMonitor::from_config(&config)?,
    };

    let target = config.session.target_readings;
    let addr = monitor
        .start()
        .await
        .context("failed to start the device monitor")?;
    info!("device monitor listening on {addr}, waiting for {target} reading(s)");

    // ── Wait for the target or Ctrl+C ─────────────────────────────────────────
    tokio::select! {
        result = monitor.wait_for_readings(target) => match result {
            Ok(readings) => info!("collected {readings} reading(s)"),
            Err(e) => warn!("stopping early: {e}"),
        },
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("received Ctrl+C, stopping"),
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        },
    }

    monitor.stop();
    if let Some(report) = monitor.join().await.context("connection task failed")? {
        info!(
            session = %report.session_id,
            stored = report.readings_stored,
            duplicates = report.duplicates_dropped,
            acks = report.acks_sent,
            receive_errors = report.receive_errors,
            "session finished"
        );
    }

    let summary = monitor.summary().await;
    let rendered = render(&summary, cli.format.into()).context("failed to render summary")?;
    println!("{rendered}");

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_leave_config_untouched() {
        // Arrange
        let cli = Cli::parse_from(["device-monitor"]);
        let mut config = MonitorConfig::default();

        // Act
        cli.apply_to(&mut config);

        // Assert
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_cli_default_format_is_xml() {
        let cli = Cli::parse_from(["device-monitor"]);
        assert_eq!(cli.format, OutputFormat::Xml);
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["device-monitor", "--port", "9000"]);
        let mut config = MonitorConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config.listener.port, 9000);
    }

    #[test]
    fn test_cli_bind_override() {
        let cli = Cli::parse_from(["device-monitor", "--bind", "0.0.0.0"]);
        let mut config = MonitorConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config.listener.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_cli_readings_override() {
        let cli = Cli::parse_from(["device-monitor", "--readings", "3"]);
        let mut config = MonitorConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config.session.target_readings, 3);
    }

    #[test]
    fn test_cli_dedup_first_seen() {
        // Arrange
        let cli = Cli::parse_from(["device-monitor", "--dedup", "first-seen"]);
        let mut config = MonitorConfig::default();

        // Act
        cli.apply_to(&mut config);

        // Assert
        assert_eq!(config.session.dedup_policy, DedupPolicy::FirstSeen);
    }

    #[test]
    fn test_cli_json_format() {
        let cli = Cli::parse_from(["device-monitor", "--format", "json"]);
        assert_eq!(ReportFormat::from(cli.format), ReportFormat::Json);
    }

    #[test]
    fn test_cli_rejects_unknown_dedup_policy() {
        let result = Cli::try_parse_from(["device-monitor", "--dedup", "newest"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_out_of_range_port() {
        let result = Cli::try_parse_from(["device-monitor", "--port", "70000"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_config_missing_file_uses_defaults_plus_flags() {
        // Arrange
        let missing = std::env::temp_dir().join("device-monitor-no-such-config.toml");
        let cli = Cli::parse_from([
            "device-monitor",
            "--config",
            missing.to_str().unwrap(),
            "--port",
            "7100",
        ]);

        // Act
        let config = cli.resolve_config().unwrap();

        // Assert
        assert_eq!(config.listener.port, 7100);
        assert_eq!(config.session.target_readings, 11);
    }

    #[test]
    fn test_export_config_writes_flags_into_loadable_file() {
        // Arrange
        let path = std::env::temp_dir()
            .join(format!("device-monitor-export-{}", uuid::Uuid::new_v4()))
            .join("monitor.toml");
        let cli = Cli::parse_from([
            "device-monitor",
            "--port",
            "7200",
            "--dedup",
            "first-seen",
            "--write-config",
            path.to_str().unwrap(),
        ]);
        let config = cli.resolve_config().unwrap();

        // Act
        export_config(cli.write_config.as_deref().unwrap(), &config).unwrap();

        // Assert
        let restored = load_config(&path).unwrap();
        assert_eq!(restored.listener.port, 7200);
        assert_eq!(restored.session.dedup_policy, DedupPolicy::FirstSeen);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_export_config_rejects_invalid_values() {
        let path = std::env::temp_dir().join("device-monitor-never-written.toml");
        let cli = Cli::parse_from(["device-monitor", "--readings", "0"]);
        let config = cli.resolve_config().unwrap();

        assert!(export_config(&path, &config).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_cli_host_is_kept_verbatim() {
        let cli = Cli::parse_from(["device-monitor", "--host", "localhost"]);
        assert_eq!(cli.host.as_deref(), Some("localhost"));
    }
}
