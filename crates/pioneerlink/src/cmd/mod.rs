use clap::{Args, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

use pioneerlink_device::LinkConfig;

use crate::exit::{io_error, link_error, CliResult};
use crate::output::OutputFormat;

pub mod config;
pub mod decode;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to the vehicle and print published values until Ctrl-C.
    Run(RunArgs),
    /// Decode a raw channel log.
    Decode(DecodeArgs),
    /// Print the effective link configuration.
    Config(ConfigArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Config(args) => config::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// Link settings. Each flag overrides the `--config` file, which overrides
/// the built-in defaults.
#[derive(Args, Debug, Default)]
pub struct LinkArgs {
    /// JSON file with a full or partial link configuration.
    #[arg(long, value_name = "FILE", env = "PIONEER_CONFIG")]
    pub config: Option<PathBuf>,
    /// Vehicle address for the command channel.
    #[arg(long, value_name = "ADDR", env = "PIONEER_TCP_ADDR")]
    pub tcp_addr: Option<IpAddr>,
    /// Vehicle command port.
    #[arg(long, value_name = "PORT", env = "PIONEER_TCP_PORT")]
    pub tcp_port: Option<u16>,
    /// Local telemetry port (0 picks a free port).
    #[arg(long, value_name = "PORT", env = "PIONEER_UDP_PORT")]
    pub udp_port: Option<u16>,
    /// Connect and write timeout in seconds.
    #[arg(long, value_name = "SECS", env = "PIONEER_COMM_TIMEOUT")]
    pub comm_timeout: Option<u64>,
    /// Never connect the command channel or send anything.
    #[arg(long, env = "PIONEER_LISTEN_ONLY")]
    pub listen_only: bool,
    /// Only accept telemetry from the command address.
    #[arg(long, env = "PIONEER_FILTER_UDP")]
    pub filter_udp_to_tcp: bool,
    /// Publish a navigation estimate built from telemetry.
    #[arg(long, env = "PIONEER_SYNTHETIC_STATE")]
    pub synthetic_state: bool,
    /// Publish raw copies of commands and decoded records.
    #[arg(long, env = "PIONEER_RAW_ECHO")]
    pub raw_echo: bool,
    /// Do not write raw logs during logging sessions.
    #[arg(long)]
    pub no_log_raw: bool,
    /// Do not correct the vehicle clock.
    #[arg(long)]
    pub no_set_time: bool,
}

impl LinkArgs {
    /// Resolve the effective configuration and validate it.
    pub fn resolve(&self) -> CliResult<LinkConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|err| {
                    io_error(&format!("failed to read {}", path.display()), err)
                })?;
                LinkConfig::from_json(&text).map_err(|err| link_error("invalid config file", err))?
            }
            None => LinkConfig::default(),
        };

        if let Some(addr) = self.tcp_addr {
            config.tcp_addr = addr;
        }
        if let Some(port) = self.tcp_port {
            config.tcp_port = port;
        }
        if let Some(port) = self.udp_port {
            config.udp_listen_port = port;
        }
        if let Some(secs) = self.comm_timeout {
            config.comm_timeout = secs;
        }
        config.listen_only |= self.listen_only;
        config.filter_udp_to_tcp |= self.filter_udp_to_tcp;
        config.synthetic_state |= self.synthetic_state;
        config.raw_echo |= self.raw_echo;
        if self.no_log_raw {
            config.log_raw = false;
        }
        if self.no_set_time {
            config.set_time = false;
        }

        config
            .validate()
            .map_err(|err| link_error("config", err))?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Start a raw logging session in this folder.
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
    /// Heartbeat period in milliseconds.
    #[arg(long, value_name = "MS", default_value = "1000")]
    pub heartbeat_ms: u64,
    /// Exit after printing N values.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogChannel {
    /// `telemetry.bin`: UDP telemetry records.
    Telemetry,
    /// `replies.bin`: records received on the command channel.
    Replies,
    /// `commands.bin`: commands sent to the vehicle.
    Commands,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Raw log to decode.
    pub file: PathBuf,
    /// Which stream the file holds. Inferred from the file name if omitted.
    #[arg(long, short = 'c')]
    pub channel: Option<LogChannel>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn flags_override_defaults() {
        let args = LinkArgs {
            tcp_addr: Some(IpAddr::V4(Ipv4Addr::new(192, 168, 2, 2))),
            udp_port: Some(0),
            listen_only: true,
            no_set_time: true,
            ..LinkArgs::default()
        };
        let config = args.resolve().expect("config should resolve");
        assert_eq!(config.tcp_addr, IpAddr::V4(Ipv4Addr::new(192, 168, 2, 2)));
        assert_eq!(config.udp_listen_port, 0);
        assert!(config.listen_only);
        assert!(!config.set_time);
        assert!(config.log_raw);
    }

    #[test]
    fn out_of_range_timeout_is_usage_error() {
        let args = LinkArgs {
            comm_timeout: Some(0),
            ..LinkArgs::default()
        };
        let err = args.resolve().expect_err("timeout 0 should be rejected");
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn file_values_are_overridden_by_flags() {
        let path = std::env::temp_dir().join(format!(
            "pioneerlink-config-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::write(&path, r#"{"tcp_port": 3000, "comm_timeout": 5}"#)
            .expect("config file should be writable");

        let args = LinkArgs {
            config: Some(path.clone()),
            tcp_port: Some(4000),
            ..LinkArgs::default()
        };
        let config = args.resolve().expect("config should resolve");
        assert_eq!(config.tcp_port, 4000);
        assert_eq!(config.comm_timeout, 5);
        let _ = std::fs::remove_file(&path);
    }
}
