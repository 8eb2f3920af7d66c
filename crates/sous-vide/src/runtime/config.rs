use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{flag} requires a value")]
    MissingValue { flag: String },

    #[error("invalid value {value:?} for {flag}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown option {0:?} (see --help)")]
    UnknownFlag(String),
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub relay_pin: u32,
    pub target: f64,
    pub kp: f64,
    pub ki: f64,
    pub cycle_time: f64,
    pub min_duration: f64,
    pub sample_period: Duration,
    pub sensor_id: Option<String>,
    pub gpio_root: PathBuf,
    pub w1_root: PathBuf,
    pub bind_addr: String,
    pub server_enabled: bool,
    pub simulate: bool,
    /// Simulated bath seconds per real second.
    pub time_scale: f64,
    pub run_seconds: Option<Duration>,
    pub json_logs: bool,
    pub log_dir: Option<PathBuf>,
    pub metrics_addr: Option<String>,
    pub history_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            relay_pin: 17,
            target: 78.0,
            kp: 0.2,
            ki: 0.004,
            cycle_time: 20.0,
            min_duration: 1.0,
            sample_period: Duration::from_secs(10),
            sensor_id: None,
            gpio_root: PathBuf::from(sous_io::gpio::SYSFS_GPIO_ROOT),
            w1_root: PathBuf::from(sous_io::ds18b20::W1_DEVICES_ROOT),
            bind_addr: "0.0.0.0:9901".to_string(),
            server_enabled: true,
            simulate: false,
            time_scale: 1.0,
            run_seconds: None,
            json_logs: false,
            log_dir: None,
            metrics_addr: None,
            history_limit: 8_640,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            let mut value = || next_value(args, &mut i, flag);
            match flag {
                "--relay-pin" => cfg.relay_pin = parse(flag, value()?)?,
                "--target" => cfg.target = parse_finite(flag, value()?)?,
                "--kp" => cfg.kp = parse_finite(flag, value()?)?,
                "--ki" => cfg.ki = parse_finite(flag, value()?)?,
                "--cycle-time" => cfg.cycle_time = parse_duration(flag, value()?)?.as_secs_f64(),
                "--min-duration" => {
                    cfg.min_duration = parse_duration(flag, value()?)?.as_secs_f64();
                }
                "--sample-period" => cfg.sample_period = parse_duration(flag, value()?)?,
                "--sensor-id" => cfg.sensor_id = Some(value()?.to_string()),
                "--gpio-root" => cfg.gpio_root = PathBuf::from(value()?),
                "--w1-root" => cfg.w1_root = PathBuf::from(value()?),
                "--bind" => cfg.bind_addr = value()?.to_string(),
                "--no-server" => cfg.server_enabled = false,
                "--simulate" => cfg.simulate = true,
                "--time-scale" => {
                    cfg.simulate = true;
                    cfg.time_scale = parse_positive(flag, value()?)?;
                }
                "--run-seconds" => cfg.run_seconds = Some(parse_duration(flag, value()?)?),
                "--json-logs" => cfg.json_logs = true,
                "--log-dir" => cfg.log_dir = Some(PathBuf::from(value()?)),
                "--metrics-addr" => cfg.metrics_addr = Some(value()?.to_string()),
                "--history-limit" => cfg.history_limit = parse(flag, value()?)?,
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                other => return Err(ConfigError::UnknownFlag(other.to_string())),
            }
            i += 1;
        }
        Ok(cfg)
    }

    pub fn print_help() {
        println!(
            r#"sous-vide - PI temperature controller driving a heater relay

USAGE:
    sous-vide [OPTIONS]

OPTIONS:
    --relay-pin <N>         GPIO pin driving the heater relay [default: 17]
    --target <F>            Target bath temperature in °F [default: 78]
    --kp <GAIN>             Proportional gain [default: 0.2]
    --ki <GAIN>             Integral gain [default: 0.004]
    --cycle-time <SECS>     Heater on/off period [default: 20]
    --min-duration <SECS>   Shortest relay on or off stretch [default: 1]
    --sample-period <SECS>  Seconds between temperature samples [default: 10]
    --sensor-id <ID>        1-Wire sensor id (e.g. 28-0000075a1f2b) [default: first found]
    --gpio-root <PATH>      Sysfs GPIO directory [default: /sys/class/gpio]
    --w1-root <PATH>        1-Wire devices directory [default: /sys/bus/w1/devices]
    --bind <ADDR>           HTTP state server address [default: 0.0.0.0:9901]
    --no-server             Disable the HTTP state server
    --simulate              Use a simulated relay and water bath instead of hardware
    --time-scale <X>        Simulated seconds per real second (implies --simulate) [default: 1]
    --run-seconds <SECS>    Run for a fixed duration then exit
    --json-logs             Output logs in JSON format (for log aggregation)
    --log-dir <PATH>        Also write logs to a daily rolling file in PATH
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --history-limit <N>     States kept in memory for /history [default: 8640]
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,sous_core=trace)

EXAMPLES:
    # Cook at 131 °F on pin 17 with metrics
    sous-vide --target 131 --metrics-addr 0.0.0.0:9090

    # Short simulated run, bath running 60x real time
    sous-vide --time-scale 60 --sample-period 1 --run-seconds 30
"#
        );
    }
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, ConfigError> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::MissingValue {
            flag: flag.to_string(),
        })
}

fn parse<T: FromStr>(flag: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}

fn parse_finite(flag: &str, value: &str) -> Result<f64, ConfigError> {
    let number: f64 = parse(flag, value)?;
    if number.is_finite() {
        Ok(number)
    } else {
        Err(ConfigError::InvalidValue {
            flag: flag.to_string(),
            value: value.to_string(),
        })
    }
}

fn parse_positive(flag: &str, value: &str) -> Result<f64, ConfigError> {
    let number = parse_finite(flag, value)?;
    if number > 0.0 {
        Ok(number)
    } else {
        Err(ConfigError::InvalidValue {
            flag: flag.to_string(),
            value: value.to_string(),
        })
    }
}

/// A positive number of seconds that fits in a `Duration`.
fn parse_duration(flag: &str, value: &str) -> Result<Duration, ConfigError> {
    let seconds = parse_positive(flag, value)?;
    Duration::try_from_secs_f64(seconds).map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}
