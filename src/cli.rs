use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

use dxl_recorder::protocol::ProtocolVersion;

#[derive(Error, Debug)]
pub enum RangeError {
    #[error("range mask '{0}' not in 1..=16")]
    BadRange(String),
}

fn parse_with_radix<T>(input: &str) -> Result<T, T::FromStrRadixErr>
where
    T: num::Num,
    <T as num::Num>::FromStrRadixErr: std::error::Error + Send + Sync,
{
    if input.starts_with("0x") {
        T::from_str_radix(input.trim_start_matches("0x"), 16)
    } else if input.starts_with("0b") {
        T::from_str_radix(input.trim_start_matches("0b"), 2)
    } else {
        T::from_str_radix(input, 10)
    }
}

fn parse_range(input: &str) -> Result<u16, RangeError> {
    let value: u16 =
        parse_with_radix(input).map_err(|_| RangeError::BadRange(input.to_string()))?;
    if (1..=16).contains(&value) {
        Ok(value)
    } else {
        Err(RangeError::BadRange(input.to_string()))
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Skip the port-busy sanity check
    #[clap(long, short)]
    pub force: bool,

    /// Enable debug output
    #[clap(long, short)]
    pub debug: bool,

    /// UART device or 'auto'
    #[clap(long, short, default_value = "auto")]
    pub port: String,

    /// UART baud rate
    #[clap(long, short, default_value_t = 115200)]
    pub baudrate: u32,

    /// Dynamixel protocol version
    #[clap(long, short = 'P', default_value = "2")]
    pub protocol: ProtocolVersion,

    /// Bus ID of the recorder hub
    #[clap(long, short, default_value = "171", parse(try_from_str=parse_with_radix))]
    pub id: u8,

    /// Target sensor identifier
    #[clap(long, short, default_value = "46", parse(try_from_str=parse_with_radix))]
    pub sensor: u16,

    /// Range-select mask written to the hub port
    #[clap(long, short, default_value = "1", parse(try_from_str=parse_range))]
    pub range: u16,

    /// Measurement pairs to collect
    #[clap(long, short, default_value_t = 3)]
    pub cycles: u16,

    /// Seconds between sample reads
    #[clap(long, default_value_t = 9)]
    pub interval: u64,

    /// Sensor warm-up time in seconds (0 disables)
    #[clap(long, default_value_t = 54)]
    pub warmup: u64,

    /// Log file path
    #[clap(long, short, default_value = "results_term_compens.txt", parse(from_os_str))]
    pub output: PathBuf,

    /// Read/write retry count
    #[clap(long, default_value_t = 0)]
    pub retries: usize,

    /// Print collected pairs as JSON
    #[clap(long, short)]
    pub json: bool,
}
