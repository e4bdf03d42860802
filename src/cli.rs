// CLI definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use rmi_transport::{ReportMode, ALL_SOURCES};

#[derive(Parser)]
#[command(name = "rmi4utils")]
#[command(author, version, about = "Synaptics RMI4 over HID diagnostics")]
#[command(propagate_version = true)]
pub struct Cli {
    /// hidraw node of the RMI device
    #[arg(short, long, global = true, default_value = "/dev/hidraw0")]
    pub device: String,

    /// Report mode selected after opening
    #[arg(long, global = true, value_enum, default_value_t = ModeArg::Attention)]
    pub mode: ModeArg,

    /// Largest register read issued as one request (0 = no limit)
    #[arg(long, global = true, default_value_t = 0)]
    pub read_chunk: usize,

    /// Wait for each read-data report (ms)
    #[arg(long, global = true, default_value_t = 200)]
    pub read_timeout_ms: u64,

    /// Debug logging for all RMI crates
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan functions and print F01 device properties
    #[command(visible_alias = "i")]
    Info,

    /// Reset the device through F01 and rescan
    Reset,

    /// Read registers
    #[command(visible_alias = "r")]
    Read {
        /// Register address (hex with 0x prefix, or decimal)
        #[arg(value_parser = parse_u16)]
        addr: u16,

        /// Number of bytes
        #[arg(default_value_t = 1)]
        len: usize,
    },

    /// Write registers
    #[command(visible_alias = "w")]
    Write {
        /// Register address (hex with 0x prefix, or decimal)
        #[arg(value_parser = parse_u16)]
        addr: u16,

        /// Data bytes in hex (e.g. 01 ff)
        #[arg(required = true, value_parser = parse_hex_byte)]
        data: Vec<u8>,
    },

    /// Print attention reports until Ctrl+C
    #[command(visible_alias = "a")]
    Attn {
        /// Interrupt source mask
        #[arg(long, value_parser = parse_u32, default_value_t = ALL_SOURCES)]
        mask: u32,

        /// Only reports raised by this function's sources (e.g. 0x12)
        #[arg(long, value_parser = parse_u8, conflicts_with = "mask")]
        function: Option<u8>,

        /// Stop after this many reports
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Give up after waiting this long for a report (ms)
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },
}

/// Report mode names accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Mouse,
    Attention,
    NoPacked,
}

impl From<ModeArg> for ReportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Mouse => ReportMode::Mouse,
            ModeArg::Attention => ReportMode::AttentionReports,
            ModeArg::NoPacked => ReportMode::NoPackedAttentionReports,
        }
    }
}

fn parse_number(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

pub fn parse_u8(s: &str) -> Result<u8, String> {
    let value = parse_number(s)?;
    u8::try_from(value).map_err(|_| format!("{s} does not fit in 8 bits"))
}

pub fn parse_u16(s: &str) -> Result<u16, String> {
    let value = parse_number(s)?;
    u16::try_from(value).map_err(|_| format!("{s} does not fit in 16 bits"))
}

pub fn parse_u32(s: &str) -> Result<u32, String> {
    let value = parse_number(s)?;
    u32::try_from(value).map_err(|_| format!("{s} does not fit in 32 bits"))
}

/// Data bytes are always hex, with or without a prefix
pub fn parse_hex_byte(s: &str) -> Result<u8, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid byte '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_u16("0x00E9"), Ok(0x00E9));
        assert_eq!(parse_u16("255"), Ok(255));
        assert!(parse_u16("0x10000").is_err());
        assert!(parse_u8("256").is_err());
        assert_eq!(parse_u32("0xFFFFFFFF"), Ok(u32::MAX));
    }

    #[test]
    fn test_parse_hex_byte() {
        assert_eq!(parse_hex_byte("ff"), Ok(0xFF));
        assert_eq!(parse_hex_byte("0x01"), Ok(0x01));
        assert_eq!(parse_hex_byte("10"), Ok(0x10));
        assert!(parse_hex_byte("100").is_err());
    }

    #[test]
    fn test_write_command_args() {
        let cli = Cli::try_parse_from(["rmi4utils", "write", "0x01FF", "00", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Write { addr, data } => {
                assert_eq!(addr, 0x01FF);
                assert_eq!(data, vec![0x00]);
            }
            _ => panic!("expected write"),
        }
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "rmi4utils",
            "info",
            "--device",
            "/dev/hidraw3",
            "--mode",
            "no-packed",
            "--read-chunk",
            "16",
            "--read-timeout-ms",
            "500",
        ])
        .unwrap();
        assert_eq!(cli.device, "/dev/hidraw3");
        assert_eq!(
            ReportMode::from(cli.mode),
            ReportMode::NoPackedAttentionReports
        );
        assert_eq!(cli.read_chunk, 16);
        assert_eq!(cli.read_timeout_ms, 500);
    }

    #[test]
    fn test_attn_mask_conflicts_with_function() {
        let result =
            Cli::try_parse_from(["rmi4utils", "attn", "--mask", "1", "--function", "0x11"]);
        assert!(result.is_err());
    }
}
