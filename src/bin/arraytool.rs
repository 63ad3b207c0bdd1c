//! arraytool
//!
//! Encode, decode and inspect self-describing arrays from the shell

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, info};
use typed_array::{Datatype, Engine, EngineConfig, LongWidth};

#[derive(Parser, Debug)]
#[command(name = "arraytool")]
#[command(about = "Encode, decode and inspect self-describing arrays")]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse element tokens and print the wire bytes as hex
    Encode {
        #[command(flatten)]
        shape: Shape,

        #[command(flatten)]
        wire: Wire,

        /// Element tokens, separated by whitespace
        tokens: String,
    },

    /// Decode hex wire bytes and print the element tokens
    Decode {
        #[command(flatten)]
        shape: Shape,

        #[command(flatten)]
        wire: Wire,

        /// Wire bytes as hex; whitespace is ignored
        hex: String,
    },

    /// Allocate an array of the given shape and print its header
    Header {
        #[command(flatten)]
        shape: Shape,

        /// Print the header as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct Shape {
    /// Datatype name (double, int32, string, ...)
    #[arg(short = 't', long)]
    datatype: Datatype,

    /// Comma separated dimensions, outermost first; omit for a scalar
    #[arg(short = 'd', long, value_parser = parse_dims, default_value = "")]
    dims: Dims,
}

#[derive(Args, Debug)]
struct Wire {
    /// Wire format
    #[arg(short = 'f', long, value_enum, default_value = "xdr")]
    format: Format,

    /// Send `long`/`ulong` as 64-bit values on the native wire
    #[arg(long)]
    long64: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Xdr,
    Native,
}

#[derive(Clone, Debug)]
struct Dims(Vec<usize>);

fn parse_dims(s: &str) -> Result<Dims, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Dims(Vec::new()));
    }
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| format!("Invalid dimension '{}'", part))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Dims)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn from_hex(text: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        bail!("Hex input has an odd number of digits");
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).context("Hex input is not ASCII")?;
            u8::from_str_radix(pair, 16).with_context(|| format!("Invalid hex byte '{}'", pair))
        })
        .collect()
}

fn build_engine(config: Option<&PathBuf>, wire: Option<&Wire>) -> Result<Engine> {
    let mut config = match config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => EngineConfig::default(),
    };
    if wire.is_some_and(|w| w.long64) {
        config.codec.long_wire_width = LongWidth::Bits64;
    }
    Ok(Engine::with_config(config))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Encode {
            shape,
            wire,
            tokens,
        } => {
            let mut engine = build_engine(cli.config.as_ref(), Some(&wire))?;
            let array = engine.allocate(shape.datatype, &shape.dims.0)?;
            let ascii = engine.ascii();
            let used = ascii.tokens_to_array(engine.arena_mut(), array, &tokens)?;
            debug!("Parsed {} tokens", used);

            let bytes = match wire.format {
                Format::Xdr => engine.xdr().encode(engine.arena(), array)?,
                Format::Native => engine.native().encode(engine.arena(), array)?,
            };
            info!("Encoded {} bytes as {:?}", bytes.len(), wire.format);
            println!("{}", to_hex(&bytes));
            engine.free(array)?;
        }
        Command::Decode { shape, wire, hex } => {
            let mut engine = build_engine(cli.config.as_ref(), Some(&wire))?;
            let array = engine.allocate(shape.datatype, &shape.dims.0)?;
            let mut bytes = from_hex(&hex)?;

            let consumed = match wire.format {
                Format::Xdr => {
                    let codec = engine.xdr();
                    codec.decode(engine.arena_mut(), array, &mut bytes)?
                }
                Format::Native => {
                    let codec = engine.native();
                    codec.decode(engine.arena_mut(), array, &bytes)?
                }
            };
            info!("Decoded {} of {} bytes", consumed, bytes.len());
            println!("{}", engine.ascii().array_to_tokens(engine.arena(), array)?);
            engine.free(array)?;
        }
        Command::Header { shape, json } => {
            let mut engine = build_engine(cli.config.as_ref(), None)?;
            let array = engine.allocate(shape.datatype, &shape.dims.0)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&engine.header(array)?)?);
            } else {
                print!("{}", engine.dump(array)?);
            }
            engine.free(array)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dims() {
        assert_eq!(parse_dims("2, 3,4").unwrap().0, vec![2, 3, 4]);
        assert!(parse_dims("").unwrap().0.is_empty());
        assert!(parse_dims("2,x").is_err());
    }

    #[test]
    fn test_hex() {
        assert_eq!(to_hex(&[0, 0xab, 0x10]), "00ab10");
        assert_eq!(from_hex("00 ab\n10").unwrap(), vec![0, 0xab, 0x10]);
        assert!(from_hex("abc").is_err());
        assert!(from_hex("zz").is_err());
    }
}
