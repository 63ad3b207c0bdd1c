//! Engine configuration
//!
//! Options are grouped the way they are consumed: the arena, the wire
//! codecs and the ASCII bridge. A complete file looks like:
//!
//! ```toml
//! [arena]
//! max_bytes = 0
//! abort_on_identity_violation = false
//!
//! [codec]
//! long_wire_width = "32"
//! quiet_overflow = false
//!
//! [ascii]
//! max_token_length = 400
//! float_precision = 15
//! ```
//!
//! Every key is optional.

use crate::error::{ArrayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Wire width used for the native-width `long`/`ulong` types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LongWidth {
    #[default]
    #[serde(rename = "32")]
    Bits32,
    #[serde(rename = "64")]
    Bits64,
}

impl LongWidth {
    pub fn bytes(&self) -> usize {
        match self {
            LongWidth::Bits32 => 4,
            LongWidth::Bits64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Upper bound on bytes in live blocks; 0 disables the limit
    pub max_bytes: usize,

    /// Abort the process on double free or a foreign address instead of
    /// returning `CorruptOrFreedHandle`
    pub abort_on_identity_violation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    pub long_wire_width: LongWidth,

    /// Report undersized buffers without a warning
    pub quiet_overflow: bool,
}

impl CodecOptions {
    pub fn with_long_width(mut self, width: LongWidth) -> Self {
        self.long_wire_width = width;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet_overflow = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsciiOptions {
    /// Longest token the tokenizer will return; longer input is cut
    pub max_token_length: usize,

    /// Significant digits for float and double tokens
    pub float_precision: usize,
}

impl Default for AsciiOptions {
    fn default() -> Self {
        AsciiOptions {
            max_token_length: 400,
            float_precision: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub arena: ArenaConfig,
    pub codec: CodecOptions,
    pub ascii: AsciiOptions,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ascii.max_token_length == 0 {
            return Err(ArrayError::IllegalArgument(
                "ascii.max_token_length must be at least 1".into(),
            ));
        }
        if self.ascii.float_precision == 0 || self.ascii.float_precision > 17 {
            return Err(ArrayError::IllegalArgument(format!(
                "ascii.float_precision must be between 1 and 17, got {}",
                self.ascii.float_precision
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.arena.max_bytes, 0);
        assert_eq!(config.codec.long_wire_width, LongWidth::Bits32);
        assert_eq!(config.ascii.max_token_length, 400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [codec]
            long_wire_width = "64"
            "#,
        )
        .unwrap();
        assert_eq!(config.codec.long_wire_width, LongWidth::Bits64);
        assert!(!config.codec.quiet_overflow);
        assert_eq!(config.ascii.float_precision, 15);
    }

    #[test]
    fn test_full_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [arena]
            max_bytes = 4096
            abort_on_identity_violation = true

            [codec]
            long_wire_width = "32"
            quiet_overflow = true

            [ascii]
            max_token_length = 64
            float_precision = 6
            "#,
        )
        .unwrap();
        assert_eq!(config.arena.max_bytes, 4096);
        assert!(config.arena.abort_on_identity_violation);
        assert!(config.codec.quiet_overflow);
        assert_eq!(config.ascii.max_token_length, 64);
    }

    #[test]
    fn test_invalid_width() {
        let result = EngineConfig::from_toml_str("[codec]\nlong_wire_width = \"16\"\n");
        assert!(matches!(result, Err(ArrayError::Config(_))));
    }

    #[test]
    fn test_invalid_precision() {
        let result = EngineConfig::from_toml_str("[ascii]\nfloat_precision = 40\n");
        assert!(matches!(result, Err(ArrayError::IllegalArgument(_))));
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut config = EngineConfig::default();
        config.codec.long_wire_width = LongWidth::Bits64;
        let text = toml::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }
}
