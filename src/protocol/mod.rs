//! LS9 SysEx parameter protocol
//!
//! Parameter addressing, value range and the fixed frame layout used to
//! read and write mixer parameters.

pub mod codec;
pub mod error;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use codec::{decode, decode_request, encode_param_change, encode_param_request};
pub use error::DecodeError;

/// Parameter value as carried on the wire (35-bit two's complement)
pub type Value = i64;

/// Number of significant bits in a wire value
pub const VALUE_BITS: u32 = 35;

/// Smallest value representable on the wire
pub const VALUE_MIN: Value = -(1 << (VALUE_BITS - 1));

/// Largest value representable on the wire
pub const VALUE_MAX: Value = (1 << (VALUE_BITS - 1)) - 1;

/// Largest address field value (two 7-bit halves)
pub const ADDRESS_MAX: u16 = 0x3FFF;

/// Address of a control on the mixer
///
/// The triple is opaque to this crate: the meaning of `element`, `index`
/// and `channel` is defined by the device's parameter tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Parameter {
    pub element: u16,
    pub index: u16,
    pub channel: u16,
}

impl Parameter {
    pub const fn new(element: u16, index: u16, channel: u16) -> Self {
        Self {
            element,
            index,
            channel,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.element, self.index, self.channel)
    }
}

/// Error returned when parsing `element:index:channel` fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid parameter '{0}' (expected element:index:channel, each 0-16383)")]
pub struct ParseParameterError(String);

impl FromStr for Parameter {
    type Err = ParseParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<u16> = s
            .split(':')
            .map(|part| part.trim().parse::<u16>())
            .collect::<Result<_, _>>()
            .map_err(|_| ParseParameterError(s.to_string()))?;

        match fields.as_slice() {
            [element, index, channel]
                if [*element, *index, *channel].iter().all(|f| *f <= ADDRESS_MAX) =>
            {
                Ok(Parameter::new(*element, *index, *channel))
            }
            _ => Err(ParseParameterError(s.to_string())),
        }
    }
}

/// Format bytes as a hex string for logging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parameter_parse() {
        let param: Parameter = "51:0:10".parse().unwrap();
        assert_eq!(param, Parameter::new(51, 0, 10));
        assert_eq!(param.to_string(), "51:0:10");
    }

    #[test]
    fn test_parameter_parse_rejects_bad_input() {
        assert!("51:0".parse::<Parameter>().is_err());
        assert!("51:0:10:3".parse::<Parameter>().is_err());
        assert!("a:b:c".parse::<Parameter>().is_err());
        assert!("16384:0:0".parse::<Parameter>().is_err());
    }

    #[test]
    fn test_parameter_structural_hash() {
        let mut set = HashSet::new();
        set.insert(Parameter::new(1, 2, 3));
        set.insert(Parameter::new(1, 2, 3));
        set.insert(Parameter::new(3, 2, 1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_value_range() {
        assert_eq!(VALUE_MIN, -17_179_869_184);
        assert_eq!(VALUE_MAX, 17_179_869_183);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0xF0, 0x43, 0x10]), "F0 43 10");
        assert_eq!(format_hex(&[]), "");
    }
}
