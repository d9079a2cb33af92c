use std::num::ParseIntError;

use vec_map_derive::{NumericIndex, Token};

/// Name of the elastic image. It is never declared in the input and takes whatever flash is
/// left after every other image is placed.
pub const APP: &str = "app";

macro_attr! {
    #[derive(Token!, NumericIndex!, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageToken(pub usize);
}

/// Parses a size given either in decimal or as a `0x`-prefixed hexadecimal literal.
pub fn parse_size(text: &str) -> Result<u64, ParseIntError> {
    let text = text.trim();

    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    }
}
