//! Mapping between the ledger's 24-bit color integers and `#RRGGBB` strings.

use crate::error::{
    Error,
    Result,
};

pub const MAX_COLOR: u32 = 0xFF_FF_FF;

/// Display value for an unowned square. The ledger stores `0` for squares
/// nobody has bought yet; those render white rather than black.
pub const UNSET_DISPLAY: &str = "#FFFFFF";

pub fn to_hex(value: u32) -> String {
    if value == 0 {
        return UNSET_DISPLAY.to_string();
    }
    format!("#{value:06x}")
}

pub fn to_int(hex: &str) -> Result<u32> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidColorFormat(hex.to_string()));
    }
    u32::from_str_radix(digits, 16).map_err(|_| Error::InvalidColorFormat(hex.to_string()))
}

/// Split a color integer into its RGB components for terminal rendering.
pub fn rgb(value: u32) -> (u8, u8, u8) {
    (
        ((value >> 16) & 0xFF) as u8,
        ((value >> 8) & 0xFF) as u8,
        (value & 0xFF) as u8,
    )
}
