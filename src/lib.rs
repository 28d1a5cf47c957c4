pub mod agent;
pub mod app;
pub mod audit;
pub mod color;
pub mod error;
pub mod ledger;
pub mod session;
pub mod sync;
pub mod test_helpers;
pub mod tx;
pub mod ui;

/// The grid is a fixed 10x10; the ledger indexes squares 0-99 row-major.
pub const GRID_WIDTH: usize = 10;
pub const GRID_SQUARES: usize = GRID_WIDTH * GRID_WIDTH;

/// Fixed price of one square: 0.001 of the native unit, in wei.
pub const SQUARE_PRICE_WEI: u128 = 1_000_000_000_000_000;
pub const SQUARE_PRICE_DISPLAY: &str = "0.001";

/// Abbreviate an address for panels and audit details: first six and last
/// four characters, explorer-style. Addresses come from the bridge
/// unvalidated, so this counts chars rather than slicing bytes.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn short_address__abbreviates_long_addresses() {
        assert_eq!(
            short_address("0xAAAA000000000000000000000000000000001111"),
            "0xAAAA...1111"
        );
        assert_eq!(short_address("0x1234"), "0x1234");
    }

    #[test]
    fn short_address__handles_multibyte_input_from_the_bridge() {
        assert_eq!(short_address("0xAAAαβγδεζ"), "0xAAAα...γδεζ");
        assert_eq!(short_address("0xαβγδεζηθ"), "0xαβγδεζηθ");
    }
}
