//! Integer-exact wei arithmetic and display-only unit conversions.
//!
//! All internal balance and fee math happens on wei as `u128`. Ether and
//! gwei values are produced only for display at the boundary and must never
//! be fed back into comparisons.

use crate::errors::{WalletError, WalletResult};

pub const WEI_PER_GWEI: u128 = 1_000_000_000;
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

const ETHER_DECIMALS: usize = 18;

/// Convert a decimal ether string (e.g. "1.5", "0.000021") to wei without
/// going through floating point.
pub fn ether_to_wei(amount: &str) -> WalletResult<u128> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(WalletError::InvalidAmount(
            "Amount cannot be empty".to_string(),
        ));
    }
    if amount.starts_with('-') || amount.starts_with('+') {
        return Err(WalletError::InvalidAmount(format!(
            "Amount must be an unsigned decimal: {}",
            amount
        )));
    }

    let (whole, frac) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(WalletError::InvalidAmount(format!(
            "Malformed amount: {}",
            amount
        )));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(WalletError::InvalidAmount(format!(
            "Malformed amount: {}",
            amount
        )));
    }
    if frac.len() > ETHER_DECIMALS {
        return Err(WalletError::InvalidAmount(format!(
            "Amount has more than {} decimal places: {}",
            ETHER_DECIMALS, amount
        )));
    }

    let whole_wei = if whole.is_empty() {
        0u128
    } else {
        whole
            .parse::<u128>()
            .ok()
            .and_then(|w| w.checked_mul(WEI_PER_ETHER))
            .ok_or_else(|| WalletError::InvalidAmount(format!("Amount too large: {}", amount)))?
    };

    // Pad the fraction to 18 digits: "5" in "1.5" means 5 * 10^17 wei.
    let frac_wei = if frac.is_empty() {
        0u128
    } else {
        let scale = 10u128.pow((ETHER_DECIMALS - frac.len()) as u32);
        frac.parse::<u128>()
            .map_err(|_| WalletError::InvalidAmount(format!("Malformed amount: {}", amount)))?
            * scale
    };

    whole_wei
        .checked_add(frac_wei)
        .ok_or_else(|| WalletError::InvalidAmount(format!("Amount too large: {}", amount)))
}

/// Convert a gwei quantity to wei.
pub fn gwei_to_wei(gwei: u64) -> u128 {
    gwei as u128 * WEI_PER_GWEI
}

/// Display value in ether, rounded to 6 decimal places.
pub fn wei_to_ether_display(wei: u128) -> f64 {
    let ether = wei as f64 / WEI_PER_ETHER as f64;
    (ether * 1e6).round() / 1e6
}

/// Display value in gwei, rounded to 2 decimal places.
pub fn wei_to_gwei_display(wei: u128) -> f64 {
    let gwei = wei as f64 / WEI_PER_GWEI as f64;
    (gwei * 1e2).round() / 1e2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_ether_amounts() {
        assert_eq!(ether_to_wei("1").unwrap(), WEI_PER_ETHER);
        assert_eq!(ether_to_wei("2").unwrap(), 2 * WEI_PER_ETHER);
        assert_eq!(ether_to_wei("0").unwrap(), 0);
    }

    #[test]
    fn fractional_amounts_are_exact() {
        assert_eq!(ether_to_wei("1.5").unwrap(), 1_500_000_000_000_000_000);
        assert_eq!(ether_to_wei("0.000000000000000001").unwrap(), 1);
        assert_eq!(ether_to_wei(".5").unwrap(), 500_000_000_000_000_000);
        // 0.1 is not representable in binary floating point; the decimal
        // scaling must still be exact.
        assert_eq!(ether_to_wei("0.1").unwrap(), 100_000_000_000_000_000);
    }

    #[test]
    fn rejects_malformed_amounts() {
        for bad in ["", ".", "-1", "+1", "1.2.3", "one", "1,5", "0.0000000000000000001"] {
            assert!(
                matches!(ether_to_wei(bad), Err(WalletError::InvalidAmount(_))),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn display_conversions_round() {
        assert_eq!(wei_to_ether_display(1_500_000_000_000_000_000), 1.5);
        assert_eq!(wei_to_gwei_display(1_000_000_000), 1.0);
        assert_eq!(wei_to_gwei_display(1_250_000_000), 1.25);
    }

    #[test]
    fn gwei_conversion() {
        assert_eq!(gwei_to_wei(1), 1_000_000_000);
        assert_eq!(gwei_to_wei(100), 100_000_000_000);
    }
}
