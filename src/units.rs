//! Amount units per chain family

use crate::error::{Result, SwapError};

/// A display unit and its number of decimals relative to the smallest unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    pub symbol: &'static str,
    pub decimals: u32,
}

const fn unit(symbol: &'static str, decimals: u32) -> Unit {
    Unit { symbol, decimals }
}

pub const BITCOIN_UNITS: &[Unit] = &[unit("BTC", 8), unit("mBTC", 5), unit("Satoshi", 0)];
pub const ETHEREUM_UNITS: &[Unit] = &[unit("Ether", 18), unit("Gwei", 9), unit("Wei", 0)];
pub const XINFIN_UNITS: &[Unit] = &[unit("XDC", 18), unit("Gwei", 9), unit("Wei", 0)];
pub const VAPOR_UNITS: &[Unit] = &[unit("BTM", 8), unit("mBTM", 5), unit("NEU", 0)];

fn find(units: &[Unit], symbol: &str) -> Result<Unit> {
    units.iter().copied().find(|u| u.symbol == symbol).ok_or_else(|| {
        let known: Vec<&str> = units.iter().map(|u| u.symbol).collect();
        SwapError::Unit(format!(
            "'{}', choose only {}",
            symbol,
            known.join(", ")
        ))
    })
}

/// Converts an amount between two units of the same family.
pub fn amount_unit_converter(units: &[Unit], amount: f64, from: &str, to: &str) -> Result<f64> {
    let from = find(units, from)?;
    let to = find(units, to)?;
    let shift = from.decimals as i32 - to.decimals as i32;
    if shift >= 0 {
        Ok(amount * 10f64.powi(shift))
    } else {
        Ok(amount / 10f64.powi(-shift))
    }
}

/// Expresses an amount in the smallest unit as `to`.
pub fn from_smallest(units: &[Unit], amount: u128, to: &str) -> Result<f64> {
    let to = find(units, to)?;
    Ok(amount as f64 / 10f64.powi(to.decimals as i32))
}
