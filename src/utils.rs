use std::{fmt::Display, str::FromStr};

use derive_more::{AsRef, From};
use ethers::{
    types::{Address, U256},
    utils::{to_checksum, Units},
};
use serde::{Deserialize, Serialize};

use super::Error;

/// Largest decimal count a `U256` can be scaled by.
const MAX_DECIMALS: u32 = 77;

/// Address that always renders in its EIP-55 checksummed form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, AsRef, From)]
pub struct ChecksumAddress(Address);

impl ChecksumAddress {
    pub fn address(&self) -> Address {
        self.0
    }
}

impl Display for ChecksumAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&to_checksum(&self.0, None))
    }
}

impl FromStr for ChecksumAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        get_address(s)
    }
}

impl From<ChecksumAddress> for Address {
    fn from(val: ChecksumAddress) -> Self {
        val.0
    }
}

impl Serialize for ChecksumAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChecksumAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        get_address(&String::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

/// Parses a hex address. All-lowercase and all-uppercase input is taken as is; mixed case
/// must carry a valid EIP-55 checksum.
pub fn get_address(value: &str) -> Result<ChecksumAddress, Error> {
    let invalid = || Error::InvalidAddress(value.to_string());
    let trimmed = value.trim();
    let hex = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")).unwrap_or(trimmed);
    if hex.len() != 40 {
        return Err(invalid());
    }
    let address = hex.parse::<Address>().map_err(|_| invalid())?;

    let mixed_case = hex.chars().any(|c| c.is_ascii_lowercase())
        && hex.chars().any(|c| c.is_ascii_uppercase());
    if mixed_case && to_checksum(&address, None)[2..] != *hex {
        return Err(invalid());
    }
    Ok(ChecksumAddress(address))
}

/// Unit used when rendering base-unit integers for humans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormatUnits {
    Decimals(u32),
    Named(String),
}

impl FormatUnits {
    pub fn decimals(&self) -> Result<u32, Error> {
        match self {
            Self::Decimals(decimals) if *decimals <= MAX_DECIMALS => Ok(*decimals),
            Self::Decimals(decimals) => {
                Err(Error::Units(format!("{decimals} decimals exceed {MAX_DECIMALS}")))
            }
            Self::Named(name) => Ok(Units::try_from(name.as_str())?.as_num()),
        }
    }
}

impl Default for FormatUnits {
    fn default() -> Self {
        Self::Named("wei".to_string())
    }
}

impl From<&str> for FormatUnits {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<u32> for FormatUnits {
    fn from(decimals: u32) -> Self {
        Self::Decimals(decimals)
    }
}

/// Renders `value` scaled down by `units`, trimming trailing zeros but always keeping one
/// fractional digit (`1000000000` in gwei is `"1.0"`).
pub fn format_units(value: U256, units: &FormatUnits) -> Result<String, Error> {
    format_fixed(value, units.decimals()?)
}

pub(crate) fn format_fixed(value: U256, decimals: u32) -> Result<String, Error> {
    let fixed = ethers::utils::format_units(value, decimals)?;
    let Some((integer, fraction)) = fixed.split_once('.') else {
        return Ok(format!("{fixed}.0"));
    };
    let fraction = fraction.trim_end_matches('0');
    let fraction = if fraction.is_empty() { "0" } else { fraction };
    Ok(format!("{integer}.{fraction}"))
}
