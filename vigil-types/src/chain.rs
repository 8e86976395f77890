use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Numeric identifier of a blockchain in the attestation network.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ChainId(pub u16);

impl ChainId {
    pub const UNSET: ChainId = ChainId(0);
    pub const SOLANA: ChainId = ChainId(1);
    pub const ETHEREUM: ChainId = ChainId(2);
    pub const TERRA: ChainId = ChainId(3);
    pub const BSC: ChainId = ChainId(4);
    pub const POLYGON: ChainId = ChainId(5);
    pub const AVALANCHE: ChainId = ChainId(6);
    pub const OASIS: ChainId = ChainId(7);
    pub const ALGORAND: ChainId = ChainId(8);
    pub const AURORA: ChainId = ChainId(9);
    pub const FANTOM: ChainId = ChainId(10);
    pub const KARURA: ChainId = ChainId(11);
    pub const ACALA: ChainId = ChainId(12);
    pub const KLAYTN: ChainId = ChainId(13);
    pub const CELO: ChainId = ChainId(14);
    pub const NEAR: ChainId = ChainId(15);
    pub const MOONBEAM: ChainId = ChainId(16);
    pub const NEON: ChainId = ChainId(17);
    pub const TERRA2: ChainId = ChainId(18);
    pub const INJECTIVE: ChainId = ChainId(19);
    pub const APTOS: ChainId = ChainId(22);
    pub const PYTHNET: ChainId = ChainId(26);

    /// Lowercase chain name, if known.
    pub fn name(&self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "unset",
            1 => "solana",
            2 => "ethereum",
            3 => "terra",
            4 => "bsc",
            5 => "polygon",
            6 => "avalanche",
            7 => "oasis",
            8 => "algorand",
            9 => "aurora",
            10 => "fantom",
            11 => "karura",
            12 => "acala",
            13 => "klaytn",
            14 => "celo",
            15 => "near",
            16 => "moonbeam",
            17 => "neon",
            18 => "terra2",
            19 => "injective",
            22 => "aptos",
            26 => "pythnet",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<u16> for ChainId {
    fn from(id: u16) -> Self {
        ChainId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_known_chains() {
        assert_eq!(ChainId::ETHEREUM.to_string(), "ethereum");
        assert_eq!(ChainId::SOLANA.to_string(), "solana");
        assert_eq!(ChainId::UNSET.to_string(), "unset");
    }

    #[test]
    fn test_display_unknown_chain_is_numeric() {
        assert_eq!(ChainId(4242).to_string(), "4242");
        assert!(ChainId(4242).name().is_none());
    }
}
