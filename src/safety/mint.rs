//! SPL mint account decoding

use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use spl_token::state::Mint;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintInfo {
    pub mint_authority: Option<Pubkey>,
    /// Raw units
    pub supply: u64,
    pub decimals: u8,
    pub freeze_authority: Option<Pubkey>,
}

impl MintInfo {
    /// Decodes the base mint layout. Extension bytes past it are ignored.
    /// Uninitialized mints and malformed authority options are rejected.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let base = data.get(..Mint::LEN).ok_or_else(|| {
            Error::Decode(format!(
                "Account data too short for SPL mint ({} bytes)",
                data.len()
            ))
        })?;

        let mint = Mint::unpack(base)
            .map_err(|e| Error::Decode(format!("Invalid SPL mint: {}", e)))?;

        Ok(Self {
            mint_authority: mint.mint_authority.into(),
            supply: mint.supply,
            decimals: mint.decimals,
            freeze_authority: mint.freeze_authority.into(),
        })
    }

    pub fn is_mintable(&self) -> bool {
        self.mint_authority.is_some()
    }

    #[cfg(test)]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mint = Mint {
            mint_authority: self.mint_authority.into(),
            supply: self.supply,
            decimals: self.decimals,
            is_initialized: true,
            freeze_authority: self.freeze_authority.into(),
        };
        let mut data = vec![0u8; Mint::LEN];
        Mint::pack(mint, &mut data).unwrap();
        data
    }
}
