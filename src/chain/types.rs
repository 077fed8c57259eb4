//! Gateway-neutral transaction and account types

use serde_json::Value;

/// One log notification from the program subscription
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub signature: String,
    pub logs: Vec<String>,
    /// The transaction failed on chain
    pub failed: bool,
}

/// A fetched transaction, flattened to what the parsers read
#[derive(Debug, Clone, Default)]
pub struct ChainTransaction {
    pub signature: String,
    /// Unix seconds
    pub block_time: Option<i64>,
    pub failed: bool,
    pub instructions: Vec<ChainInstruction>,
    pub inner_instructions: Vec<InnerInstructionSet>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

#[derive(Debug, Clone, Default)]
pub struct InnerInstructionSet {
    /// Index of the top-level instruction these were invoked from
    pub index: u8,
    pub instructions: Vec<ChainInstruction>,
}

/// Instruction in either raw or node-parsed form.
///
/// Programs the node knows (spl-token, system) come back with `parsed`
/// set and no raw accounts/data; everything else carries raw accounts
/// and decoded instruction data.
#[derive(Debug, Clone, Default)]
pub struct ChainInstruction {
    pub program_id: String,
    pub accounts: Vec<String>,
    pub data: Vec<u8>,
    pub parsed: Option<ParsedInstruction>,
}

#[derive(Debug, Clone)]
pub struct ParsedInstruction {
    /// e.g. "spl-token"
    pub program: String,
    /// e.g. "transfer"
    pub kind: String,
    pub info: Value,
}

impl ChainInstruction {
    /// String field of a parsed instruction's `info` object
    pub fn info_str(&self, field: &str) -> Option<&str> {
        self.parsed.as_ref()?.info.get(field)?.as_str()
    }

    pub fn is_token_transfer(&self) -> bool {
        matches!(
            &self.parsed,
            Some(p) if p.program == "spl-token" && p.kind == "transfer"
        )
    }
}

#[derive(Debug, Clone)]
pub struct TokenBalance {
    pub account_index: u8,
    pub mint: String,
    pub owner: Option<String>,
    pub amount: u64,
    pub decimals: u8,
}

/// Token account balance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenAmount {
    pub amount: u64,
    pub decimals: u8,
}

impl TokenAmount {
    pub fn ui_amount(&self) -> f64 {
        self.amount as f64 / 10f64.powi(self.decimals as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_info_str() {
        let ix = ChainInstruction {
            program_id: "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA".into(),
            parsed: Some(ParsedInstruction {
                program: "spl-token".into(),
                kind: "transfer".into(),
                info: json!({ "source": "abc", "amount": "10" }),
            }),
            ..Default::default()
        };

        assert!(ix.is_token_transfer());
        assert_eq!(ix.info_str("source"), Some("abc"));
        assert_eq!(ix.info_str("destination"), None);
    }

    #[test]
    fn test_ui_amount() {
        let amount = TokenAmount {
            amount: 1_500_000_000,
            decimals: 9,
        };
        assert!((amount.ui_amount() - 1.5).abs() < 1e-12);
    }
}
