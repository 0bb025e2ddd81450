//! Double-entry ledger schemas used to exercise structured generation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{FieldDescriptor, FieldKind, SchemaDescriptor, StructuredOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSide {
    Credit,
    Debit,
}

impl LedgerSide {
    pub const LITERALS: [&'static str; 2] = ["credit", "debit"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub name: String,
    pub description: String,
    pub currency: String,
    pub normal_balance: LedgerSide,
}

impl StructuredOutput for LedgerAccount {
    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new("LedgerAccount")
            .with_description("A Ledger Account for tracking financial transactions.")
            .field(FieldDescriptor::string("name", "Short name of the account"))
            .field(FieldDescriptor::string(
                "description",
                "Longer description of how the account is intended to be used",
            ))
            .field(FieldDescriptor::string(
                "currency",
                "The currency of the account",
            ))
            .field(FieldDescriptor::enumeration(
                "normal_balance",
                LedgerSide::LITERALS,
                "Whether the account is credit-normal or debit-normal. Acceptable values are either credit or debit.",
            ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartOfAccounts {
    pub accounts: Vec<LedgerAccount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSummary {
    pub total_accounts: usize,
    pub debit_accounts: usize,
    pub credit_accounts: usize,
    pub currencies: BTreeMap<String, usize>,
}

impl ChartOfAccounts {
    pub fn balance_summary(&self) -> BalanceSummary {
        let mut summary = BalanceSummary {
            total_accounts: self.accounts.len(),
            ..BalanceSummary::default()
        };
        for account in &self.accounts {
            match account.normal_balance {
                LedgerSide::Debit => summary.debit_accounts += 1,
                LedgerSide::Credit => summary.credit_accounts += 1,
            }
            *summary
                .currencies
                .entry(account.currency.clone())
                .or_default() += 1;
        }
        summary
    }
}

impl StructuredOutput for ChartOfAccounts {
    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new("ChartOfAccounts")
            .with_description("The full set of ledger accounts for a business.")
            .field(FieldDescriptor::list(
                "accounts",
                FieldKind::Object(LedgerAccount::schema()),
                "Ledger accounts in the chart",
            ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub account_id: String,
    pub direction: LedgerSide,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
}

impl StructuredOutput for LedgerEntry {
    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new("LedgerEntry")
            .with_description("One side of a ledger transaction posted to a single account.")
            .field(FieldDescriptor::string(
                "account_id",
                "Identifier of the account the entry is posted to",
            ))
            .field(FieldDescriptor::enumeration(
                "direction",
                LedgerSide::LITERALS,
                "Whether the entry debits or credits the account. Acceptable values are either credit or debit.",
            ))
            .field(FieldDescriptor::integer(
                "amount",
                "Amount in the smallest unit of the currency (for example cents)",
            ))
            .field(FieldDescriptor::string(
                "currency",
                "The currency of the entry",
            ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub description: String,
    pub entries: Vec<LedgerEntry>,
}

impl LedgerTransaction {
    /// True when debits equal credits in every currency the transaction touches.
    pub fn is_balanced(&self) -> bool {
        let mut net = BTreeMap::<&str, i128>::new();
        for entry in &self.entries {
            let amount = i128::from(entry.amount);
            let signed = match entry.direction {
                LedgerSide::Debit => amount,
                LedgerSide::Credit => -amount,
            };
            *net.entry(entry.currency.as_str()).or_default() += signed;
        }
        net.values().all(|total| *total == 0)
    }
}

impl StructuredOutput for LedgerTransaction {
    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new("LedgerTransaction")
            .with_description("A set of ledger entries that move funds together.")
            .field(FieldDescriptor::string(
                "description",
                "What the transaction represents",
            ))
            .field(FieldDescriptor::list(
                "entries",
                FieldKind::Object(LedgerEntry::schema()),
                "Entries posted by the transaction",
            ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundFlow {
    pub transactions: Vec<LedgerTransaction>,
}

impl StructuredOutput for FundFlow {
    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new("FundFlow")
            .with_description(
                "An ordered sequence of ledger transactions describing a flow of funds.",
            )
            .field(FieldDescriptor::list(
                "transactions",
                FieldKind::Object(LedgerTransaction::schema()),
                "Transactions in the order they occur",
            ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        ChartOfAccounts, FundFlow, LedgerAccount, LedgerEntry, LedgerSide, LedgerTransaction,
    };
    use crate::domain::StructuredOutput;

    fn account(name: &str, currency: &str, side: LedgerSide) -> LedgerAccount {
        LedgerAccount {
            name: name.to_string(),
            description: format!("{name} account"),
            currency: currency.to_string(),
            normal_balance: side,
        }
    }

    fn entry(account_id: &str, direction: LedgerSide, amount: i64) -> LedgerEntry {
        LedgerEntry {
            account_id: account_id.to_string(),
            direction,
            amount,
            currency: "USD".to_string(),
        }
    }

    #[test]
    fn all_ledger_schemas_are_valid() {
        LedgerAccount::schema().validate().expect("LedgerAccount");
        ChartOfAccounts::schema().validate().expect("ChartOfAccounts");
        LedgerEntry::schema().validate().expect("LedgerEntry");
        LedgerTransaction::schema()
            .validate()
            .expect("LedgerTransaction");
        FundFlow::schema().validate().expect("FundFlow");
    }

    #[test]
    fn ledger_side_serializes_as_lowercase_literal() {
        assert_eq!(json!(LedgerSide::Debit), json!("debit"));
        assert_eq!(LedgerSide::Credit.as_str(), "credit");
    }

    #[test]
    fn fund_flow_schema_defines_each_nested_object_once() {
        let schema = FundFlow::schema().to_json_schema();

        let defs = schema["$defs"]
            .as_object()
            .expect("nested objects should live in $defs");
        let mut names = defs.keys().cloned().collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["LedgerEntry", "LedgerTransaction"]);
        assert_eq!(
            defs["LedgerTransaction"]["properties"]["entries"]["items"]["$ref"],
            "#/$defs/LedgerEntry"
        );
    }

    #[test]
    fn balance_summary_counts_sides_and_currencies() {
        let chart = ChartOfAccounts {
            accounts: vec![
                account("Cash", "USD", LedgerSide::Debit),
                account("User Balances", "USD", LedgerSide::Credit),
                account("EUR Cash", "EUR", LedgerSide::Debit),
            ],
        };

        let summary = chart.balance_summary();

        assert_eq!(summary.total_accounts, 3);
        assert_eq!(summary.debit_accounts, 2);
        assert_eq!(summary.credit_accounts, 1);
        assert_eq!(summary.currencies.get("USD"), Some(&2));
        assert_eq!(summary.currencies.get("EUR"), Some(&1));
    }

    #[test]
    fn is_balanced_compares_debits_and_credits() {
        let balanced = LedgerTransaction {
            description: "deposit".to_string(),
            entries: vec![
                entry("cash", LedgerSide::Debit, 1_000),
                entry("user", LedgerSide::Credit, 1_000),
            ],
        };
        let unbalanced = LedgerTransaction {
            description: "broken".to_string(),
            entries: vec![entry("cash", LedgerSide::Debit, 1_000)],
        };

        assert!(balanced.is_balanced());
        assert!(!unbalanced.is_balanced());
    }
}
