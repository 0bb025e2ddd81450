mod errors;
mod generation_contract;
mod ledger;
mod schema;

pub use errors::{GenerationError, GenerationErrorCategory};
pub use generation_contract::{
    GenerationMetadata, GenerationOutput, GenerationRequest, GenerationUsage, StructuredOutput,
};
pub use ledger::{
    BalanceSummary, ChartOfAccounts, FundFlow, LedgerAccount, LedgerEntry, LedgerSide,
    LedgerTransaction,
};
pub use schema::{FieldDescriptor, FieldKind, SchemaDescriptor};
