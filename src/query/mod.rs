//! Dashboard query construction.
//!
//! Request parameters are parsed into typed filters ([`AccountFilter`],
//! [`TransactionFilter`]). Sort columns come from closed enums, so the
//! only identifiers that reach SQL text are compile-time constants; every
//! user-supplied value is bound as a parameter (see `sql`).

mod csv;
mod filter;
mod kpi;
mod rows;
#[cfg(feature = "sqlx_postgres")]
pub mod sql;

pub use csv::{CSV_COLUMNS, export_filename, is_mobile_user_agent, write_csv};
pub use filter::{
    AccountFilter, AccountScope, AccountSort, Page, PageRequest, SortOrder, TransactionFilter,
    TransactionSort, ilike_pattern, normalize_search, parse_pending,
};
pub use kpi::SummaryKpis;
pub use rows::{AccountOption, AccountRow, ExportRow, TransactionRow};

/// Read-only view holding current account balances.
pub const ACCOUNTS_VIEW: &str = "analytics.vw_superset_accounts_current";

/// Read-only view holding transactions.
pub const TRANSACTIONS_VIEW: &str = "analytics.vw_superset_transactions";
