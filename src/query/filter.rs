use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;

/// Which accounts a query may see after client and account filters are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountScope {
    /// No client or account filter.
    All,
    /// Only these account ids. An empty list matches nothing.
    Only(Vec<String>),
}

impl AccountScope {
    /// Combines a client's mapped accounts with an optional single-account filter.
    ///
    /// `client_accounts` is `None` when no client filter is set. An account
    /// outside the client's mappings yields an empty scope rather than
    /// falling back to all accounts.
    pub fn resolve(client_accounts: Option<Vec<String>>, account_id: Option<&str>) -> Self {
        match (client_accounts, account_id) {
            (None, None) => Self::All,
            (Some(ids), None) => Self::Only(ids),
            (None, Some(account)) => Self::Only(vec![account.to_owned()]),
            (Some(ids), Some(account)) => {
                if ids.iter().any(|id| id == account) {
                    Self::Only(vec![account.to_owned()])
                } else {
                    Self::Only(Vec::new())
                }
            }
        }
    }

    pub fn contains(&self, account_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.iter().any(|id| id == account_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Only(ids) if ids.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Sortable columns of the accounts view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountSort {
    #[default]
    AccountName,
    InstitutionName,
    Type,
    Subtype,
    Mask,
    CurrentBalance,
    AvailableBalance,
    CreditLimit,
    UtilizationPct,
    BalanceAsOf,
}

impl AccountSort {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "account_name" => Self::AccountName,
            "institution_name" => Self::InstitutionName,
            "type" => Self::Type,
            "subtype" => Self::Subtype,
            "mask" => Self::Mask,
            "current_balance" => Self::CurrentBalance,
            "available_balance" => Self::AvailableBalance,
            "credit_limit" => Self::CreditLimit,
            "utilization_pct" => Self::UtilizationPct,
            "balance_as_of" => Self::BalanceAsOf,
            _ => return None,
        })
    }

    /// Column name in the accounts view. The only text ever spliced into SQL.
    pub fn column(self) -> &'static str {
        match self {
            Self::AccountName => "account_name",
            Self::InstitutionName => "institution_name",
            Self::Type => "type",
            Self::Subtype => "subtype",
            Self::Mask => "mask",
            Self::CurrentBalance => "current_balance",
            Self::AvailableBalance => "available_balance",
            Self::CreditLimit => "credit_limit",
            Self::UtilizationPct => "utilization_pct",
            Self::BalanceAsOf => "balance_as_of",
        }
    }
}

/// Sortable columns of the transactions view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSort {
    #[default]
    TransactionDate,
    TransactionName,
    MerchantName,
    Amount,
    AccountName,
    InstitutionName,
    PaymentChannel,
    TransactionType,
    FlowDirection,
    Pending,
}

impl TransactionSort {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "transaction_date" => Self::TransactionDate,
            "transaction_name" => Self::TransactionName,
            "merchant_name" => Self::MerchantName,
            "amount" => Self::Amount,
            "account_name" => Self::AccountName,
            "institution_name" => Self::InstitutionName,
            "payment_channel" => Self::PaymentChannel,
            "transaction_type" => Self::TransactionType,
            "flow_direction" => Self::FlowDirection,
            "pending" => Self::Pending,
            _ => return None,
        })
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::TransactionDate => "transaction_date",
            Self::TransactionName => "transaction_name",
            Self::MerchantName => "merchant_name",
            Self::Amount => "amount",
            Self::AccountName => "account_name",
            Self::InstitutionName => "institution_name",
            Self::PaymentChannel => "payment_channel",
            Self::TransactionType => "transaction_type",
            Self::FlowDirection => "flow_direction",
            Self::Pending => "pending",
        }
    }
}

/// One-based page request, clamped to the configured limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Invalid or missing values fall back to page 1 and the default size;
    /// sizes above the maximum are clamped.
    pub fn new(page: Option<u32>, page_size: Option<u32>, config: &PaginationConfig) -> Self {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size
            .unwrap_or(config.default_page_size)
            .max(1)
            .min(config.max_page_size);
        Self { page, page_size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None, &PaginationConfig::default())
    }
}

/// A page of rows plus the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(rows: Vec<T>, total: u64, request: PageRequest) -> Self {
        let size = u64::from(request.page_size);
        Self {
            rows,
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages: total.div_ceil(size).max(1),
        }
    }
}

/// Filters for the accounts table on the summary page.
#[derive(Debug, Clone)]
pub struct AccountFilter {
    pub scope: AccountScope,
    pub search: Option<String>,
    pub sort: AccountSort,
    pub order: SortOrder,
    pub page: PageRequest,
}

impl AccountFilter {
    pub fn new(scope: AccountScope) -> Self {
        Self {
            scope,
            search: None,
            sort: AccountSort::default(),
            order: SortOrder::Asc,
            page: PageRequest::default(),
        }
    }
}

/// Filters shared by the transactions table and the CSV export.
#[derive(Debug, Clone)]
pub struct TransactionFilter {
    pub scope: AccountScope,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub pending: Option<bool>,
    pub search: Option<String>,
    pub sort: TransactionSort,
    pub order: SortOrder,
    pub page: PageRequest,
}

impl TransactionFilter {
    pub fn new(scope: AccountScope) -> Self {
        Self {
            scope,
            date_from: None,
            date_to: None,
            pending: None,
            search: None,
            sort: TransactionSort::default(),
            order: SortOrder::Desc,
            page: PageRequest::default(),
        }
    }

    /// Fills a missing range with the 30 days ending `today`.
    pub fn with_default_range(mut self, today: NaiveDate) -> Self {
        if self.date_from.is_none() {
            self.date_from = Some(today - Duration::days(30));
        }
        if self.date_to.is_none() {
            self.date_to = Some(today);
        }
        self
    }
}

/// `"true"` and `"false"` filter on the pending flag; anything else does not.
pub fn parse_pending(value: Option<&str>) -> Option<bool> {
    match value {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

/// Empty and whitespace-only search strings are treated as absent.
pub fn normalize_search(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// `ILIKE` pattern for a search term. `%`, `_` and `\` in the term match literally.
pub fn ilike_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
