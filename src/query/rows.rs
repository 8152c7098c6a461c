use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Row of the current-balances accounts view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx_postgres", derive(sqlx::FromRow))]
pub struct AccountRow {
    pub account_id: String,
    pub account_name: Option<String>,
    pub institution_name: Option<String>,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "sqlx_postgres", sqlx(rename = "type"))]
    pub account_type: Option<String>,
    pub subtype: Option<String>,
    pub mask: Option<String>,
    pub current_balance: Option<Decimal>,
    pub available_balance: Option<Decimal>,
    pub credit_limit: Option<Decimal>,
    pub utilization_pct: Option<Decimal>,
    pub is_overdrawn: Option<bool>,
    pub balance_as_of: Option<NaiveDate>,
}

/// Row of the transactions view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx_postgres", derive(sqlx::FromRow))]
pub struct TransactionRow {
    pub transaction_id: String,
    pub transaction_date: Option<NaiveDate>,
    pub transaction_name: Option<String>,
    pub merchant_name: Option<String>,
    pub amount: Option<Decimal>,
    pub amount_abs: Option<Decimal>,
    pub pending: Option<bool>,
    pub account_name: Option<String>,
    pub account_id: String,
    pub institution_name: Option<String>,
    pub payment_channel: Option<String>,
    pub transaction_type: Option<String>,
    pub category_id: Option<String>,
    pub flow_direction: Option<String>,
    pub iso_currency_code: Option<String>,
}

/// Flat export row, one field per [`CSV_COLUMNS`](super::CSV_COLUMNS) entry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "sqlx_postgres", derive(sqlx::FromRow))]
pub struct ExportRow {
    pub transaction_date: Option<NaiveDate>,
    pub transaction_name: Option<String>,
    pub merchant_name: Option<String>,
    pub amount: Option<Decimal>,
    pub pending: Option<bool>,
    pub account_name: Option<String>,
    pub institution_name: Option<String>,
    pub payment_channel: Option<String>,
    pub transaction_type: Option<String>,
    pub category_id: Option<String>,
    pub flow_direction: Option<String>,
}

impl ExportRow {
    /// Field values in column order. NULLs become empty strings.
    pub fn to_record(&self) -> [String; 11] {
        fn text(value: &Option<String>) -> String {
            value.clone().unwrap_or_default()
        }

        [
            self.transaction_date.map(|d| d.to_string()).unwrap_or_default(),
            text(&self.transaction_name),
            text(&self.merchant_name),
            self.amount.map(|a| a.to_string()).unwrap_or_default(),
            self.pending
                .map(|p| if p { "true" } else { "false" }.to_owned())
                .unwrap_or_default(),
            text(&self.account_name),
            text(&self.institution_name),
            text(&self.payment_channel),
            text(&self.transaction_type),
            text(&self.category_id),
            text(&self.flow_direction),
        ]
    }
}

impl From<&TransactionRow> for ExportRow {
    fn from(row: &TransactionRow) -> Self {
        Self {
            transaction_date: row.transaction_date,
            transaction_name: row.transaction_name.clone(),
            merchant_name: row.merchant_name.clone(),
            amount: row.amount,
            pending: row.pending,
            account_name: row.account_name.clone(),
            institution_name: row.institution_name.clone(),
            payment_channel: row.payment_channel.clone(),
            transaction_type: row.transaction_type.clone(),
            category_id: row.category_id.clone(),
            flow_direction: row.flow_direction.clone(),
        }
    }
}

/// Entry of the account filter dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx_postgres", derive(sqlx::FromRow))]
pub struct AccountOption {
    pub account_id: String,
    /// `"{account_name} ({mask})"`
    pub label: String,
}

impl AccountOption {
    pub fn for_account(row: &AccountRow) -> Self {
        Self {
            account_id: row.account_id.clone(),
            label: format!(
                "{} ({})",
                row.account_name.as_deref().unwrap_or_default(),
                row.mask.as_deref().unwrap_or_default()
            ),
        }
    }
}

#[cfg(any(test, feature = "mocks"))]
impl AccountRow {
    pub fn mock(account_id: &str, current: Option<Decimal>, available: Option<Decimal>) -> Self {
        Self {
            account_id: account_id.to_owned(),
            account_name: Some(format!("Account {account_id}")),
            institution_name: Some("First Test Bank".to_owned()),
            account_type: Some("depository".to_owned()),
            subtype: Some("checking".to_owned()),
            mask: Some("0000".to_owned()),
            current_balance: current,
            available_balance: available,
            credit_limit: None,
            utilization_pct: None,
            is_overdrawn: current.map(|c| c.is_sign_negative()),
            balance_as_of: None,
        }
    }
}

#[cfg(any(test, feature = "mocks"))]
impl TransactionRow {
    pub fn mock(
        transaction_id: &str,
        account_id: &str,
        date: NaiveDate,
        amount: Decimal,
        pending: bool,
    ) -> Self {
        Self {
            transaction_id: transaction_id.to_owned(),
            transaction_date: Some(date),
            transaction_name: Some(format!("Transaction {transaction_id}")),
            merchant_name: None,
            amount: Some(amount),
            amount_abs: Some(amount.abs()),
            pending: Some(pending),
            account_name: Some(format!("Account {account_id}")),
            account_id: account_id.to_owned(),
            institution_name: Some("First Test Bank".to_owned()),
            payment_channel: Some("online".to_owned()),
            transaction_type: Some("special".to_owned()),
            category_id: None,
            flow_direction: Some(if amount.is_sign_negative() { "inflow" } else { "outflow" }.to_owned()),
            iso_currency_code: Some("USD".to_owned()),
        }
    }
}
