//! SQL text for the analytics views.
//!
//! Each function returns a [`QueryBuilder`] whose text contains only
//! constants and `$n` placeholders. Columns are cast explicitly so the
//! row types decode regardless of how the views declare them.

use sqlx::{Postgres, QueryBuilder};

use super::{
    ACCOUNTS_VIEW, AccountFilter, AccountScope, TRANSACTIONS_VIEW, TransactionFilter,
    ilike_pattern,
};

const ACCOUNT_COLUMNS: &str = "a.account_id::text AS account_id, \
     a.account_name::text AS account_name, \
     a.institution_name::text AS institution_name, \
     a.type::text AS type, \
     a.subtype::text AS subtype, \
     a.mask::text AS mask, \
     a.current_balance::numeric AS current_balance, \
     a.available_balance::numeric AS available_balance, \
     a.credit_limit::numeric AS credit_limit, \
     a.utilization_pct::numeric AS utilization_pct, \
     a.is_overdrawn::boolean AS is_overdrawn, \
     a.balance_as_of::date AS balance_as_of";

const TRANSACTION_COLUMNS: &str = "t.transaction_id::text AS transaction_id, \
     t.transaction_date::date AS transaction_date, \
     t.transaction_name::text AS transaction_name, \
     t.merchant_name::text AS merchant_name, \
     t.amount::numeric AS amount, \
     t.amount_abs::numeric AS amount_abs, \
     t.pending::boolean AS pending, \
     t.account_name::text AS account_name, \
     t.account_id::text AS account_id, \
     t.institution_name::text AS institution_name, \
     t.payment_channel::text AS payment_channel, \
     t.transaction_type::text AS transaction_type, \
     t.category_id::text AS category_id, \
     t.flow_direction::text AS flow_direction, \
     t.iso_currency_code::text AS iso_currency_code";

const EXPORT_COLUMNS: &str = "t.transaction_date::date AS transaction_date, \
     t.transaction_name::text AS transaction_name, \
     t.merchant_name::text AS merchant_name, \
     t.amount::numeric AS amount, \
     t.pending::boolean AS pending, \
     t.account_name::text AS account_name, \
     t.institution_name::text AS institution_name, \
     t.payment_channel::text AS payment_channel, \
     t.transaction_type::text AS transaction_type, \
     t.category_id::text AS category_id, \
     t.flow_direction::text AS flow_direction";

fn push_scope(qb: &mut QueryBuilder<'static, Postgres>, alias: &str, scope: &AccountScope) {
    if let AccountScope::Only(ids) = scope {
        qb.push(format!(" AND {alias}.account_id::text = ANY("));
        qb.push_bind(ids.clone());
        qb.push(")");
    }
}

fn push_account_conditions(qb: &mut QueryBuilder<'static, Postgres>, filter: &AccountFilter) {
    qb.push(" WHERE TRUE");
    push_scope(qb, "a", &filter.scope);

    if let Some(search) = &filter.search {
        let pattern = ilike_pattern(search);
        qb.push(" AND (a.account_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR a.institution_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR a.mask ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

fn push_transaction_conditions(
    qb: &mut QueryBuilder<'static, Postgres>,
    filter: &TransactionFilter,
) {
    qb.push(" WHERE TRUE");
    push_scope(qb, "t", &filter.scope);

    if let Some(from) = filter.date_from {
        qb.push(" AND t.transaction_date >= ");
        qb.push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND t.transaction_date <= ");
        qb.push_bind(to);
    }
    if let Some(pending) = filter.pending {
        qb.push(" AND t.pending = ");
        qb.push_bind(pending);
    }
    if let Some(search) = &filter.search {
        let pattern = ilike_pattern(search);
        qb.push(" AND (t.transaction_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR t.merchant_name ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

fn push_limit_offset(qb: &mut QueryBuilder<'static, Postgres>, limit: u64, offset: u64) {
    qb.push(" LIMIT ");
    qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    qb.push(" OFFSET ");
    qb.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
}

/// `total_balance`, `total_available` over the scoped accounts.
pub fn balance_kpis(scope: &AccountScope) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT COALESCE(SUM(a.current_balance), 0)::numeric AS total_balance, \
         COALESCE(SUM(a.available_balance), 0)::numeric AS total_available \
         FROM {ACCOUNTS_VIEW} a WHERE TRUE"
    ));
    push_scope(&mut qb, "a", scope);
    qb
}

/// `total_pending` over pending transactions of the scoped accounts, any date.
pub fn pending_kpi(scope: &AccountScope) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT COALESCE(SUM(t.amount_abs), 0)::numeric AS total_pending \
         FROM {TRANSACTIONS_VIEW} t WHERE t.pending = TRUE"
    ));
    push_scope(&mut qb, "t", scope);
    qb
}

pub fn accounts_count(filter: &AccountFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {ACCOUNTS_VIEW} a"));
    push_account_conditions(&mut qb, filter);
    qb
}

pub fn accounts_page(filter: &AccountFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {ACCOUNT_COLUMNS} FROM {ACCOUNTS_VIEW} a"));
    push_account_conditions(&mut qb, filter);
    qb.push(format!(
        " ORDER BY a.{} {} NULLS LAST, a.account_id",
        filter.sort.column(),
        filter.order.as_sql()
    ));
    push_limit_offset(&mut qb, filter.page.limit(), filter.page.offset());
    qb
}

pub fn transactions_count(filter: &TransactionFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {TRANSACTIONS_VIEW} t"));
    push_transaction_conditions(&mut qb, filter);
    qb
}

pub fn transactions_page(filter: &TransactionFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {TRANSACTION_COLUMNS} FROM {TRANSACTIONS_VIEW} t"
    ));
    push_transaction_conditions(&mut qb, filter);
    qb.push(format!(
        " ORDER BY t.{} {} NULLS LAST, t.transaction_id",
        filter.sort.column(),
        filter.order.as_sql()
    ));
    push_limit_offset(&mut qb, filter.page.limit(), filter.page.offset());
    qb
}

/// Export rows, newest first, never more than `limit`.
pub fn export_rows(filter: &TransactionFilter, limit: u64) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {EXPORT_COLUMNS} FROM {TRANSACTIONS_VIEW} t"));
    push_transaction_conditions(&mut qb, filter);
    qb.push(" ORDER BY t.transaction_date DESC NULLS LAST LIMIT ");
    qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    qb
}

pub fn account_options(scope: &AccountScope) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT a.account_id::text AS account_id, \
         COALESCE(a.account_name::text, '') || ' (' || COALESCE(a.mask::text, '') || ')' AS label \
         FROM {ACCOUNTS_VIEW} a WHERE TRUE"
    ));
    push_scope(&mut qb, "a", scope);
    qb.push(" ORDER BY a.account_name");
    qb
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::query::{AccountSort, SortOrder, TransactionSort};

    const HOSTILE: &str = "x' OR 1=1; DROP TABLE users; --";

    #[test]
    fn test_search_is_bound_not_interpolated() {
        let mut filter = AccountFilter::new(AccountScope::All);
        filter.search = Some(HOSTILE.to_owned());

        let qb = accounts_page(&filter);
        let sql = qb.sql();
        assert!(!sql.contains("DROP"));
        assert!(sql.contains("a.account_name ILIKE $1"));
        assert!(sql.contains("a.mask ILIKE $3"));
        assert!(sql.contains("LIMIT $4 OFFSET $5"));
    }

    #[test]
    fn test_scope_becomes_array_parameter() {
        let scope = AccountScope::Only(vec![HOSTILE.to_owned()]);
        let qb = balance_kpis(&scope);
        assert!(qb.sql().ends_with("AND a.account_id::text = ANY($1)"));
        assert!(!qb.sql().contains("DROP"));

        let qb = balance_kpis(&AccountScope::All);
        assert!(!qb.sql().contains("ANY("));
    }

    #[test]
    fn test_sort_uses_whitelisted_column() {
        let mut filter = TransactionFilter::new(AccountScope::All);
        filter.sort = TransactionSort::MerchantName;
        filter.order = SortOrder::Asc;
        let qb = transactions_page(&filter);
        assert!(qb.sql().contains("ORDER BY t.merchant_name ASC NULLS LAST"));

        let mut filter = AccountFilter::new(AccountScope::All);
        filter.sort = AccountSort::UtilizationPct;
        filter.order = SortOrder::Desc;
        let qb = accounts_page(&filter);
        assert!(qb.sql().contains("ORDER BY a.utilization_pct DESC NULLS LAST"));
    }

    #[test]
    fn test_transaction_filters_in_order() {
        let mut filter = TransactionFilter::new(AccountScope::Only(vec!["acc".to_owned()]));
        filter.date_from = NaiveDate::from_ymd_opt(2024, 1, 1);
        filter.date_to = NaiveDate::from_ymd_opt(2024, 1, 31);
        filter.pending = Some(false);
        filter.search = Some("coffee".to_owned());

        let qb = transactions_count(&filter);
        let sql = qb.sql();
        assert!(sql.contains("t.account_id::text = ANY($1)"));
        assert!(sql.contains("t.transaction_date >= $2"));
        assert!(sql.contains("t.transaction_date <= $3"));
        assert!(sql.contains("t.pending = $4"));
        assert!(sql.contains("t.merchant_name ILIKE $6"));
    }

    #[test]
    fn test_export_orders_by_date_and_caps() {
        let filter = TransactionFilter::new(AccountScope::All);
        let qb = export_rows(&filter, 250_000);
        assert!(qb.sql().contains("ORDER BY t.transaction_date DESC NULLS LAST LIMIT $1"));
    }

    #[test]
    fn test_pending_kpi_has_no_date_filter() {
        let qb = pending_kpi(&AccountScope::All);
        assert!(!qb.sql().contains("transaction_date"));
        assert!(qb.sql().contains("t.pending = TRUE"));
    }
}
