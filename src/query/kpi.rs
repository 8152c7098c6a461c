use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountRow, AccountScope, TransactionRow};

/// Headline figures on the summary page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryKpis {
    pub total_balance: Decimal,
    /// Sum over accounts that report an available balance. NULLs are skipped.
    pub total_available: Decimal,
    /// Absolute amount of all pending transactions, regardless of date.
    pub total_pending: Decimal,
}

impl SummaryKpis {
    /// Computes the KPIs over in-memory rows with the same semantics as
    /// the SQL aggregates: `SUM` ignores NULLs and an empty set sums to zero.
    pub fn compute<'a>(
        scope: &AccountScope,
        accounts: impl IntoIterator<Item = &'a AccountRow>,
        transactions: impl IntoIterator<Item = &'a TransactionRow>,
    ) -> Self {
        let mut kpis = Self::default();

        for account in accounts.into_iter().filter(|a| scope.contains(&a.account_id)) {
            if let Some(balance) = account.current_balance {
                kpis.total_balance += balance;
            }
            if let Some(available) = account.available_balance {
                kpis.total_available += available;
            }
        }

        kpis.total_pending = transactions
            .into_iter()
            .filter(|t| t.pending == Some(true) && scope.contains(&t.account_id))
            .filter_map(|t| t.amount_abs)
            .sum();

        kpis
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn dec(n: i64) -> Option<Decimal> {
        Some(Decimal::from(n))
    }

    #[test]
    fn test_total_balance_sums_included_accounts_only() {
        let accounts = vec![
            AccountRow::mock("a", dec(100), dec(90)),
            AccountRow::mock("b", dec(-50), None),
            AccountRow::mock("c", dec(25), dec(20)),
        ];
        let scope = AccountScope::Only(vec!["a".to_owned(), "b".to_owned()]);

        let kpis = SummaryKpis::compute(&scope, &accounts, &Vec::<TransactionRow>::new());
        assert_eq!(kpis.total_balance, Decimal::from(50));
        // b has no available balance; it is skipped, not counted as zero
        assert_eq!(kpis.total_available, Decimal::from(90));

        let none: Vec<TransactionRow> = Vec::new();
        let all = SummaryKpis::compute(&AccountScope::All, &accounts, &none);
        assert_eq!(all.total_balance, Decimal::from(75));
        assert_eq!(all.total_available, Decimal::from(110));
    }

    #[test]
    fn test_empty_scope_sums_to_zero() {
        let accounts = vec![AccountRow::mock("a", dec(100), dec(100))];
        let kpis = SummaryKpis::compute(
            &AccountScope::Only(Vec::new()),
            &accounts,
            &Vec::<TransactionRow>::new(),
        );
        assert_eq!(kpis, SummaryKpis::default());
    }

    #[test]
    fn test_pending_uses_absolute_amounts_of_pending_rows() {
        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let transactions = vec![
            TransactionRow::mock("t1", "a", day, Decimal::from(-40), true),
            TransactionRow::mock("t2", "a", day, Decimal::from(15), true),
            TransactionRow::mock("t3", "a", day, Decimal::from(999), false),
            TransactionRow::mock("t4", "z", day, Decimal::from(7), true),
        ];
        let scope = AccountScope::Only(vec!["a".to_owned()]);

        let kpis = SummaryKpis::compute(&scope, &Vec::<AccountRow>::new(), &transactions);
        assert_eq!(kpis.total_pending, Decimal::from(55));
    }
}
