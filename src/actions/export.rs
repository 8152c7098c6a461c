use std::sync::Arc;

use super::dashboard::{TransactionQuery, transaction_filter};
use super::Actor;
use crate::audit::{AuditLogger, RequestContext};
use crate::config::{ExportConfig, PaginationConfig};
use crate::permission::{Action, Resource, authorize};
use crate::query::{export_filename, is_mobile_user_agent, write_csv};
use crate::repository::{AnalyticsRepository, AuditEventType, ClientRepository};
use crate::DashboardError;

/// A rendered CSV download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub body: String,
    pub rows: u64,
}

/// Exports filtered transactions as CSV, refusing result sets above the row cap.
pub struct ExportTransactionsAction {
    analytics: Arc<dyn AnalyticsRepository>,
    clients: Arc<dyn ClientRepository>,
    audit: AuditLogger,
    config: ExportConfig,
}

impl ExportTransactionsAction {
    pub fn new(
        analytics: Arc<dyn AnalyticsRepository>,
        clients: Arc<dyn ClientRepository>,
        audit: AuditLogger,
    ) -> Self {
        Self::with_config(analytics, clients, audit, ExportConfig::default())
    }

    pub fn with_config(
        analytics: Arc<dyn AnalyticsRepository>,
        clients: Arc<dyn ClientRepository>,
        audit: AuditLogger,
        config: ExportConfig,
    ) -> Self {
        Self {
            analytics,
            clients,
            audit,
            config,
        }
    }

    /// Builds the CSV for the filters in `query`.
    ///
    /// Unlike the transactions page, no default date range is applied.
    ///
    /// # Returns
    ///
    /// - `Ok(export)` - filename and CSV body, header row included
    /// - `Err(DashboardError::Forbidden(_))` - request came from a mobile browser
    /// - `Err(DashboardError::ExportRowCapExceeded { .. })` - more rows matched than the cap allows
    /// - `Err(_)` - invalid filters, database or audit errors
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "export_transactions", skip_all, err)
    )]
    pub async fn execute(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        query: &TransactionQuery,
    ) -> Result<CsvExport, DashboardError> {
        authorize(actor.role, Resource::Export, Action::Create)?;
        if is_mobile_user_agent(&ctx.user_agent) {
            return Err(DashboardError::forbidden(
                "CSV export is not available on mobile devices.",
            ));
        }

        let partition = &actor.partition;
        let filter = transaction_filter(
            self.clients.as_ref(),
            partition,
            query,
            &PaginationConfig::default(),
        )
        .await?;

        let max_rows = self.config.max_rows;
        let matched = self.analytics.count_transactions(partition, &filter).await?;
        if matched > max_rows {
            self.audit
                .record(
                    partition,
                    ctx,
                    AuditEventType::CsvExportDenied,
                    Some(actor.user_id),
                    format!(
                        "Exceeded {max_rows} rows ({matched} matched). User advised to narrow filters."
                    ),
                )
                .await?;
            log::info!(
                target: "ledgerdash",
                "msg=\"export denied\", partition=\"{partition}\", matched={matched}, max_rows={max_rows}"
            );
            return Err(DashboardError::ExportRowCapExceeded { max_rows, matched });
        }

        self.audit
            .record(
                partition,
                ctx,
                AuditEventType::CsvExportInitiated,
                Some(actor.user_id),
                format!("{matched} rows"),
            )
            .await?;

        let rows = self
            .analytics
            .export_rows(partition, &filter, max_rows)
            .await?;
        let body = write_csv(&rows);
        let exported = rows.len() as u64;

        self.audit
            .record(
                partition,
                ctx,
                AuditEventType::CsvExportCompleted,
                Some(actor.user_id),
                format!("{exported} rows"),
            )
            .await?;

        log::info!(
            target: "ledgerdash",
            "msg=\"export completed\", partition=\"{partition}\", rows={exported}"
        );

        Ok(CsvExport {
            filename: export_filename(filter.date_from, filter.date_to),
            body,
            rows: exported,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;
    use crate::actions::test_support::*;
    use crate::permission::Role;
    use crate::query::TransactionRow;
    use crate::repository::{
        MockAnalyticsRepository, MockAuditLogRepository, MockClientRepository, MockUserRepository,
    };

    struct Fixture {
        analytics: MockAnalyticsRepository,
        audit_repo: MockAuditLogRepository,
        action: ExportTransactionsAction,
        actor: Actor,
    }

    fn fixture() -> Fixture {
        let users = MockUserRepository::new();
        let analytics = MockAnalyticsRepository::new();
        let audit_repo = MockAuditLogRepository::new();
        let user = seed_user(&users, &acme(), "ada@acme.example", Role::User);
        let action = ExportTransactionsAction::new(
            Arc::new(analytics.clone()),
            Arc::new(MockClientRepository::new()),
            audit(&audit_repo),
        );
        Fixture {
            analytics,
            audit_repo,
            action,
            actor: actor_for(&user, &acme()),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[tokio::test]
    async fn test_export_writes_header_and_rows_newest_first() {
        let f = fixture();
        f.analytics.add_transaction(
            &acme(),
            TransactionRow::mock("t1", "a", day(1), Decimal::new(1250, 2), false),
        );
        f.analytics.add_transaction(
            &acme(),
            TransactionRow::mock("t2", "a", day(3), Decimal::new(-500, 2), true),
        );

        let query = TransactionQuery {
            date_from: Some("2024-05-01".to_owned()),
            date_to: Some("2024-05-31".to_owned()),
            ..Default::default()
        };
        let export = f.action.execute(&f.actor, &ctx(), &query).await.unwrap();

        assert_eq!(export.filename, "transactions_2024-05-01_2024-05-31.csv");
        assert_eq!(export.rows, 2);
        let lines: Vec<&str> = export.body.split("\r\n").collect();
        assert!(lines[0].starts_with("transaction_date,transaction_name,"));
        assert!(lines[1].starts_with("2024-05-03,Transaction t2,"));
        assert!(lines[2].starts_with("2024-05-01,Transaction t1,"));
        assert_eq!(
            f.audit_repo.events(&acme()),
            vec![
                AuditEventType::CsvExportInitiated,
                AuditEventType::CsvExportCompleted
            ]
        );
    }

    #[tokio::test]
    async fn test_export_over_cap_is_denied_and_audited() {
        let f = fixture();
        f.analytics.set_transaction_count(&acme(), Some(250_001));

        let result = f
            .action
            .execute(&f.actor, &ctx(), &TransactionQuery::default())
            .await;

        assert_eq!(
            result,
            Err(DashboardError::ExportRowCapExceeded {
                max_rows: 250_000,
                matched: 250_001
            })
        );
        let denied = f.audit_repo.entries_of(&acme(), AuditEventType::CsvExportDenied);
        assert_eq!(denied.len(), 1);
        assert_eq!(
            denied[0].detail,
            "Exceeded 250000 rows (250001 matched). User advised to narrow filters."
        );
        assert!(f
            .audit_repo
            .entries_of(&acme(), AuditEventType::CsvExportInitiated)
            .is_empty());
    }

    #[tokio::test]
    async fn test_export_at_cap_is_allowed() {
        let f = fixture();
        f.analytics.set_transaction_count(&acme(), Some(250_000));

        let export = f
            .action
            .execute(&f.actor, &ctx(), &TransactionQuery::default())
            .await
            .unwrap();

        assert_eq!(export.filename, "transactions__.csv");
        let initiated = f
            .audit_repo
            .entries_of(&acme(), AuditEventType::CsvExportInitiated);
        assert_eq!(initiated[0].detail, "250000 rows");
    }

    #[tokio::test]
    async fn test_mobile_user_agent_is_forbidden() {
        let f = fixture();
        let mobile = RequestContext::new(
            Some("198.51.100.7".to_owned()),
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)",
            "acme.example.com",
        );

        let result = f
            .action
            .execute(&f.actor, &mobile, &TransactionQuery::default())
            .await;

        assert!(matches!(result, Err(DashboardError::Forbidden(_))));
        assert!(f.audit_repo.events(&acme()).is_empty());
    }

    #[tokio::test]
    async fn test_audit_failure_fails_export() {
        let f = fixture();
        f.audit_repo.fail_writes(true);

        let result = f
            .action
            .execute(&f.actor, &ctx(), &TransactionQuery::default())
            .await;
        assert!(result.is_err());
    }
}
