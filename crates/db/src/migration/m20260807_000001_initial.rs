//! Initial schema: ledger, outbox, idempotency, and the domain
//! settlement tables.
//!
//! Built with the portable schema builder so the same migration runs on
//! Postgres in production and on SQLite in tests.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .col(pk_uuid(LedgerEntries::Id))
                    .col(uuid(LedgerEntries::TraceId))
                    .col(uuid_null(LedgerEntries::UserId))
                    .col(string(LedgerEntries::Account))
                    .col(string_len(LedgerEntries::EntryType, 16))
                    .col(string_len(LedgerEntries::Category, 32))
                    .col(string_null(LedgerEntries::Subtype))
                    .col(big_integer(LedgerEntries::Amount))
                    .col(string_len(LedgerEntries::Currency, 3))
                    .col(big_integer_null(LedgerEntries::BalanceBefore))
                    .col(big_integer_null(LedgerEntries::BalanceAfter))
                    .col(string_len(LedgerEntries::Status, 16))
                    .col(uuid_null(LedgerEntries::RelatedTo))
                    .col(string_null(LedgerEntries::IdempotencyKey))
                    .col(json_binary(LedgerEntries::Meta))
                    .col(timestamp_with_time_zone(LedgerEntries::CreatedAt))
                    .col(timestamp_with_time_zone_null(LedgerEntries::ProcessedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ledger_entries_trace")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::TraceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ledger_entries_user_category")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::UserId)
                    .col(LedgerEntries::Category)
                    .col(LedgerEntries::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ledger_entries_status_category")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::Status)
                    .col(LedgerEntries::Category)
                    .col(LedgerEntries::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OutboxEvents::Table)
                    .col(pk_uuid(OutboxEvents::Id))
                    .col(string(OutboxEvents::Topic))
                    .col(json_binary(OutboxEvents::Payload))
                    .col(boolean(OutboxEvents::Processed))
                    .col(integer(OutboxEvents::RetryCount))
                    .col(string_null(OutboxEvents::LastError))
                    .col(timestamp_with_time_zone_null(OutboxEvents::ClaimedAt))
                    .col(timestamp_with_time_zone(OutboxEvents::CreatedAt))
                    .col(timestamp_with_time_zone_null(OutboxEvents::ProcessedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_outbox_events_unprocessed")
                    .table(OutboxEvents::Table)
                    .col(OutboxEvents::Processed)
                    .col(OutboxEvents::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IdempotencyRecords::Table)
                    .col(string(IdempotencyRecords::Key))
                    .col(uuid(IdempotencyRecords::UserId))
                    .col(json_binary(IdempotencyRecords::Response))
                    .col(timestamp_with_time_zone(IdempotencyRecords::ExpiresAt))
                    .col(timestamp_with_time_zone(IdempotencyRecords::CreatedAt))
                    .primary_key(
                        Index::create()
                            .col(IdempotencyRecords::Key)
                            .col(IdempotencyRecords::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_idempotency_records_expiry")
                    .table(IdempotencyRecords::Table)
                    .col(IdempotencyRecords::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transfers::Table)
                    .col(pk_uuid(Transfers::Id))
                    .col(uuid(Transfers::TraceId))
                    .col(uuid(Transfers::UserId))
                    .col(string(Transfers::Counterparty))
                    .col(string_len(Transfers::TransferType, 16))
                    .col(big_integer(Transfers::Amount))
                    .col(string_len(Transfers::Currency, 3))
                    .col(string_len(Transfers::Status, 16))
                    .col(string_uniq(Transfers::Reference))
                    .col(string_null(Transfers::ProviderRef))
                    .col(string_null(Transfers::SessionId))
                    .col(string_null(Transfers::Narration))
                    .col(timestamp_with_time_zone(Transfers::CreatedAt))
                    .col(timestamp_with_time_zone(Transfers::UpdatedAt))
                    .col(timestamp_with_time_zone_null(Transfers::ProcessedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transfers_status_created")
                    .table(Transfers::Table)
                    .col(Transfers::Status)
                    .col(Transfers::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BillPayments::Table)
                    .col(pk_uuid(BillPayments::Id))
                    .col(uuid(BillPayments::TraceId))
                    .col(uuid(BillPayments::UserId))
                    .col(string(BillPayments::Biller))
                    .col(string(BillPayments::CustomerRef))
                    .col(big_integer(BillPayments::Amount))
                    .col(big_integer(BillPayments::Fee))
                    .col(string_len(BillPayments::Currency, 3))
                    .col(string_len(BillPayments::Status, 16))
                    .col(string_uniq(BillPayments::Reference))
                    .col(string_null(BillPayments::ProviderRef))
                    .col(timestamp_with_time_zone(BillPayments::CreatedAt))
                    .col(timestamp_with_time_zone(BillPayments::UpdatedAt))
                    .col(timestamp_with_time_zone_null(BillPayments::ProcessedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bill_payments_status_created")
                    .table(BillPayments::Table)
                    .col(BillPayments::Status)
                    .col(BillPayments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SavingsTransactions::Table)
                    .col(pk_uuid(SavingsTransactions::Id))
                    .col(uuid(SavingsTransactions::TraceId))
                    .col(uuid(SavingsTransactions::UserId))
                    .col(string_len(SavingsTransactions::Kind, 16))
                    .col(big_integer(SavingsTransactions::Amount))
                    .col(string_len(SavingsTransactions::Currency, 3))
                    .col(string_len(SavingsTransactions::Status, 16))
                    .col(string_uniq(SavingsTransactions::Reference))
                    .col(timestamp_with_time_zone(SavingsTransactions::CreatedAt))
                    .col(timestamp_with_time_zone(SavingsTransactions::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_savings_transactions_user")
                    .table(SavingsTransactions::Table)
                    .col(SavingsTransactions::UserId)
                    .col(SavingsTransactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LoanApplications::Table)
                    .col(pk_uuid(LoanApplications::Id))
                    .col(uuid(LoanApplications::UserId))
                    .col(big_integer(LoanApplications::Principal))
                    .col(string_len(LoanApplications::Currency, 3))
                    .col(string_len(LoanApplications::Status, 16))
                    .col(uuid_null(LoanApplications::TraceId))
                    .col(string_uniq(LoanApplications::Reference))
                    .col(timestamp_with_time_zone(LoanApplications::CreatedAt))
                    .col(timestamp_with_time_zone(LoanApplications::UpdatedAt))
                    .col(timestamp_with_time_zone_null(LoanApplications::DisbursedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_loan_applications_user")
                    .table(LoanApplications::Table)
                    .col(LoanApplications::UserId)
                    .col(LoanApplications::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Table::drop().table(LoanApplications::Table).to_owned(),
            Table::drop().table(SavingsTransactions::Table).to_owned(),
            Table::drop().table(BillPayments::Table).to_owned(),
            Table::drop().table(Transfers::Table).to_owned(),
            Table::drop().table(IdempotencyRecords::Table).to_owned(),
            Table::drop().table(OutboxEvents::Table).to_owned(),
            Table::drop().table(LedgerEntries::Table).to_owned(),
        ] {
            manager.drop_table(table).await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum LedgerEntries {
    Table,
    Id,
    TraceId,
    UserId,
    Account,
    EntryType,
    Category,
    Subtype,
    Amount,
    Currency,
    BalanceBefore,
    BalanceAfter,
    Status,
    RelatedTo,
    IdempotencyKey,
    Meta,
    CreatedAt,
    ProcessedAt,
}

#[derive(DeriveIden)]
enum OutboxEvents {
    Table,
    Id,
    Topic,
    Payload,
    Processed,
    RetryCount,
    LastError,
    ClaimedAt,
    CreatedAt,
    ProcessedAt,
}

#[derive(DeriveIden)]
enum IdempotencyRecords {
    Table,
    Key,
    UserId,
    Response,
    ExpiresAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Transfers {
    Table,
    Id,
    TraceId,
    UserId,
    Counterparty,
    TransferType,
    Amount,
    Currency,
    Status,
    Reference,
    ProviderRef,
    SessionId,
    Narration,
    CreatedAt,
    UpdatedAt,
    ProcessedAt,
}

#[derive(DeriveIden)]
enum BillPayments {
    Table,
    Id,
    TraceId,
    UserId,
    Biller,
    CustomerRef,
    Amount,
    Fee,
    Currency,
    Status,
    Reference,
    ProviderRef,
    CreatedAt,
    UpdatedAt,
    ProcessedAt,
}

#[derive(DeriveIden)]
enum SavingsTransactions {
    Table,
    Id,
    TraceId,
    UserId,
    Kind,
    Amount,
    Currency,
    Status,
    Reference,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LoanApplications {
    Table,
    Id,
    UserId,
    Principal,
    Currency,
    Status,
    TraceId,
    Reference,
    CreatedAt,
    UpdatedAt,
    DisbursedAt,
}
