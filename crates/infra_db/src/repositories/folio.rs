//! Folio ledger repository implementation
//!
//! This module provides database access for folios, charges, payments,
//! transfers, invoices, audit entries and numbering sequences. Reads go
//! through the pool; writes take a connection so the ledger adapter can run
//! a whole change set inside one transaction.
//!
//! Enums are stored as their snake_case text form, money as a `NUMERIC`
//! amount next to a currency code, and invoice lines and customer details
//! as JSONB.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use core_kernel::{
    AuditEntryId, BookingId, ChargeId, Currency, FolioId, InvoiceId, Money, PartyId, PaymentId,
    Rate, TenantId, TransferId,
};
use domain_folio::{
    AuditAction, AuditEntry, AuditQuery, Charge, ChargeCategory, CustomerInfo, EntityType, Folio,
    FolioStatus, FolioType, Invoice, InvoiceLine, InvoiceStatus, Payment, PaymentType,
    SequenceKind, TransferRecord,
};

use crate::error::DatabaseError;

// ============================================================================
// Row types
// ============================================================================

/// Database row for a folio
#[derive(Debug, Clone, FromRow)]
pub struct FolioRow {
    pub folio_id: Uuid,
    pub tenant_id: Uuid,
    pub booking_id: Uuid,
    pub folio_type: String,
    pub owner_id: Uuid,
    pub folio_number: String,
    pub currency: String,
    pub status: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
    pub close_reason: Option<String>,
}

/// Database row for a charge
#[derive(Debug, Clone, FromRow)]
pub struct ChargeRow {
    pub charge_id: Uuid,
    pub tenant_id: Uuid,
    pub folio_id: Uuid,
    pub category: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub voided: bool,
    pub void_reason: Option<String>,
    pub voided_by: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub posted_at: DateTime<Utc>,
    pub posted_by: String,
    pub version: i64,
}

/// Database row for a payment
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub payment_id: Uuid,
    pub tenant_id: Uuid,
    pub folio_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub payment_type: String,
    pub reference: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub posted_by: String,
}

/// Database row for a charge transfer
#[derive(Debug, Clone, FromRow)]
pub struct TransferRow {
    pub transfer_id: Uuid,
    pub tenant_id: Uuid,
    pub from_folio_id: Uuid,
    pub to_folio_id: Uuid,
    pub charge_ids: Vec<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub reason: String,
    pub performed_by: String,
    pub performed_at: DateTime<Utc>,
}

/// Database row for an invoice
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_number: String,
    pub customer: Json<CustomerInfo>,
    pub currency: String,
    pub source_folio_ids: Vec<Uuid>,
    pub lines: Json<Vec<InvoiceLine>>,
    pub subtotal: Decimal,
    pub total_vat: Decimal,
    pub total_additional_taxes: Decimal,
    pub vat_withholding: Decimal,
    pub total: Decimal,
    pub vendor_vat_receivable: Decimal,
    pub amount_due_to_vendor: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Database row for an audit entry
#[derive(Debug, Clone, FromRow)]
pub struct AuditRow {
    pub entry_id: Uuid,
    pub tenant_id: Uuid,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Version and status of a folio row locked for a commit
#[derive(Debug, Clone, FromRow)]
pub struct LockedFolio {
    pub folio_id: Uuid,
    pub status: String,
    pub version: i64,
}

/// Folio and version of a charge row locked for a commit
#[derive(Debug, Clone, FromRow)]
pub struct LockedCharge {
    pub charge_id: Uuid,
    pub folio_id: Uuid,
    pub version: i64,
}

/// Status of an invoice row locked for a commit
#[derive(Debug, Clone, FromRow)]
pub struct LockedInvoice {
    pub invoice_id: Uuid,
    pub status: String,
}

// ============================================================================
// Row to domain conversions
// ============================================================================

fn currency(code: &str) -> Result<Currency, DatabaseError> {
    Currency::from_str(code).map_err(DatabaseError::serialization)
}

fn version(value: i64) -> Result<u64, DatabaseError> {
    u64::try_from(value).map_err(|_| DatabaseError::serialization(format!("negative version {}", value)))
}

impl TryFrom<FolioRow> for Folio {
    type Error = DatabaseError;

    fn try_from(row: FolioRow) -> Result<Self, Self::Error> {
        Ok(Folio {
            id: FolioId::from(row.folio_id),
            tenant_id: TenantId::from(row.tenant_id),
            booking_id: BookingId::from(row.booking_id),
            folio_type: FolioType::from_str(&row.folio_type).map_err(DatabaseError::serialization)?,
            owner_id: PartyId::from(row.owner_id),
            folio_number: row.folio_number,
            currency: currency(&row.currency)?,
            status: FolioStatus::from_str(&row.status).map_err(DatabaseError::serialization)?,
            version: version(row.version)?,
            created_at: row.created_at,
            closed_at: row.closed_at,
            closed_by: row.closed_by,
            close_reason: row.close_reason,
        })
    }
}

impl TryFrom<ChargeRow> for Charge {
    type Error = DatabaseError;

    fn try_from(row: ChargeRow) -> Result<Self, Self::Error> {
        let currency = currency(&row.currency)?;
        Ok(Charge {
            id: ChargeId::from(row.charge_id),
            tenant_id: TenantId::from(row.tenant_id),
            folio_id: FolioId::from(row.folio_id),
            category: ChargeCategory::from(row.category),
            description: row.description,
            quantity: row.quantity,
            unit_price: Money::new(row.unit_price, currency),
            amount: Money::new(row.amount, currency),
            tax_rate: Rate::new(row.tax_rate),
            tax_amount: Money::new(row.tax_amount, currency),
            total: Money::new(row.total, currency),
            voided: row.voided,
            void_reason: row.void_reason,
            voided_by: row.voided_by,
            voided_at: row.voided_at,
            posted_at: row.posted_at,
            posted_by: row.posted_by,
            version: version(row.version)?,
        })
    }
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from(row.payment_id),
            tenant_id: TenantId::from(row.tenant_id),
            folio_id: FolioId::from(row.folio_id),
            amount: Money::new(row.amount, currency(&row.currency)?),
            method: row.method,
            payment_type: PaymentType::from_str(&row.payment_type).map_err(DatabaseError::serialization)?,
            reference: row.reference,
            posted_at: row.posted_at,
            posted_by: row.posted_by,
        })
    }
}

impl TryFrom<TransferRow> for TransferRecord {
    type Error = DatabaseError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        Ok(TransferRecord {
            id: TransferId::from(row.transfer_id),
            tenant_id: TenantId::from(row.tenant_id),
            from_folio_id: FolioId::from(row.from_folio_id),
            to_folio_id: FolioId::from(row.to_folio_id),
            charge_ids: row.charge_ids.into_iter().map(ChargeId::from).collect(),
            amount: Money::new(row.amount, currency(&row.currency)?),
            reason: row.reason,
            performed_by: row.performed_by,
            performed_at: row.performed_at,
        })
    }
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = DatabaseError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let currency = currency(&row.currency)?;
        let status = InvoiceStatus::parse(&row.status)
            .ok_or_else(|| DatabaseError::serialization(format!("unknown invoice status '{}'", row.status)))?;
        Ok(Invoice {
            id: InvoiceId::from(row.invoice_id),
            tenant_id: TenantId::from(row.tenant_id),
            invoice_number: row.invoice_number,
            customer: row.customer.0,
            currency,
            source_folio_ids: row.source_folio_ids.into_iter().map(FolioId::from).collect(),
            lines: row.lines.0,
            subtotal: Money::new(row.subtotal, currency),
            total_vat: Money::new(row.total_vat, currency),
            total_additional_taxes: Money::new(row.total_additional_taxes, currency),
            vat_withholding: Money::new(row.vat_withholding, currency),
            total: Money::new(row.total, currency),
            vendor_vat_receivable: Money::new(row.vendor_vat_receivable, currency),
            amount_due_to_vendor: Money::new(row.amount_due_to_vendor, currency),
            status,
            created_at: row.created_at,
            created_by: row.created_by,
            issued_at: row.issued_at,
            paid_at: row.paid_at,
        })
    }
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = DatabaseError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action = AuditAction::parse(&row.action)
            .ok_or_else(|| DatabaseError::serialization(format!("unknown audit action '{}'", row.action)))?;
        let entity_type = EntityType::parse(&row.entity_type)
            .ok_or_else(|| DatabaseError::serialization(format!("unknown entity type '{}'", row.entity_type)))?;
        Ok(AuditEntry {
            id: AuditEntryId::from(row.entry_id),
            tenant_id: TenantId::from(row.tenant_id),
            actor: row.actor,
            action,
            entity_type,
            entity_id: row.entity_id,
            before: row.before_state,
            after: row.after_state,
            reason: row.reason,
            timestamp: row.recorded_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DatabaseError>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// Queries
// ============================================================================

const FOLIO_COLUMNS: &str = "folio_id, tenant_id, booking_id, folio_type, owner_id, folio_number, \
     currency, status, version, created_at, closed_at, closed_by, close_reason";

const CHARGE_COLUMNS: &str = "charge_id, tenant_id, folio_id, category, description, quantity, \
     unit_price, amount, tax_rate, tax_amount, total, currency, voided, void_reason, voided_by, \
     voided_at, posted_at, posted_by, version";

const PAYMENT_COLUMNS: &str = "payment_id, tenant_id, folio_id, amount, currency, method, \
     payment_type, reference, posted_at, posted_by";

const INVOICE_COLUMNS: &str = "invoice_id, tenant_id, invoice_number, customer, currency, \
     source_folio_ids, lines, subtotal, total_vat, total_additional_taxes, vat_withholding, total, \
     vendor_vat_receivable, amount_due_to_vendor, status, created_at, created_by, issued_at, paid_at";

/// Repository for the folio ledger tables
///
/// Every read is scoped by tenant: rows of another tenant are invisible.
#[derive(Debug, Clone)]
pub struct FolioRepository {
    pool: PgPool,
}

impl FolioRepository {
    /// Creates a new FolioRepository with the given connection pool
    ///
    /// # Arguments
    ///
    /// * `pool` - The PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Increments and returns a per-tenant, per-year sequence
    ///
    /// The upsert runs in its own statement, outside any ledger commit, so
    /// numbers consumed by a failed commit are not reused.
    pub async fn next_sequence(
        &self,
        tenant_id: TenantId,
        kind: SequenceKind,
        year: i32,
    ) -> Result<u32, DatabaseError> {
        let value: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO ledger_sequences (tenant_id, kind, year, last_value)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (tenant_id, kind, year)
            DO UPDATE SET last_value = ledger_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .bind(kind.as_str())
        .bind(year)
        .fetch_one(&self.pool)
        .await?;

        u32::try_from(value).map_err(|_| DatabaseError::serialization(format!("sequence value {}", value)))
    }

    /// Retrieves a folio by id
    pub async fn find_folio(&self, tenant_id: TenantId, id: FolioId) -> Result<Option<Folio>, DatabaseError> {
        let row: Option<FolioRow> = sqlx::query_as(&format!(
            "SELECT {} FROM folios WHERE tenant_id = $1 AND folio_id = $2",
            FOLIO_COLUMNS
        ))
        .bind(*tenant_id.as_uuid())
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Folio::try_from).transpose()
    }

    /// Retrieves all folios of a booking, oldest first
    pub async fn folios_for_booking(
        &self,
        tenant_id: TenantId,
        booking_id: BookingId,
    ) -> Result<Vec<Folio>, DatabaseError> {
        let rows: Vec<FolioRow> = sqlx::query_as(&format!(
            "SELECT {} FROM folios WHERE tenant_id = $1 AND booking_id = $2 ORDER BY created_at, folio_id",
            FOLIO_COLUMNS
        ))
        .bind(*tenant_id.as_uuid())
        .bind(*booking_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    /// Retrieves a charge by id
    pub async fn find_charge(&self, tenant_id: TenantId, id: ChargeId) -> Result<Option<Charge>, DatabaseError> {
        let row: Option<ChargeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM charges WHERE tenant_id = $1 AND charge_id = $2",
            CHARGE_COLUMNS
        ))
        .bind(*tenant_id.as_uuid())
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Charge::try_from).transpose()
    }

    /// Retrieves the charges currently on a folio, voided included, in posting order
    pub async fn charges_for_folio(
        &self,
        tenant_id: TenantId,
        folio_id: FolioId,
    ) -> Result<Vec<Charge>, DatabaseError> {
        let rows: Vec<ChargeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM charges WHERE tenant_id = $1 AND folio_id = $2 ORDER BY posted_at, charge_id",
            CHARGE_COLUMNS
        ))
        .bind(*tenant_id.as_uuid())
        .bind(*folio_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    /// Retrieves the payments on a folio in posting order
    pub async fn payments_for_folio(
        &self,
        tenant_id: TenantId,
        folio_id: FolioId,
    ) -> Result<Vec<Payment>, DatabaseError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE tenant_id = $1 AND folio_id = $2 ORDER BY posted_at, payment_id",
            PAYMENT_COLUMNS
        ))
        .bind(*tenant_id.as_uuid())
        .bind(*folio_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    /// Retrieves the transfers into or out of a folio, oldest first
    pub async fn transfers_for_folio(
        &self,
        tenant_id: TenantId,
        folio_id: FolioId,
    ) -> Result<Vec<TransferRecord>, DatabaseError> {
        let rows: Vec<TransferRow> = sqlx::query_as(
            r#"
            SELECT transfer_id, tenant_id, from_folio_id, to_folio_id, charge_ids, amount,
                   currency, reason, performed_by, performed_at
            FROM folio_transfers
            WHERE tenant_id = $1 AND (from_folio_id = $2 OR to_folio_id = $2)
            ORDER BY performed_at, transfer_id
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .bind(*folio_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    /// Retrieves an invoice by id
    pub async fn find_invoice(&self, tenant_id: TenantId, id: InvoiceId) -> Result<Option<Invoice>, DatabaseError> {
        let row: Option<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices WHERE tenant_id = $1 AND invoice_id = $2",
            INVOICE_COLUMNS
        ))
        .bind(*tenant_id.as_uuid())
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Invoice::try_from).transpose()
    }

    /// Retrieves audit entries matching a query, in recording order
    ///
    /// `from` is inclusive and `to` exclusive, as in [`AuditQuery::matches`].
    pub async fn audit_entries(
        &self,
        tenant_id: TenantId,
        query: &AuditQuery,
    ) -> Result<Vec<AuditEntry>, DatabaseError> {
        let limit = query
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX));
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT entry_id, tenant_id, actor, action, entity_type, entity_id,
                   before_state, after_state, reason, recorded_at
            FROM audit_entries
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR entity_id = $2)
              AND ($3::timestamptz IS NULL OR recorded_at >= $3)
              AND ($4::timestamptz IS NULL OR recorded_at < $4)
            ORDER BY seq
            LIMIT $5
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .bind(query.entity_id)
        .bind(query.from)
        .bind(query.to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }
}

// ============================================================================
// Transactional writes
// ============================================================================

/// Serializes commits that read or grow a booking's set of open folios
///
/// Held until the transaction ends. Rows that do not exist yet cannot be
/// locked with `FOR UPDATE`, so the lock is advisory and keyed on the booking.
pub async fn lock_booking(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    booking_id: BookingId,
) -> Result<(), DatabaseError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("folio-booking:{}:{}", tenant_id.as_uuid(), booking_id.as_uuid()))
        .execute(conn)
        .await?;
    Ok(())
}

/// Number of open folios of a booking
pub async fn count_open_folios(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    booking_id: BookingId,
) -> Result<i64, DatabaseError> {
    let count = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM folios
        WHERE tenant_id = $1 AND booking_id = $2 AND status = 'open'
        "#,
    )
    .bind(*tenant_id.as_uuid())
    .bind(*booking_id.as_uuid())
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Locks invoice rows in id order and returns their status
pub async fn lock_invoices(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    ids: &[Uuid],
) -> Result<Vec<LockedInvoice>, DatabaseError> {
    let rows = sqlx::query_as(
        r#"
        SELECT invoice_id, status
        FROM invoices
        WHERE tenant_id = $1 AND invoice_id = ANY($2)
        ORDER BY invoice_id
        FOR UPDATE
        "#,
    )
    .bind(*tenant_id.as_uuid())
    .bind(ids)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Locks folio rows in id order and returns their status and version
pub async fn lock_folios(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    ids: &[Uuid],
) -> Result<Vec<LockedFolio>, DatabaseError> {
    let rows = sqlx::query_as(
        r#"
        SELECT folio_id, status, version
        FROM folios
        WHERE tenant_id = $1 AND folio_id = ANY($2)
        ORDER BY folio_id
        FOR UPDATE
        "#,
    )
    .bind(*tenant_id.as_uuid())
    .bind(ids)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Locks charge rows in id order and returns their folio and version
pub async fn lock_charges(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    ids: &[Uuid],
) -> Result<Vec<LockedCharge>, DatabaseError> {
    let rows = sqlx::query_as(
        r#"
        SELECT charge_id, folio_id, version
        FROM charges
        WHERE tenant_id = $1 AND charge_id = ANY($2)
        ORDER BY charge_id
        FOR UPDATE
        "#,
    )
    .bind(*tenant_id.as_uuid())
    .bind(ids)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Inserts a folio at version 0
pub async fn insert_folio(conn: &mut PgConnection, folio: &Folio) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO folios (
            folio_id, tenant_id, booking_id, folio_type, owner_id, folio_number,
            currency, status, version, created_at, closed_at, closed_by, close_reason
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, $11, $12)
        "#,
    )
    .bind(*folio.id.as_uuid())
    .bind(*folio.tenant_id.as_uuid())
    .bind(*folio.booking_id.as_uuid())
    .bind(folio.folio_type.as_str())
    .bind(*folio.owner_id.as_uuid())
    .bind(&folio.folio_number)
    .bind(folio.currency.code())
    .bind(folio.status.as_str())
    .bind(folio.created_at)
    .bind(folio.closed_at)
    .bind(&folio.closed_by)
    .bind(&folio.close_reason)
    .execute(conn)
    .await?;
    Ok(())
}

/// Updates a folio's lifecycle columns; the version is left to the caller
pub async fn update_folio(conn: &mut PgConnection, folio: &Folio) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE folios
        SET status = $3, closed_at = $4, closed_by = $5, close_reason = $6
        WHERE tenant_id = $1 AND folio_id = $2
        "#,
    )
    .bind(*folio.tenant_id.as_uuid())
    .bind(*folio.id.as_uuid())
    .bind(folio.status.as_str())
    .bind(folio.closed_at)
    .bind(&folio.closed_by)
    .bind(&folio.close_reason)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Folio", folio.id));
    }
    Ok(())
}

/// Inserts a charge at version 0
pub async fn insert_charge(conn: &mut PgConnection, charge: &Charge) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO charges (
            charge_id, tenant_id, folio_id, category, description, quantity, unit_price,
            amount, tax_rate, tax_amount, total, currency, voided, void_reason, voided_by,
            voided_at, posted_at, posted_by, version
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, 0)
        "#,
    )
    .bind(*charge.id.as_uuid())
    .bind(*charge.tenant_id.as_uuid())
    .bind(*charge.folio_id.as_uuid())
    .bind(charge.category.as_str())
    .bind(&charge.description)
    .bind(charge.quantity)
    .bind(charge.unit_price.amount())
    .bind(charge.amount.amount())
    .bind(charge.tax_rate.as_decimal())
    .bind(charge.tax_amount.amount())
    .bind(charge.total.amount())
    .bind(charge.total.currency().code())
    .bind(charge.voided)
    .bind(&charge.void_reason)
    .bind(&charge.voided_by)
    .bind(charge.voided_at)
    .bind(charge.posted_at)
    .bind(&charge.posted_by)
    .execute(conn)
    .await?;
    Ok(())
}

/// Updates a charge's folio and void columns and bumps its version
pub async fn update_charge(conn: &mut PgConnection, charge: &Charge) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE charges
        SET folio_id = $3, voided = $4, void_reason = $5, voided_by = $6, voided_at = $7,
            version = version + 1
        WHERE tenant_id = $1 AND charge_id = $2
        "#,
    )
    .bind(*charge.tenant_id.as_uuid())
    .bind(*charge.id.as_uuid())
    .bind(*charge.folio_id.as_uuid())
    .bind(charge.voided)
    .bind(&charge.void_reason)
    .bind(&charge.voided_by)
    .bind(charge.voided_at)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Charge", charge.id));
    }
    Ok(())
}

/// Inserts a payment
pub async fn insert_payment(conn: &mut PgConnection, payment: &Payment) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            payment_id, tenant_id, folio_id, amount, currency, method, payment_type,
            reference, posted_at, posted_by
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(*payment.id.as_uuid())
    .bind(*payment.tenant_id.as_uuid())
    .bind(*payment.folio_id.as_uuid())
    .bind(payment.amount.amount())
    .bind(payment.amount.currency().code())
    .bind(&payment.method)
    .bind(payment.payment_type.as_str())
    .bind(&payment.reference)
    .bind(payment.posted_at)
    .bind(&payment.posted_by)
    .execute(conn)
    .await?;
    Ok(())
}

/// Inserts a transfer record
pub async fn insert_transfer(conn: &mut PgConnection, transfer: &TransferRecord) -> Result<(), DatabaseError> {
    let charge_ids: Vec<Uuid> = transfer.charge_ids.iter().map(|id| *id.as_uuid()).collect();
    sqlx::query(
        r#"
        INSERT INTO folio_transfers (
            transfer_id, tenant_id, from_folio_id, to_folio_id, charge_ids, amount,
            currency, reason, performed_by, performed_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(*transfer.id.as_uuid())
    .bind(*transfer.tenant_id.as_uuid())
    .bind(*transfer.from_folio_id.as_uuid())
    .bind(*transfer.to_folio_id.as_uuid())
    .bind(charge_ids)
    .bind(transfer.amount.amount())
    .bind(transfer.amount.currency().code())
    .bind(&transfer.reason)
    .bind(&transfer.performed_by)
    .bind(transfer.performed_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Inserts an invoice snapshot
pub async fn insert_invoice(conn: &mut PgConnection, invoice: &Invoice) -> Result<(), DatabaseError> {
    let folio_ids: Vec<Uuid> = invoice.source_folio_ids.iter().map(|id| *id.as_uuid()).collect();
    sqlx::query(
        r#"
        INSERT INTO invoices (
            invoice_id, tenant_id, invoice_number, customer, currency, source_folio_ids, lines,
            subtotal, total_vat, total_additional_taxes, vat_withholding, total,
            vendor_vat_receivable, amount_due_to_vendor, status, created_at, created_by,
            issued_at, paid_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        "#,
    )
    .bind(*invoice.id.as_uuid())
    .bind(*invoice.tenant_id.as_uuid())
    .bind(&invoice.invoice_number)
    .bind(Json(&invoice.customer))
    .bind(invoice.currency.code())
    .bind(folio_ids)
    .bind(Json(&invoice.lines))
    .bind(invoice.subtotal.amount())
    .bind(invoice.total_vat.amount())
    .bind(invoice.total_additional_taxes.amount())
    .bind(invoice.vat_withholding.amount())
    .bind(invoice.total.amount())
    .bind(invoice.vendor_vat_receivable.amount())
    .bind(invoice.amount_due_to_vendor.amount())
    .bind(invoice.status.as_str())
    .bind(invoice.created_at)
    .bind(&invoice.created_by)
    .bind(invoice.issued_at)
    .bind(invoice.paid_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Updates an invoice's lifecycle columns
///
/// Amounts and lines are a frozen snapshot and never rewritten.
pub async fn update_invoice(conn: &mut PgConnection, invoice: &Invoice) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE invoices
        SET status = $3, issued_at = $4, paid_at = $5
        WHERE tenant_id = $1 AND invoice_id = $2
        "#,
    )
    .bind(*invoice.tenant_id.as_uuid())
    .bind(*invoice.id.as_uuid())
    .bind(invoice.status.as_str())
    .bind(invoice.issued_at)
    .bind(invoice.paid_at)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Invoice", invoice.id));
    }
    Ok(())
}

/// Appends an audit entry
pub async fn insert_audit(conn: &mut PgConnection, entry: &AuditEntry) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO audit_entries (
            entry_id, tenant_id, actor, action, entity_type, entity_id,
            before_state, after_state, reason, recorded_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(*entry.id.as_uuid())
    .bind(*entry.tenant_id.as_uuid())
    .bind(&entry.actor)
    .bind(entry.action.as_str())
    .bind(entry.entity_type.as_str())
    .bind(entry.entity_id)
    .bind(&entry.before)
    .bind(&entry.after)
    .bind(&entry.reason)
    .bind(entry.timestamp)
    .execute(conn)
    .await?;
    Ok(())
}

/// Bumps the version of every listed folio by one
pub async fn bump_folio_versions(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    ids: &[Uuid],
) -> Result<(), DatabaseError> {
    if ids.is_empty() {
        return Ok(());
    }
    sqlx::query("UPDATE folios SET version = version + 1 WHERE tenant_id = $1 AND folio_id = ANY($2)")
        .bind(*tenant_id.as_uuid())
        .bind(ids)
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn folio_row() -> FolioRow {
        FolioRow {
            folio_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            folio_type: "company".to_string(),
            owner_id: Uuid::new_v4(),
            folio_number: "F2026-000007".to_string(),
            currency: "EUR".to_string(),
            status: "closed".to_string(),
            version: 4,
            created_at: Utc::now(),
            closed_at: Some(Utc::now()),
            closed_by: Some("night-audit".to_string()),
            close_reason: None,
        }
    }

    #[test]
    fn test_folio_row_conversion() {
        let row = folio_row();
        let id = row.folio_id;
        let folio = Folio::try_from(row).unwrap();

        assert_eq!(*folio.id.as_uuid(), id);
        assert_eq!(folio.folio_type, FolioType::Company);
        assert_eq!(folio.status, FolioStatus::Closed);
        assert_eq!(folio.version, 4);
        assert_eq!(folio.currency, Currency::EUR);
    }

    #[test]
    fn test_folio_row_rejects_unknown_status() {
        let row = FolioRow {
            status: "archived".to_string(),
            ..folio_row()
        };
        assert!(matches!(Folio::try_from(row), Err(DatabaseError::SerializationError(_))));
    }

    #[test]
    fn test_folio_row_rejects_negative_version() {
        let row = FolioRow { version: -1, ..folio_row() };
        assert!(Folio::try_from(row).is_err());
    }

    #[test]
    fn test_charge_row_conversion_keeps_custom_category() {
        let row = ChargeRow {
            charge_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            folio_id: Uuid::new_v4(),
            category: "golf".to_string(),
            description: "Green fee".to_string(),
            quantity: dec!(2),
            unit_price: dec!(45.00),
            amount: dec!(90.00),
            tax_rate: dec!(0.10),
            tax_amount: dec!(9.00),
            total: dec!(99.00),
            currency: "EUR".to_string(),
            voided: false,
            void_reason: None,
            voided_by: None,
            voided_at: None,
            posted_at: Utc::now(),
            posted_by: "pro-shop".to_string(),
            version: 1,
        };
        let charge = Charge::try_from(row).unwrap();

        assert_eq!(charge.category, ChargeCategory::Other("golf".to_string()));
        assert_eq!(charge.total.amount(), dec!(99.00));
        assert_eq!(charge.tax_rate.as_decimal(), dec!(0.10));
    }

    #[test]
    fn test_audit_row_rejects_unknown_action() {
        let row = AuditRow {
            entry_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            actor: "fd".to_string(),
            action: "folio_deleted".to_string(),
            entity_type: "folio".to_string(),
            entity_id: Uuid::new_v4(),
            before_state: None,
            after_state: None,
            reason: None,
            recorded_at: Utc::now(),
        };
        assert!(AuditEntry::try_from(row).is_err());
    }
}
