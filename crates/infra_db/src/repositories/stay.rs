//! Stay repository implementation
//!
//! Database access for the booking and housekeeping state the ledger
//! collaborates with: whether a booking exists, its checkout marker, and
//! the dirty-room task queue.

use chrono::Utc;
use sqlx::PgPool;

use core_kernel::{BookingId, TenantId};

use crate::error::DatabaseError;

/// Repository for stay bookings and housekeeping tasks
#[derive(Debug, Clone)]
pub struct StayRepository {
    pool: PgPool,
}

impl StayRepository {
    /// Creates a new StayRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Registers a booking, optionally with its room
    ///
    /// Registering an existing booking again is a no-op.
    pub async fn register_booking(
        &self,
        tenant_id: TenantId,
        booking_id: BookingId,
        room_number: Option<&str>,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO stay_bookings (booking_id, tenant_id, room_number)
            VALUES ($1, $2, $3)
            ON CONFLICT (booking_id) DO NOTHING
            "#,
        )
        .bind(*booking_id.as_uuid())
        .bind(*tenant_id.as_uuid())
        .bind(room_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns true if the booking exists in the tenant
    pub async fn booking_exists(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<bool, DatabaseError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM stay_bookings WHERE tenant_id = $1 AND booking_id = $2)",
        )
        .bind(*tenant_id.as_uuid())
        .bind(*booking_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Records the checkout time of a booking
    ///
    /// A booking already checked out keeps its first checkout time.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if the booking is unknown
    pub async fn mark_checked_out(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE stay_bookings
            SET checked_out_at = COALESCE(checked_out_at, $3)
            WHERE tenant_id = $1 AND booking_id = $2
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .bind(*booking_id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Booking", booking_id));
        }
        Ok(())
    }

    /// Returns true once the booking has been checked out
    pub async fn is_checked_out(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<bool, DatabaseError> {
        let checked_out: Option<bool> = sqlx::query_scalar(
            "SELECT checked_out_at IS NOT NULL FROM stay_bookings WHERE tenant_id = $1 AND booking_id = $2",
        )
        .bind(*tenant_id.as_uuid())
        .bind(*booking_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(checked_out.unwrap_or(false))
    }

    /// Queues a cleaning task for the booking's room
    pub async fn queue_dirty_room(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO housekeeping_tasks (tenant_id, booking_id, room_number, status)
            SELECT $1, $2, b.room_number, 'dirty'
            FROM (SELECT $2::uuid AS booking_id) AS requested
            LEFT JOIN stay_bookings b ON b.booking_id = requested.booking_id AND b.tenant_id = $1
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .bind(*booking_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Number of open cleaning tasks for a booking
    pub async fn dirty_tasks(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM housekeeping_tasks WHERE tenant_id = $1 AND booking_id = $2 AND status = 'dirty'",
        )
        .bind(*tenant_id.as_uuid())
        .bind(*booking_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
