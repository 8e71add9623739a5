//! PostgreSQL Stay Adapter
//!
//! Implements the ledger's collaborator ports, `BookingPort` and
//! `HousekeepingPort`, over the `stay_bookings` and `housekeeping_tasks`
//! tables. Deployments with a separate reservations or housekeeping service
//! replace this adapter with one that calls those services.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, instrument};

use core_kernel::{
    BookingId, DomainPort, HealthCheckResult, HealthCheckable, PortError, TenantId,
};
use domain_folio::{BookingPort, HousekeepingPort};

use crate::repositories::stay::StayRepository;

const ADAPTER_ID: &str = "postgres-stay-adapter";

/// PostgreSQL-backed booking and housekeeping collaborator
#[derive(Debug, Clone)]
pub struct PostgresStayAdapter {
    repository: StayRepository,
    pool: PgPool,
}

impl PostgresStayAdapter {
    /// Creates a new stay adapter
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: StayRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &StayRepository {
        &self.repository
    }
}

impl DomainPort for PostgresStayAdapter {}

#[async_trait]
impl HealthCheckable for PostgresStayAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(ADAPTER_ID, latency_ms, format!("Database error: {}", e)),
        }
    }
}

#[async_trait]
impl BookingPort for PostgresStayAdapter {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, booking_id = %booking_id))]
    async fn booking_exists(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<bool, PortError> {
        Ok(self.repository.booking_exists(tenant_id, booking_id).await?)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, booking_id = %booking_id))]
    async fn mark_checked_out(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<(), PortError> {
        self.repository.mark_checked_out(tenant_id, booking_id).await?;
        info!("Booking checked out");
        Ok(())
    }
}

#[async_trait]
impl HousekeepingPort for PostgresStayAdapter {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, booking_id = %booking_id))]
    async fn mark_room_dirty(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<(), PortError> {
        self.repository.queue_dirty_room(tenant_id, booking_id).await?;
        info!("Room queued for cleaning");
        Ok(())
    }
}
