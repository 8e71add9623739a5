//! Test Data Builders
//!
//! Provides builder patterns for constructing ledger requests with sensible
//! defaults, and a harness wiring a `FolioService` to in-memory adapters (or
//! any other `LedgerStore`). Tests specify only the relevant fields and use
//! defaults for everything else.

use std::sync::Arc;

use core_kernel::{BookingId, ChargeId, FolioId, PartyId, Rate, TenantId};
use domain_folio::{
    Charge, ChargeCategory, CreateFolio, Folio, FolioError, FolioService, FolioType,
    InMemoryLedgerStore, LedgerConfig, LedgerStore, MockBookingPort, MockHousekeepingPort,
    Payment, PaymentType, PostCharge, PostPayment, RequestContext, TransferCharges,
};
use rust_decimal::Decimal;

use crate::fixtures::{ContextFixtures, MoneyFixtures, RateFixtures, StringFixtures};

// ============================================================================
// Request builders
// ============================================================================

/// Builder for `PostCharge` requests
///
/// Defaults to one room night at the reference rate with 18% VAT.
pub struct PostChargeBuilder {
    folio_id: FolioId,
    category: ChargeCategory,
    description: String,
    quantity: Decimal,
    unit_price: Decimal,
    tax_rate: Rate,
}

impl PostChargeBuilder {
    /// Creates a new builder for a charge on `folio_id`
    pub fn new(folio_id: FolioId) -> Self {
        Self {
            folio_id,
            category: ChargeCategory::Room,
            description: StringFixtures::room_description().to_string(),
            quantity: Decimal::ONE,
            unit_price: MoneyFixtures::eur_room_rate().amount(),
            tax_rate: RateFixtures::vat_18(),
        }
    }

    /// Sets the category
    pub fn with_category(mut self, category: ChargeCategory) -> Self {
        self.category = category;
        self
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the quantity
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sets the unit price
    pub fn with_unit_price(mut self, unit_price: Decimal) -> Self {
        self.unit_price = unit_price;
        self
    }

    /// Sets the tax rate
    pub fn with_tax_rate(mut self, tax_rate: Rate) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    /// Builds the request
    pub fn build(self) -> PostCharge {
        PostCharge {
            folio_id: self.folio_id,
            category: self.category,
            description: self.description,
            quantity: self.quantity,
            unit_price: self.unit_price,
            tax_rate: self.tax_rate,
        }
    }
}

/// Builder for `PostPayment` requests
///
/// Defaults to a card prepayment of the reference amount.
pub struct PostPaymentBuilder {
    folio_id: FolioId,
    amount: Decimal,
    method: String,
    payment_type: PaymentType,
    reference: Option<String>,
}

impl PostPaymentBuilder {
    /// Creates a new builder for a payment on `folio_id`
    pub fn new(folio_id: FolioId) -> Self {
        Self {
            folio_id,
            amount: MoneyFixtures::eur_prepayment().amount(),
            method: StringFixtures::card_method().to_string(),
            payment_type: PaymentType::Prepayment,
            reference: None,
        }
    }

    /// Sets the amount
    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    /// Sets the payment method
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Sets the payment type
    pub fn with_payment_type(mut self, payment_type: PaymentType) -> Self {
        self.payment_type = payment_type;
        self
    }

    /// Sets the external reference
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Builds the request
    pub fn build(self) -> PostPayment {
        PostPayment {
            folio_id: self.folio_id,
            amount: self.amount,
            method: self.method,
            payment_type: self.payment_type,
            reference: self.reference,
        }
    }
}

// ============================================================================
// Ledger harness
// ============================================================================

/// Builder for [`LedgerHarness`]
pub struct LedgerHarnessBuilder {
    store: Option<Arc<dyn LedgerStore>>,
    config: LedgerConfig,
    tenant_id: TenantId,
}

impl Default for LedgerHarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerHarnessBuilder {
    /// Creates a new builder over an in-memory store and a fresh tenant
    pub fn new() -> Self {
        Self {
            store: None,
            config: LedgerConfig::default(),
            tenant_id: TenantId::new(),
        }
    }

    /// Uses a specific ledger store, e.g. the PostgreSQL adapter
    pub fn with_store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the ledger configuration
    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the settlement tolerance
    pub fn with_tolerance(mut self, tolerance: Decimal) -> Self {
        self.config.settlement_tolerance = tolerance;
        self
    }

    /// Sets the tenant
    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    /// Builds the harness
    pub fn build(self) -> LedgerHarness {
        let memory = Arc::new(InMemoryLedgerStore::new());
        let store: Arc<dyn LedgerStore> = match self.store {
            Some(store) => store,
            None => memory.clone(),
        };
        let bookings = Arc::new(MockBookingPort::new());
        let housekeeping = Arc::new(MockHousekeepingPort::new());
        let service = Arc::new(FolioService::new(
            store.clone(),
            bookings.clone(),
            housekeeping.clone(),
            self.config,
        ));

        LedgerHarness {
            service,
            store,
            memory,
            bookings,
            housekeeping,
            tenant_id: self.tenant_id,
        }
    }
}

/// A `FolioService` wired to mock collaborators, with shortcuts for the
/// common ledger steps
///
/// # Example
///
/// ```rust,ignore
/// let harness = LedgerHarness::new();
/// let booking = harness.new_booking().await;
/// let guest = harness.open_folio(booking, FolioType::Guest).await?;
/// harness.post_room_charge(guest.id).await?;
/// assert_eq!(harness.balance(guest.id).await?, dec!(177.00));
/// ```
pub struct LedgerHarness {
    pub service: Arc<FolioService>,
    pub store: Arc<dyn LedgerStore>,
    /// The in-memory store; unused when another store was supplied
    pub memory: Arc<InMemoryLedgerStore>,
    pub bookings: Arc<MockBookingPort>,
    pub housekeeping: Arc<MockHousekeepingPort>,
    pub tenant_id: TenantId,
}

impl Default for LedgerHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerHarness {
    /// Creates a harness over the in-memory store with default configuration
    pub fn new() -> Self {
        LedgerHarnessBuilder::new().build()
    }

    /// Creates a builder
    pub fn builder() -> LedgerHarnessBuilder {
        LedgerHarnessBuilder::new()
    }

    /// A clerk context in the harness tenant
    pub fn clerk(&self) -> RequestContext {
        ContextFixtures::clerk(self.tenant_id)
    }

    /// A manager context in the harness tenant
    pub fn manager(&self) -> RequestContext {
        ContextFixtures::manager(self.tenant_id)
    }

    /// Registers a new booking with the booking collaborator
    pub async fn new_booking(&self) -> BookingId {
        let booking_id = BookingId::new();
        self.bookings.register(self.tenant_id, booking_id).await;
        booking_id
    }

    /// Opens a folio of `folio_type` for `booking_id`
    pub async fn open_folio(&self, booking_id: BookingId, folio_type: FolioType) -> Result<Folio, FolioError> {
        self.service
            .create_folio(
                &self.clerk(),
                &CreateFolio {
                    booking_id,
                    folio_type,
                    owner_id: PartyId::new(),
                    currency: None,
                },
            )
            .await
    }

    /// Posts one room night (150.00 at 18% VAT)
    pub async fn post_room_charge(&self, folio_id: FolioId) -> Result<Charge, FolioError> {
        self.service
            .post_charge(&self.clerk(), &PostChargeBuilder::new(folio_id).build())
            .await
    }

    /// Posts a charge request
    pub async fn post_charge(&self, request: PostCharge) -> Result<Charge, FolioError> {
        self.service.post_charge(&self.clerk(), &request).await
    }

    /// Posts a card prepayment of `amount`
    pub async fn pay(&self, folio_id: FolioId, amount: Decimal) -> Result<Payment, FolioError> {
        self.service
            .post_payment(
                &self.clerk(),
                &PostPaymentBuilder::new(folio_id).with_amount(amount).build(),
            )
            .await
    }

    /// Moves charges between folios
    pub async fn transfer(
        &self,
        from_folio_id: FolioId,
        to_folio_id: FolioId,
        charge_ids: Vec<ChargeId>,
    ) -> Result<(), FolioError> {
        self.service
            .transfer(
                &self.clerk(),
                &TransferCharges {
                    from_folio_id,
                    to_folio_id,
                    charge_ids,
                    reason: "billing instruction".to_string(),
                },
            )
            .await
            .map(|_| ())
    }

    /// Current balance of a folio
    pub async fn balance(&self, folio_id: FolioId) -> Result<Decimal, FolioError> {
        let statement = self
            .service
            .get_folio(&self.clerk(), folio_id)
            .await?;
        Ok(statement.balance.amount())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_charge_builder_defaults() {
        let folio_id = FolioId::new();
        let request = PostChargeBuilder::new(folio_id).build();

        assert_eq!(request.folio_id, folio_id);
        assert_eq!(request.category, ChargeCategory::Room);
        assert_eq!(request.unit_price, dec!(150.00));
        assert_eq!(request.tax_rate, RateFixtures::vat_18());
    }

    #[test]
    fn test_payment_builder_overrides() {
        let request = PostPaymentBuilder::new(FolioId::new())
            .with_amount(dec!(20))
            .with_method("cash")
            .with_payment_type(PaymentType::Final)
            .with_reference("R-1")
            .build();

        assert_eq!(request.amount, dec!(20));
        assert_eq!(request.method, "cash");
        assert_eq!(request.payment_type, PaymentType::Final);
        assert_eq!(request.reference.as_deref(), Some("R-1"));
    }

    #[tokio::test]
    async fn test_harness_reference_stay() {
        let harness = LedgerHarness::new();
        let booking = harness.new_booking().await;
        let guest = harness.open_folio(booking, FolioType::Guest).await.unwrap();

        harness.post_room_charge(guest.id).await.unwrap();
        harness.pay(guest.id, dec!(100)).await.unwrap();

        assert_eq!(harness.balance(guest.id).await.unwrap(), dec!(77.00));
    }
}
