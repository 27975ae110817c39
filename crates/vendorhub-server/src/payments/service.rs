//! Subscription upgrades and server-side payment confirmation.
//!
//! An upgrade creates a pending subscription and payment, submits the intent
//! to the gateway and spawns one poller per payment. The poller asks the
//! gateway for the payment status on a fixed interval until the payment
//! settles, the attempt budget runs out, or its cancellation token fires.
//! Gateway webhooks settle payments through the same path.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use vendorhub_api::ApiError;
use vendorhub_core::lifecycle::Lifecycle;
use vendorhub_core::models::{
    Bus, BusRoute, Dispatch, Payment, PaymentMethod, PaymentStatus, Plan, Prescription,
    StaffMember, Subscription, SubscriptionPayment, SubscriptionStatus, UsageResource,
};
use vendorhub_core::{CoreError, Entity, ServiceType};
use vendorhub_storage::{DynStore, Query, Repository, Scope, StorageError};

use super::gateway::{DynPaymentGateway, GatewayError, GatewayStatus, PaymentIntent};

pub const TIMEOUT_REASON: &str = "Payment confirmation timed out";
pub const CANCELLED_REASON: &str = "Payment cancelled by user";

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Plan not found")]
    PlanNotFound,

    #[error("Plan is not available for {0} vendors")]
    PlanUnavailable(ServiceType),

    #[error("A payment is already pending (reference {reference})")]
    AlreadyPending { reference: String },

    #[error("Payment not found")]
    NotFound,

    #[error("Payment is already {0}")]
    AlreadySettled(PaymentStatus),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::PlanNotFound | PaymentError::NotFound => ApiError::NotFound(err.to_string()),
            PaymentError::PlanUnavailable(_) => ApiError::BadRequest(err.to_string()),
            PaymentError::AlreadyPending { .. } | PaymentError::AlreadySettled(_) => {
                ApiError::Conflict(err.to_string())
            }
            PaymentError::Core(e) => e.into(),
            PaymentError::Storage(e) => e.into(),
            PaymentError::Gateway(e) => ApiError::Internal(format!("payment gateway: {e}")),
        }
    }
}

/// Final outcome applied to a pending payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Paid { transaction_id: Option<String> },
    Failed { reason: String },
    Cancelled { reason: String },
}

impl Settlement {
    /// `None` while the gateway still reports the payment as pending.
    pub fn from_gateway(status: GatewayStatus) -> Option<Self> {
        match status {
            GatewayStatus::Pending => None,
            GatewayStatus::Successful { transaction_id } => Some(Self::Paid { transaction_id }),
            GatewayStatus::Failed { message } => Some(Self::Failed { reason: message }),
        }
    }

    fn payment_status(&self) -> PaymentStatus {
        match self {
            Self::Paid { .. } => PaymentStatus::Success,
            Self::Failed { .. } => PaymentStatus::Failed,
            Self::Cancelled { .. } => PaymentStatus::Cancelled,
        }
    }
}

/// An upgrade request after presence validation.
#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    pub plan_id: String,
    pub method: PaymentMethod,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 30,
        }
    }
}

enum PollOutcome {
    Pending,
    Settled(PaymentStatus),
    /// The payment record disappeared.
    Gone,
}

#[derive(Clone)]
pub struct PaymentService {
    inner: Arc<Inner>,
}

struct Inner {
    store: DynStore,
    gateway: DynPaymentGateway,
    settings: PollSettings,
    pollers: DashMap<String, CancellationToken>,
    shutdown: CancellationToken,
    /// Serializes the pending-payment check and every settlement.
    lock: Mutex<()>,
}

impl PaymentService {
    pub fn new(store: DynStore, gateway: DynPaymentGateway, settings: PollSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                gateway,
                settings,
                pollers: DashMap::new(),
                shutdown: CancellationToken::new(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn gateway_name(&self) -> &'static str {
        self.inner.gateway.name()
    }

    /// Number of payments currently being polled.
    pub fn active_pollers(&self) -> usize {
        self.inner.pollers.len()
    }

    pub fn is_polling(&self, reference: &str) -> bool {
        self.inner.pollers.contains_key(reference)
    }

    fn payments(&self, scope: Scope) -> Repository<Payment> {
        Repository::new(self.inner.store.clone(), scope)
    }

    fn subscriptions(&self, vendor_id: &str) -> Repository<Subscription> {
        Repository::new(self.inner.store.clone(), Scope::tenant(vendor_id))
    }

    /// Start paying for `request.plan_id`.
    pub async fn start_upgrade(
        &self,
        vendor_id: &str,
        service_type: Option<ServiceType>,
        request: UpgradeRequest,
    ) -> Result<(Subscription, Payment), PaymentError> {
        let plan = Repository::<Plan>::new(self.inner.store.clone(), Scope::Platform)
            .get(&request.plan_id)
            .await?
            .filter(|p| p.active)
            .ok_or(PaymentError::PlanNotFound)?;
        if let Some(service) = service_type
            && !plan.is_available_to(service)
        {
            return Err(PaymentError::PlanUnavailable(service));
        }

        let payments = self.payments(Scope::tenant(vendor_id));
        let subscriptions = self.subscriptions(vendor_id);

        let (mut subscription, mut payment) = {
            let _guard = self.inner.lock.lock().await;
            if let Some(pending) = payments
                .find_one(Query::new().eq("status", PaymentStatus::Pending.as_str()))
                .await?
            {
                return Err(PaymentError::AlreadyPending {
                    reference: pending.reference,
                });
            }

            let mut subscription = Subscription::pending(
                vendor_id,
                &plan,
                SubscriptionPayment {
                    method: request.method,
                    status: PaymentStatus::Pending,
                    transaction_id: None,
                    reference: None,
                    amount: plan.price,
                    currency: plan.currency.clone(),
                },
            );
            let mut payment = Payment::pending(
                vendor_id,
                subscription.id(),
                plan.id(),
                plan.price,
                plan.currency.clone(),
                request.method,
            );
            payment.phone_number = request.phone_number;
            if let Some(p) = subscription.payment.as_mut() {
                p.reference = Some(payment.reference.clone());
            }
            let subscription = subscriptions.insert(&subscription).await?;
            let payment = payments.insert(&payment).await?;
            (subscription, payment)
        };

        let intent = PaymentIntent {
            reference: payment.reference.clone(),
            vendor_id: vendor_id.to_string(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            method: payment.method,
            phone_number: payment.phone_number.clone(),
            description: format!("{} subscription", plan.name),
        };

        let receipt = match self.inner.gateway.initiate(&intent).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(
                    vendor_id,
                    reference = %payment.reference,
                    gateway = self.inner.gateway.name(),
                    error = %e,
                    "payment initiation failed"
                );
                payment.settle(PaymentStatus::Failed, None, Some(e.to_string()))?;
                payments.update(&mut payment).await?;
                subscription.abandon(PaymentStatus::Failed)?;
                subscriptions.update(&mut subscription).await?;
                return Err(e.into());
            }
        };

        if receipt.reference != payment.reference {
            tracing::debug!(
                local = %payment.reference,
                gateway = %receipt.reference,
                "gateway assigned its own reference"
            );
            payment.reference = receipt.reference.clone();
            payments.update(&mut payment).await?;
            if let Some(p) = subscription.payment.as_mut() {
                p.reference = Some(receipt.reference);
            }
            subscriptions.update(&mut subscription).await?;
        }

        tracing::info!(
            vendor_id,
            plan_id = %plan.meta.id,
            reference = %payment.reference,
            amount = payment.amount,
            "subscription upgrade started"
        );
        self.spawn_poller(vendor_id.to_string(), payment.reference.clone());
        Ok((subscription, payment))
    }

    /// Poll the gateway for `reference` until it settles.
    pub fn spawn_poller(&self, vendor_id: String, reference: String) {
        let token = self.inner.shutdown.child_token();
        if let Some(previous) = self.inner.pollers.insert(reference.clone(), token.clone()) {
            previous.cancel();
        }
        let service = self.clone();

        tokio::spawn(async move {
            let PollSettings {
                interval,
                max_attempts,
            } = service.inner.settings;
            tracing::debug!(
                %reference,
                interval_ms = interval.as_millis() as u64,
                max_attempts,
                "payment poller started"
            );
            let mut ticker = interval_at(Instant::now() + interval, interval);
            let mut ticks: u32 = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        ticks += 1;
                        match service.check_once(&vendor_id, &reference).await {
                            Ok(PollOutcome::Pending) => {}
                            Ok(PollOutcome::Settled(status)) => {
                                tracing::info!(%reference, %status, attempts = ticks, "payment settled");
                                break;
                            }
                            Ok(PollOutcome::Gone) => {
                                tracing::warn!(%reference, "payment disappeared while polling");
                                break;
                            }
                            Err(e) => {
                                tracing::error!(%reference, error = %e, "payment poll failed");
                                if ticks >= max_attempts {
                                    service.expire(&vendor_id, &reference).await;
                                    break;
                                }
                            }
                        }
                    }
                    _ = token.cancelled() => {
                        tracing::debug!(%reference, "payment poller cancelled");
                        break;
                    }
                }
            }

            // A cancelled token was already removed or replaced by whoever cancelled it.
            if !token.is_cancelled() {
                service.inner.pollers.remove(&reference);
            }
        });
    }

    /// Final settlement after the poller ran out of attempts on errors.
    async fn expire(&self, vendor_id: &str, reference: &str) {
        let settlement = Settlement::Failed {
            reason: TIMEOUT_REASON.to_string(),
        };
        match self.settle(vendor_id, reference, settlement).await {
            Ok(payment) => {
                tracing::warn!(
                    reference,
                    status = %payment.status,
                    "payment expired after poll errors"
                );
            }
            Err(e) => {
                tracing::error!(reference, error = %e, "payment could not be expired");
            }
        }
    }

    async fn check_once(&self, vendor_id: &str, reference: &str) -> Result<PollOutcome, PaymentError> {
        let payments = self.payments(Scope::tenant(vendor_id));
        let Some(mut payment) = payments
            .find_one(Query::new().eq("reference", reference))
            .await?
        else {
            return Ok(PollOutcome::Gone);
        };
        if payment.status.is_settled() {
            return Ok(PollOutcome::Settled(payment.status));
        }

        payment.record_check();
        let attempt = payment.attempts;
        payments.update(&mut payment).await?;

        let status = match self.inner.gateway.status(reference).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(reference, attempt, error = %e, "payment status check failed");
                GatewayStatus::Pending
            }
        };

        let settlement = match Settlement::from_gateway(status) {
            Some(settlement) => settlement,
            None if attempt >= self.inner.settings.max_attempts => Settlement::Failed {
                reason: TIMEOUT_REASON.to_string(),
            },
            None => {
                tracing::debug!(reference, attempt, "payment still pending");
                return Ok(PollOutcome::Pending);
            }
        };

        let payment = self.settle(vendor_id, reference, settlement).await?;
        Ok(PollOutcome::Settled(payment.status))
    }

    /// Apply a final outcome to a payment and its subscription.
    ///
    /// Settling an already settled payment returns it unchanged.
    pub async fn settle(
        &self,
        vendor_id: &str,
        reference: &str,
        settlement: Settlement,
    ) -> Result<Payment, PaymentError> {
        let _guard = self.inner.lock.lock().await;

        let payments = self.payments(Scope::tenant(vendor_id));
        let mut payment = payments
            .find_one(Query::new().eq("reference", reference))
            .await?
            .ok_or(PaymentError::NotFound)?;
        if payment.status.is_settled() {
            tracing::debug!(reference, status = %payment.status, "payment already settled");
            return Ok(payment);
        }

        let subscriptions = self.subscriptions(vendor_id);
        let subscription = subscriptions.get(&payment.subscription_id).await?;

        match &settlement {
            Settlement::Paid { transaction_id } => {
                payment.settle(PaymentStatus::Success, transaction_id.clone(), None)?;
                match subscription {
                    Some(mut subscription)
                        if subscription.status == SubscriptionStatus::Pending =>
                    {
                        let tx = transaction_id.clone();
                        self.activate(vendor_id, &subscriptions, &mut subscription, tx)
                            .await?;
                    }
                    Some(subscription) => {
                        tracing::warn!(
                            reference,
                            subscription_id = %subscription.meta.id,
                            status = %subscription.status,
                            "payment succeeded for a subscription that is no longer pending"
                        );
                    }
                    None => {
                        tracing::warn!(reference, "payment succeeded for a missing subscription");
                    }
                }
            }
            Settlement::Failed { reason } | Settlement::Cancelled { reason } => {
                let status = settlement.payment_status();
                payment.settle(status, None, Some(reason.clone()))?;
                if let Some(mut subscription) = subscription
                    && subscription.status == SubscriptionStatus::Pending
                {
                    subscription.abandon(status)?;
                    subscriptions.update(&mut subscription).await?;
                }
            }
        }
        payments.update(&mut payment).await?;
        self.stop_poller(reference);

        tracing::info!(
            vendor_id,
            reference,
            status = %payment.status,
            reason = payment.failure_reason.as_deref().unwrap_or(""),
            "payment settled"
        );
        Ok(payment)
    }

    async fn activate(
        &self,
        vendor_id: &str,
        subscriptions: &Repository<Subscription>,
        subscription: &mut Subscription,
        transaction_id: Option<String>,
    ) -> Result<(), PaymentError> {
        let replaced: Vec<Subscription> = subscriptions
            .find_all(
                Query::new()
                    .eq("status", SubscriptionStatus::Active.as_str())
                    .newest_first(),
            )
            .await?
            .into_iter()
            .filter(|s| s.meta.id != subscription.meta.id)
            .collect();

        let usage = self.tenant_usage(vendor_id).await?;
        subscription.activate(usage, transaction_id)?;
        subscriptions.update(subscription).await?;

        for mut old in replaced {
            old.status = old.status.transition_to(SubscriptionStatus::Cancelled)?;
            subscriptions.update(&mut old).await?;
            tracing::info!(subscription_id = %old.meta.id, "replaced subscription cancelled");
        }
        Ok(())
    }

    /// Live record counts of the tenant, one per metered resource.
    async fn tenant_usage(
        &self,
        vendor_id: &str,
    ) -> Result<BTreeMap<UsageResource, u32>, PaymentError> {
        let mut usage = BTreeMap::new();
        for &resource in UsageResource::ALL {
            let count = match resource {
                UsageResource::Buses => self.count_of::<Bus>(vendor_id).await?,
                UsageResource::Routes => self.count_of::<BusRoute>(vendor_id).await?,
                UsageResource::Staff => self.count_of::<StaffMember>(vendor_id).await?,
                UsageResource::Dispatches => self.count_of::<Dispatch>(vendor_id).await?,
                UsageResource::Prescriptions => self.count_of::<Prescription>(vendor_id).await?,
            };
            usage.insert(resource, u32::try_from(count).unwrap_or(u32::MAX));
        }
        Ok(usage)
    }

    async fn count_of<T>(&self, vendor_id: &str) -> Result<u64, StorageError>
    where
        T: Entity + Serialize + DeserializeOwned,
    {
        Repository::<T>::new(self.inner.store.clone(), Scope::tenant(vendor_id))
            .count(Query::new())
            .await
    }

    /// Payment of the tenant by reference.
    pub async fn get(&self, vendor_id: &str, reference: &str) -> Result<Payment, PaymentError> {
        self.payments(Scope::tenant(vendor_id))
            .find_one(Query::new().eq("reference", reference))
            .await?
            .ok_or(PaymentError::NotFound)
    }

    /// Stop polling and mark the payment cancelled.
    pub async fn cancel(&self, vendor_id: &str, reference: &str) -> Result<Payment, PaymentError> {
        let payment = self.get(vendor_id, reference).await?;
        if payment.status.is_settled() {
            return Err(PaymentError::AlreadySettled(payment.status));
        }
        self.stop_poller(reference);
        self.settle(
            vendor_id,
            reference,
            Settlement::Cancelled {
                reason: CANCELLED_REASON.to_string(),
            },
        )
        .await
    }

    /// Apply a gateway webhook.
    pub async fn handle_callback(
        &self,
        reference: &str,
        status: GatewayStatus,
    ) -> Result<Payment, PaymentError> {
        let payment = self
            .payments(Scope::Platform)
            .find_one(Query::new().eq("reference", reference))
            .await?
            .ok_or(PaymentError::NotFound)?;
        let Some(settlement) = Settlement::from_gateway(status) else {
            return Ok(payment);
        };
        let vendor_id = payment
            .meta
            .vendor_id
            .clone()
            .ok_or_else(|| StorageError::internal(format!("payment {reference} has no vendor")))?;
        self.settle(&vendor_id, reference, settlement).await
    }

    /// Restart pollers for payments left pending by a previous run.
    pub async fn resume_pending(&self) -> Result<usize, PaymentError> {
        let pending = self
            .payments(Scope::Platform)
            .find_all(Query::new().eq("status", PaymentStatus::Pending.as_str()))
            .await?;
        let mut resumed = 0;
        for payment in pending {
            if let Some(vendor_id) = payment.meta.vendor_id {
                self.spawn_poller(vendor_id, payment.reference);
                resumed += 1;
            }
        }
        if resumed > 0 {
            tracing::info!(count = resumed, "resumed payment pollers");
        }
        Ok(resumed)
    }

    fn stop_poller(&self, reference: &str) {
        if let Some((_, token)) = self.inner.pollers.remove(reference) {
            token.cancel();
        }
    }

    /// Cancel every poller.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.pollers.clear();
        tracing::debug!("payment pollers stopped");
    }
}
