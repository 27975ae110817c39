//! Billing plans, tenant subscriptions and usage counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::entity::RecordMeta;
use crate::error::{CoreError, Result};
use crate::lifecycle::Lifecycle;
use crate::models::payment::{PaymentMethod, PaymentStatus};
use crate::tenant::ServiceType;
use crate::time::period_end;
use crate::{impl_entity, string_enum};

string_enum! {
    pub enum BillingCycle ("billing cycle") {
        Monthly => "monthly",
        Yearly => "yearly",
    }
}

impl BillingCycle {
    pub fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Yearly => 12,
        }
    }
}

string_enum! {
    /// Resources counted against a plan.
    pub enum UsageResource ("usage resource") {
        Buses => "buses",
        Routes => "routes",
        Staff => "staff",
        Dispatches => "dispatches",
        Prescriptions => "prescriptions",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    /// Vertical the plan is sold to; `None` means any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<ServiceType>,
    /// Price in minor currency units.
    pub price: u64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    /// Per-resource caps. Absent resources are unlimited.
    #[serde(default)]
    pub limits: BTreeMap<UsageResource, u32>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl_entity!(Plan, "plans");

impl Plan {
    pub fn limit_for(&self, resource: UsageResource) -> Option<u32> {
        self.limits.get(&resource).copied()
    }

    pub fn is_available_to(&self, service_type: ServiceType) -> bool {
        self.active && self.service_type.is_none_or(|s| s == service_type)
    }
}

string_enum! {
    pub enum SubscriptionStatus ("subscription status") {
        Pending => "pending",
        Active => "active",
        PastDue => "past_due",
        Suspended => "suspended",
        Expired => "expired",
        Cancelled => "cancelled",
    }
}

impl Lifecycle for SubscriptionStatus {
    const ENTITY: &'static str = "subscription";

    fn allowed_next(&self) -> &'static [Self] {
        use SubscriptionStatus::*;
        match self {
            Pending => &[Active, Cancelled],
            Active => &[PastDue, Suspended, Expired, Cancelled],
            PastDue => &[Active, Suspended, Expired, Cancelled],
            Suspended => &[Active, Expired, Cancelled],
            Expired | Cancelled => &[],
        }
    }
}

/// Payment details copied onto the subscription for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPayment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub amount: u64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub plan_id: String,
    pub plan_name: String,
    pub billing_cycle: BillingCycle,
    pub status: SubscriptionStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub usage: BTreeMap<UsageResource, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<SubscriptionPayment>,
}

impl_entity!(Subscription, "subscriptions");

impl Subscription {
    /// A subscription awaiting payment confirmation.
    pub fn pending(vendor_id: impl Into<String>, plan: &Plan, payment: SubscriptionPayment) -> Self {
        Self {
            meta: RecordMeta::for_vendor(vendor_id),
            plan_id: plan.meta.id.clone(),
            plan_name: plan.name.clone(),
            billing_cycle: plan.billing_cycle,
            status: SubscriptionStatus::Pending,
            start_date: None,
            end_date: None,
            usage: BTreeMap::new(),
            payment: Some(payment),
        }
    }

    /// Activate after a confirmed payment. `usage` holds the tenant's
    /// current record counts.
    pub fn activate(
        &mut self,
        usage: BTreeMap<UsageResource, u32>,
        transaction_id: Option<String>,
    ) -> Result<()> {
        self.status = self.status.transition_to(SubscriptionStatus::Active)?;
        let now = OffsetDateTime::now_utc();
        self.start_date = Some(now);
        self.end_date = Some(period_end(now, self.billing_cycle.months()));
        self.usage = usage;
        if let Some(payment) = self.payment.as_mut() {
            payment.status = PaymentStatus::Success;
            payment.transaction_id = transaction_id;
        }
        Ok(())
    }

    /// Close the subscription after a failed or abandoned payment.
    pub fn abandon(&mut self, payment_status: PaymentStatus) -> Result<()> {
        self.status = self.status.transition_to(SubscriptionStatus::Cancelled)?;
        if let Some(payment) = self.payment.as_mut() {
            payment.status = payment_status;
        }
        Ok(())
    }

    pub fn usage_of(&self, resource: UsageResource) -> u32 {
        self.usage.get(&resource).copied().unwrap_or(0)
    }

    /// Count one more `resource`, refusing when the plan cap is reached.
    pub fn consume(&mut self, resource: UsageResource, limit: Option<u32>) -> Result<u32> {
        let used = self.usage_of(resource);
        if let Some(limit) = limit
            && used >= limit
        {
            return Err(CoreError::limit_reached(resource, limit));
        }
        self.usage.insert(resource, used + 1);
        Ok(used + 1)
    }

    /// Release one `resource`; never drops below zero.
    pub fn release(&mut self, resource: UsageResource) -> u32 {
        let used = self.usage_of(resource).saturating_sub(1);
        self.usage.insert(resource, used);
        used
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }
}
