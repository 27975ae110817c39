//! Subscription payments tracked against an external gateway.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::entity::RecordMeta;
use crate::error::{CoreError, Result};
use crate::id::generate_reference;
use crate::{impl_entity, string_enum};

string_enum! {
    pub enum PaymentMethod ("payment method") {
        Card => "card",
        MobileMoney => "mobile_money",
        BankTransfer => "bank_transfer",
    }
}

string_enum! {
    pub enum PaymentStatus ("payment status") {
        Pending => "pending",
        Success => "success",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl PaymentStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Reference shared with the gateway.
    pub reference: String,
    pub subscription_id: String,
    pub plan_id: String,
    /// Minor currency units.
    pub amount: u64,
    pub currency: String,
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_checked_at: Option<OffsetDateTime>,
}

impl_entity!(Payment, "payments");

impl Payment {
    pub fn pending(
        vendor_id: impl Into<String>,
        subscription_id: impl Into<String>,
        plan_id: impl Into<String>,
        amount: u64,
        currency: impl Into<String>,
        method: PaymentMethod,
    ) -> Self {
        Self {
            meta: RecordMeta::for_vendor(vendor_id),
            reference: generate_reference("PAY"),
            subscription_id: subscription_id.into(),
            plan_id: plan_id.into(),
            amount,
            currency: currency.into(),
            method,
            phone_number: None,
            status: PaymentStatus::Pending,
            transaction_id: None,
            attempts: 0,
            failure_reason: None,
            last_checked_at: None,
        }
    }

    /// Record one gateway status check.
    pub fn record_check(&mut self) {
        self.attempts += 1;
        self.last_checked_at = Some(OffsetDateTime::now_utc());
    }

    /// Move out of `pending`. Settled payments never change again.
    pub fn settle(
        &mut self,
        status: PaymentStatus,
        transaction_id: Option<String>,
        failure_reason: Option<String>,
    ) -> Result<()> {
        if self.status.is_settled() {
            return Err(CoreError::invalid_transition("payment", self.status, status));
        }
        if status == PaymentStatus::Pending {
            return Ok(());
        }
        self.status = status;
        if transaction_id.is_some() {
            self.transaction_id = transaction_id;
        }
        self.failure_reason = failure_reason;
        Ok(())
    }
}
