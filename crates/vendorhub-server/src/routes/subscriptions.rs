//! The tenant's subscription, its usage and plan upgrades.

use axum::extract::State;
use axum::response::IntoResponse;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use vendorhub_api::{ApiError, ApiJson, ApiQuery, ApiResponse};
use vendorhub_auth::{Session, SessionAuth};
use vendorhub_core::lifecycle::Lifecycle;
use vendorhub_core::models::{Plan, Subscription, SubscriptionStatus, UsageResource};
use vendorhub_core::validation::{Required, clean, take};
use vendorhub_storage::{Query, Repository};

use super::{ListParams, find_page};
use crate::payments::UpgradeRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeBody {
    pub plan_id: Option<String>,
    pub payment_method: Option<String>,
    #[serde(alias = "phone")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub used: u32,
    /// `None` means unlimited.
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
}

/// Usage of every counted resource against `plan`.
pub fn usage_report(
    subscription: &Subscription,
    plan: Option<&Plan>,
) -> IndexMap<UsageResource, ResourceUsage> {
    UsageResource::ALL
        .iter()
        .map(|&resource| {
            let used = subscription.usage_of(resource);
            let limit = plan.and_then(|p| p.limit_for(resource));
            let usage = ResourceUsage {
                used,
                limit,
                remaining: limit.map(|l| l.saturating_sub(used)),
            };
            (resource, usage)
        })
        .collect()
}

fn subscriptions(state: &AppState, session: &Session) -> Result<Repository<Subscription>, ApiError> {
    state.tenant(session)
}

async fn active(repo: &Repository<Subscription>) -> Result<Option<Subscription>, ApiError> {
    Ok(repo
        .find_one(
            Query::new()
                .eq("status", SubscriptionStatus::Active.as_str())
                .newest_first(),
        )
        .await?)
}

/// GET /api/subscriptions
///
/// The active subscription and its plan; both `null` when there is none.
pub async fn current(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
) -> Result<impl IntoResponse, ApiError> {
    let repo = subscriptions(&state, &session)?;
    let subscription = active(&repo).await?;
    let plan = match &subscription {
        Some(s) => state.platform::<Plan>().get(&s.plan_id).await?,
        None => None,
    };
    Ok(ApiResponse::ok(json!({
        "subscription": subscription,
        "plan": plan,
    })))
}

/// GET /api/subscriptions/history
pub async fn history(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = subscriptions(&state, &session)?;
    let query = Query::new().eq_opt(
        "status",
        params.status::<SubscriptionStatus>()?.map(|s| s.as_str()),
    );
    let (items, pagination) = find_page(&repo, query, state.page(&params.page)).await?;
    Ok(ApiResponse::ok(json!({
        "subscriptions": items,
        "pagination": pagination,
    })))
}

/// GET /api/subscriptions/usage
pub async fn usage(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
) -> Result<impl IntoResponse, ApiError> {
    let repo = subscriptions(&state, &session)?;
    let Some(subscription) = active(&repo).await? else {
        return Err(ApiError::not_found("No active subscription"));
    };
    let plan = state.platform::<Plan>().get(&subscription.plan_id).await?;
    Ok(ApiResponse::ok(json!({
        "planId": subscription.plan_id,
        "usage": usage_report(&subscription, plan.as_ref()),
    })))
}

/// POST /api/subscriptions/upgrade
///
/// Creates a pending subscription and payment; the payment is confirmed in
/// the background. Poll `GET /api/payments/{reference}` for the outcome.
pub async fn upgrade(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiJson(body): ApiJson<UpgradeBody>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_manager()?;
    Required::new()
        .text("planId", &body.plan_id)
        .text("paymentMethod", &body.payment_method)
        .finish()?;

    let request = UpgradeRequest {
        plan_id: take("planId", clean(body.plan_id))?,
        method: take("paymentMethod", body.payment_method)?.parse()?,
        phone_number: clean(body.phone_number),
    };
    let (subscription, payment) = state
        .payments
        .start_upgrade(session.vendor_id()?, session.service_type(), request)
        .await?;

    Ok(ApiResponse::created(json!({
        "subscription": subscription,
        "payment": payment,
        "message": "Payment initiated; confirmation is in progress",
    })))
}

/// POST /api/subscriptions/cancel
pub async fn cancel(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
) -> Result<impl IntoResponse, ApiError> {
    session.require_manager()?;
    let repo = subscriptions(&state, &session)?;
    let Some(mut subscription) = active(&repo).await? else {
        return Err(ApiError::not_found("No active subscription"));
    };
    subscription.status = subscription
        .status
        .transition_to(SubscriptionStatus::Cancelled)?;
    repo.update(&mut subscription).await?;

    tracing::info!(
        vendor_id = session.vendor_id()?,
        subscription_id = %subscription.meta.id,
        "subscription cancelled"
    );
    Ok(ApiResponse::ok(json!({ "subscription": subscription })))
}
