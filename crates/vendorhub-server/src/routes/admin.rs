//! Platform administration: vendors, their users, and the plan catalogue.
//!
//! Every handler here requires the `admin` role.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use vendorhub_api::{ApiError, ApiJson, ApiQuery, ApiResponse};
use vendorhub_auth::password::{check_strength, hash_password_async};
use vendorhub_auth::{NewUser, SessionAuth, User};
use vendorhub_core::models::{
    BillingCycle, Plan, Subscription, SubscriptionStatus, UsageResource, Vendor,
};
use vendorhub_core::validation::{Required, clean, take};
use vendorhub_core::{RecordMeta, Role, ServiceType};
use vendorhub_storage::Query;

use super::{ListParams, find_page};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRequest {
    pub name: Option<String>,
    pub service_type: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Display name of the owner login; defaults to the vendor name.
    pub owner_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VendorStatusRequest {
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct VendorUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub name: Option<String>,
    pub service_type: Option<String>,
    pub price: Option<u64>,
    pub currency: Option<String>,
    pub billing_cycle: Option<String>,
    pub limits: Option<BTreeMap<UsageResource, u32>>,
    pub active: Option<bool>,
}

async fn ensure_email_free(state: &AppState, email: &str) -> Result<(), ApiError> {
    if state.auth.find_user_by_email(email).await?.is_some() {
        return Err(ApiError::conflict(format!(
            "A user with email {email} already exists"
        )));
    }
    Ok(())
}

/// Hash `password` after checking its strength; weak passwords are a 400.
async fn password_hash(password: String) -> Result<String, ApiError> {
    check_strength(&password).map_err(ApiError::bad_request)?;
    Ok(hash_password_async(password).await?)
}

async fn load_vendor(state: &AppState, id: &str) -> Result<Vendor, ApiError> {
    state
        .platform::<Vendor>()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Vendor not found"))
}

/// GET /api/admin/vendors
///
/// `status` is `active` or `inactive`; `search` covers name and email.
pub async fn list_vendors(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    let active = match params.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some("active") => Some(true),
        Some("inactive") => Some(false),
        Some(other) => {
            return Err(ApiError::bad_request(format!(
                "Invalid vendor status: '{other}'"
            )));
        }
    };
    let query = Query::new()
        .eq_opt("active", active)
        .search(params.search(), ["name", "email"]);
    let (items, pagination) =
        find_page(&state.platform::<Vendor>(), query, state.page(&params.page)).await?;
    Ok(ApiResponse::ok(json!({
        "vendors": items,
        "pagination": pagination,
    })))
}

/// POST /api/admin/vendors
///
/// Creates the vendor and its owner login (role `vendor`, same email).
pub async fn create_vendor(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiJson(body): ApiJson<VendorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    Required::new()
        .text("name", &body.name)
        .text("serviceType", &body.service_type)
        .text("email", &body.email)
        .text("password", &body.password)
        .finish()?;

    let name = take("name", clean(body.name))?;
    let service_type: ServiceType = take("serviceType", body.service_type)?.parse()?;
    let email = vendorhub_auth::user::normalize_email(&take("email", body.email)?);
    ensure_email_free(&state, &email).await?;
    let vendors = state.platform::<Vendor>();
    if vendors.count(Query::new().eq("email", email.as_str())).await? > 0 {
        return Err(ApiError::conflict(format!(
            "A vendor with email {email} already exists"
        )));
    }
    let password_hash = password_hash(take("password", body.password)?).await?;

    let mut vendor = Vendor::new(name.as_str(), service_type, email.as_str());
    vendor.phone = clean(body.phone);
    let owner = User::new(NewUser {
        email,
        name: clean(body.owner_name).unwrap_or_else(|| name.clone()),
        password_hash,
        role: Role::Vendor,
        vendor_id: Some(vendor.meta.id.clone()),
        service_type: Some(service_type),
    })?;

    let vendor = vendors.insert(&vendor).await?;
    if let Err(e) = state.auth.users().insert(&owner).await {
        if let Err(cleanup) = vendors.delete(&vendor.meta.id).await {
            tracing::warn!(vendor_id = %vendor.meta.id, error = %cleanup, "orphan vendor left behind");
        }
        return Err(e.into());
    }

    tracing::info!(
        vendor_id = %vendor.meta.id,
        service_type = %vendor.service_type,
        "vendor created"
    );
    Ok(ApiResponse::created(json!({
        "vendor": vendor,
        "owner": owner.view(),
    })))
}

/// GET /api/admin/vendors/{id}
pub async fn read_vendor(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    let vendor = load_vendor(&state, &id).await?;
    let users: Vec<_> = state
        .auth
        .users()
        .find_all(Query::new().eq("vendorId", id.as_str()).sort_by("email", false))
        .await?
        .iter()
        .map(User::view)
        .collect();
    let subscription = state
        .platform::<Subscription>()
        .find_one(
            Query::new()
                .eq("vendorId", id.as_str())
                .eq("status", SubscriptionStatus::Active.as_str())
                .newest_first(),
        )
        .await?;
    Ok(ApiResponse::ok(json!({
        "vendor": vendor,
        "users": users,
        "subscription": subscription,
    })))
}

/// PATCH /api/admin/vendors/{id}/status
///
/// Suspending a vendor locks out all of its users on their next request.
pub async fn set_vendor_status(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<VendorStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    Required::new().value("active", &body.active).finish()?;
    let mut vendor = load_vendor(&state, &id).await?;
    vendor.active = take("active", body.active)?;
    state.platform::<Vendor>().update(&mut vendor).await?;

    tracing::info!(vendor_id = %id, active = vendor.active, "vendor status changed");
    Ok(ApiResponse::ok(json!({ "vendor": vendor })))
}

/// POST /api/admin/vendors/{id}/users
///
/// Adds a `vendor` or `staff` login to an existing vendor.
pub async fn create_vendor_user(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<VendorUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    Required::new()
        .text("email", &body.email)
        .text("name", &body.name)
        .text("password", &body.password)
        .finish()?;
    let vendor = load_vendor(&state, &id).await?;

    let role = match clean(body.role) {
        Some(r) => r.parse()?,
        None => Role::Staff,
    };
    if !role.is_tenant_bound() {
        return Err(ApiError::bad_request("Vendor users must have role vendor or staff"));
    }
    let email = take("email", body.email)?;
    ensure_email_free(&state, &email).await?;

    let user = User::new(NewUser {
        email,
        name: take("name", body.name)?,
        password_hash: password_hash(take("password", body.password)?).await?,
        role,
        vendor_id: Some(vendor.meta.id.clone()),
        service_type: Some(vendor.service_type),
    })?;
    state.auth.users().insert(&user).await?;

    tracing::info!(vendor_id = %id, user_id = %user.meta.id, role = %role, "vendor user created");
    Ok(ApiResponse::created(json!({ "user": user.view() })))
}

/// GET /api/admin/plans
///
/// Every plan, including inactive ones.
pub async fn list_plans(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    let plans = state
        .platform::<Plan>()
        .find_all(Query::new().sort_by("price", false))
        .await?;
    Ok(ApiResponse::ok(json!({ "plans": plans })))
}

/// POST /api/admin/plans
pub async fn create_plan(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiJson(body): ApiJson<PlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    Required::new()
        .text("name", &body.name)
        .value("price", &body.price)
        .finish()?;

    let plan = Plan {
        meta: RecordMeta::platform(),
        name: take("name", clean(body.name))?,
        service_type: clean(body.service_type).map(|s| s.parse()).transpose()?,
        price: take("price", body.price)?,
        currency: clean(body.currency)
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or_else(|| "USD".to_string()),
        billing_cycle: match clean(body.billing_cycle) {
            Some(c) => c.parse()?,
            None => BillingCycle::Monthly,
        },
        limits: body.limits.unwrap_or_default(),
        active: body.active.unwrap_or(true),
    };
    let plan = state.platform::<Plan>().insert(&plan).await?;

    tracing::info!(plan_id = %plan.meta.id, name = %plan.name, "plan created");
    Ok(ApiResponse::created(json!({ "plan": plan })))
}

/// PUT /api/admin/plans/{id}
///
/// Existing subscriptions keep the name and cycle they were sold with.
pub async fn update_plan(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<PlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    let plans = state.platform::<Plan>();
    let mut plan = plans
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Plan not found"))?;

    if let Some(v) = clean(body.name) {
        plan.name = v;
    }
    if body.service_type.is_some() {
        plan.service_type = clean(body.service_type).map(|s| s.parse()).transpose()?;
    }
    if let Some(v) = body.price {
        plan.price = v;
    }
    if let Some(v) = clean(body.currency) {
        plan.currency = v.to_ascii_uppercase();
    }
    if let Some(v) = clean(body.billing_cycle) {
        plan.billing_cycle = v.parse()?;
    }
    if let Some(v) = body.limits {
        plan.limits = v;
    }
    if let Some(v) = body.active {
        plan.active = v;
    }
    plans.update(&mut plan).await?;
    Ok(ApiResponse::ok(json!({ "plan": plan })))
}

/// DELETE /api/admin/plans/{id}
///
/// Refused while a live subscription uses the plan; deactivate it instead.
pub async fn delete_plan(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    let in_use = state
        .platform::<Subscription>()
        .count(Query::new().eq("planId", id.as_str()).any_of(
            "status",
            [SubscriptionStatus::Pending, SubscriptionStatus::Active].map(|s| s.as_str()),
        ))
        .await?;
    if in_use > 0 {
        return Err(ApiError::conflict(format!(
            "Plan is used by {in_use} subscription(s)"
        )));
    }
    if !state.platform::<Plan>().delete(&id).await? {
        return Err(ApiError::not_found("Plan not found"));
    }
    tracing::info!(plan_id = %id, "plan deleted");
    Ok(ApiResponse::ok(json!({ "message": "Plan deleted" })))
}
