//! Plan usage counters kept on the tenant's active subscription.

use serde::Serialize;
use serde::de::DeserializeOwned;
use vendorhub_api::ApiError;
use vendorhub_core::Entity;
use vendorhub_core::models::{Plan, Subscription, SubscriptionStatus, UsageResource};
use vendorhub_storage::{DynStore, Query, Repository, Scope};

async fn active_subscription(
    store: &DynStore,
    vendor_id: &str,
) -> Result<Option<(Repository<Subscription>, Subscription)>, ApiError> {
    let subscriptions = Repository::<Subscription>::new(store.clone(), Scope::tenant(vendor_id));
    let active = subscriptions
        .find_one(
            Query::new()
                .eq("status", SubscriptionStatus::Active.as_str())
                .newest_first(),
        )
        .await?;
    Ok(active.map(|s| (subscriptions, s)))
}

/// Count one more `resource` for the tenant, refusing past the plan limit.
///
/// Tenants without an active subscription are not limited.
pub(crate) async fn consume(
    store: &DynStore,
    vendor_id: &str,
    resource: UsageResource,
) -> Result<(), ApiError> {
    let Some((subscriptions, mut subscription)) = active_subscription(store, vendor_id).await?
    else {
        return Ok(());
    };
    let limit = Repository::<Plan>::new(store.clone(), Scope::Platform)
        .get(&subscription.plan_id)
        .await?
        .and_then(|plan| plan.limit_for(resource));

    let used = subscription.consume(resource, limit).inspect_err(|_| {
        tracing::info!(vendor_id, %resource, ?limit, "plan limit reached");
    })?;
    subscriptions.update(&mut subscription).await?;
    tracing::debug!(vendor_id, %resource, used, "usage counted");
    Ok(())
}

/// Give back one `resource`.
pub(crate) async fn release(
    store: &DynStore,
    vendor_id: &str,
    resource: UsageResource,
) -> Result<(), ApiError> {
    let Some((subscriptions, mut subscription)) = active_subscription(store, vendor_id).await?
    else {
        return Ok(());
    };
    let used = subscription.release(resource);
    subscriptions.update(&mut subscription).await?;
    tracing::debug!(vendor_id, %resource, used, "usage released");
    Ok(())
}

/// Release after a failed insert; errors are logged, not returned.
pub(crate) async fn rollback(store: &DynStore, vendor_id: &str, resource: UsageResource) {
    if let Err(e) = release(store, vendor_id, resource).await {
        tracing::warn!(vendor_id, %resource, error = %e, "usage rollback failed");
    }
}

/// Count `resource` and insert `entity`, giving the count back if the insert
/// fails.
pub(crate) async fn insert_counted<T>(
    store: &DynStore,
    repo: &Repository<T>,
    entity: &T,
    resource: UsageResource,
) -> Result<T, ApiError>
where
    T: Entity + Serialize + DeserializeOwned,
{
    let vendor_id = entity
        .vendor_id()
        .ok_or_else(|| ApiError::internal("tenant record without a vendor"))?;
    consume(store, vendor_id, resource).await?;
    match repo.insert(entity).await {
        Ok(stored) => Ok(stored),
        Err(e) => {
            rollback(store, vendor_id, resource).await;
            Err(e.into())
        }
    }
}
