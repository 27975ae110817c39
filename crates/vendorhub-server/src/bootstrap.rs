//! First-start seeding: the platform administrator and the plan catalogue.
//!
//! Both steps are idempotent. An existing admin email is left untouched and
//! plans are only seeded into an empty catalogue.

use anyhow::Context;
use tracing::info;
use vendorhub_auth::password::hash_password_async;
use vendorhub_auth::{AuthState, NewUser, User};
use vendorhub_core::models::Plan;
use vendorhub_core::{RecordMeta, Role};
use vendorhub_storage::{DynStore, Query, Repository, Scope};

use crate::config::{AdminUserConfig, BootstrapConfig, PlanSeed};

/// What a bootstrap run created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapStats {
    pub admin_created: bool,
    pub plans_seeded: usize,
}

pub async fn run(
    cfg: &BootstrapConfig,
    store: &DynStore,
    auth: &AuthState,
) -> anyhow::Result<BootstrapStats> {
    let mut stats = BootstrapStats::default();
    if let Some(admin) = &cfg.admin_user {
        stats.admin_created = ensure_admin(admin, auth).await?;
    }
    stats.plans_seeded = seed_plans(&cfg.plans, store).await?;
    Ok(stats)
}

async fn ensure_admin(admin: &AdminUserConfig, auth: &AuthState) -> anyhow::Result<bool> {
    if auth.find_user_by_email(&admin.email).await?.is_some() {
        return Ok(false);
    }
    let password_hash = hash_password_async(admin.password.clone())
        .await
        .context("hashing bootstrap admin password")?;
    let user = User::new(NewUser {
        email: admin.email.clone(),
        name: admin.name.clone(),
        password_hash,
        role: Role::Admin,
        vendor_id: None,
        service_type: None,
    })
    .context("bootstrap admin user is invalid")?;
    auth.users()
        .insert(&user)
        .await
        .context("storing bootstrap admin user")?;
    info!(email = %user.email, "bootstrap admin user created");
    Ok(true)
}

async fn seed_plans(seeds: &[PlanSeed], store: &DynStore) -> anyhow::Result<usize> {
    if seeds.is_empty() {
        return Ok(0);
    }
    let plans = Repository::<Plan>::new(store.clone(), Scope::Platform);
    if plans.count(Query::new()).await? > 0 {
        return Ok(0);
    }
    for seed in seeds {
        let plan = Plan {
            meta: RecordMeta::platform(),
            name: seed.name.clone(),
            service_type: seed.service_type,
            price: seed.price,
            currency: seed.currency.to_ascii_uppercase(),
            billing_cycle: seed.billing_cycle,
            limits: seed.limits.clone(),
            active: true,
        };
        plans
            .insert(&plan)
            .await
            .with_context(|| format!("seeding plan '{}'", seed.name))?;
    }
    info!(count = seeds.len(), "plan catalogue seeded");
    Ok(seeds.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use vendorhub_auth::SessionTokens;
    use vendorhub_core::ServiceType;
    use vendorhub_core::models::BillingCycle;

    fn auth(store: &DynStore) -> AuthState {
        AuthState::new(
            Arc::new(SessionTokens::new(b"0123456789abcdef0123456789abcdef", 3600)),
            store.clone(),
        )
    }

    fn config() -> BootstrapConfig {
        BootstrapConfig {
            admin_user: Some(AdminUserConfig {
                email: "Root@Example.com".into(),
                password: "Sup3r-secret!".into(),
                name: "Root".into(),
            }),
            plans: vec![PlanSeed {
                name: "Bus Starter".into(),
                service_type: Some(ServiceType::Bus),
                price: 2_500,
                currency: "usd".into(),
                billing_cycle: BillingCycle::Monthly,
                limits: Default::default(),
            }],
        }
    }

    #[tokio::test]
    async fn seeds_once() {
        let store = vendorhub_db_memory::create_store();
        let auth = auth(&store);

        let first = run(&config(), &store, &auth).await.unwrap();
        assert_eq!(
            first,
            BootstrapStats {
                admin_created: true,
                plans_seeded: 1
            }
        );
        let admin = auth.find_user_by_email("root@example.com").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);

        let second = run(&config(), &store, &auth).await.unwrap();
        assert_eq!(second, BootstrapStats::default());

        let plans = Repository::<Plan>::new(store, Scope::Platform)
            .find_all(Query::new())
            .await
            .unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].currency, "USD");
    }
}
