use chrono::{DateTime, Utc};
use crates::domain::{
    repositories::{
        entitlements::EntitlementRepository, recipes::RecipeRepository,
        usage_counters::UsageCounterRepository,
    },
    value_objects::{
        access::AccessDecision,
        iam::SessionIdentity,
        recipes::RecipeAccessDto,
        usage::UsageSummary,
    },
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::usecases::{entitlement_resolver::EntitlementResolver, usage_meter::UsageMeter};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("sign in required")]
    Unauthenticated,
    #[error("recipe not found")]
    ResourceNotFound,
    #[error("storage unavailable")]
    StorageFault(#[source] anyhow::Error),
}

impl AccessError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AccessError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AccessError::ResourceNotFound => StatusCode::NOT_FOUND,
            AccessError::StorageFault(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

pub type AccessResult<T> = std::result::Result<T, AccessError>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageOverview {
    pub has_unlimited_access: bool,
    pub usage: Option<UsageSummary>,
}

/// Per-request access decision for a recipe page.
///
/// Branch order: no session, unknown recipe, standing grant, exhausted allowance, counted view.
/// Each branch short-circuits everything after it.
pub struct RecipeAccessUseCase<R, E, U>
where
    R: RecipeRepository + Send + Sync + 'static,
    E: EntitlementRepository + Send + Sync + 'static,
    U: UsageCounterRepository + Send + Sync + 'static,
{
    recipe_repo: Arc<R>,
    entitlement_resolver: Arc<EntitlementResolver<E>>,
    usage_meter: Arc<UsageMeter<U>>,
}

impl<R, E, U> RecipeAccessUseCase<R, E, U>
where
    R: RecipeRepository + Send + Sync + 'static,
    E: EntitlementRepository + Send + Sync + 'static,
    U: UsageCounterRepository + Send + Sync + 'static,
{
    pub fn new(
        recipe_repo: Arc<R>,
        entitlement_resolver: Arc<EntitlementResolver<E>>,
        usage_meter: Arc<UsageMeter<U>>,
    ) -> Self {
        Self {
            recipe_repo,
            entitlement_resolver,
            usage_meter,
        }
    }

    pub async fn view_recipe(
        &self,
        session: Option<&SessionIdentity>,
        recipe_key: &str,
    ) -> AccessResult<RecipeAccessDto> {
        self.view_recipe_at(session, recipe_key, Utc::now()).await
    }

    pub async fn view_recipe_at(
        &self,
        session: Option<&SessionIdentity>,
        recipe_key: &str,
        now: DateTime<Utc>,
    ) -> AccessResult<RecipeAccessDto> {
        let Some(session) = session else {
            info!(recipe_key, "recipe_access: anonymous request, sign in required");
            return Err(AccessError::Unauthenticated);
        };
        let user_id = session.user_id;

        let recipe = self
            .recipe_repo
            .find_recipe_by_title_or_id(recipe_key)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    recipe_key,
                    db_error = ?err,
                    "recipe_access: failed to load recipe"
                );
                AccessError::StorageFault(err)
            })?
            .ok_or_else(|| {
                warn!(%user_id, recipe_key, "recipe_access: recipe not found");
                AccessError::ResourceNotFound
            })?;

        let decision = self.decide(session, now).await?;

        info!(
            %user_id,
            recipe_id = %recipe.id,
            access = ?decision.kind(),
            recipe_views = decision.usage().map(|usage| usage.recipe_views),
            "recipe_access: decision made"
        );

        Ok(RecipeAccessDto::from_decision(recipe, decision))
    }

    /// Entitlement and metering steps for a caller whose recipe is known to exist.
    pub async fn decide(
        &self,
        session: &SessionIdentity,
        now: DateTime<Utc>,
    ) -> AccessResult<AccessDecision> {
        let user_id = session.user_id;

        let unlimited = self
            .entitlement_resolver
            .has_unlimited_access(user_id, session.email.as_deref(), now)
            .await
            .map_err(AccessError::StorageFault)?;

        if unlimited {
            return Ok(AccessDecision::AllowUnlimited);
        }

        let usage = self
            .usage_meter
            .get_usage(user_id, now)
            .await
            .map_err(AccessError::StorageFault)?;

        if usage.is_exhausted() {
            return Ok(AccessDecision::ShowPaywall { usage });
        }

        match self
            .usage_meter
            .try_consume_view(user_id, now)
            .await
            .map_err(AccessError::StorageFault)?
        {
            Some(usage) => Ok(AccessDecision::AllowAndCount { usage }),
            None => {
                // A concurrent request consumed the last free view between read and increment.
                let limit = self.usage_meter.policy().limit;
                warn!(%user_id, limit, "recipe_access: allowance exhausted concurrently");
                Ok(AccessDecision::ShowPaywall {
                    usage: UsageSummary::new(limit, limit),
                })
            }
        }
    }

    /// Banner data without counting a view.
    pub async fn usage_overview(
        &self,
        session: Option<&SessionIdentity>,
    ) -> AccessResult<UsageOverview> {
        let session = session.ok_or(AccessError::Unauthenticated)?;
        let now = Utc::now();

        let has_unlimited_access = self
            .entitlement_resolver
            .has_unlimited_access(session.user_id, session.email.as_deref(), now)
            .await
            .map_err(AccessError::StorageFault)?;

        if has_unlimited_access {
            return Ok(UsageOverview {
                has_unlimited_access,
                usage: None,
            });
        }

        let usage = self
            .usage_meter
            .get_usage(session.user_id, now)
            .await
            .map_err(AccessError::StorageFault)?;

        Ok(UsageOverview {
            has_unlimited_access,
            usage: Some(usage),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::usage_meter::tests::InMemoryUsageCounters;
    use chrono::{Duration, TimeZone};
    use crates::domain::{
        entities::{entitlements::EntitlementEntity, recipes::RecipeEntity},
        repositories::{
            entitlements::MockEntitlementRepository, recipes::MockRecipeRepository,
            usage_counters::MockUsageCounterRepository,
        },
        value_objects::{
            access::AccessKind,
            enums::{features::Feature, metering_periods::MeteringPeriod},
            usage::FreeTierPolicy,
        },
    };
    use serde_json::json;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()
    }

    fn recipe() -> RecipeEntity {
        RecipeEntity {
            id: Uuid::new_v4(),
            title: "Tomato Soup".to_string(),
            description: Some("Weeknight classic".to_string()),
            content: "Roast tomatoes, blend, season.".to_string(),
            image_url: None,
            created_at: now() - Duration::days(3),
        }
    }

    fn recipe_repo() -> MockRecipeRepository {
        let mut repo = MockRecipeRepository::new();
        repo.expect_find_recipe_by_title_or_id()
            .returning(|_| Ok(Some(recipe())));
        repo
    }

    fn no_grants() -> MockEntitlementRepository {
        let mut repo = MockEntitlementRepository::new();
        repo.expect_find_entitlement().returning(|_, _| Ok(None));
        repo.expect_find_entitlement_by_email()
            .returning(|_, _| Ok(None));
        repo
    }

    fn lifetime_grant(user_id: Uuid) -> MockEntitlementRepository {
        let mut repo = MockEntitlementRepository::new();
        repo.expect_find_entitlement().returning(move |_, _| {
            Ok(Some(EntitlementEntity {
                id: Uuid::new_v4(),
                user_id,
                feature: Feature::RecipeAccess.to_string(),
                customer_email: None,
                granted_at: now() - Duration::days(100),
                expires_at: None,
                metadata: json!({ "plan_type": "lifetime" }),
                updated_at: now(),
            }))
        });
        repo
    }

    fn usecase<R, E, U>(
        recipes: R,
        entitlements: E,
        usage: Arc<U>,
        policy: FreeTierPolicy,
    ) -> RecipeAccessUseCase<R, E, U>
    where
        R: RecipeRepository + Send + Sync + 'static,
        E: EntitlementRepository + Send + Sync + 'static,
        U: UsageCounterRepository + Send + Sync + 'static,
    {
        RecipeAccessUseCase::new(
            Arc::new(recipes),
            Arc::new(EntitlementResolver::new(Arc::new(entitlements))),
            Arc::new(UsageMeter::new(usage, policy)),
        )
    }

    fn session(user_id: Uuid) -> SessionIdentity {
        SessionIdentity::new(user_id, Some("cook@example.com".to_string()))
    }

    #[tokio::test]
    async fn free_views_are_counted_until_the_limit_then_paywalled() {
        let user_id = Uuid::new_v4();
        let store = Arc::new(InMemoryUsageCounters::default());
        let usecase = usecase(
            recipe_repo(),
            no_grants(),
            Arc::clone(&store),
            FreeTierPolicy::default(),
        );
        let session = session(user_id);

        for expected in 1..=3 {
            let view = usecase
                .view_recipe_at(Some(&session), "Tomato Soup", now())
                .await
                .unwrap();

            assert_eq!(view.access, AccessKind::Metered);
            assert!(view.content.is_some());
            assert_eq!(view.usage.unwrap().recipe_views, expected);
            assert_eq!(store.value(user_id, "2026-10"), expected);
        }

        let fourth = usecase
            .view_recipe_at(Some(&session), "Tomato Soup", now())
            .await
            .unwrap();

        assert_eq!(fourth.access, AccessKind::Paywall);
        assert_eq!(fourth.content, None);
        assert_eq!(fourth.recipe.title, "Tomato Soup");
        assert_eq!(fourth.usage, Some(UsageSummary::new(3, 3)));
        assert_eq!(store.value(user_id, "2026-10"), 3);
    }

    #[tokio::test]
    async fn banner_reports_post_increment_state_and_last_free_view() {
        let user_id = Uuid::new_v4();
        let store = Arc::new(InMemoryUsageCounters::default());
        let usecase = usecase(
            recipe_repo(),
            no_grants(),
            Arc::clone(&store),
            FreeTierPolicy::default(),
        );
        let session = session(user_id);

        let first = usecase.decide(&session, now()).await.unwrap();
        let second = usecase.decide(&session, now()).await.unwrap();
        let third = usecase.decide(&session, now()).await.unwrap();

        let first = first.usage().unwrap();
        assert_eq!((first.recipe_views, first.remaining), (1, 2));
        assert!(!first.is_last_free_view);

        let second = second.usage().unwrap();
        assert_eq!((second.recipe_views, second.remaining), (2, 1));
        assert!(second.is_last_free_view);

        assert_eq!(
            third,
            AccessDecision::AllowAndCount {
                usage: UsageSummary::new(3, 3)
            }
        );
        assert!(matches!(
            usecase.decide(&session, now()).await.unwrap(),
            AccessDecision::ShowPaywall { .. }
        ));
    }

    #[tokio::test]
    async fn unlimited_users_never_touch_the_meter() {
        let user_id = Uuid::new_v4();
        let mut usage = MockUsageCounterRepository::new();
        usage.expect_get_usage().never();
        usage.expect_atomic_increment().never();
        usage.expect_increment_if_below().never();

        let usecase = usecase(
            recipe_repo(),
            lifetime_grant(user_id),
            Arc::new(usage),
            FreeTierPolicy::default(),
        );
        let session = session(user_id);

        for _ in 0..100 {
            let view = usecase
                .view_recipe_at(Some(&session), "Tomato Soup", now())
                .await
                .unwrap();
            assert_eq!(view.access, AccessKind::Unlimited);
            assert!(view.content.is_some());
            assert_eq!(view.usage, None);
        }
    }

    #[tokio::test]
    async fn unlimited_users_leave_counter_untouched() {
        let user_id = Uuid::new_v4();
        let store = Arc::new(InMemoryUsageCounters::default());
        let usecase = usecase(
            recipe_repo(),
            lifetime_grant(user_id),
            Arc::clone(&store),
            FreeTierPolicy::default(),
        );

        for _ in 0..100 {
            usecase
                .view_recipe_at(Some(&session(user_id)), "Tomato Soup", now())
                .await
                .unwrap();
        }

        assert_eq!(store.value(user_id, "2026-10"), 0);
    }

    #[tokio::test]
    async fn anonymous_request_touches_no_store() {
        let mut recipes = MockRecipeRepository::new();
        recipes.expect_find_recipe_by_title_or_id().never();
        let mut entitlements = MockEntitlementRepository::new();
        entitlements.expect_find_entitlement().never();
        entitlements.expect_find_entitlement_by_email().never();
        let mut usage = MockUsageCounterRepository::new();
        usage.expect_get_usage().never();
        usage.expect_atomic_increment().never();
        usage.expect_increment_if_below().never();

        let usecase = usecase(
            recipes,
            entitlements,
            Arc::new(usage),
            FreeTierPolicy::default(),
        );

        let result = usecase.view_recipe_at(None, "Tomato Soup", now()).await;

        assert!(matches!(result, Err(AccessError::Unauthenticated)));
    }

    #[tokio::test]
    async fn missing_recipe_short_circuits_before_entitlements() {
        let mut recipes = MockRecipeRepository::new();
        recipes
            .expect_find_recipe_by_title_or_id()
            .times(1)
            .returning(|_| Ok(None));
        let mut entitlements = MockEntitlementRepository::new();
        entitlements.expect_find_entitlement().never();
        let mut usage = MockUsageCounterRepository::new();
        usage.expect_get_usage().never();
        usage.expect_increment_if_below().never();

        let usecase = usecase(
            recipes,
            entitlements,
            Arc::new(usage),
            FreeTierPolicy::default(),
        );

        let result = usecase
            .view_recipe_at(Some(&session(Uuid::new_v4())), "Ghost Pie", now())
            .await;

        assert!(matches!(result, Err(AccessError::ResourceNotFound)));
    }

    #[tokio::test]
    async fn expired_grant_falls_through_to_metering() {
        let user_id = Uuid::new_v4();
        let mut entitlements = MockEntitlementRepository::new();
        entitlements.expect_find_entitlement().returning(move |_, _| {
            Ok(Some(EntitlementEntity {
                id: Uuid::new_v4(),
                user_id,
                feature: Feature::RecipeAccess.to_string(),
                customer_email: None,
                granted_at: now() - Duration::days(60),
                expires_at: Some(now() - Duration::days(30)),
                metadata: json!({ "plan_type": "monthly" }),
                updated_at: now(),
            }))
        });
        entitlements
            .expect_find_entitlement_by_email()
            .returning(|_, _| Ok(None));
        let store = Arc::new(InMemoryUsageCounters::default());

        let usecase = usecase(
            recipe_repo(),
            entitlements,
            Arc::clone(&store),
            FreeTierPolicy::default(),
        );

        let view = usecase
            .view_recipe_at(Some(&session(user_id)), "Tomato Soup", now())
            .await
            .unwrap();

        assert_eq!(view.access, AccessKind::Metered);
        assert_eq!(store.value(user_id, "2026-10"), 1);
    }

    #[tokio::test]
    async fn exhausted_allowance_is_not_incremented() {
        let mut usage = MockUsageCounterRepository::new();
        usage.expect_get_usage().returning(|_, _, _| Ok(3));
        usage.expect_increment_if_below().never();
        usage.expect_atomic_increment().never();

        let usecase = usecase(
            recipe_repo(),
            no_grants(),
            Arc::new(usage),
            FreeTierPolicy::default(),
        );

        let decision = usecase
            .decide(&session(Uuid::new_v4()), now())
            .await
            .unwrap();

        assert_eq!(
            decision,
            AccessDecision::ShowPaywall {
                usage: UsageSummary::new(3, 3)
            }
        );
    }

    #[tokio::test]
    async fn losing_the_last_view_race_shows_paywall() {
        let mut usage = MockUsageCounterRepository::new();
        usage.expect_get_usage().returning(|_, _, _| Ok(2));
        usage
            .expect_increment_if_below()
            .times(1)
            .returning(|_, _, _, _| Ok(None));

        let usecase = usecase(
            recipe_repo(),
            no_grants(),
            Arc::new(usage),
            FreeTierPolicy::default(),
        );

        let decision = usecase
            .decide(&session(Uuid::new_v4()), now())
            .await
            .unwrap();

        assert!(!decision.allows_content());
        assert_eq!(decision.usage(), Some(UsageSummary::new(3, 3)));
    }

    #[tokio::test]
    async fn storage_fault_fails_the_request_instead_of_guessing() {
        let mut entitlements = MockEntitlementRepository::new();
        entitlements
            .expect_find_entitlement()
            .returning(|_, _| Err(anyhow::anyhow!("connection reset")));
        let mut usage = MockUsageCounterRepository::new();
        usage.expect_get_usage().never();
        usage.expect_increment_if_below().never();

        let usecase = usecase(
            recipe_repo(),
            entitlements,
            Arc::new(usage),
            FreeTierPolicy::default(),
        );

        let result = usecase
            .view_recipe_at(Some(&session(Uuid::new_v4())), "Tomato Soup", now())
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, AccessError::StorageFault(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn zero_limit_paywalls_first_view() {
        let store = Arc::new(InMemoryUsageCounters::default());
        let usecase = usecase(
            recipe_repo(),
            no_grants(),
            Arc::clone(&store),
            FreeTierPolicy::new(0, MeteringPeriod::Lifetime),
        );
        let user_id = Uuid::new_v4();

        let view = usecase
            .view_recipe_at(Some(&session(user_id)), "Tomato Soup", now())
            .await
            .unwrap();

        assert_eq!(view.access, AccessKind::Paywall);
        assert_eq!(store.value(user_id, "lifetime"), 0);
    }

    #[tokio::test]
    async fn usage_overview_reads_without_counting() {
        let user_id = Uuid::new_v4();
        let mut usage = MockUsageCounterRepository::new();
        usage.expect_get_usage().times(1).returning(|_, _, _| Ok(2));
        usage.expect_increment_if_below().never();
        usage.expect_atomic_increment().never();

        let usecase = usecase(
            recipe_repo(),
            no_grants(),
            Arc::new(usage),
            FreeTierPolicy::default(),
        );

        let overview = usecase
            .usage_overview(Some(&session(user_id)))
            .await
            .unwrap();

        assert!(!overview.has_unlimited_access);
        assert_eq!(overview.usage, Some(UsageSummary::new(2, 3)));
    }
}
