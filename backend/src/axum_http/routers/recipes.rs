use crate::{
    auth::AuthUser,
    usecases::{
        entitlement_resolver::EntitlementResolver, recipe_access::RecipeAccessUseCase,
        usage_meter::UsageMeter,
    },
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use crates::{
    domain::{
        repositories::{
            entitlements::EntitlementRepository, recipes::RecipeRepository,
            usage_counters::UsageCounterRepository,
        },
        value_objects::usage::FreeTierPolicy,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            entitlements::EntitlementPostgres, recipes::RecipePostgres,
            usage_counters::UsageCounterPostgres,
        },
    },
};
use std::sync::Arc;

type PostgresRecipeAccess =
    RecipeAccessUseCase<RecipePostgres, EntitlementPostgres, UsageCounterPostgres>;

fn recipe_access_usecase(
    db_pool: Arc<PgPoolSquad>,
    policy: FreeTierPolicy,
) -> Arc<PostgresRecipeAccess> {
    let recipe_repository = RecipePostgres::new(Arc::clone(&db_pool));
    let entitlement_repository = EntitlementPostgres::new(Arc::clone(&db_pool));
    let usage_repository = UsageCounterPostgres::new(Arc::clone(&db_pool));

    Arc::new(RecipeAccessUseCase::new(
        Arc::new(recipe_repository),
        Arc::new(EntitlementResolver::new(Arc::new(entitlement_repository))),
        Arc::new(UsageMeter::new(Arc::new(usage_repository), policy)),
    ))
}

pub fn routes(db_pool: Arc<PgPoolSquad>, policy: FreeTierPolicy) -> Router {
    Router::new()
        .route("/:key", get(view_recipe))
        .with_state(recipe_access_usecase(db_pool, policy))
}

pub fn usage_routes(db_pool: Arc<PgPoolSquad>, policy: FreeTierPolicy) -> Router {
    Router::new()
        .route("/", get(usage_overview))
        .with_state(recipe_access_usecase(db_pool, policy))
}

pub async fn view_recipe<R, E, U>(
    State(recipe_access_usecase): State<Arc<RecipeAccessUseCase<R, E, U>>>,
    auth: Option<AuthUser>,
    Path(key): Path<String>,
) -> impl IntoResponse
where
    R: RecipeRepository + Send + Sync + 'static,
    E: EntitlementRepository + Send + Sync + 'static,
    U: UsageCounterRepository + Send + Sync + 'static,
{
    let session = auth.map(|auth| auth.session());

    match recipe_access_usecase
        .view_recipe(session.as_ref(), &key)
        .await
    {
        Ok(recipe) => (StatusCode::OK, Json(recipe)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn usage_overview<R, E, U>(
    State(recipe_access_usecase): State<Arc<RecipeAccessUseCase<R, E, U>>>,
    auth: Option<AuthUser>,
) -> impl IntoResponse
where
    R: RecipeRepository + Send + Sync + 'static,
    E: EntitlementRepository + Send + Sync + 'static,
    U: UsageCounterRepository + Send + Sync + 'static,
{
    let session = auth.map(|auth| auth.session());

    match recipe_access_usecase.usage_overview(session.as_ref()).await {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::repositories::{
        entitlements::MockEntitlementRepository, recipes::MockRecipeRepository,
        usage_counters::MockUsageCounterRepository,
    };

    fn state(
        recipes: MockRecipeRepository,
    ) -> State<
        Arc<
            RecipeAccessUseCase<
                MockRecipeRepository,
                MockEntitlementRepository,
                MockUsageCounterRepository,
            >,
        >,
    > {
        State(Arc::new(RecipeAccessUseCase::new(
            Arc::new(recipes),
            Arc::new(EntitlementResolver::new(Arc::new(
                MockEntitlementRepository::new(),
            ))),
            Arc::new(UsageMeter::new(
                Arc::new(MockUsageCounterRepository::new()),
                FreeTierPolicy::default(),
            )),
        )))
    }

    #[tokio::test]
    async fn anonymous_recipe_request_is_unauthorized() {
        let mut recipes = MockRecipeRepository::new();
        recipes.expect_find_recipe_by_title_or_id().never();

        let response = view_recipe(state(recipes), None, Path("Tomato Soup".to_string()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn anonymous_usage_request_is_unauthorized() {
        let response = usage_overview(state(MockRecipeRepository::new()), None)
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
