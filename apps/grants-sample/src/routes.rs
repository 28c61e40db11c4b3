//! Sample routes guarded by grant checks.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use xavyo_grants::names::{BASE_SYSTEM_WORK_GROUP_ROLES_READ, BASE_SYSTEM_WORK_GROUP_ROLES_WRITE};
use xavyo_grants::{
    ErrorResponse, GrantEvaluator, Principal, RefreshOutcome, Userspace, UserspaceId, WorkGroupId,
};

#[derive(Clone)]
pub struct AppState {
    pub grants: Arc<dyn GrantEvaluator>,
}

#[derive(Debug, Serialize)]
struct WorkGroupsResponse {
    userspace_id: UserspaceId,
    work_groups: Vec<WorkGroupId>,
}

#[derive(Debug, Serialize)]
struct UserspacesResponse {
    userspaces: Vec<UserspaceId>,
}

#[derive(Debug, Serialize)]
struct AccessResponse {
    work_group_id: WorkGroupId,
    can_read_roles: bool,
    can_write_roles: bool,
    is_manager: bool,
    is_userspace_admin: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/me/userspaces", get(my_userspaces))
        .route("/me/work-groups", get(my_work_groups))
        .route("/work-groups/:id/access", get(work_group_access))
        .route("/work-groups/:id/roles", get(work_group_roles))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn forbidden(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse::new("forbidden", message)),
    )
        .into_response()
}

async fn my_userspaces(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
) -> Json<UserspacesResponse> {
    let principal = principal.map(|Extension(p)| p);
    Json(UserspacesResponse {
        userspaces: state.grants.userspaces(principal.as_ref()),
    })
}

async fn my_work_groups(
    State(state): State<AppState>,
    Userspace(userspace_id): Userspace,
    principal: Option<Extension<Principal>>,
) -> Json<WorkGroupsResponse> {
    let principal = principal.map(|Extension(p)| p);
    Json(WorkGroupsResponse {
        userspace_id,
        work_groups: state.grants.work_groups(principal.as_ref(), userspace_id),
    })
}

async fn work_group_access(
    State(state): State<AppState>,
    Path(work_group_id): Path<i64>,
    Userspace(userspace_id): Userspace,
    principal: Option<Extension<Principal>>,
) -> Json<AccessResponse> {
    let principal = principal.map(|Extension(p)| p);
    let principal = principal.as_ref();
    let work_group_id = WorkGroupId::new(work_group_id);
    let grants = &state.grants;

    Json(AccessResponse {
        work_group_id,
        can_read_roles: grants.has_grant(
            principal,
            userspace_id,
            work_group_id,
            BASE_SYSTEM_WORK_GROUP_ROLES_READ,
        ),
        can_write_roles: grants.has_grant(
            principal,
            userspace_id,
            work_group_id,
            BASE_SYSTEM_WORK_GROUP_ROLES_WRITE,
        ),
        is_manager: grants.is_work_group_manager(principal, userspace_id, work_group_id),
        is_userspace_admin: grants.is_userspace_admin(principal, userspace_id),
    })
}

async fn work_group_roles(
    State(state): State<AppState>,
    Path(work_group_id): Path<i64>,
    Userspace(userspace_id): Userspace,
    principal: Option<Extension<Principal>>,
    outcome: Option<Extension<RefreshOutcome>>,
) -> Response {
    let principal = principal.map(|Extension(p)| p);
    let work_group_id = WorkGroupId::new(work_group_id);

    if !state.grants.has_grant(
        principal.as_ref(),
        userspace_id,
        work_group_id,
        BASE_SYSTEM_WORK_GROUP_ROLES_READ,
    ) {
        tracing::debug!(
            userspace_id = %userspace_id,
            work_group_id = %work_group_id,
            refresh = ?outcome.map(|Extension(o)| o),
            "Roles read denied"
        );
        return forbidden("Missing grant base-system.work-group.roles-read");
    }

    Json(serde_json::json!({
        "work_group_id": work_group_id,
        "roles": ["viewer", "operator"],
    }))
    .into_response()
}
