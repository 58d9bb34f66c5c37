use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::catalog::{CourseDraft, ProjectDraft, ValidationError};
use super::domain::{
    Actor, ApplicationId, AssignmentId, CategoryId, CourseId, CourseLevel, LanguageId, ProjectId,
    UserId,
};
use super::listing::{CourseQuery, ProjectQuery};
use super::repository::RepositoryError;
use super::service::{MembershipError, MembershipService, MembershipStore};

/// Header carrying the directory id of the caller. Absent means anonymous.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Router builder exposing the membership workflow, catalog and admin endpoints.
pub fn membership_router<S>(service: Arc<MembershipService<S>>) -> Router
where
    S: MembershipStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/projects",
            get(list_projects_handler::<S>).post(create_project_handler::<S>),
        )
        .route("/api/v1/projects/:project_id", post(update_project_handler::<S>))
        .route(
            "/api/v1/projects/:project_id/delete",
            post(delete_project_handler::<S>),
        )
        .route("/api/v1/projects/:project_id/apply", post(apply_handler::<S>))
        .route("/api/v1/projects/:project_id/mentor", post(mentor_handler::<S>))
        .route(
            "/api/v1/projects/:project_id/unmentor",
            post(unmentor_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/accept",
            get(accept_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/reject",
            get(reject_handler::<S>),
        )
        .route(
            "/api/v1/assignments/:assignment_id/remove",
            post(remove_assignment_handler::<S>),
        )
        .route(
            "/api/v1/courses",
            get(list_courses_handler::<S>).post(create_course_handler::<S>),
        )
        .route("/api/v1/courses/:course_id", post(update_course_handler::<S>))
        .route(
            "/api/v1/courses/:course_id/delete",
            post(delete_course_handler::<S>),
        )
        .route("/api/v1/categories", get(categories_handler::<S>))
        .route("/api/v1/languages", get(languages_handler::<S>))
        .route("/api/v1/dashboard", get(dashboard_handler::<S>))
        .route("/api/v1/admin/users", get(list_users_handler::<S>))
        .route(
            "/api/v1/admin/users/:user_id/role",
            post(change_role_handler::<S>),
        )
        .route(
            "/api/v1/admin/users/:user_id/delete",
            post(delete_user_handler::<S>),
        )
        .route(
            "/api/v1/admin/users/:user_id/assign",
            post(direct_assign_handler::<S>),
        )
        .with_state(service)
}

/// Query string of a listing request as raw key/value pairs, in request order.
pub(crate) type QueryPairs = Vec<(String, String)>;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ProjectListParams {
    pub(crate) q: Option<String>,
    pub(crate) categories: Vec<u64>,
}

impl TryFrom<QueryPairs> for ProjectListParams {
    type Error = String;

    fn try_from(pairs: QueryPairs) -> Result<Self, Self::Error> {
        Ok(Self {
            q: last_value(&pairs, "q"),
            categories: collect_ids(&pairs, "categories")?,
        })
    }
}

impl From<ProjectListParams> for ProjectQuery {
    fn from(params: ProjectListParams) -> Self {
        Self {
            query: params.q,
            categories: params.categories.into_iter().map(CategoryId).collect(),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CourseListParams {
    pub(crate) q: Option<String>,
    pub(crate) languages: Vec<u64>,
    pub(crate) level: Option<String>,
}

impl TryFrom<QueryPairs> for CourseListParams {
    type Error = String;

    fn try_from(pairs: QueryPairs) -> Result<Self, Self::Error> {
        Ok(Self {
            q: last_value(&pairs, "q"),
            languages: collect_ids(&pairs, "languages")?,
            level: last_value(&pairs, "level"),
        })
    }
}

impl TryFrom<CourseListParams> for CourseQuery {
    type Error = ValidationError;

    fn try_from(params: CourseListParams) -> Result<Self, Self::Error> {
        let level = match params.level.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let ordinal = raw
                    .parse::<i64>()
                    .map_err(|_| ValidationError::LevelNotNumeric(raw.to_string()))?;
                let level = CourseLevel::from_ordinal(ordinal)
                    .ok_or(ValidationError::LevelOutOfRange(ordinal))?;
                Some(level)
            }
        };
        Ok(Self {
            query: params.q,
            languages: params.languages.into_iter().map(LanguageId).collect(),
            level,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleUpdate {
    pub(crate) role: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DirectAssignment {
    pub(crate) project_id: ProjectId,
}

/// Parses `1,2,3` into ids. Blank segments are skipped.
pub(crate) fn parse_id_list(raw: &str) -> Result<Vec<u64>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment
                .parse::<u64>()
                .map_err(|err| format!("invalid id '{segment}' ({err})"))
        })
        .collect()
}

/// Last value given for `key`. Repeated scalar keys keep the final one.
fn last_value(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs
        .iter()
        .rev()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.clone())
}

/// Ids from every occurrence of `key`, so `?k=1,2` and `?k=1&k=2` agree.
fn collect_ids(pairs: &[(String, String)], key: &str) -> Result<Vec<u64>, String> {
    let mut ids = Vec::new();
    for (_, value) in pairs.iter().filter(|(name, _)| name == key) {
        ids.extend(parse_id_list(value).map_err(|err| format!("{key}: {err}"))?);
    }
    Ok(ids)
}

/// HTTP status for each service error.
pub fn error_status(error: &MembershipError) -> StatusCode {
    match error {
        MembershipError::Unauthenticated => StatusCode::UNAUTHORIZED,
        MembershipError::Forbidden(_) => StatusCode::FORBIDDEN,
        MembershipError::AlreadyApplied | MembershipError::AlreadyAssigned => StatusCode::CONFLICT,
        MembershipError::NotFound { .. } => StatusCode::NOT_FOUND,
        MembershipError::InvalidRole(_) | MembershipError::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        MembershipError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
        MembershipError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(error: &MembershipError) -> Response {
    let status = error_status(error);
    if status.is_server_error() {
        error!(error = %error, "membership request failed");
    }
    let payload = json!({
        "error": error.to_string(),
        "code": error.code(),
    });
    (status, axum::Json(payload)).into_response()
}

/// 400 with the same `{error, code}` body the service errors use.
fn bad_request(code: &'static str, message: String) -> Response {
    let payload = json!({ "error": message, "code": code });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

fn parse_listing<P>(query: Result<Query<QueryPairs>, QueryRejection>) -> Result<P, Response>
where
    P: TryFrom<QueryPairs, Error = String>,
{
    let Query(pairs) =
        query.map_err(|rejection| bad_request("invalid_query", rejection.body_text()))?;
    P::try_from(pairs).map_err(|message| bad_request("invalid_query", message))
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, MembershipError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// Resolves the caller from [`ACTOR_HEADER`]. A malformed header is a client error.
pub(crate) fn actor_from_headers<S>(
    service: &Arc<MembershipService<S>>,
    headers: &HeaderMap,
) -> Result<Actor, Response>
where
    S: MembershipStore + 'static,
{
    let user_id = match headers.get(ACTOR_HEADER) {
        None => None,
        Some(value) => {
            let parsed = value
                .to_str()
                .ok()
                .and_then(|raw| raw.trim().parse::<u64>().ok());
            match parsed {
                Some(id) => Some(UserId(id)),
                None => {
                    return Err(bad_request(
                        "invalid_actor",
                        format!("{ACTOR_HEADER} must be a numeric user id"),
                    ));
                }
            }
        }
    };
    service
        .resolve_actor(user_id)
        .map_err(|error| error_response(&error))
}

macro_rules! actor_or_return {
    ($service:expr, $headers:expr) => {
        match actor_from_headers(&$service, &$headers) {
            Ok(actor) => actor,
            Err(response) => return response,
        }
    };
}

pub(crate) async fn apply_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(project_id): Path<u64>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::CREATED,
        service.apply(&actor, ProjectId(project_id)),
    )
}

pub(crate) async fn list_projects_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    let params: ProjectListParams = match parse_listing(query) {
        Ok(params) => params,
        Err(response) => return response,
    };
    let query = ProjectQuery::from(params);
    respond(
        StatusCode::OK,
        service
            .list_projects(&actor, &query)
            .map(|projects| json!({ "projects": projects })),
    )
}

pub(crate) async fn accept_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(application_id): Path<u64>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service.accept(&actor, ApplicationId(application_id)),
    )
}

pub(crate) async fn reject_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(application_id): Path<u64>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service.reject(&actor, ApplicationId(application_id)),
    )
}

pub(crate) async fn remove_assignment_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(assignment_id): Path<u64>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service.remove_assignment(&actor, AssignmentId(assignment_id)),
    )
}

pub(crate) async fn mentor_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(project_id): Path<u64>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(StatusCode::OK, service.mentor(&actor, ProjectId(project_id)))
}

pub(crate) async fn unmentor_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(project_id): Path<u64>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service.unmentor(&actor, ProjectId(project_id)),
    )
}

pub(crate) async fn list_courses_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    let params: CourseListParams = match parse_listing(query) {
        Ok(params) => params,
        Err(response) => return response,
    };
    let result = CourseQuery::try_from(params)
        .map_err(MembershipError::from)
        .and_then(|query| service.list_courses(&actor, &query))
        .map(|courses| json!({ "courses": courses }));
    respond(StatusCode::OK, result)
}

pub(crate) async fn create_project_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    axum::Json(draft): axum::Json<ProjectDraft>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(StatusCode::CREATED, service.create_project(&actor, draft))
}

pub(crate) async fn update_project_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(project_id): Path<u64>,
    axum::Json(draft): axum::Json<ProjectDraft>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service.update_project(&actor, ProjectId(project_id), draft),
    )
}

pub(crate) async fn delete_project_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(project_id): Path<u64>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service.delete_project(&actor, ProjectId(project_id)),
    )
}

pub(crate) async fn create_course_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    axum::Json(draft): axum::Json<CourseDraft>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(StatusCode::CREATED, service.create_course(&actor, draft))
}

pub(crate) async fn update_course_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(course_id): Path<u64>,
    axum::Json(draft): axum::Json<CourseDraft>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service.update_course(&actor, CourseId(course_id), draft),
    )
}

pub(crate) async fn delete_course_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(course_id): Path<u64>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service.delete_course(&actor, CourseId(course_id)),
    )
}

pub(crate) async fn categories_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service
            .categories(&actor)
            .map(|categories| json!({ "categories": categories })),
    )
}

pub(crate) async fn languages_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service
            .languages(&actor)
            .map(|languages| json!({ "languages": languages })),
    )
}

pub(crate) async fn dashboard_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(StatusCode::OK, service.dashboard(&actor))
}

pub(crate) async fn list_users_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service
            .list_users(&actor)
            .map(|users| json!({ "users": users })),
    )
}

pub(crate) async fn change_role_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(user_id): Path<u64>,
    axum::Json(update): axum::Json<RoleUpdate>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service.change_user_role(&actor, UserId(user_id), &update.role),
    )
}

pub(crate) async fn delete_user_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(user_id): Path<u64>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service
            .delete_user(&actor, UserId(user_id))
            .map(|user| json!({ "deleted": user })),
    )
}

pub(crate) async fn direct_assign_handler<S>(
    State(service): State<Arc<MembershipService<S>>>,
    headers: HeaderMap,
    Path(user_id): Path<u64>,
    axum::Json(body): axum::Json<DirectAssignment>,
) -> Response
where
    S: MembershipStore + 'static,
{
    let actor = actor_or_return!(service, headers);
    match service.direct_assign(&actor, UserId(user_id), body.project_id) {
        Ok(outcome) => {
            let status = if outcome.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, axum::Json(outcome)).into_response()
        }
        Err(error) => error_response(&error),
    }
}
