use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::catalog::OfferFilter;
use super::domain::{
    Actor, ActorId, ActorRole, ApplicationId, ApplicationStatus, OfferDraft, OfferId, SessionId,
    SessionStatus,
};
use super::lifecycle::ApplyCommand;
use super::repository::{Mailer, MentorshipStore};
use super::service::{MentorshipError, MentorshipService};
use super::sessions::ScheduleCommand;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Response body shared by every mentorship endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

fn respond<T: Serialize>(status: StatusCode, body: ApiResponse<T>) -> Response {
    (status, Json(body)).into_response()
}

/// Caller identity taken from request headers.
///
/// Nothing here is verified: the headers are trusted as sent. Swap this extractor for token
/// resolution before exposing the service beyond a trusted gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorIdentity(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for ActorIdentity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        resolve_actor(&parts.headers).map(ActorIdentity).ok_or_else(|| {
            respond(
                StatusCode::UNAUTHORIZED,
                ApiResponse::failure("caller identity is missing or malformed"),
            )
        })
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub(crate) fn resolve_actor(headers: &HeaderMap) -> Option<Actor> {
    for (id_header, role_header) in [("x-actor-id", "x-actor-role"), ("x-user-id", "x-user-type")] {
        if let Some(id) = header(headers, id_header) {
            let role = header(headers, role_header)?.parse::<ActorRole>().ok()?;
            return Some(Actor::new(id, role));
        }
    }

    if let Some(id) = header(headers, "x-alumni-id") {
        return Some(Actor::new(id, ActorRole::Alumni));
    }
    header(headers, "x-student-id").map(|id| Actor::new(id, ActorRole::Student))
}

/// Router builder exposing the offer, application, session, and notification endpoints.
pub fn mentorship_router<S, M>(service: Arc<MentorshipService<S, M>>) -> Router
where
    S: MentorshipStore,
    M: Mailer,
{
    Router::new()
        .route(
            "/api/offers",
            get(list_offers_handler::<S, M>).post(create_offer_handler::<S, M>),
        )
        .route("/api/offers/apply", post(apply_handler::<S, M>))
        .route(
            "/api/offers/:offer_id",
            get(get_offer_handler::<S, M>)
                .put(edit_offer_handler::<S, M>)
                .delete(delete_offer_handler::<S, M>),
        )
        .route(
            "/api/applications/student/:student_id",
            get(student_applications_handler::<S, M>),
        )
        .route(
            "/api/applications/:offer_id",
            get(offer_applications_handler::<S, M>),
        )
        .route(
            "/api/applications/:application_id/status",
            put(application_status_handler::<S, M>),
        )
        .route("/api/sessions", get(owner_sessions_handler::<S, M>))
        .route(
            "/api/sessions/student/:student_id",
            get(student_sessions_handler::<S, M>),
        )
        .route("/api/sessions/:session_id", put(schedule_session_handler::<S, M>))
        .route("/api/notifications", get(notifications_handler::<S, M>))
        .route(
            "/api/notifications/read-all",
            put(mark_notifications_read_handler::<S, M>),
        )
        .with_state(service)
}

type SharedService<S, M> = State<Arc<MentorshipService<S, M>>>;

pub(crate) fn error_response(err: MentorshipError) -> Response {
    AppError::Workflow(err).into_response()
}

fn bad_body(rejection: JsonRejection) -> Response {
    respond(
        StatusCode::BAD_REQUEST,
        ApiResponse::failure(format!("invalid request body: {}", rejection.body_text())),
    )
}

fn bad_query(rejection: QueryRejection) -> Response {
    respond(
        StatusCode::BAD_REQUEST,
        ApiResponse::failure(format!("invalid query string: {}", rejection.body_text())),
    )
}

fn bad_path(rejection: PathRejection) -> Response {
    respond(
        StatusCode::BAD_REQUEST,
        ApiResponse::failure(format!("invalid path parameter: {}", rejection.body_text())),
    )
}

fn unidentified() -> Response {
    respond(
        StatusCode::UNAUTHORIZED,
        ApiResponse::failure("caller identity is missing or malformed"),
    )
}

/// `mine` is a flag only when it is exactly `"true"`; other values are ignored.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OfferQuery {
    #[serde(default)]
    mine: Option<String>,
    #[serde(default, alias = "ownerId", alias = "alumniId")]
    owner_id: Option<String>,
}

pub(crate) async fn list_offers_handler<S, M>(
    State(service): SharedService<S, M>,
    identity: Option<ActorIdentity>,
    query: Result<Query<OfferQuery>, QueryRejection>,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_query(rejection),
    };

    let owner = query
        .owner_id
        .filter(|owner| !owner.trim().is_empty())
        .map(ActorId::new);
    let filter = if query.mine.as_deref() == Some("true") {
        match owner.or_else(|| identity.map(|ActorIdentity(actor)| actor.id)) {
            Some(owner) => OfferFilter::owned_by(owner),
            None => return unidentified(),
        }
    } else {
        owner.map(OfferFilter::owned_by).unwrap_or_default()
    };

    match service.catalog().list_offers(&filter).await {
        Ok(offers) => respond(StatusCode::OK, ApiResponse::data(offers)),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn get_offer_handler<S, M>(
    State(service): SharedService<S, M>,
    offer_id: Result<Path<i64>, PathRejection>,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    let Path(offer_id) = match offer_id {
        Ok(path) => path,
        Err(rejection) => return bad_path(rejection),
    };

    match service.catalog().get_offer(OfferId(offer_id)).await {
        Ok(listing) => respond(StatusCode::OK, ApiResponse::data(listing)),
        Err(err) => error_response(err),
    }
}

fn require_alumni(actor: &Actor) -> Result<(), Response> {
    match actor.role {
        ActorRole::Alumni => Ok(()),
        ActorRole::Student => Err(error_response(MentorshipError::Forbidden(
            "only alumni can manage offers".to_string(),
        ))),
    }
}

pub(crate) async fn create_offer_handler<S, M>(
    State(service): SharedService<S, M>,
    ActorIdentity(actor): ActorIdentity,
    payload: Result<Json<OfferDraft>, JsonRejection>,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    if let Err(response) = require_alumni(&actor) {
        return response;
    }
    let Json(draft) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_body(rejection),
    };

    match service.catalog().create_offer(&actor.id, draft).await {
        Ok(offer) => respond(
            StatusCode::CREATED,
            ApiResponse::data(offer).with_message("Offer created"),
        ),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn edit_offer_handler<S, M>(
    State(service): SharedService<S, M>,
    ActorIdentity(actor): ActorIdentity,
    offer_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<OfferDraft>, JsonRejection>,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    let Path(offer_id) = match offer_id {
        Ok(path) => path,
        Err(rejection) => return bad_path(rejection),
    };

    if let Err(response) = require_alumni(&actor) {
        return response;
    }
    let Json(draft) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_body(rejection),
    };

    match service
        .catalog()
        .edit_offer(OfferId(offer_id), &actor.id, draft)
        .await
    {
        Ok(offer) => respond(
            StatusCode::OK,
            ApiResponse::data(offer).with_message("Offer updated"),
        ),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_offer_handler<S, M>(
    State(service): SharedService<S, M>,
    ActorIdentity(actor): ActorIdentity,
    offer_id: Result<Path<i64>, PathRejection>,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    let Path(offer_id) = match offer_id {
        Ok(path) => path,
        Err(rejection) => return bad_path(rejection),
    };

    if let Err(response) = require_alumni(&actor) {
        return response;
    }

    match service.catalog().delete_offer(OfferId(offer_id), &actor.id).await {
        Ok(()) => respond(StatusCode::OK, ApiResponse::message("Offer deleted")),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApplyBody {
    #[serde(default, alias = "offerId")]
    offer_id: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

pub(crate) async fn apply_handler<S, M>(
    State(service): SharedService<S, M>,
    ActorIdentity(actor): ActorIdentity,
    payload: Result<Json<ApplyBody>, JsonRejection>,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    let Json(body) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_body(rejection),
    };

    let command = ApplyCommand {
        offer_id: body.offer_id.map(OfferId),
        applicant_id: Some(actor.id),
        applicant_role: Some(actor.role.label().to_string()),
        message: body.message,
    };

    match service.applications().apply(command).await {
        Ok(application) => respond(
            StatusCode::CREATED,
            ApiResponse::data(application).with_message("Application submitted"),
        ),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn offer_applications_handler<S, M>(
    State(service): SharedService<S, M>,
    ActorIdentity(actor): ActorIdentity,
    offer_id: Result<Path<i64>, PathRejection>,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    let Path(offer_id) = match offer_id {
        Ok(path) => path,
        Err(rejection) => return bad_path(rejection),
    };

    match service
        .applications()
        .list_applications_for_offer(OfferId(offer_id), &actor.id)
        .await
    {
        Ok(entries) => respond(StatusCode::OK, ApiResponse::data(entries)),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn student_applications_handler<S, M>(
    State(service): SharedService<S, M>,
    ActorIdentity(actor): ActorIdentity,
    Path(student_id): Path<String>,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    if actor.id.as_str() != student_id {
        return error_response(MentorshipError::Forbidden(
            "cannot view another member's applications".to_string(),
        ));
    }

    match service
        .applications()
        .list_applications_for_applicant(&actor.id)
        .await
    {
        Ok(summaries) => respond(StatusCode::OK, ApiResponse::data(summaries)),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatusBody {
    #[serde(default)]
    status: Option<String>,
}

pub(crate) async fn application_status_handler<S, M>(
    State(service): SharedService<S, M>,
    ActorIdentity(actor): ActorIdentity,
    application_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    let Path(application_id) = match application_id {
        Ok(path) => path,
        Err(rejection) => return bad_path(rejection),
    };
    let Json(body) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_body(rejection),
    };

    let status = match body.status.as_deref().map(str::parse::<ApplicationStatus>) {
        Some(Ok(status)) => status,
        Some(Err(_)) | None => {
            return error_response(MentorshipError::Validation(
                "status must be approved or rejected".to_string(),
            ))
        }
    };

    match service
        .applications()
        .set_application_status(ApplicationId(application_id), &actor.id, status)
        .await
    {
        Ok(outcome) => respond(
            StatusCode::OK,
            ApiResponse::data(outcome.application).with_message(format!("Application {status}")),
        ),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SessionQuery {
    #[serde(default, alias = "ownerId")]
    owner_id: Option<String>,
}

pub(crate) async fn owner_sessions_handler<S, M>(
    State(service): SharedService<S, M>,
    identity: Option<ActorIdentity>,
    Query(query): Query<SessionQuery>,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    let owner_id = query
        .owner_id
        .filter(|owner| !owner.trim().is_empty())
        .map(ActorId::new)
        .or_else(|| identity.map(|ActorIdentity(actor)| actor.id));

    let Some(owner_id) = owner_id else {
        return error_response(MentorshipError::Validation(
            "ownerId is required".to_string(),
        ));
    };

    match service.sessions().sessions_for_owner(&owner_id).await {
        Ok(sessions) => respond(StatusCode::OK, ApiResponse::data(sessions)),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn student_sessions_handler<S, M>(
    State(service): SharedService<S, M>,
    ActorIdentity(actor): ActorIdentity,
    Path(student_id): Path<String>,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    if actor.id.as_str() != student_id {
        return error_response(MentorshipError::Forbidden(
            "cannot view another member's sessions".to_string(),
        ));
    }

    match service.sessions().sessions_for_student(&actor.id).await
    {
        Ok(sessions) => respond(StatusCode::OK, ApiResponse::data(sessions)),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScheduleBody {
    #[serde(default)]
    datetime: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default, alias = "meetingLink")]
    meeting_link: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl ScheduleBody {
    fn into_command(self) -> Result<ScheduleCommand, MentorshipError> {
        let datetime = match self.datetime.as_deref() {
            Some(raw) => parse_session_datetime(raw)?,
            None => None,
        };

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<SessionStatus>().map_err(|_| {
                MentorshipError::Validation("status must be scheduled or rescheduled".to_string())
            })?),
        };

        Ok(ScheduleCommand {
            datetime,
            topic: self.topic,
            meeting_link: self.meeting_link,
            status,
        })
    }
}

/// Accepts `datetime-local` style values as well as RFC 3339 timestamps (stored as UTC).
pub(crate) fn parse_session_datetime(raw: &str) -> Result<Option<NaiveDateTime>, MentorshipError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(stamp.naive_utc()));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(Some)
        .ok_or_else(|| MentorshipError::Validation(format!("invalid datetime '{raw}'")))
}

pub(crate) async fn schedule_session_handler<S, M>(
    State(service): SharedService<S, M>,
    ActorIdentity(actor): ActorIdentity,
    session_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ScheduleBody>, JsonRejection>,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    let Path(session_id) = match session_id {
        Ok(path) => path,
        Err(rejection) => return bad_path(rejection),
    };
    let Json(body) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_body(rejection),
    };
    let command = match body.into_command() {
        Ok(command) => command,
        Err(err) => return error_response(err),
    };

    match service
        .sessions()
        .schedule_session(SessionId(session_id), &actor.id, command)
        .await
    {
        Ok(session) => respond(
            StatusCode::OK,
            ApiResponse::data(session).with_message("Session scheduled"),
        ),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn notifications_handler<S, M>(
    State(service): SharedService<S, M>,
    ActorIdentity(actor): ActorIdentity,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    match service.inbox().list(&actor).await {
        Ok(notifications) => respond(StatusCode::OK, ApiResponse::data(notifications)),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Serialize)]
struct MarkedRead {
    updated: u64,
}

pub(crate) async fn mark_notifications_read_handler<S, M>(
    State(service): SharedService<S, M>,
    ActorIdentity(actor): ActorIdentity,
) -> Response
where
    S: MentorshipStore,
    M: Mailer,
{
    match service.inbox().mark_all_read(&actor).await {
        Ok(updated) => respond(
            StatusCode::OK,
            ApiResponse::data(MarkedRead { updated }).with_message("Notifications marked read"),
        ),
        Err(err) => error_response(err),
    }
}
