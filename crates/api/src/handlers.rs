use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use std::path::Path as FsPath;
use study_ingest::safe_name;
use study_models::{
    DocsetsResponse, EvaluateAnswerRequest, Evaluation, JobStatusResponse, LoginForm,
    Quiz, QuizRequest, RandomUploadResponse, StudyError, TokenWithUser, UploadAccepted,
    UploadFilesResponse, UserCreate, UserOut, UserUpdate, UserUploadItem,
};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::payload::{ApiForm, ApiJson};
use crate::AppState;

fn failure(context: &str, e: StudyError) -> ApiError {
    if e.http_status() >= 500 {
        error!("{}: {}", context, e);
    } else {
        warn!("{}: {}", context, e);
    }
    ApiError(e)
}

#[utoipa::path(
    post,
    path = "/quizzes",
    tag = "quiz",
    request_body = QuizRequest,
    responses(
        (status = 200, description = "Generated quiz", body = Quiz),
        (status = 404, description = "Nothing indexed for the job", body = study_models::ErrorShape),
        (status = 503, description = "No language model configured", body = study_models::ErrorShape)
    )
)]
#[instrument(skip(state, request), fields(job_id = %request.job_id))]
pub async fn create_quiz(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<QuizRequest>,
) -> Result<Json<Quiz>, ApiError> {
    match state.control.generate_quiz(&request).await {
        Ok(quiz) => Ok(Json(quiz)),
        Err(e) => Err(failure("Failed to generate quiz", e)),
    }
}

/// Multipart body accepted by `POST /uploads`.
#[derive(ToSchema)]
pub struct UploadForm {
    pub course_code: String,
    pub week: String,
    /// One part per file.
    #[schema(value_type = Vec<String>)]
    pub files: Vec<Vec<u8>>,
}

#[derive(Default)]
struct ReceivedUpload {
    course_code: Option<String>,
    week: Option<String>,
    saw_files: bool,
    filenames: Vec<String>,
    bytes: u64,
}

fn multipart_error(e: MultipartError, max_bytes: u64) -> StudyError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StudyError::UploadTooLarge {
            size: max_bytes.saturating_add(1),
            max_size: max_bytes,
        }
    } else {
        StudyError::BadRequest {
            reason: e.body_text(),
        }
    }
}

/// Streams every file part into `in_dir`, failing as soon as the running
/// total passes `max_bytes`.
async fn receive_upload(
    multipart: &mut Multipart,
    in_dir: &FsPath,
    max_bytes: u64,
) -> Result<ReceivedUpload, StudyError> {
    let mut received = ReceivedUpload::default();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "course_code" => {
                received.course_code =
                    Some(field.text().await.map_err(|e| multipart_error(e, max_bytes))?);
            }
            "week" => {
                received.week = Some(field.text().await.map_err(|e| multipart_error(e, max_bytes))?);
            }
            "files" | "files[]" => {
                received.saw_files = true;
                let filename = match field.file_name() {
                    Some(original) if !original.is_empty() => safe_name(original),
                    _ => continue,
                };
                let mut out = tokio::fs::File::create(in_dir.join(&filename)).await?;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?
                {
                    received.bytes += chunk.len() as u64;
                    if received.bytes > max_bytes {
                        return Err(StudyError::UploadTooLarge {
                            size: received.bytes,
                            max_size: max_bytes,
                        });
                    }
                    out.write_all(&chunk).await?;
                }
                out.flush().await?;
                received.filenames.push(filename);
            }
            other => warn!("Ignoring unexpected form field {:?}", other),
        }
    }
    Ok(received)
}

fn required(value: Option<String>, field: &str) -> Result<String, StudyError> {
    value.ok_or_else(|| StudyError::InvalidRequest {
        reason: format!("{} field required", field),
    })
}

async fn store_upload(
    state: &AppState,
    user: &study_models::User,
    job_id: &str,
    in_dir: &FsPath,
    multipart: &mut Multipart,
) -> Result<UploadAccepted, StudyError> {
    let received = receive_upload(multipart, in_dir, state.config.max_upload_bytes()).await?;
    if !received.saw_files {
        return Err(StudyError::BadRequest {
            reason: "No files provided".to_string(),
        });
    }
    let course_code = required(received.course_code, "course_code")?;
    let week = required(received.week, "week")?;
    if received.filenames.is_empty() {
        return Err(StudyError::BadRequest {
            reason: "No valid files uploaded".to_string(),
        });
    }
    state
        .control
        .accept_upload(user, job_id, &course_code, &week, received.filenames, received.bytes)
        .await
}

#[utoipa::path(
    post,
    path = "/uploads",
    tag = "quiz",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    security(("bearer" = [])),
    responses(
        (status = 202, description = "Upload accepted for processing", body = UploadAccepted),
        (status = 400, description = "No usable files", body = study_models::ErrorShape),
        (status = 401, description = "Missing or invalid token", body = study_models::ErrorShape),
        (status = 413, description = "Total upload too large", body = study_models::ErrorShape)
    )
)]
#[instrument(skip(state, user, multipart), fields(user_id = user.id))]
pub async fn upload(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let (job_id, in_dir) = state
        .control
        .begin_upload()
        .map_err(|e| failure("Failed to prepare upload folder", e))?;

    match store_upload(&state, &user, &job_id, &in_dir, &mut multipart).await {
        Ok(accepted) => {
            info!("Accepted upload {} with {} files", job_id, accepted.filenames.len());
            let location = format!("/jobs/{}", job_id);
            Ok((
                StatusCode::ACCEPTED,
                [(header::LOCATION, location)],
                Json(accepted),
            )
                .into_response())
        }
        Err(e) => {
            state.control.abort_upload(&job_id);
            Err(failure("Upload rejected", e))
        }
    }
}

#[utoipa::path(
    get,
    path = "/jobs/{job_id}",
    tag = "quiz",
    params(("job_id" = String, Path, description = "Job identifier returned by an upload")),
    responses(
        (status = 200, description = "Current job state", body = JobStatusResponse),
        (status = 404, description = "Job not found", body = study_models::ErrorShape)
    )
)]
#[instrument(skip(state))]
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    match state.control.get_job(&job_id) {
        Ok(job) => Ok(Json(JobStatusResponse::from(&job))),
        Err(e) => Err(failure("Failed to get job", e)),
    }
}

#[utoipa::path(
    get,
    path = "/jobs/{job_id}/result",
    tag = "quiz",
    params(("job_id" = String, Path, description = "Job identifier")),
    responses(
        (status = 200, description = "Result artefact streamed as an attachment"),
        (status = 404, description = "Result not available", body = study_models::ErrorShape),
        (status = 410, description = "Result expired", body = study_models::ErrorShape)
    )
)]
#[instrument(skip(state))]
pub async fn job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let path = state
        .control
        .job_result(&job_id)
        .map_err(|e| failure("Result unavailable", e))?;
    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        warn!("Failed to open result {}: {}", path.display(), e);
        ApiError(StudyError::Gone {
            reason: "Result expired".to_string(),
        })
    })?;

    let content_type = mime_guess::from_path(&path).first_or_octet_stream().to_string();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result".to_string());
    let disposition = format!("attachment; filename=\"{}\"", filename);
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/jobs/all/{job_id}/docksets",
    tag = "quiz",
    params(("job_id" = String, Path, description = "Job whose chunks to list")),
    responses(
        (status = 200, description = "Indexed chunks and metadata", body = DocsetsResponse),
        (status = 404, description = "Docsets not found", body = study_models::ErrorShape)
    )
)]
#[instrument(skip(state))]
pub async fn get_docsets(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<DocsetsResponse>, ApiError> {
    match state.control.get_docsets(&job_id).await {
        Ok(docsets) => Ok(Json(docsets)),
        Err(e) => Err(failure("Failed to load docsets", e)),
    }
}

#[utoipa::path(
    post,
    path = "/evaluate_short_answer",
    tag = "quiz",
    request_body = EvaluateAnswerRequest,
    responses((status = 200, description = "Grading result", body = Evaluation))
)]
#[instrument(skip(state, request))]
pub async fn evaluate_short_answer(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<EvaluateAnswerRequest>,
) -> Result<Json<Evaluation>, ApiError> {
    match state.control.evaluate_answer(&request) {
        Ok(evaluation) => Ok(Json(evaluation)),
        Err(e) => Err(failure("Failed to evaluate answer", e)),
    }
}

#[utoipa::path(
    post,
    path = "/log_in",
    tag = "auth",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Bearer token and profile", body = TokenWithUser),
        (status = 400, description = "Incorrect email or password", body = study_models::ErrorShape)
    )
)]
#[instrument(skip(state, form), fields(username = %form.username))]
pub async fn log_in(
    State(state): State<AppState>,
    ApiForm(form): ApiForm<LoginForm>,
) -> Result<Json<TokenWithUser>, ApiError> {
    match state.control.login(&form.username, &form.password).await {
        Ok(token) => Ok(Json(token)),
        Err(e) => Err(failure("Login failed", e)),
    }
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User successfully created", body = study_models::ErrorShape),
        (status = 400, description = "Email already registered", body = study_models::ErrorShape),
        (status = 422, description = "Invalid email", body = study_models::ErrorShape)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UserCreate>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    match state.control.create_user(&request).await {
        Ok(user) => {
            info!("Created user {}", user.id);
            Ok((
                StatusCode::CREATED,
                Json(json!({ "detail": "User successfully created" })),
            ))
        }
        Err(e) => Err(failure("Failed to create user", e)),
    }
}

#[utoipa::path(
    get,
    path = "/get_files/{job_id}",
    tag = "uploads",
    params(("job_id" = String, Path, description = "Upload identifier")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Stored filenames", body = UploadFilesResponse),
        (status = 404, description = "Files not found", body = study_models::ErrorShape)
    )
)]
#[instrument(skip(state, _user))]
pub async fn get_files(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(job_id): Path<String>,
) -> Result<Json<UploadFilesResponse>, ApiError> {
    match state.control.get_files(&job_id).await {
        Ok(files) => Ok(Json(files)),
        Err(e) => Err(failure("Failed to get files", e)),
    }
}

#[utoipa::path(
    get,
    path = "/user_uploads",
    tag = "uploads",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Uploads visible to the caller", body = [UserUploadItem]),
        (status = 403, description = "Caller may not list uploads", body = study_models::ErrorShape)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn user_uploads(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<UserUploadItem>>, ApiError> {
    match state.control.user_uploads(&user).await {
        Ok(uploads) => Ok(Json(uploads)),
        Err(e) => Err(failure("Failed to list uploads", e)),
    }
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All users", body = [UserOut]),
        (status = 403, description = "Admins only", body = study_models::ErrorShape)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<UserOut>>, ApiError> {
    match state.control.list_users(&user).await {
        Ok(users) => Ok(Json(users)),
        Err(e) => Err(failure("Failed to list users", e)),
    }
}

#[utoipa::path(
    put,
    path = "/users/{user_id}",
    tag = "users",
    params(("user_id" = i64, Path, description = "User to update")),
    request_body = UserUpdate,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated user", body = UserOut),
        (status = 403, description = "Admin privileges required", body = study_models::ErrorShape),
        (status = 404, description = "User not found", body = study_models::ErrorShape)
    )
)]
#[instrument(skip(state, actor, update), fields(actor_id = actor.id))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<i64>,
    ApiJson(update): ApiJson<UserUpdate>,
) -> Result<Json<UserOut>, ApiError> {
    match state.control.update_user(&actor, user_id, &update).await {
        Ok(user) => Ok(Json(user)),
        Err(e) => Err(failure("Failed to update user", e)),
    }
}

#[utoipa::path(
    delete,
    path = "/uploaded_files/{job_id}",
    tag = "uploads",
    params(("job_id" = String, Path, description = "Upload to remove")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Upload removed"),
        (status = 400, description = "Invalid job id", body = study_models::ErrorShape),
        (status = 403, description = "Admin privileges required", body = study_models::ErrorShape),
        (status = 500, description = "DB cleanup failed", body = study_models::ErrorShape)
    )
)]
#[instrument(skip(state, actor), fields(actor_id = actor.id))]
pub async fn delete_uploaded_files(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.control.delete_upload(&actor, &job_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(failure("Failed to delete upload", e)),
    }
}

#[utoipa::path(
    get,
    path = "/random_upload_id",
    tag = "uploads",
    responses((status = 200, description = "Any stored upload id, or null", body = RandomUploadResponse))
)]
#[instrument(skip(state))]
pub async fn random_upload_id(
    State(state): State<AppState>,
) -> Result<Json<RandomUploadResponse>, ApiError> {
    match state.control.random_upload_id().await {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err(failure("Failed to pick an upload", e)),
    }
}

#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses((status = 200, description = "Service is alive", body = String))
)]
pub async fn health_check(State(_state): State<AppState>) -> Result<&'static str, StatusCode> {
    Ok("OK")
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "health",
    responses((status = 200, description = "Prometheus text exposition", body = String))
)]
#[instrument(skip(state))]
pub async fn metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    match state.metrics.get_prometheus_metrics() {
        Ok(metrics) => Ok(metrics),
        Err(e) => {
            error!("Failed to get metrics: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
