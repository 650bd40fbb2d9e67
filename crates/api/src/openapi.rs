use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{self, UploadForm};
use study_models::{
    ChunkMeta, Citation, Difficulty, DocsetsResponse, ErrorShape, EvaluateAnswerRequest,
    Evaluation, JobStatus, JobStatusResponse, LoginForm, QuestionType, Question, Quiz,
    QuizRequest, RandomUploadResponse, TokenWithUser, UploadAccepted, UploadFilesResponse,
    UserCreate, UserOut, UserRole, UserUpdate, UserUploadItem,
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_quiz,
        handlers::upload,
        handlers::job_status,
        handlers::job_result,
        handlers::get_docsets,
        handlers::evaluate_short_answer,
        handlers::log_in,
        handlers::create_user,
        handlers::get_files,
        handlers::user_uploads,
        handlers::list_users,
        handlers::update_user,
        handlers::delete_uploaded_files,
        handlers::random_upload_id,
        handlers::health_check,
        handlers::metrics,
    ),
    components(
        schemas(
            QuizRequest,
            Quiz,
            Question,
            QuestionType,
            Difficulty,
            Citation,
            EvaluateAnswerRequest,
            Evaluation,
            UploadForm,
            UploadAccepted,
            UploadFilesResponse,
            UserUploadItem,
            RandomUploadResponse,
            JobStatus,
            JobStatusResponse,
            ChunkMeta,
            DocsetsResponse,
            LoginForm,
            TokenWithUser,
            UserCreate,
            UserUpdate,
            UserOut,
            UserRole,
            ErrorShape,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "quiz", description = "Uploads, processing jobs and quiz generation"),
        (name = "uploads", description = "Stored upload records"),
        (name = "auth", description = "Token issuance"),
        (name = "users", description = "Account management"),
        (name = "health", description = "Health and monitoring endpoints"),
    ),
    info(
        title = "StudyForge API",
        description = "Turns uploaded course material into retrieval-grounded quizzes",
        version = "0.1.0"
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    )
)]
pub struct ApiDoc;

pub fn create_swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs")
        .url("/openapi.json", ApiDoc::openapi())
        .config(
            utoipa_swagger_ui::Config::new(["/openapi.json"])
                .try_it_out_enabled(true)
                .display_request_duration(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/quizzes",
            "/uploads",
            "/jobs/{job_id}",
            "/jobs/{job_id}/result",
            "/jobs/all/{job_id}/docksets",
            "/evaluate_short_answer",
            "/log_in",
            "/users",
            "/users/{user_id}",
            "/get_files/{job_id}",
            "/user_uploads",
            "/uploaded_files/{job_id}",
            "/random_upload_id",
            "/healthz",
            "/metrics",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
