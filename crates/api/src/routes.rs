use axum::{
    routing::{delete, get, post, put},
    Router,
};
use crate::{handlers::*, openapi::create_swagger_ui, AppState};

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Quiz pipeline
        .route("/quizzes", post(create_quiz))
        .route("/uploads", post(upload))
        .route("/jobs/:job_id", get(job_status))
        .route("/jobs/:job_id/result", get(job_result))
        .route("/jobs/all/:job_id/docksets", get(get_docsets))
        .route("/evaluate_short_answer", post(evaluate_short_answer))

        // Accounts
        .route("/log_in", post(log_in))
        .route("/users", post(create_user).get(list_users))
        .route("/users/:user_id", put(update_user))

        // Upload records
        .route("/get_files/:job_id", get(get_files))
        .route("/user_uploads", get(user_uploads))
        .route("/uploaded_files/:job_id", delete(delete_uploaded_files))
        .route("/random_upload_id", get(random_upload_id))

        // Health and metrics
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics))
        .merge(create_swagger_ui())
}

pub fn build_router(state: AppState) -> Router {
    create_router().with_state(state)
}
