use anyhow::Result;
use reqwest::{multipart, Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use study_models::{
    DocsetsResponse, JobStatus, JobStatusResponse, Quiz, TokenWithUser, UploadAccepted,
};

use crate::poll_until;

pub struct StudyClient {
    client: Client,
    base_url: String,
}

async fn expect_success(response: Response, action: &str) -> Result<Response> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await?;
        anyhow::bail!("{} failed with {}: {}", action, status, error_text);
    }
    Ok(response)
}

impl StudyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<String> {
        let response = self.client.get(self.url("/healthz")).send().await?;
        Ok(expect_success(response, "Health check").await?.text().await?)
    }

    pub async fn metrics(&self) -> Result<String> {
        let response = self.client.get(self.url("/metrics")).send().await?;
        Ok(expect_success(response, "Metrics").await?.text().await?)
    }

    pub async fn create_user(&self, first: &str, last: &str, email: &str, password: &str) -> Result<StatusCode> {
        let response = self
            .client
            .post(self.url("/users"))
            .json(&json!({
                "first_name": first,
                "last_name": last,
                "email": email,
                "password": password,
            }))
            .send()
            .await?;
        let response = expect_success(response, "Create user").await?;
        Ok(response.status())
    }

    pub async fn log_in(&self, username: &str, password: &str) -> Result<TokenWithUser> {
        let response = self
            .client
            .post(self.url("/log_in"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        Ok(expect_success(response, "Log in").await?.json().await?)
    }

    /// Posts `files` as `(name, bytes)` pairs under the `files` field.
    pub async fn upload(
        &self,
        token: &str,
        course_code: &str,
        week: &str,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<(UploadAccepted, Option<String>)> {
        let mut form = multipart::Form::new()
            .text("course_code", course_code.to_string())
            .text("week", week.to_string());
        for (name, bytes) in files {
            form = form.part("files", multipart::Part::bytes(bytes).file_name(name));
        }
        let response = self
            .client
            .post(self.url("/uploads"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        let response = expect_success(response, "Upload").await?;
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok((response.json().await?, location))
    }

    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse> {
        let response = self.client.get(self.url(&format!("/jobs/{}", job_id))).send().await?;
        Ok(expect_success(response, "Job status").await?.json().await?)
    }

    /// Polls the job until it succeeds or fails.
    pub async fn wait_for_job(&self, job_id: &str, timeout: Duration) -> Result<JobStatusResponse> {
        let client = self;
        poll_until(&format!("job {}", job_id), timeout, move || async move {
            let status = client.job_status(job_id).await?.status;
            Ok(matches!(status, JobStatus::Succeeded | JobStatus::Failed))
        })
        .await?;
        self.job_status(job_id).await
    }

    pub async fn job_result(&self, job_id: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}/result", job_id)))
            .send()
            .await?;
        let bytes = expect_success(response, "Job result").await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn docsets(&self, job_id: &str) -> Result<DocsetsResponse> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/all/{}/docksets", job_id)))
            .send()
            .await?;
        Ok(expect_success(response, "Docsets").await?.json().await?)
    }

    pub async fn create_quiz(&self, job_id: &str, num_questions: u32) -> Result<Quiz> {
        let response = self
            .client
            .post(self.url("/quizzes"))
            .json(&json!({ "jobId": job_id, "numQuestions": num_questions }))
            .send()
            .await?;
        Ok(expect_success(response, "Create quiz").await?.json().await?)
    }

    pub async fn user_uploads(&self, token: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.url("/user_uploads"))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(expect_success(response, "User uploads").await?.json().await?)
    }

    pub async fn delete_upload(&self, token: &str, job_id: &str) -> Result<StatusCode> {
        let response = self
            .client
            .delete(self.url(&format!("/uploaded_files/{}", job_id)))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(expect_success(response, "Delete upload").await?.status())
    }

    /// Issues a raw GET and returns the status with the body text.
    pub async fn get_raw(&self, path: &str) -> Result<(StatusCode, String)> {
        let response = self.client.get(self.url(path)).send().await?;
        let status = response.status();
        Ok((status, response.text().await?))
    }
}
