use std::time::Duration;
use study_models::JobStatus;
use study_testsupport::*;

const LECTURE: &[&str] = &[
    "Ownership moves values between bindings.",
    "Borrowing lends access without moving the value.",
];

#[tokio::test(flavor = "multi_thread")]
async fn upload_index_and_quiz_over_http() -> anyhow::Result<()> {
    let chat = StubChat::true_false("lecture.docx");
    let env = TestEnv::new(Some(chat.clone())).await?;
    let server = TestServer::serve(study_api::build_app(env.control.clone())).await?;
    let client = StudyClient::new(server.base_url.clone());

    assert_eq!(client.health().await?, "OK");

    let created = client
        .create_user("Grace", "Hopper", "grace@example.com", "cobol-rules")
        .await?;
    assert_eq!(created.as_u16(), 201);
    let login = client.log_in("grace@example.com", "cobol-rules").await?;
    assert_eq!(login.token_type, "bearer");

    let files = vec![
        ("lecture.docx".to_string(), docx_bytes(LECTURE)?),
        ("notes.txt".to_string(), b"Lifetimes keep references valid.".to_vec()),
    ];
    let (accepted, location) = client
        .upload(&login.access_token, "CS101", "7", files)
        .await?;
    assert_eq!(accepted.user_name, "Grace Hopper");
    assert_eq!(location, Some(format!("/jobs/{}", accepted.job_id)));

    let status = client
        .wait_for_job(&accepted.job_id, Duration::from_secs(10))
        .await?;
    assert_eq!(status.status, JobStatus::Succeeded, "{:?}", status.error);

    let manifest = client.job_result(&accepted.job_id).await?;
    let sources: Vec<&str> = manifest["sources"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["source"].as_str())
        .collect();
    assert_eq!(sources, vec!["lecture.docx", "notes.txt"]);

    let docsets = client.docsets(&accepted.job_id).await?;
    assert!(docsets.docsets.iter().any(|d| d.contains("Borrowing lends access")));

    let quiz = client.create_quiz(&accepted.job_id, 2).await?;
    assert_eq!(quiz.questions.len(), 1);
    assert!(chat.prompts()[0].contains("[source: lecture.docx | chunk: 0]"));

    let metrics = prom_parse(&client.metrics().await?)?;
    assert_eq!(metrics.counter("studyforge_uploads_total"), 1.0);
    assert_eq!(metrics.counter("studyforge_jobs_succeeded_total"), 1.0);
    assert_eq!(metrics.counter("studyforge_quizzes_generated_total"), 1.0);
    assert_eq!(
        metrics.histograms["studyforge_quiz_generation_seconds"].count,
        1.0
    );

    let admin = env.token_for("admin@example.com", "admin").await?;
    let uploads = client.user_uploads(&admin).await?;
    assert_eq!(uploads.as_array().map(Vec::len), Some(1));
    assert_eq!(client.delete_upload(&admin, &accepted.job_id).await?.as_u16(), 204);

    let (status, body) = client
        .get_raw(&format!("/jobs/{}/result", accepted.job_id))
        .await?;
    assert_eq!(status.as_u16(), 410);
    assert!(body.contains("Result expired"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn swagger_ui_answers_the_container_health_check() -> anyhow::Result<()> {
    let env = TestEnv::new(None).await?;
    let server = TestServer::serve(study_api::build_app(env.control.clone())).await?;
    let client = StudyClient::new(server.base_url.clone());

    // reqwest follows the redirect from /docs to /docs/
    let (status, body) = client.get_raw("/docs").await?;
    assert_eq!(status.as_u16(), 200);
    assert!(body.to_lowercase().contains("swagger"));

    let (status, body) = client.get_raw("/openapi.json").await?;
    assert_eq!(status.as_u16(), 200);
    assert!(body.contains("/jobs/all/{job_id}/docksets"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_logins_are_counted() -> anyhow::Result<()> {
    let env = TestEnv::new(None).await?;
    env.user_with_role("tutor@example.com", "tutor").await?;
    let server = TestServer::serve(study_api::build_app(env.control.clone())).await?;
    let client = StudyClient::new(server.base_url.clone());

    let err = client
        .log_in("tutor@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Incorrect email or password"));
    client.log_in("tutor@example.com", TEST_PASSWORD).await?;

    let metrics = prom_parse(&client.metrics().await?)?;
    assert_eq!(metrics.counter("studyforge_failed_logins_total"), 1.0);
    Ok(())
}
