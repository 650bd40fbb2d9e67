mod common;

use study_models::{NewUpload, StudyError, UserCreate, UserRole, UserUpdate, UserUpdateDetails};

fn new_user(email: &str) -> UserCreate {
    UserCreate {
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        email: email.into(),
        password: "cobol".into(),
    }
}

fn upload(user_id: i64, upload_id: &str) -> NewUpload {
    NewUpload {
        user_id,
        upload_id: upload_id.into(),
        filenames: vec!["notes.md".into(), "slides.pptx".into()],
        course_code: "CS101".into(),
        week: "3".into(),
    }
}

#[tokio::test]
async fn users_are_created_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let control = common::control_plane(dir.path(), None).await;

    let user = control.create_user(&new_user("grace@example.com")).await.unwrap();
    assert_eq!(user.role, UserRole::User);
    assert!(user.is_active);
    assert!(!user.is_verified);
    assert_ne!(user.hashed_password, "cobol");

    let fetched = control.registry().get_user(user.id).await.unwrap().unwrap();
    assert_eq!(fetched.email, "grace@example.com");
    assert!(control.registry().get_user(999).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_and_invalid_emails_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let control = common::control_plane(dir.path(), None).await;
    control.create_user(&new_user("grace@example.com")).await.unwrap();

    let err = control.create_user(&new_user("grace@example.com")).await.unwrap_err();
    assert!(matches!(err, StudyError::EmailAlreadyRegistered));

    // the unique index backs the same error
    let err = control
        .registry()
        .create_user(&new_user("grace@example.com"), "hash")
        .await
        .unwrap_err();
    assert!(matches!(err, StudyError::EmailAlreadyRegistered));

    let err = control.create_user(&new_user("not-an-email")).await.unwrap_err();
    assert_eq!(err.http_status(), 422);
}

#[tokio::test]
async fn role_updates_fall_back_to_user() {
    let dir = tempfile::tempdir().unwrap();
    let control = common::control_plane(dir.path(), None).await;
    let user = control.create_user(&new_user("grace@example.com")).await.unwrap();

    let tutor = control
        .registry()
        .update_user(
            user.id,
            &UserUpdate {
                first_name: "Rear Admiral".into(),
                last_name: "Hopper".into(),
                role: "tutor".into(),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tutor.role, UserRole::Tutor);
    assert_eq!(tutor.first_name, "Rear Admiral");
    assert!(tutor.updated_at.is_some());

    let demoted = control
        .registry()
        .update_user(
            user.id,
            &UserUpdate {
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                role: "superuser".into(),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(demoted.role, UserRole::User);

    let missing = control
        .registry()
        .update_user(
            404,
            &UserUpdate {
                first_name: "x".into(),
                last_name: "y".into(),
                role: "admin".into(),
            },
        )
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn details_update_keeps_role() {
    let dir = tempfile::tempdir().unwrap();
    let control = common::control_plane(dir.path(), None).await;
    let admin = common::user_with_role(&control, "admin@example.com", "admin").await;

    let updated = control
        .registry()
        .update_user_details(
            admin.id,
            &UserUpdateDetails {
                first_name: "Ada".into(),
                last_name: "Byron".into(),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.full_name(), "Ada Byron");
    assert_eq!(updated.role, UserRole::Admin);
}

#[tokio::test]
async fn uploads_are_listed_newest_first_with_owner_names() {
    let dir = tempfile::tempdir().unwrap();
    let control = common::control_plane(dir.path(), None).await;
    let registry = control.registry();
    let tutor = common::user_with_role(&control, "tutor@example.com", "tutor").await;
    let other = common::user_with_role(&control, "other@example.com", "tutor").await;

    registry.create_upload_file(&upload(tutor.id, "job-1")).await.unwrap();
    registry.create_upload_file(&upload(other.id, "job-2")).await.unwrap();
    registry.create_upload_file(&upload(tutor.id, "job-3")).await.unwrap();

    let all = registry.get_user_uploads(None).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|u| u.upload.upload_id.as_str()).collect();
    assert_eq!(ids, vec!["job-3", "job-2", "job-1"]);

    let own = registry.get_user_uploads(Some(tutor.id)).await.unwrap();
    assert_eq!(own.len(), 2);
    assert_eq!(own[0].user_name(), "Test tutor");
    assert_eq!(own[0].upload.filenames, vec!["notes.md", "slides.pptx"]);

    let record = registry.get_files_by_job_id("job-2").await.unwrap().unwrap();
    assert_eq!(record.user_id, other.id);
    assert!(registry.get_files_by_job_id("job-9").await.unwrap().is_none());
}

#[tokio::test]
async fn upload_ids_are_unique() {
    let dir = tempfile::tempdir().unwrap();
    let control = common::control_plane(dir.path(), None).await;
    let tutor = common::user_with_role(&control, "tutor@example.com", "tutor").await;

    control.registry().create_upload_file(&upload(tutor.id, "job-1")).await.unwrap();
    assert!(control
        .registry()
        .create_upload_file(&upload(tutor.id, "job-1"))
        .await
        .is_err());
}

#[tokio::test]
async fn deleting_a_user_cascades_to_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let control = common::control_plane(dir.path(), None).await;
    let registry = control.registry();
    let tutor = common::user_with_role(&control, "tutor@example.com", "tutor").await;
    registry.create_upload_file(&upload(tutor.id, "job-1")).await.unwrap();

    assert!(registry.delete_user(tutor.id).await.unwrap());
    assert!(!registry.delete_user(tutor.id).await.unwrap());
    assert!(registry.get_files_by_job_id("job-1").await.unwrap().is_none());
}

#[tokio::test]
async fn random_upload_id_is_none_when_empty() {
    let dir = tempfile::tempdir().unwrap();
    let control = common::control_plane(dir.path(), None).await;
    assert_eq!(control.random_upload_id().await.unwrap().job_id, None);

    let tutor = common::user_with_role(&control, "tutor@example.com", "tutor").await;
    control.registry().create_upload_file(&upload(tutor.id, "job-1")).await.unwrap();
    assert_eq!(
        control.random_upload_id().await.unwrap().job_id.as_deref(),
        Some("job-1")
    );

    assert!(control.registry().delete_uploaded_files("job-1").await.unwrap());
    assert!(!control.registry().delete_uploaded_files("job-1").await.unwrap());
}
