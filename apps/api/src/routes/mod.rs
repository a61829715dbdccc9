pub mod health;
pub mod session;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Room for the multipart framing around the document itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_document_bytes
        .saturating_add(UPLOAD_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/session",
            get(session::handle_get_session)
                .post(session::handle_start_session)
                .delete(session::handle_end_session),
        )
        .route(
            "/api/v1/session/tasks/:horizon/:index/complete",
            post(session::handle_complete_task),
        )
        .route("/api/v1/session/refresh", post(session::handle_refresh))
        .route(
            "/api/v1/session/progress",
            post(session::handle_sync_progress),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use serde_json::{json, Value};

    use super::*;
    use crate::config::Config;
    use crate::engine::fake::{FakeEngine, FakeFailure};
    use crate::engine::EngineCall;
    use crate::models::document::DEFAULT_MAX_DOCUMENT_BYTES;
    use crate::models::profile::SubjectId;
    use crate::sync::SyncController;

    const PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF";

    fn create_test_app() -> (TestServer, Arc<FakeEngine>) {
        let engine = Arc::new(FakeEngine::new());
        let config = Config {
            engine_url: "http://engine.invalid".to_string(),
            engine_timeout_secs: 5,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            port: 0,
            rust_log: "debug".to_string(),
        };
        let sync = Arc::new(SyncController::new(
            engine.clone(),
            config.max_document_bytes,
        ));
        let server = TestServer::new(build_router(AppState { sync, config })).unwrap();
        (server, engine)
    }

    fn upload(mime: &str, bytes: &[u8], target_role: &str) -> MultipartForm {
        MultipartForm::new()
            .add_part(
                "file",
                Part::bytes(bytes.to_vec())
                    .file_name("resume.pdf")
                    .mime_type(mime),
            )
            .add_text("target_role", target_role)
    }

    async fn start(server: &TestServer) -> Value {
        let response = server
            .post("/api/v1/session")
            .multipart(upload("application/pdf", PDF, "Data Scientist"))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    #[tokio::test]
    async fn test_health_reports_no_session() {
        let (server, _) = create_test_app();

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["session_active"], false);
    }

    #[tokio::test]
    async fn test_get_session_without_one_is_not_found() {
        let (server, _) = create_test_app();

        let response = server.get("/api/v1/session").await;
        response.assert_status_not_found();

        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_upload_starts_session_with_progress() {
        let (server, _) = create_test_app();
        let body = start(&server).await;

        let session = &body["session"];
        assert_eq!(session["identity"], "u1");
        assert_eq!(session["target_role"], "Data Scientist");
        assert_eq!(session["revision"], 1);
        assert_eq!(session["readiness"]["score"], 40);
        assert_eq!(session["readiness"]["label"], "Getting There");
        assert_eq!(session["horizons"][0]["key"], "30");
        assert_eq!(session["horizons"][0]["label"], "Foundation");
        assert_eq!(session["horizons"][0]["tasks"].as_array().unwrap().len(), 3);
        assert_eq!(session["progress"]["total_tasks"], 7);
        assert_eq!(session["progress"]["completed_tasks"], 0);
        assert_eq!(body["progress_sync"]["status"], "applied");

        server.get("/api/v1/session").await.assert_status_ok();
        let health: Value = server.get("/health").await.json();
        assert_eq!(health["session_active"], true);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf_without_calling_engine() {
        let (server, engine) = create_test_app();

        let response = server
            .post("/api/v1/session")
            .multipart(upload("text/plain", b"plain text resume", "Data Scientist"))
            .await;
        response.assert_status_bad_request();

        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upload_requires_file_and_role() {
        let (server, engine) = create_test_app();

        server
            .post("/api/v1/session")
            .multipart(MultipartForm::new().add_text("target_role", "Data Scientist"))
            .await
            .assert_status_bad_request();

        server
            .post("/api/v1/session")
            .multipart(upload("application/pdf", PDF, "  "))
            .await
            .assert_status_bad_request();

        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_second_upload_conflicts_until_session_ended() {
        let (server, _) = create_test_app();
        start(&server).await;

        let response = server
            .post("/api/v1/session")
            .multipart(upload("application/pdf", PDF, "Data Scientist"))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "CONFLICT");

        server
            .delete("/api/v1/session")
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let body = start(&server).await;
        assert_eq!(body["session"]["identity"], "u2");
    }

    #[tokio::test]
    async fn test_complete_task_updates_flag_and_progress() {
        let (server, _) = create_test_app();
        start(&server).await;

        let response = server
            .post("/api/v1/session/tasks/30/1/complete")
            .json(&json!({ "revision": 1 }))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["session"]["horizons"][0]["tasks"][1]["completed"], true);
        assert_eq!(body["session"]["progress"]["completed_tasks"], 1);
        assert_eq!(body["session"]["progress"]["completion_percentage"], 14);
    }

    #[tokio::test]
    async fn test_complete_task_without_body_is_accepted() {
        let (server, _) = create_test_app();
        start(&server).await;

        let response = server.post("/api/v1/session/tasks/90/0/complete").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["session"]["horizons"][2]["tasks"][0]["completed"], true);
    }

    #[tokio::test]
    async fn test_complete_task_rejects_bad_addresses() {
        let (server, engine) = create_test_app();
        start(&server).await;
        let before = engine.calls().len();

        let response = server.post("/api/v1/session/tasks/45/0/complete").await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "INVALID_ADDRESS");

        server
            .post("/api/v1/session/tasks/60/9/complete")
            .await
            .assert_status(StatusCode::CONFLICT);

        server
            .post("/api/v1/session/tasks/30/0/complete")
            .json(&json!({ "revision": 7 }))
            .await
            .assert_status(StatusCode::CONFLICT);

        assert_eq!(engine.calls().len(), before);
    }

    #[tokio::test]
    async fn test_non_numeric_index_uses_error_envelope() {
        let (server, engine) = create_test_app();
        start(&server).await;
        let before = engine.calls().len();

        for path in [
            "/api/v1/session/tasks/30/-1/complete",
            "/api/v1/session/tasks/30/first/complete",
        ] {
            let response = server.post(path).await;
            response.assert_status(StatusCode::CONFLICT);
            let body: Value = response.json();
            assert_eq!(body["error"]["code"], "INVALID_ADDRESS");
        }

        assert_eq!(engine.calls().len(), before);
    }

    #[tokio::test]
    async fn test_revision_is_checked_whatever_the_content_type() {
        let (server, engine) = create_test_app();
        start(&server).await;
        let before = engine.calls().len();

        // stale revision sent without a JSON content type
        let response = server
            .post("/api/v1/session/tasks/30/0/complete")
            .text(r#"{"revision": 7}"#)
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "INVALID_ADDRESS");

        // revision of the wrong JSON type
        let response = server
            .post("/api/v1/session/tasks/30/0/complete")
            .json(&json!({ "revision": "7" }))
            .await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        // unparseable body and misspelled field
        server
            .post("/api/v1/session/tasks/30/0/complete")
            .text("revision=7")
            .await
            .assert_status_bad_request();
        server
            .post("/api/v1/session/tasks/30/0/complete")
            .json(&json!({ "revison": 7 }))
            .await
            .assert_status_bad_request();

        assert_eq!(engine.calls().len(), before);
        let session: Value = server.get("/api/v1/session").await.json();
        assert_eq!(session["horizons"][0]["tasks"][0]["completed"], false);
    }

    #[tokio::test]
    async fn test_refresh_bumps_revision_and_score() {
        let (server, _) = create_test_app();
        start(&server).await;
        server
            .post("/api/v1/session/tasks/30/0/complete")
            .await
            .assert_status_ok();

        let response = server.post("/api/v1/session/refresh").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["session"]["revision"], 2);
        assert_eq!(body["session"]["readiness"]["score"], 45);
        assert_eq!(body["session"]["horizons"][0]["tasks"].as_array().unwrap().len(), 2);
        assert_eq!(body["session"]["progress"]["total_tasks"], 6);
    }

    #[tokio::test]
    async fn test_progress_failure_is_bad_gateway_and_keeps_session() {
        let (server, engine) = create_test_app();
        start(&server).await;
        engine.fail_next(EngineCall::FetchProgress, FakeFailure::Network);

        let response = server.post("/api/v1/session/progress").await;
        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "NETWORK_FAILURE");

        let response = server.get("/api/v1/session").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["progress"]["total_tasks"], 7);
    }

    #[tokio::test]
    async fn test_forgotten_subject_is_gone_and_session_cleared() {
        let (server, engine) = create_test_app();
        let body = start(&server).await;
        let identity = body["session"]["identity"].as_str().unwrap().to_string();
        engine.forget(&SubjectId::new(identity));

        let response = server.post("/api/v1/session/progress").await;
        response.assert_status(StatusCode::GONE);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "UNKNOWN_IDENTITY");

        server.get("/api/v1/session").await.assert_status_not_found();
    }
}
