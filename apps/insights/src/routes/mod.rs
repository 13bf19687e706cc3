pub mod dashboard;
pub mod health;
pub mod resumes;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resume intake and job results
        .route("/api/v1/resumes", post(resumes::handle_submit))
        .route("/api/v1/resumes/jobs/:job_id", get(resumes::handle_job_result))
        // Dashboard views
        .route("/api/v1/dashboard", get(dashboard::handle_dashboard))
        .route("/api/v1/recommendations", get(dashboard::handle_recommendations))
        .route(
            "/api/v1/skills/:name/progress",
            patch(dashboard::handle_skill_progress),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::cache::{CacheLayer, InMemoryStore, Namespace};
    use crate::config::PipelineConfig;
    use crate::content::ContentPrioritizer;
    use crate::inference::tests::ScriptedInference;
    use crate::jobs::{AnalysisPipeline, JobQueue, Maintenance};
    use crate::models::skill::{SkillCategory, SkillRecord};
    use crate::persistence::{InMemoryResumeStore, ResumeStore};

    const BOUNDARY: &str = "insights-test-boundary";

    fn test_state(upload_dir: &Path) -> AppState {
        let store: Arc<dyn ResumeStore> = Arc::new(InMemoryResumeStore::new());
        let cache = CacheLayer::new(Arc::new(InMemoryStore::new()), Arc::clone(&store));
        let pipeline = AnalysisPipeline::new(
            Arc::new(ScriptedInference::failing()),
            cache.clone(),
            Arc::clone(&store),
        );
        let prioritizer = ContentPrioritizer::new(cache.clone(), vec![]);
        let maintenance = Maintenance::new(cache.clone(), prioritizer.clone(), store);
        let queue = JobQueue::start(
            PipelineConfig {
                backoff_base: Duration::from_millis(10),
                ..PipelineConfig::default()
            },
            cache.clone(),
            Arc::new(pipeline),
            Arc::new(maintenance),
        );
        AppState {
            cache,
            queue,
            prioritizer,
            upload_dir: Arc::new(upload_dir.to_path_buf()),
        }
    }

    fn upload_request(user_id: &str, mime: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"user_id\"\r\n\r\n\
             {user_id}\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"resume\"\r\n\
             Content-Type: {mime}\r\n\r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/api/v1/resumes")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["queue"]["failed"], 0);
    }

    #[tokio::test]
    async fn test_unsupported_type_is_rejected_before_queuing() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = build_router(state.clone());

        let user = Uuid::new_v4().to_string();
        let (status, body) = send(&app, upload_request(&user, "image/png", "not a resume")).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"]["code"], "UNSUPPORTED_FORMAT");
        assert_eq!(state.queue.stats().queued, 0);
        assert_eq!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
    }

    #[tokio::test]
    async fn test_missing_user_id_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));
        let (status, _) = send(&app, upload_request("not-a-uuid", "text/plain", "x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_plain_text_resume_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = build_router(state.clone());
        let user = Uuid::new_v4();

        let (status, body) = send(
            &app,
            upload_request(
                &user.to_string(),
                "text/plain; charset=utf-8",
                "Senior JavaScript engineer at Google. \
                 Built React dashboards for the analytics team.",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/resumes/jobs/{job_id}?user_id={user}");
        let mut outcome = Value::Null;
        for _ in 0..500 {
            let (status, body) = send(&app, get(&uri)).await;
            if status == StatusCode::OK {
                outcome = body;
                break;
            }
            assert_eq!(status, StatusCode::NOT_FOUND);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(outcome["status"], "succeeded");
        let score = outcome["result"]["score"].as_u64().unwrap();
        assert!(score <= 100);
        assert!(outcome["result"]["entities"]["companies"]
            .as_array()
            .unwrap()
            .contains(&json!("google")));

        let dashboard_uri = format!("/api/v1/dashboard?user_id={user}");
        let (status, dashboard) = send(&app, get(&dashboard_uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dashboard["score"].as_u64(), Some(score));

        // Expired dashboard entry: rebuilt from the stored analysis.
        state
            .cache
            .invalidate(Namespace::Dashboard, &user.to_string())
            .await
            .unwrap();
        let (status, rebuilt) = send(&app, get(&dashboard_uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rebuilt["score"].as_u64(), Some(score));
        assert_eq!(rebuilt["skills"], dashboard["skills"]);
    }

    #[tokio::test]
    async fn test_unknown_job_and_dashboard_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));
        let user = Uuid::new_v4();

        let uri = format!("/api/v1/resumes/jobs/{}?user_id={user}", Uuid::new_v4());
        assert_eq!(send(&app, get(&uri)).await.0, StatusCode::NOT_FOUND);
        let uri = format!("/api/v1/dashboard?user_id={user}");
        assert_eq!(send(&app, get(&uri)).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_skill_progress_route() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = build_router(state.clone());
        let user = Uuid::new_v4();
        state
            .cache
            .set_skill_progress(
                user,
                vec![SkillRecord {
                    name: "rust".to_string(),
                    level: 50,
                    target_level: 70,
                    category: SkillCategory::Programming,
                    last_practiced: None,
                    progress: 10,
                }],
            )
            .await
            .unwrap();

        let patch = |skill: &str, delta: i32| {
            Request::builder()
                .method("PATCH")
                .uri(format!("/api/v1/skills/{skill}/progress"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"user_id": user, "delta": delta}).to_string()))
                .unwrap()
        };

        let (status, body) = send(&app, patch("rust", 15)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["progress"], 25);
        assert!(body[0]["lastPracticed"].is_string());

        let (status, _) = send(&app, patch("cobol", 5)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/api/v1/recommendations?user_id={user}");
        let (status, body) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }
}
