use crate::http::CollectorState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use common::http::{bad_object_response, domain_error_to_response, StatusResponse};
use serde_json::Value;
use tracing::{debug, instrument};

/// `POST /collector`: store one payload of device statistics
#[instrument(name = "Collect", skip_all)]
pub async fn collect(
    State(state): State<CollectorState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<StatusResponse>) {
    let payload = match payload {
        Ok(Json(Value::Object(map))) => map,
        Ok(Json(_)) => {
            debug!("payload is not a JSON object");
            return bad_object_response();
        }
        Err(rejection) => {
            debug!(error = %rejection, "unreadable payload");
            return bad_object_response();
        }
    };

    match state.ingestion_service.ingest(payload).await {
        Ok(stat_id) => {
            debug!(stat_id, "Stat collected successfully");
            (StatusCode::OK, Json(StatusResponse::ok()))
        }
        Err(e) => domain_error_to_response(e),
    }
}

/// `GET /health`: liveness probe
pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

#[cfg(test)]
mod tests {
    use crate::domain::StatIngestionService;
    use crate::http::build_router;
    use axum::body::Body;
    use axum::Router;
    use common::domain::{
        AttributeRecord, DomainError, MockAttributeRecordStore, MockPersistenceSession,
        PersistenceSession,
    };
    use common::http::{HttpLoggingConfig, StatusResponse};
    use http::{Request, StatusCode};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;
    use tracing_subscriber::fmt::MakeWriter;

    fn router(store: MockAttributeRecordStore) -> Router {
        build_router(
            Arc::new(StatIngestionService::new(Arc::new(store))),
            HttpLoggingConfig::default(),
        )
    }

    fn committing_store(expected_attributes: usize) -> MockAttributeRecordStore {
        let mut session = MockPersistenceSession::new();
        session
            .expect_add()
            .withf(move |record: &AttributeRecord| record.len() == expected_attributes)
            .times(1)
            .returning(|_| Ok(()));
        session
            .expect_commit()
            .times(1)
            .return_once(|| Ok(vec![1]));

        let mut store = MockAttributeRecordStore::new();
        store
            .expect_begin()
            .times(1)
            .return_once(move || Ok(Box::new(session) as Box<dyn PersistenceSession>));
        store
    }

    async fn post_collector(router: Router, body: &str) -> (StatusCode, StatusResponse) {
        let request = Request::builder()
            .method("POST")
            .uri("/collector")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_collect_success() {
        let (status, body) = post_collector(
            router(committing_store(3)),
            r#"{"application":"app1","device_id":"dev1","temp":36.6,"active":true,"count":5}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, StatusResponse::ok());
    }

    #[tokio::test]
    async fn test_collect_duplicate_keys_collapse() {
        let (status, _) = post_collector(
            router(committing_store(1)),
            r#"{"application":"app1","device_id":"dev1","count":1,"count":2}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_collect_missing_device_id() {
        let (status, body) = post_collector(
            router(MockAttributeRecordStore::new()),
            r#"{"application":"app1","count":5}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, StatusResponse::error("bad object"));
    }

    #[tokio::test]
    async fn test_collect_missing_application() {
        let (status, body) = post_collector(
            router(MockAttributeRecordStore::new()),
            r#"{"device_id":"dev1","count":5}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, StatusResponse::error("bad object"));
    }

    #[tokio::test]
    async fn test_collect_malformed_json() {
        let (status, body) =
            post_collector(router(MockAttributeRecordStore::new()), "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, StatusResponse::error("bad object"));
    }

    #[tokio::test]
    async fn test_collect_non_object_payload() {
        let (status, body) =
            post_collector(router(MockAttributeRecordStore::new()), "[1, 2, 3]").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, StatusResponse::error("bad object"));
    }

    #[tokio::test]
    async fn test_collect_unsupported_value() {
        let (status, body) = post_collector(
            router(MockAttributeRecordStore::new()),
            r#"{"application":"app1","device_id":"dev1","location":{"lat":1.0}}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            StatusResponse::error("unsupported value for field 'location': object")
        );
    }

    #[tokio::test]
    async fn test_collect_integer_beyond_i64_is_rejected() {
        let (status, body) = post_collector(
            router(MockAttributeRecordStore::new()),
            r#"{"application":"app1","device_id":"dev1","uptime":-9223372036854775809}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            StatusResponse::error("unsupported value for field 'uptime': integer out of range")
        );
    }

    #[tokio::test]
    async fn test_collect_persistence_failure() {
        let mut session = MockPersistenceSession::new();
        session.expect_add().times(1).returning(|_| Ok(()));
        session.expect_commit().times(1).return_once(|| {
            Err(DomainError::RepositoryError(anyhow::anyhow!(
                "disk full"
            )))
        });
        let mut store = MockAttributeRecordStore::new();
        store
            .expect_begin()
            .times(1)
            .return_once(move || Ok(Box::new(session) as Box<dyn PersistenceSession>));

        let (status, body) = post_collector(
            router(store),
            r#"{"application":"app1","device_id":"dev1","count":5}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, StatusResponse::error("internal error"));
    }

    /// Collects formatted log output for assertions
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_collect_persistence_failure_logged_once() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::ERROR)
            .with_ansi(false)
            .finish();
        // Current-thread runtime, so the whole request runs under this subscriber
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut session = MockPersistenceSession::new();
        session.expect_add().times(1).returning(|_| Ok(()));
        session.expect_commit().times(1).return_once(|| {
            Err(DomainError::RepositoryError(anyhow::anyhow!(
                "disk full"
            )))
        });
        let mut store = MockAttributeRecordStore::new();
        store
            .expect_begin()
            .times(1)
            .return_once(move || Ok(Box::new(session) as Box<dyn PersistenceSession>));

        let (status, _) = post_collector(
            router(store),
            r#"{"application":"app1","device_id":"dev1","count":5}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("ERROR").count(), 1, "logs were: {}", output);
        assert!(output.contains("failed to commit stat record"));
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = router(MockAttributeRecordStore::new())
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
