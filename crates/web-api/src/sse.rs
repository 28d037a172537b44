use axum::{
    extract::{rejection::JsonRejection, State},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::StreamExt;
use simdrive_core::{RunRequest, ValidationError};
use simdrive_orchestrator::{EventSink, RunCoordinator, StreamEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;

const EVENT_BUFFER: usize = 32;

/// Shared state of the simulation endpoints.
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<RunCoordinator>,
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    #[must_use]
    pub fn new(coordinator: Arc<RunCoordinator>) -> Self {
        Self {
            coordinator,
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Starts a simulation run and streams its events back as server-sent events.
///
/// A body that cannot be parsed is answered like a request with missing
/// fields. Only one run may use the browser at a time; a second caller gets a
/// single `error` event.
pub async fn run_simulation(
    State(state): State<AppState>,
    body: Result<Json<RunRequest>, JsonRejection>,
) -> Response {
    let (sink, rx) = EventSink::channel(EVENT_BUFFER);

    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "unreadable run request body");
            sink.emit(StreamEvent::from(&ValidationError::MissingFields))
                .await;
            return into_sse(rx);
        }
    };

    match state.run_lock.clone().try_lock_owned() {
        Ok(guard) => {
            let coordinator = state.coordinator.clone();
            tokio::spawn(async move {
                let _guard = guard;
                let summary = coordinator.run(request, &sink).await;
                tracing::debug!(?summary, "run task finished");
            });
        }
        Err(_) => {
            tracing::warn!("run request refused, another run is in progress");
            sink.emit(StreamEvent::error(
                "A simulation is already running. Try again when it has finished.",
                None,
            ))
            .await;
        }
    }

    into_sse(rx)
}

/// The stream ends once every sender of `rx` is dropped.
fn into_sse(rx: mpsc::Receiver<StreamEvent>) -> Response {
    let stream = ReceiverStream::new(rx).map(|event| {
        event
            .data()
            .map(|data| Event::default().event(event.name()).data(data))
    });
    Sse::new(stream).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ApiServer;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use simdrive_core::{AppConfig, CalendarDate, SiteLayout, TimingConfig};
    use simdrive_driver::fake::{FakeFactory, FakeSimulator};
    use simdrive_driver::MemorySessionStore;
    use tower::ServiceExt;

    fn coordinator(fake: Arc<FakeSimulator>) -> Arc<RunCoordinator> {
        let config = AppConfig {
            timing: TimingConfig::immediate(),
            ..AppConfig::default()
        };
        Arc::new(RunCoordinator::new(
            Arc::new(config),
            Arc::new(FakeFactory::new(fake)),
            Arc::new(MemorySessionStore::new()),
        ))
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_body(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn event_names(body: &str) -> Vec<&str> {
        body.lines()
            .filter_map(|line| line.strip_prefix("event: "))
            .collect()
    }

    #[tokio::test]
    async fn test_run_streams_every_event() {
        let fake = Arc::new(FakeSimulator::new(SiteLayout::default()));
        fake.disable_day(CalendarDate::new(2024, 1, 2).unwrap());
        let router = ApiServer::new(coordinator(fake.clone()), None).router();

        let response = router
            .oneshot(post(
                "/run-puppeteer",
                r#"{"phoneNumber":"9999999999","password":"secret","startDate":"2024-01-01","endDate":"2024-01-03"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let body = read_body(response).await;
        assert_eq!(
            event_names(&body),
            vec![
                "start", "progress", "update", "progress", "update", "progress", "update",
                "complete"
            ]
        );
        assert!(body.starts_with(
            "event: start\ndata: {\"message\":\"Starting simulation for 3 dates.\"}\n\n"
        ));
        assert!(body.contains(
            "\"result\":\"Skipped simulation for 02-01-2024: Date was disabled or could not be selected.\""
        ));
        assert!(body.ends_with(
            "event: complete\ndata: {\"message\":\"All simulations completed.\"}\n\n"
        ));
        assert!(fake.stats().closed);
    }

    #[tokio::test]
    async fn test_missing_field_streams_single_error() {
        let fake = Arc::new(FakeSimulator::new(SiteLayout::default()));
        let router = ApiServer::new(coordinator(fake.clone()), None).router();

        let response = router
            .oneshot(post(
                "/api/simulations",
                r#"{"phoneNumber":"9999999999","startDate":"2024-01-01","endDate":"2024-01-03"}"#,
            ))
            .await
            .unwrap();

        let body = read_body(response).await;
        assert_eq!(
            body,
            "event: error\ndata: {\"message\":\"Phone number, password, start date, and end date are required.\"}\n\n"
        );
        assert_eq!(fake.stats().navigations, 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_missing_field_error() {
        let fake = Arc::new(FakeSimulator::new(SiteLayout::default()));
        let router = ApiServer::new(coordinator(fake), None).router();

        let response = router
            .oneshot(post("/run-puppeteer", "{not json"))
            .await
            .unwrap();

        let body = read_body(response).await;
        assert_eq!(event_names(&body), vec!["error"]);
        assert!(body.contains("are required."));
    }

    #[tokio::test]
    async fn test_second_run_is_refused_while_one_is_active() {
        let fake = Arc::new(FakeSimulator::new(SiteLayout::default()));
        let state = AppState::new(coordinator(fake.clone()));
        let _held = state.run_lock.clone().try_lock_owned().unwrap();

        let response = run_simulation(
            State(state),
            Ok(Json(RunRequest {
                phone_number: Some("9999999999".to_string()),
                password: Some("secret".to_string()),
                start_date: Some("2024-01-01".to_string()),
                end_date: Some("2024-01-01".to_string()),
            })),
        )
        .await;

        let body = read_body(response).await;
        assert_eq!(event_names(&body), vec!["error"]);
        assert!(body.contains("already running"));
        assert_eq!(fake.stats().navigations, 0);
    }

    #[tokio::test]
    async fn test_static_front_end_is_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>simdrive</h1>").unwrap();
        let fake = Arc::new(FakeSimulator::new(SiteLayout::default()));
        let router = ApiServer::new(coordinator(fake), Some(dir.path().to_path_buf())).router();

        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, "<h1>simdrive</h1>");
    }
}
