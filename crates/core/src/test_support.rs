//! In-process stub of the e-service backend for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::barcode::BarcodeMatrix;
use crate::config::Endpoints;

const LOGIN_PATH: &str = "/api/v1/eservice-back/login";
const DASHBOARD_PATH: &str = "/api/v1/eservice-back/customer/current/main-dashboard/reduced";

/// Canned responses for the stub
#[derive(Debug, Clone)]
pub(crate) struct StubBehavior {
    login_status: u16,
    login_cookies: Vec<String>,
    dashboard_status: u16,
    dashboard_body: String,
    dashboard_requires: Option<(String, String)>,
    dashboard_delay: Option<Duration>,
}

impl Default for StubBehavior {
    fn default() -> Self {
        Self {
            login_status: 200,
            login_cookies: Vec::new(),
            dashboard_status: 200,
            dashboard_body: "{}".to_string(),
            dashboard_requires: None,
            dashboard_delay: None,
        }
    }
}

impl StubBehavior {
    pub(crate) fn login_status(mut self, status: u16) -> Self {
        self.login_status = status;
        self
    }

    pub(crate) fn login_cookies<I, S>(mut self, cookies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.login_cookies = cookies.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn dashboard_status(mut self, status: u16) -> Self {
        self.dashboard_status = status;
        self
    }

    pub(crate) fn dashboard_body(mut self, body: impl Into<String>) -> Self {
        self.dashboard_body = body.into();
        self
    }

    /// Answer the dashboard with 401 unless this header is present
    pub(crate) fn dashboard_requires(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.dashboard_requires = Some((name.into(), value.into()));
        self
    }

    /// Hold the dashboard response back for `delay`
    pub(crate) fn dashboard_delay(mut self, delay: Duration) -> Self {
        self.dashboard_delay = Some(delay);
        self
    }
}

/// A request seen by the stub
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub headers: HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Default)]
struct Recorder {
    login_hits: AtomicUsize,
    dashboard_hits: AtomicUsize,
    last_login: Mutex<Option<RecordedRequest>>,
    last_dashboard: Mutex<Option<RecordedRequest>>,
}

#[derive(Clone)]
struct StubState {
    behavior: Arc<StubBehavior>,
    recorder: Arc<Recorder>,
}

/// Running stub server bound to an ephemeral loopback port
pub(crate) struct StubServer {
    base_url: String,
    recorder: Arc<Recorder>,
}

impl StubServer {
    pub(crate) async fn start(behavior: StubBehavior) -> Self {
        let recorder = Arc::new(Recorder::default());
        let state = StubState {
            behavior: Arc::new(behavior),
            recorder: recorder.clone(),
        };

        let app = Router::new()
            .route(LOGIN_PATH, post(login))
            .route(DASHBOARD_PATH, get(dashboard))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub local addr");

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{}", addr),
            recorder,
        }
    }

    /// URL on a loopback port nothing listens on
    pub(crate) fn unreachable_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe");
        let addr = listener.local_addr().expect("probe addr");
        drop(listener);
        format!("http://{}{}", addr, LOGIN_PATH)
    }

    pub(crate) fn endpoints(&self) -> Endpoints {
        Endpoints::with_base(&self.base_url)
    }

    pub(crate) fn login_hits(&self) -> usize {
        self.recorder.login_hits.load(Ordering::SeqCst)
    }

    pub(crate) fn dashboard_hits(&self) -> usize {
        self.recorder.dashboard_hits.load(Ordering::SeqCst)
    }

    pub(crate) fn last_login(&self) -> Option<RecordedRequest> {
        self.recorder.last_login.lock().unwrap().clone()
    }

    pub(crate) fn last_dashboard(&self) -> Option<RecordedRequest> {
        self.recorder.last_dashboard.lock().unwrap().clone()
    }
}

async fn login(State(state): State<StubState>, headers: HeaderMap, body: String) -> Response {
    state.recorder.login_hits.fetch_add(1, Ordering::SeqCst);
    *state.recorder.last_login.lock().unwrap() = Some(RecordedRequest { headers, body });

    let status = StatusCode::from_u16(state.behavior.login_status).unwrap();
    let mut response_headers = HeaderMap::new();
    for cookie in &state.behavior.login_cookies {
        response_headers.append(header::SET_COOKIE, HeaderValue::from_str(cookie).unwrap());
    }
    (status, response_headers, r#"{"status":"ok"}"#).into_response()
}

async fn dashboard(State(state): State<StubState>, headers: HeaderMap) -> Response {
    state.recorder.dashboard_hits.fetch_add(1, Ordering::SeqCst);
    let authorized = match &state.behavior.dashboard_requires {
        Some((name, value)) => headers
            .get(name.as_str())
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == value.as_str()),
        None => true,
    };
    *state.recorder.last_dashboard.lock().unwrap() = Some(RecordedRequest {
        headers,
        body: String::new(),
    });

    if let Some(delay) = state.behavior.dashboard_delay {
        tokio::time::sleep(delay).await;
    }

    if !authorized {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    let status = StatusCode::from_u16(state.behavior.dashboard_status).unwrap();
    (status, state.behavior.dashboard_body.clone()).into_response()
}

/// Decode a rendered matrix with a standard QR reader
pub(crate) fn decode_matrix(matrix: &BarcodeMatrix) -> String {
    let mut image = rqrr::PreparedImage::prepare_from_greyscale(
        matrix.size(),
        matrix.size(),
        |x, y| if matrix.is_dark(x, y) { 0 } else { 255 },
    );
    let grids = image.detect_grids();
    assert_eq!(grids.len(), 1, "expected exactly one QR symbol");
    let (_meta, content) = grids[0].decode().expect("decodable symbol");
    content
}
