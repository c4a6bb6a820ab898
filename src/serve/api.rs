//! HTTP handlers for outcome prediction
//!
//! Uploads are raw CSV request bodies in the same layout the CLI reads.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::data::read_table;
use crate::predict::{CsvFormat, JsonFormat, PredictionFormat, PredictionTable};
use crate::serve::AppState;
use crate::{Result, ShelterError};

// ---------------------------------------------------------------------------
// Error responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

/// Build a JSON error response.
fn api_error(status: StatusCode, error_type: &str, message: &str) -> Response {
    let body = ApiError {
        error: ApiErrorDetail {
            message: message.to_string(),
            error_type: error_type.to_string(),
        },
    };
    (status, Json(body)).into_response()
}

/// Bad uploads are the caller's fault (422), anything else is ours (500).
fn error_response(err: &ShelterError) -> Response {
    if err.is_input_error() {
        log::warn!("Rejected upload: {}", err);
        return api_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_input", &err.to_string());
    }

    log::error!("Prediction failed: {}", err);
    let error_type = match err {
        ShelterError::ProbabilityContract { .. } => "probability_contract",
        _ => "internal_error",
    };
    api_error(StatusCode::INTERNAL_SERVER_ERROR, error_type, &err.to_string())
}

fn predict_upload(state: &AppState, body: &[u8]) -> Result<PredictionTable> {
    let table = read_table(body)?;
    log::info!("Received upload with {} rows", table.len());
    state.service.predict(&table)
}

/// Parse and score on the blocking pool; the model call is CPU-bound.
async fn predict_blocking(state: Arc<AppState>, body: Bytes) -> Result<PredictionTable> {
    tokio::task::spawn_blocking(move || predict_upload(&state, &body))
        .await
        .map_err(|e| ShelterError::Task(e.to_string()))?
}

fn render(format: &dyn PredictionFormat, predictions: &PredictionTable) -> Response {
    match format.render(predictions) {
        Ok(bytes) => ([(header::CONTENT_TYPE, format.content_type())], bytes).into_response(),
        Err(e) => error_response(&e),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /`
pub async fn welcome() -> &'static str {
    "Welcome to the animal shelter outcome predictor. POST a CSV to /predict/."
}

/// `GET /ping/`
pub async fn ping() -> &'static str {
    "pong"
}

/// `POST /predict/`: CSV upload in, JSON records out.
pub async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match predict_blocking(state, body).await {
        Ok(predictions) => render(&JsonFormat, &predictions),
        Err(e) => error_response(&e),
    }
}

/// `POST /predict_streaming/`: CSV upload in, CSV out.
pub async fn predict_streaming(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match predict_blocking(state, body).await {
        Ok(predictions) => render(&CsvFormat, &predictions),
        Err(e) => error_response(&e),
    }
}

/// Routes of the prediction API
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/ping/", get(ping))
        .route("/predict/", post(predict))
        .route("/predict_streaming/", post(predict_streaming))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Table;
    use crate::serve::OutcomeService;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    /// Answers every row with fixed probabilities, after the usual animal check.
    struct FakeService {
        probabilities: Vec<f64>,
    }

    impl OutcomeService for FakeService {
        fn predict(&self, table: &Table) -> Result<PredictionTable> {
            crate::features::add_features(table)?;
            Ok(PredictionTable {
                key_column: "name".to_string(),
                keys: table.text("name")?,
                classes: vec!["adoption".to_string(), "transfer".to_string()],
                probabilities: vec![self.probabilities.clone(); table.len()],
            })
        }
    }

    fn app(probabilities: Vec<f64>) -> Router {
        router(Arc::new(AppState::new(Arc::new(FakeService { probabilities }))))
    }

    const UPLOAD: &str = "Name,AnimalType,SexuponOutcome,AgeuponOutcome,Breed\n\
                          Rex,Dog,Neutered Male,2 years,Pit Bull Mix\n\
                          Tom,Cat,Intact Male,3 weeks,Domestic Shorthair Mix\n";

    fn upload(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "text/csv")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(resp: Response) -> Vec<u8> {
        axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap()
            .to_vec()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(resp).await).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let req = Request::get("/ping/").body(Body::empty()).unwrap();
        let resp = app(vec![0.5, 0.5]).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, b"pong");
    }

    #[tokio::test]
    async fn test_welcome() {
        let req = Request::get("/").body(Body::empty()).unwrap();
        let resp = app(vec![0.5, 0.5]).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_predict_json() {
        let resp = app(vec![0.75, 0.25])
            .oneshot(upload("/predict/", UPLOAD))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");

        let body = json_body(resp).await;
        let records = body.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "Rex");
        assert_eq!(records[1]["adoption"], 0.75);
    }

    #[tokio::test]
    async fn test_predict_streaming_csv() {
        let resp = app(vec![0.75, 0.25])
            .oneshot(upload("/predict_streaming/", UPLOAD))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/csv");

        let text = String::from_utf8(body_bytes(resp).await).unwrap();
        assert_eq!(
            text,
            "name,adoption,transfer\nRex,0.75,0.25\nTom,0.75,0.25\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_animal_is_422() {
        let body = "Name,AnimalType,SexuponOutcome,AgeuponOutcome,Breed\n\
                    Polly,Bird,Unknown,1 year,Parrot\n";
        let resp = app(vec![0.5, 0.5])
            .oneshot(upload("/predict/", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json_body(resp).await;
        assert_eq!(body["error"]["type"], "invalid_input");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("not dogs or cats"));
    }

    #[tokio::test]
    async fn test_missing_column_is_422() {
        let resp = app(vec![0.5, 0.5])
            .oneshot(upload("/predict/", "Name\nRex\n"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_bad_probabilities_are_500() {
        let resp = app(vec![0.9, 0.3])
            .oneshot(upload("/predict/", UPLOAD))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json_body(resp).await;
        assert_eq!(body["error"]["type"], "probability_contract");
    }

    /// Takes a while per upload, like a large table would.
    struct SlowService;

    impl OutcomeService for SlowService {
        fn predict(&self, table: &Table) -> Result<PredictionTable> {
            std::thread::sleep(std::time::Duration::from_millis(500));
            FakeService {
                probabilities: vec![0.5, 0.5],
            }
            .predict(table)
        }
    }

    #[tokio::test]
    async fn test_slow_prediction_does_not_block_other_requests() {
        let app = router(Arc::new(AppState::new(Arc::new(SlowService))));
        let started = std::time::Instant::now();

        let predict = app.clone().oneshot(upload("/predict/", UPLOAD));
        let ping = async {
            let req = Request::get("/ping/").body(Body::empty()).unwrap();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            started.elapsed()
        };
        let (predicted, ping_elapsed) = tokio::join!(predict, ping);

        assert_eq!(predicted.unwrap().status(), StatusCode::OK);
        // Single-threaded test runtime: ping only finishes early if scoring left it
        assert!(ping_elapsed < std::time::Duration::from_millis(250));
    }
}
