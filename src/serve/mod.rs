//! HTTP serving shell
//!
//! The model is loaded once at startup, wrapped in an [`OutcomeService`] and
//! handed to the router through [`AppState`].

pub mod api;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use crate::data::Table;
use crate::predict::{PredictionTable, Predictor};
use crate::{InferenceBackend, Result, ShelterError};

pub use api::router;

/// Something that turns an uploaded table into class probabilities
pub trait OutcomeService: Send + Sync {
    fn predict(&self, table: &Table) -> Result<PredictionTable>;
}

/// [`OutcomeService`] backed by a loaded model
pub struct ModelService {
    predictor: Mutex<Predictor<InferenceBackend>>,
}

impl ModelService {
    pub fn new(predictor: Predictor<InferenceBackend>) -> Self {
        ModelService {
            predictor: Mutex::new(predictor),
        }
    }
}

impl OutcomeService for ModelService {
    fn predict(&self, table: &Table) -> Result<PredictionTable> {
        let predictor = self
            .predictor
            .lock()
            .map_err(|_| ShelterError::ModelFormat("model lock poisoned".to_string()))?;
        predictor.predict(table)
    }
}

/// Shared state for every request
pub struct AppState {
    pub service: Arc<dyn OutcomeService>,
}

impl AppState {
    pub fn new(service: Arc<dyn OutcomeService>) -> Self {
        AppState { service }
    }
}

/// Serve the prediction API on `addr` until the process is stopped
pub async fn run(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
