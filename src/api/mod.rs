pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::serving::{ModelHandle, ServingContext};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub models: Arc<ModelHandle>,
}

impl AppState {
    pub fn new(context: ServingContext) -> Self {
        crate::metrics::set_model_loaded(context.is_loaded());
        Self {
            models: Arc::new(ModelHandle::new(context)),
        }
    }
}
