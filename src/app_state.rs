use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::content_filter::ContentFilter;

/// Descriptive facts about the loaded model, served by the status route
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub fingerprint: Option<String>,
    pub labels: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

/// Shared, read-only state handed to every request
pub struct AppState {
    pub filter: Arc<ContentFilter>,
    pub model: ModelInfo,
}

impl AppState {
    pub fn new(filter: ContentFilter, fingerprint: Option<String>) -> Self {
        let classifier = filter.classifier();
        let model = ModelInfo {
            model_id: classifier.model_id().to_string(),
            fingerprint,
            labels: classifier.labels().to_vec(),
            loaded_at: Utc::now(),
        };

        Self {
            filter: Arc::new(filter),
            model,
        }
    }

    pub fn status(&self) -> serde_json::Value {
        let policy = self.filter.policy();
        serde_json::json!({
            "model": self.model,
            "block_threshold": policy.block_threshold,
            "blocked_label": self.model.labels.get(policy.blocked_index),
            "explainer": self.filter.explainer_method().as_str(),
        })
    }
}
