//! Library root for the `content_filter` crate
//! Text classification service: pretrained classifier, token attributions,
//! threshold decision, HTTP front end.

// Core error handling
pub mod api_errors;
pub mod errors;

// Configuration & CLI
pub mod cli;
pub mod config_loader;

// Logging
pub mod log_sink;

// Model loading & inference
pub mod classifier;
pub mod distilbert;
pub mod encoding;
pub mod model_store;

// Attribution
pub mod explainer;

// Filtering & web server interface
pub mod app_state;
pub mod content_filter;
pub mod filterweb;


pub use content_filter::{ContentFilter, DecisionPolicy, FilterVerdict};
pub use errors::{FilterError, FilterResult};
