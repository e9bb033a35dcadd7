use std::path::PathBuf;

/// The failures callers are expected to tell apart. They travel inside `anyhow::Error` and are recovered with `downcast_ref`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("training data file '{}' not found", path.display())]
	DataNotFound { path: PathBuf },
	#[error("Model not trained. Please train the model first.")]
	NotFitted,
	#[error("Missing required fields: {}", fields.join(", "))]
	MissingFields { fields: Vec<String> },
	#[error("failed to load model from {}: {reason}", path.display())]
	ModelLoad { path: PathBuf, reason: String },
	#[error("the explainer is unavailable")]
	ExplainerUnavailable,
}
