/// Errors a handler returns to choose the status of its response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	BadRequest(String),
	#[error("not found")]
	NotFound,
	#[error("Model not loaded")]
	ServiceUnavailable,
}
