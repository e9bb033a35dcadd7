use crate::{json_response, Context};
use anyhow::Result;
use hyper::{Body, Request, Response, StatusCode};

pub const SERVICE_NAME: &str = "wayfarer";

pub(crate) async fn index(_context: &Context, _request: Request<Body>) -> Result<Response<Body>> {
	json_response(
		StatusCode::OK,
		&serde_json::json!({
			"service": SERVICE_NAME,
			"description": "Travel destination predictions with SHAP explanations",
			"endpoints": [
				"GET /health",
				"GET /model-info",
				"GET /model/info",
				"POST /predict",
				"POST /recommendations",
				"POST /recommendations/simple",
				"POST /recommendations/batch",
			],
		}),
	)
}

pub(crate) async fn get(context: &Context, _request: Request<Body>) -> Result<Response<Body>> {
	match &context.service {
		Some(service) if service.is_trained() => json_response(
			StatusCode::OK,
			&serde_json::json!({
				"status": "healthy",
				"timestamp": chrono::Utc::now().to_rfc3339(),
				"model_loaded": true,
				"service": SERVICE_NAME,
			}),
		),
		_ => json_response(
			StatusCode::SERVICE_UNAVAILABLE,
			&serde_json::json!({
				"status": "error",
				"message": "Model not loaded",
			}),
		),
	}
}

pub(crate) async fn model_info(
	context: &Context,
	_request: Request<Body>,
) -> Result<Response<Body>> {
	let service = match &context.service {
		Some(service) if service.is_trained() => service,
		_ => {
			return json_response(
				StatusCode::SERVICE_UNAVAILABLE,
				&serde_json::json!({
					"status": "not_ready",
					"model_loaded": false,
				}),
			)
		}
	};
	let model_info = service.model_info()?;
	json_response(
		StatusCode::OK,
		&serde_json::json!({
			"status": "success",
			"model_loaded": true,
			"model_info": model_info,
			"supported_fields": wayfarer_core::predict::REQUIRED_FIELDS,
			"data_format_example": wayfarer_core::predict::sample_input(),
		}),
	)
}
