use crate::{error::Error, json_response, Context};
use anyhow::Result;
use hyper::{Body, Request, Response, StatusCode};
use std::{collections::BTreeMap, sync::Arc};
use wayfarer_core::{predict::DEFAULT_TOP_K, PredictionService};

type Record = serde_json::Map<String, serde_json::Value>;

/// `POST /predict`. `top_k` may be given in the body alongside the record's fields.
pub(crate) async fn predict(
	context: &Context,
	request: Request<Body>,
	search_params: Option<BTreeMap<String, String>>,
) -> Result<Response<Body>> {
	let service = service(context)?;
	let mut record = read_record(request).await?;
	let top_k = match record.remove("top_k") {
		Some(top_k) => Some(parse_top_k(&top_k.to_string())?),
		None => query_top_k(&search_params)?,
	};
	let response = service.predict(&record, top_k)?;
	json_response(StatusCode::OK, &response)
}

/// `POST /recommendations?top_k=N`.
pub(crate) async fn post(
	context: &Context,
	request: Request<Body>,
	search_params: Option<BTreeMap<String, String>>,
) -> Result<Response<Body>> {
	let service = service(context)?;
	let top_k = query_top_k(&search_params)?.unwrap_or(DEFAULT_TOP_K);
	let record = read_record(request).await?;
	let response = service.predict(&record, Some(top_k))?;
	json_response(StatusCode::OK, &response)
}

/// `POST /recommendations/simple`. Only the destination, probability and rank of each prediction are returned.
pub(crate) async fn simple(
	context: &Context,
	request: Request<Body>,
	search_params: Option<BTreeMap<String, String>>,
) -> Result<Response<Body>> {
	let service = service(context)?;
	let top_k = query_top_k(&search_params)?.unwrap_or(DEFAULT_TOP_K);
	let record = read_record(request).await?;
	let response = service.predict(&record, Some(top_k))?;
	let destinations: Vec<serde_json::Value> = response
		.predictions
		.iter()
		.map(|prediction| {
			serde_json::json!({
				"destination": prediction.destination,
				"confidence": prediction.probability,
				"rank": prediction.rank,
			})
		})
		.collect();
	json_response(
		StatusCode::OK,
		&serde_json::json!({
			"status": "success",
			"destinations": destinations,
		}),
	)
}

/// `POST /recommendations/batch`. The body is `{"users": [...]}`, and a failure for one user is reported in that user's result.
pub(crate) async fn batch(
	context: &Context,
	request: Request<Body>,
	search_params: Option<BTreeMap<String, String>>,
) -> Result<Response<Body>> {
	let service = service(context)?;
	let top_k = query_top_k(&search_params)?.unwrap_or(DEFAULT_TOP_K);
	let mut body = read_record(request).await?;
	let users = match body.remove("users") {
		Some(serde_json::Value::Array(users)) if !users.is_empty() => users,
		_ => return Err(Error::BadRequest("No users provided".to_owned()).into()),
	};
	let batch_results: Vec<serde_json::Value> = users
		.into_iter()
		.enumerate()
		.map(|(user_index, user)| {
			let result = match user {
				serde_json::Value::Object(record) => match service.predict(&record, Some(top_k)) {
					Ok(response) => serde_json::to_value(response)
						.unwrap_or_else(|error| error_result(&error.to_string())),
					Err(error) => error_result(&error.to_string()),
				},
				_ => error_result("each user must be a json object"),
			};
			serde_json::json!({
				"user_index": user_index,
				"result": result,
			})
		})
		.collect();
	json_response(
		StatusCode::OK,
		&serde_json::json!({
			"status": "success",
			"batch_results": batch_results,
		}),
	)
}

fn service(context: &Context) -> Result<&Arc<PredictionService>> {
	match &context.service {
		Some(service) if service.is_trained() => Ok(service),
		_ => Err(Error::ServiceUnavailable.into()),
	}
}

fn error_result(message: &str) -> serde_json::Value {
	serde_json::json!({
		"status": "error",
		"message": message,
	})
}

/// Read the request body as a json object. An empty body or an empty object is a bad request.
async fn read_record(request: Request<Body>) -> Result<Record> {
	let data = hyper::body::to_bytes(request.into_body()).await?;
	if data.iter().all(|byte| byte.is_ascii_whitespace()) {
		return Err(no_input());
	}
	let value: serde_json::Value = serde_json::from_slice(&data)
		.map_err(|error| Error::BadRequest(format!("invalid json: {}", error)))?;
	match value {
		serde_json::Value::Object(record) if !record.is_empty() => Ok(record),
		serde_json::Value::Object(_) | serde_json::Value::Null => Err(no_input()),
		_ => Err(Error::BadRequest("the request body must be a json object".to_owned()).into()),
	}
}

fn no_input() -> anyhow::Error {
	Error::BadRequest("No input data provided".to_owned()).into()
}

fn query_top_k(search_params: &Option<BTreeMap<String, String>>) -> Result<Option<usize>> {
	search_params
		.as_ref()
		.and_then(|search_params| search_params.get("top_k"))
		.map(|top_k| parse_top_k(top_k))
		.transpose()
}

fn parse_top_k(value: &str) -> Result<usize> {
	value
		.trim_matches('"')
		.parse()
		.map_err(|_| Error::BadRequest(format!("top_k must be a positive integer, got {}", value)).into())
}
