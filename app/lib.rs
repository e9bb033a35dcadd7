/*!
This crate serves a trained wayfarer model over http. Every response body is json, and every route is listed by `GET /`.
*/

use self::error::Error;
use anyhow::Result;
use backtrace::Backtrace;
use futures::FutureExt;
use hyper::{
	header,
	service::{make_service_fn, service_fn},
	Body, Method, Request, Response, StatusCode,
};
use std::{
	cell::RefCell, collections::BTreeMap, convert::Infallible, panic::AssertUnwindSafe,
	path::PathBuf, sync::Arc,
};
use wayfarer_core::PredictionService;

pub mod error;
mod health;
mod recommendations;

pub struct Options {
	pub host: std::net::IpAddr,
	pub model: Option<PathBuf>,
	pub port: u16,
}

pub struct Context {
	pub options: Options,
	/// This is `None` when no model could be loaded. The server still starts, and prediction routes respond with 503.
	pub service: Option<Arc<PredictionService>>,
}

async fn handle(request: Request<Body>, context: Arc<Context>) -> Response<Body> {
	let method = request.method().clone();
	let uri = request.uri().clone();
	let path = uri.path();
	let query = uri.query();
	let path_components: Vec<_> = path.split('/').skip(1).collect();
	let search_params: Option<BTreeMap<String, String>> = query.map(|search_params| {
		url::form_urlencoded::parse(search_params.as_bytes())
			.into_owned()
			.collect()
	});
	let result = match (&method, path_components.as_slice()) {
		(&Method::GET, &[""]) => self::health::index(&context, request).await,
		(&Method::GET, &["health"]) => self::health::get(&context, request).await,
		(&Method::GET, &["model-info"]) | (&Method::GET, &["model", "info"]) => {
			self::health::model_info(&context, request).await
		}
		(&Method::POST, &["predict"]) => {
			self::recommendations::predict(&context, request, search_params).await
		}
		(&Method::POST, &["recommendations"]) => {
			self::recommendations::post(&context, request, search_params).await
		}
		(&Method::POST, &["recommendations", "simple"]) => {
			self::recommendations::simple(&context, request, search_params).await
		}
		(&Method::POST, &["recommendations", "batch"]) => {
			self::recommendations::batch(&context, request, search_params).await
		}
		_ => Err(Error::NotFound.into()),
	};
	let response = match result {
		Ok(response) => response,
		Err(error) => error_response(&error),
	};
	log::info!("{} {} {}", method, path, response.status().as_u16());
	response
}

/// Choose a status for a failed request. Errors the handlers do not recognize are internal server errors.
fn error_response(error: &anyhow::Error) -> Response<Body> {
	let status = if let Some(error) = error.downcast_ref::<Error>() {
		match error {
			Error::BadRequest(_) => StatusCode::BAD_REQUEST,
			Error::NotFound => StatusCode::NOT_FOUND,
			Error::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
		}
	} else if let Some(error) = error.downcast_ref::<wayfarer_core::Error>() {
		match error {
			wayfarer_core::Error::MissingFields { .. } => StatusCode::BAD_REQUEST,
			wayfarer_core::Error::NotFitted => StatusCode::SERVICE_UNAVAILABLE,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		}
	} else {
		StatusCode::INTERNAL_SERVER_ERROR
	};
	if status == StatusCode::INTERNAL_SERVER_ERROR {
		log::error!("{:#}", error);
	}
	let body = serde_json::json!({
		"status": "error",
		"message": error.to_string(),
		"predictions": [],
		"timestamp": chrono::Utc::now().to_rfc3339(),
	});
	json_response(status, &body).unwrap_or_else(|_| plain_response(status, "error"))
}

pub(crate) fn json_response<T>(status: StatusCode, value: &T) -> Result<Response<Body>>
where
	T: serde::Serialize,
{
	let body = serde_json::to_vec(value)?;
	let response = Response::builder()
		.status(status)
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(body))?;
	Ok(response)
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<Body> {
	let mut response = Response::new(Body::from(body));
	*response.status_mut() = status;
	response
}

/// Load the model named in the options. A model that fails to load is logged and the server runs without one.
pub fn load_service(options: &Options) -> Option<Arc<PredictionService>> {
	let path = options.model.as_ref()?;
	match PredictionService::load(path) {
		Ok(service) => {
			log::info!("loaded model from {}", path.display());
			Some(Arc::new(service))
		}
		Err(error) => {
			log::error!("{:#}", error);
			None
		}
	}
}

pub fn run(options: Options) -> Result<()> {
	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()?
		.block_on(run_impl(options))
}

async fn run_impl(options: Options) -> Result<()> {
	let service = load_service(&options);
	let context = Arc::new(Context { options, service });
	tokio::task_local! {
		static PANIC_MESSAGE_AND_BACKTRACE: RefCell<Option<(String, Backtrace)>>;
	}
	let hook = std::panic::take_hook();
	std::panic::set_hook(Box::new(|panic_info| {
		let value = (panic_info.to_string(), Backtrace::new());
		PANIC_MESSAGE_AND_BACKTRACE
			.try_with(|panic_message_and_backtrace| {
				panic_message_and_backtrace.borrow_mut().replace(value);
			})
			.ok();
	}));
	let make_service = make_service_fn(|_| {
		let context = context.clone();
		async move {
			Ok::<_, Infallible>(service_fn(move |request: Request<Body>| {
				let method = request.method().to_owned();
				let path = request.uri().path().to_owned();
				let context = context.clone();
				PANIC_MESSAGE_AND_BACKTRACE.scope(RefCell::new(None), async move {
					let response = AssertUnwindSafe(handle(request, context))
						.catch_unwind()
						.await
						.unwrap_or_else(|_| {
							let message =
								PANIC_MESSAGE_AND_BACKTRACE.with(|panic_message_and_backtrace| {
									match panic_message_and_backtrace.borrow().as_ref() {
										Some((message, backtrace)) => {
											log::error!("{}\n{:?}", message, backtrace);
											message.clone()
										}
										None => "internal server error".to_owned(),
									}
								});
							log::info!("{} {} 500", method, path);
							let body = serde_json::json!({
								"status": "error",
								"message": message,
								"predictions": [],
								"timestamp": chrono::Utc::now().to_rfc3339(),
							});
							json_response(StatusCode::INTERNAL_SERVER_ERROR, &body).unwrap_or_else(
								|_| plain_response(StatusCode::INTERNAL_SERVER_ERROR, "error"),
							)
						});
					Ok::<_, Infallible>(response)
				})
			}))
		}
	});
	let addr = std::net::SocketAddr::new(context.options.host, context.options.port);
	let listener = std::net::TcpListener::bind(&addr)?;
	log::info!("serving on {}", addr);
	hyper::Server::from_tcp(listener)?
		.serve(make_service)
		.await?;
	std::panic::set_hook(hook);
	Ok(())
}

#[cfg(test)]
mod test;
