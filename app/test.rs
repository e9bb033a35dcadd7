use super::{handle, Context, Options};
use hyper::{Body, Method, Request, StatusCode};
use std::{fmt::Write, path::PathBuf, sync::Arc};
use wayfarer_core::{
	config::{GridOptions, SearchOptions, TrainingOptions},
	PredictionService,
};

fn context(service: Option<PredictionService>) -> Arc<Context> {
	Arc::new(Context {
		options: Options {
			host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
			model: None,
			port: 8080,
		},
		service: service.map(Arc::new),
	})
}

/// Send a request through the router and return the status with the parsed json body.
fn send(
	context: &Arc<Context>,
	method: Method,
	uri: &str,
	body: &str,
) -> (StatusCode, serde_json::Value) {
	let request = Request::builder()
		.method(method)
		.uri(uri)
		.body(Body::from(body.to_owned()))
		.unwrap();
	let runtime = tokio::runtime::Builder::new_current_thread()
		.build()
		.unwrap();
	runtime.block_on(async {
		let response = handle(request, context.clone()).await;
		let status = response.status();
		let data = hyper::body::to_bytes(response.into_body()).await.unwrap();
		(status, serde_json::from_slice(&data).unwrap())
	})
}

fn trained_service() -> PredictionService {
	let dir = std::env::temp_dir().join(format!("wayfarer_app_test_{}", std::process::id()));
	std::fs::create_dir_all(&dir).unwrap();
	let mut csv = String::from("Trip ID,Destination,Start date,End date,Duration (days),Traveler name,Traveler age,Traveler gender,Traveler nationality,Accommodation type,Accommodation cost,Transportation type,Transportation cost\n");
	for i in 0..60 {
		let (destination, duration, age, gender, nationality, accommodation, cost) = match i % 2 {
			0 => ("Paris, France", 7, 28 + i % 6, "Female", "American", "Hotel", 1200 + i * 10),
			_ => ("Bali, Indonesia", 14, 45 + i % 9, "Male", "Australian", "Resort", 2400 + i * 15),
		};
		writeln!(
			csv,
			"{},\"{}\",{:02}/{:02}/2022,,{},Traveler {},{},{},{},{},{},Flight,{}",
			i + 1,
			destination,
			i % 12 + 1,
			i % 28 + 1,
			duration,
			i,
			age,
			gender,
			nationality,
			accommodation,
			cost,
			cost / 2
		)
		.unwrap();
	}
	let path: PathBuf = dir.join("trips.csv");
	std::fs::write(&path, csv).unwrap();
	let options = TrainingOptions {
		search: SearchOptions {
			n_iter: 1,
			n_folds: 2,
			grid: GridOptions {
				n_estimators: vec![10],
				learning_rate: vec![0.3],
				max_depth: vec![3],
			},
		},
		..Default::default()
	};
	let (model, _) = wayfarer_core::train(&path, options, None).unwrap();
	std::fs::remove_dir_all(dir).ok();
	PredictionService::from_model(model)
}

const TRAVELER: &str = r#"{
	"Duration (days)": 7,
	"Traveler age": 30,
	"Traveler gender": "Female",
	"Traveler nationality": "American",
	"Accommodation type": "Hotel",
	"Accommodation cost": 1300,
	"Transportation type": "Flight",
	"Transportation cost": 650
}"#;

#[test]
fn test_without_a_model() {
	let context = context(None);
	let (status, body) = send(&context, Method::GET, "/", "");
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["service"], "wayfarer");
	let (status, body) = send(&context, Method::GET, "/health", "");
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body["status"], "error");
	let (status, body) = send(&context, Method::GET, "/model/info", "");
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body["status"], "not_ready");
	assert_eq!(body["model_loaded"], false);
	let (status, body) = send(&context, Method::POST, "/predict", TRAVELER);
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body["predictions"], serde_json::json!([]));
	let (status, _) = send(&context, Method::GET, "/nowhere", "");
	assert_eq!(status, StatusCode::NOT_FOUND);
	let (status, _) = send(&context, Method::GET, "/predict", "");
	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn test_routes() {
	let context = context(Some(trained_service()));

	let (status, body) = send(&context, Method::GET, "/health", "");
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "healthy");
	assert_eq!(body["model_loaded"], true);

	let (status, body) = send(&context, Method::GET, "/model-info", "");
	assert_eq!(status, StatusCode::OK);
	assert_eq!(
		body["model_info"]["destinations"],
		serde_json::json!(["Bali, Indonesia", "Paris, France"])
	);

	let (status, body) = send(&context, Method::POST, "/predict", TRAVELER);
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "success");
	assert_eq!(body["predictions"].as_array().unwrap().len(), 2);
	assert_eq!(body["predictions"][0]["rank"], 1);

	let (status, body) = send(&context, Method::POST, "/recommendations?top_k=1", TRAVELER);
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["predictions"].as_array().unwrap().len(), 1);

	let (status, body) = send(&context, Method::POST, "/recommendations/simple", TRAVELER);
	assert_eq!(status, StatusCode::OK);
	let destination = &body["destinations"][0];
	assert_eq!(destination["rank"], 1);
	assert!(destination["confidence"].as_f64().unwrap() > 0.0);
	assert!(destination.get("explanation").is_none());

	let batch = format!(r#"{{"users": [{}, {{"Traveler age": 30}}]}}"#, TRAVELER);
	let (status, body) = send(&context, Method::POST, "/recommendations/batch", &batch);
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["batch_results"][0]["user_index"], 0);
	assert_eq!(body["batch_results"][0]["result"]["status"], "success");
	assert_eq!(body["batch_results"][1]["result"]["status"], "error");

	let (status, body) = send(&context, Method::POST, "/recommendations/batch", r#"{"users": []}"#);
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["message"], "No users provided");

	let (status, body) = send(&context, Method::POST, "/predict", "");
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["message"], "No input data provided");
	let (status, _) = send(&context, Method::POST, "/predict", "{not json");
	assert_eq!(status, StatusCode::BAD_REQUEST);
	let (status, _) = send(&context, Method::POST, "/recommendations?top_k=many", TRAVELER);
	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, body) = send(&context, Method::POST, "/predict", r#"{"Traveler age": 30}"#);
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["message"]
		.as_str()
		.unwrap()
		.starts_with("Missing required fields"));
}
