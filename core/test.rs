use crate::{
	config::{GridOptions, SearchOptions, TrainingOptions},
	predict::sample_input,
	train, Error, PredictionService,
};
use chrono::{Duration, NaiveDate};
use std::{
	fmt::Write,
	path::{Path, PathBuf},
};
use wayfarer_dataframe::DataFrame;
use wayfarer_features::RAW_NUMBER_COLUMNS;

/// Write a csv of trips to three destinations, each with its own typical traveler, and return its path.
fn write_trips(dir: &Path) -> PathBuf {
	let mut csv = String::from("Trip ID,Destination,Start date,End date,Duration (days),Traveler name,Traveler age,Traveler gender,Traveler nationality,Accommodation type,Accommodation cost,Transportation type,Transportation cost\n");
	let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
	for i in 0..120 {
		let date = start + Duration::days(i * 3);
		let (destination, duration, age, gender, nationality, accommodation, accommodation_cost, transportation, transportation_cost) =
			match i % 3 {
				0 => ("Paris, France", 7, 28 + i % 8, "Female", "American", "Hotel", 1200 + (i % 5) * 40, "Flight", 800 + (i % 4) * 30),
				1 => ("Tokyo, Japan", 10, 40 + i % 10, "Male", "Canadian", "Airbnb", 900 + (i % 6) * 25, "Train", 300 + (i % 3) * 20),
				_ => ("Bali, Indonesia", 14, 22 + i % 5, "Male", "Australian", "Resort", 2000 + (i % 7) * 50, "Flight", 1100 + (i % 5) * 45),
			};
		writeln!(
			csv,
			"{},\"{}\",{},,{},Traveler {},{},{},{},{},\"${},{:03}\",{},{}",
			i + 1,
			destination,
			date.format("%m/%d/%Y"),
			duration,
			i,
			age,
			gender,
			nationality,
			accommodation,
			accommodation_cost / 1000,
			accommodation_cost % 1000,
			transportation,
			transportation_cost
		)
		.unwrap();
	}
	// Rows without a "city, country" destination are dropped.
	csv.push_str("121,Paris,03/01/2023,,5,Traveler X,30,Female,American,Hotel,1000,Flight,700\n");
	csv.push_str("122,,03/02/2023,,5,Traveler Y,30,Female,American,Hotel,1000,Flight,700\n");
	std::fs::create_dir_all(dir).unwrap();
	let path = dir.join("trips.csv");
	std::fs::write(&path, csv).unwrap();
	path
}

fn temp_dir(name: &str) -> PathBuf {
	std::env::temp_dir().join(format!("wayfarer_test_{}_{}", name, std::process::id()))
}

fn options() -> TrainingOptions {
	TrainingOptions {
		search: SearchOptions {
			n_iter: 2,
			n_folds: 2,
			grid: GridOptions {
				n_estimators: vec![10, 20],
				learning_rate: vec![0.1, 0.3],
				max_depth: vec![3],
			},
		},
		..Default::default()
	}
}

fn request() -> serde_json::Map<String, serde_json::Value> {
	let request = serde_json::json!({
		"Duration (days)": 7,
		"Traveler age": 28,
		"Traveler gender": "Female",
		"Traveler nationality": "American",
		"Accommodation type": "Hotel",
		"Accommodation cost": 1200,
		"Transportation type": "Flight",
		"Transportation cost": 800,
	});
	request.as_object().unwrap().clone()
}

#[test]
fn test_train_then_predict() {
	let dir = temp_dir("predict");
	let path = write_trips(&dir);
	let (model, report) = train(&path, options(), None).unwrap();
	assert_eq!(report.status, "success");
	assert_eq!(report.model_name, "GradientBoosted_Tuned_SMOTE");
	assert_eq!(report.unique_destinations, 3);
	assert_eq!(report.feature_count, 13);
	assert_eq!(report.training_samples, 96);
	assert_eq!(report.test_samples, 24);
	assert_eq!(report.test_samples_shap, 24);
	assert_eq!(report.mean_abs_shap.len(), 13);
	assert!(report.bias.grouping("Traveler gender").is_some());

	// The confusion matrix covers the whole test set and agrees with the test accuracy.
	let trace: u64 = (0..3).map(|i| report.confusion_matrix[i][i]).sum();
	let total: u64 = report.confusion_matrix.iter().flatten().sum();
	assert_eq!(total, 24);
	assert!((trace as f32 / total as f32 - report.test_accuracy).abs() < 1e-4);

	let service = PredictionService::from_model(model);
	let response = service.predict(&request(), Some(3)).unwrap();
	assert_eq!(response.status, "success");
	assert_eq!(response.predictions.len(), 3);
	for (index, prediction) in response.predictions.iter().enumerate() {
		assert_eq!(prediction.rank, index + 1);
		assert!(!prediction.explanation.is_empty());
		assert!(prediction.shap_details.is_some());
	}
	for pair in response.predictions.windows(2) {
		assert!(pair[0].probability >= pair[1].probability);
	}
	assert_eq!(response.predictions[0].destination, "Paris, France");

	// The probabilities over every destination sum to one.
	let model = service.model().unwrap();
	let data = DataFrame::from_records(&[request()], RAW_NUMBER_COLUMNS);
	let features = model
		.transformer
		.transform(&data, chrono::Local::now().naive_local().date());
	let probabilities = model
		.classifier
		.predict(model.registry.encode(&features).unwrap().view());
	assert!((probabilities.sum() - 1.0).abs() < 1e-6);

	// Predicting twice gives the same ranking.
	let again = service.predict(&request(), Some(3)).unwrap();
	assert_eq!(
		serde_json::to_value(&response.predictions).unwrap(),
		serde_json::to_value(&again.predictions).unwrap()
	);

	// top_k is clamped to the number of destinations.
	let response = service.predict(&sample_input(), Some(10)).unwrap();
	assert_eq!(response.predictions.len(), 3);

	let info = service.model_info().unwrap();
	assert_eq!(
		info.destinations,
		vec!["Bali, Indonesia", "Paris, France", "Tokyo, Japan"]
	);
	assert!(info.shap_available);
	assert_eq!(info.full_test_samples, 24);
	std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_missing_field() {
	let dir = temp_dir("missing");
	let path = write_trips(&dir);
	let (model, _) = train(&path, options(), None).unwrap();
	let service = PredictionService::from_model(model);
	let mut record = request();
	record.remove("Transportation type");
	let error = service.predict(&record, None).unwrap_err();
	assert!(matches!(
		error.downcast_ref::<Error>(),
		Some(Error::MissingFields { .. })
	));
	assert!(error.to_string().contains("Transportation type"));
	std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_persisted_model_predicts_the_same() {
	let dir = temp_dir("persist");
	let path = write_trips(&dir);
	let model_path = dir.join("trips.wayfarer");
	let (model, _) = train(&path, options(), Some(model_path.as_path())).unwrap();
	let in_memory = PredictionService::from_model(model);
	let loaded = PredictionService::load(&model_path).unwrap();
	assert!(loaded.is_trained());
	let expected = in_memory.predict(&request(), None).unwrap();
	let actual = loaded.predict(&request(), None).unwrap();
	assert_eq!(
		serde_json::to_value(&expected.predictions).unwrap(),
		serde_json::to_value(&actual.predictions).unwrap()
	);

	let mut service = PredictionService::new();
	assert!(service.load_model(&dir.join("missing.wayfarer")).is_err());
	assert!(!service.is_trained());
	std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_predict_without_an_explainer() {
	let dir = temp_dir("no_explainer");
	let path = write_trips(&dir);
	let (mut model, _) = train(&path, options(), None).unwrap();
	model.explainer = None;
	let service = PredictionService::from_model(model);
	let response = service.predict(&request(), Some(3)).unwrap();
	assert_eq!(response.status, "success");
	assert_eq!(response.predictions.len(), 3);
	for prediction in response.predictions.iter() {
		assert!(prediction.explanation.starts_with("🎯"));
		assert!(prediction.shap_details.is_none());
		let value = serde_json::to_value(prediction).unwrap();
		assert_eq!(value["shap_details"], serde_json::json!({}));
	}
	std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_predict_unseen_categories() {
	let dir = temp_dir("unseen");
	let path = write_trips(&dir);
	let (model, _) = train(&path, options(), None).unwrap();
	let service = PredictionService::from_model(model);
	let mut record = request();
	record.insert("Traveler nationality".to_owned(), "Martian".into());
	record.insert("Accommodation type".to_owned(), "Treehouse".into());
	record.insert("Transportation type".to_owned(), "Hot air balloon".into());
	let response = service.predict(&record, Some(3)).unwrap();
	assert_eq!(response.status, "success");
	assert_eq!(response.predictions.len(), 3);
	for (index, prediction) in response.predictions.iter().enumerate() {
		assert_eq!(prediction.rank, index + 1);
		assert!(prediction.probability.is_finite());
		assert!(!prediction.explanation.is_empty());
	}
	for pair in response.predictions.windows(2) {
		assert!(pair[0].probability >= pair[1].probability);
	}

	let model = service.model().unwrap();
	let data = DataFrame::from_records(&[record], RAW_NUMBER_COLUMNS);
	let features = model
		.transformer
		.transform(&data, chrono::Local::now().naive_local().date());
	let probabilities = model
		.classifier
		.predict(model.registry.encode(&features).unwrap().view());
	assert!(probabilities.iter().all(|probability| probability.is_finite()));
	assert!((probabilities.sum() - 1.0).abs() < 1e-6);
	std::fs::remove_dir_all(dir).ok();
}
