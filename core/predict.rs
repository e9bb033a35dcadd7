/*!
This module serves predictions from a trained [`Model`](../model/struct.Model.html). A [`PredictionService`](struct.PredictionService.html) is built once and shared read only, and each call to `predict` ranks the destinations for one traveler and explains each of them.
*/

use crate::{
	explain::{Narrator, ShapDetails},
	model::Model,
	round,
	search::HyperParameters,
	Error,
};
use anyhow::Result;
use ndarray::prelude::*;
use serde::ser::SerializeMap;
use std::{cmp::Ordering, path::Path};
use wayfarer_dataframe::DataFrame;
use wayfarer_features::{
	ACCOMMODATION_COST, ACCOMMODATION_TYPE, DURATION, RAW_NUMBER_COLUMNS, TRANSPORTATION_COST,
	TRANSPORTATION_TYPE, TRAVELER_AGE, TRAVELER_DOB, TRAVELER_GENDER, TRAVELER_NATIONALITY,
};

/// The fields every record must have. A record must also have either `Traveler DOB` or `Traveler age`.
pub const REQUIRED_FIELDS: &[&str] = &[
	DURATION,
	TRAVELER_GENDER,
	TRAVELER_NATIONALITY,
	ACCOMMODATION_TYPE,
	ACCOMMODATION_COST,
	TRANSPORTATION_TYPE,
	TRANSPORTATION_COST,
];

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Default)]
pub struct PredictionService {
	model: Option<Model>,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct PredictionResponse {
	pub status: String,
	pub predictions: Vec<Prediction>,
	pub model_info: ResponseModelInfo,
	pub timestamp: String,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct ResponseModelInfo {
	pub name: String,
	pub test_accuracy: f32,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct Prediction {
	pub rank: usize,
	pub destination: String,
	/// Rounded to four decimal places.
	pub probability: f32,
	pub confidence: Confidence,
	pub explanation: String,
	/// Serialized as an empty object when the explainer is unavailable.
	#[serde(serialize_with = "serialize_shap_details")]
	pub shap_details: Option<ShapDetails>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Confidence {
	High,
	Medium,
	Low,
}

impl Confidence {
	pub fn of(probability: f32) -> Self {
		if probability > 0.7 {
			Confidence::High
		} else if probability > 0.4 {
			Confidence::Medium
		} else {
			Confidence::Low
		}
	}
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
	pub model_name: String,
	pub test_accuracy: f32,
	pub train_accuracy: f32,
	pub best_parameters: HyperParameters,
	pub feature_count: usize,
	pub unique_destinations: usize,
	pub destinations: Vec<String>,
	pub features: Vec<String>,
	pub is_trained: bool,
	pub shap_available: bool,
	pub full_test_samples: usize,
	pub shap_test_samples: usize,
}

fn serialize_shap_details<S>(value: &Option<ShapDetails>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: serde::Serializer,
{
	match value {
		Some(value) => serde::Serialize::serialize(value, serializer),
		None => serializer.serialize_map(Some(0))?.end(),
	}
}

impl PredictionService {
	/// A service with no model. Every prediction fails with `Error::NotFitted` until a model is loaded.
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_model(model: Model) -> Self {
		Self { model: Some(model) }
	}

	/// Build a service from the model file at `path`.
	pub fn load(path: &Path) -> Result<Self> {
		Ok(Self::from_model(Model::from_path(path)?))
	}

	/// Replace the model with the one at `path`. The current model is kept if loading fails.
	pub fn load_model(&mut self, path: &Path) -> Result<()> {
		let model = Model::from_path(path)?;
		self.model = Some(model);
		Ok(())
	}

	pub fn is_trained(&self) -> bool {
		self.model.as_ref().map(|model| model.is_trained).unwrap_or(false)
	}

	pub fn model(&self) -> Option<&Model> {
		self.model.as_ref()
	}

	fn trained_model(&self) -> Result<&Model> {
		Ok(self
			.model
			.as_ref()
			.filter(|model| model.is_trained)
			.ok_or(Error::NotFitted)?)
	}

	/**
	Rank the destinations for the traveler described by `record`, a json object of raw trip fields. `top_k` defaults to 5 and is clamped to the number of destinations. Ties in probability are ranked in class order.
	*/
	pub fn predict(
		&self,
		record: &serde_json::Map<String, serde_json::Value>,
		top_k: Option<usize>,
	) -> Result<PredictionResponse> {
		let model = self.trained_model()?;
		validate_record(record)?;
		let data = DataFrame::from_records(&[record.clone()], RAW_NUMBER_COLUMNS);
		let today = chrono::Local::now().naive_local().date();
		let features = model.transformer.transform(&data, today);
		let encoded = model.registry.encode(&features)?;
		let probabilities = model.classifier.predict(encoded.view());
		let probabilities = probabilities.row(0);
		let example = encoded.row(0).to_vec();

		let n_classes = probabilities.len();
		let top_k = top_k.unwrap_or(DEFAULT_TOP_K).max(1).min(n_classes);
		let narrator = Narrator::new(&model.stats, n_classes);
		let predictions = rank_classes(probabilities)
			.into_iter()
			.take(top_k)
			.enumerate()
			.map(|(rank, class_index)| -> Result<Prediction> {
				let destination = model
					.registry
					.decode_target(class_index)?
					.unwrap_or_default()
					.to_owned();
				let probability = probabilities[class_index];
				let shap_details =
					match explain(model, &example, &features, class_index, probability) {
						Ok(shap_details) => Some(shap_details),
						Err(error) => {
							log::debug!("no attributions for {}: {}", destination, error);
							None
						}
					};
				let explanation = narrator.explain(&destination, shap_details.as_ref());
				Ok(Prediction {
					rank: rank + 1,
					destination,
					probability: round(probability, 4),
					confidence: Confidence::of(probability),
					explanation,
					shap_details,
				})
			})
			.collect::<Result<Vec<_>>>()?;

		Ok(PredictionResponse {
			status: "success".to_owned(),
			predictions,
			model_info: ResponseModelInfo {
				name: model.summary.model_name.clone(),
				test_accuracy: model.summary.test_accuracy,
			},
			timestamp: chrono::Utc::now().to_rfc3339(),
		})
	}

	pub fn model_info(&self) -> Result<ModelInfo> {
		let model = self.trained_model()?;
		let destinations = model.destinations().to_vec();
		let features = model.registry.feature_names.clone();
		Ok(ModelInfo {
			model_name: model.summary.model_name.clone(),
			test_accuracy: model.summary.test_accuracy,
			train_accuracy: model.summary.train_accuracy,
			best_parameters: model.summary.best_parameters.clone(),
			feature_count: features.len(),
			unique_destinations: destinations.len(),
			destinations,
			features,
			is_trained: model.is_trained,
			shap_available: model.explainer.is_some(),
			full_test_samples: model.summary.full_test_samples,
			shap_test_samples: model.summary.shap_test_samples,
		})
	}
}

/// A record that exercises every field the model uses.
pub fn sample_input() -> serde_json::Map<String, serde_json::Value> {
	let sample = serde_json::json!({
		"Traveler age": 32,
		"Destination type": "City",
		"Accommodation type": "Hotel",
		"Accommodation cost": 1200,
		"Transportation type": "Flight",
		"Transportation cost": 800,
		"Duration (days)": 7,
		"Traveler gender": "Female",
		"Traveler nationality": "American",
	});
	match sample {
		serde_json::Value::Object(sample) => sample,
		_ => unreachable!(),
	}
}

/// Check that `record` has every required field. Fields that are null count as absent.
pub fn validate_record(record: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
	let is_present = |field: &str| record.get(field).map(|value| !value.is_null()).unwrap_or(false);
	let mut missing: Vec<String> = REQUIRED_FIELDS
		.iter()
		.filter(|field| !is_present(field))
		.map(|field| (*field).to_owned())
		.collect();
	if !is_present(TRAVELER_DOB) && !is_present(TRAVELER_AGE) {
		missing.push(format!("{} or {}", TRAVELER_DOB, TRAVELER_AGE));
	}
	if missing.is_empty() {
		Ok(())
	} else {
		Err(Error::MissingFields { fields: missing }.into())
	}
}

/// Class indices ordered by probability, highest first. The sort is stable, so equal probabilities keep class order.
fn rank_classes(probabilities: ArrayView1<f32>) -> Vec<usize> {
	let mut classes: Vec<usize> = (0..probabilities.len()).collect();
	classes.sort_by(|a, b| {
		probabilities[*b]
			.partial_cmp(&probabilities[*a])
			.unwrap_or(Ordering::Equal)
	});
	classes
}

fn explain(
	model: &Model,
	example: &[f32],
	features: &DataFrame,
	class_index: usize,
	probability: f32,
) -> Result<ShapDetails> {
	let explainer = model.explainer.as_ref().ok_or(Error::ExplainerUnavailable)?;
	Ok(explainer.shap_details(
		&model.classifier,
		&model.registry.feature_names,
		example,
		features,
		0,
		class_index,
		probability,
	))
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_validate_record() {
		assert!(validate_record(&sample_input()).is_ok());
		let mut record = sample_input();
		record.remove(TRAVELER_GENDER);
		record.remove(TRAVELER_AGE);
		record.insert(
			ACCOMMODATION_COST.to_owned(),
			serde_json::Value::Null,
		);
		let error = validate_record(&record).unwrap_err();
		assert_eq!(
			error.to_string(),
			"Missing required fields: Traveler gender, Accommodation cost, Traveler DOB or Traveler age"
		);
		record.insert(
			TRAVELER_DOB.to_owned(),
			serde_json::Value::String("04/12/1990".to_owned()),
		);
		let error = validate_record(&record).unwrap_err();
		match error.downcast_ref::<Error>() {
			Some(Error::MissingFields { fields }) => assert_eq!(fields.len(), 2),
			_ => panic!("expected missing fields"),
		}
	}

	#[test]
	fn test_rank_classes_is_stable() {
		let probabilities = arr1(&[0.2, 0.3, 0.2, 0.3]);
		assert_eq!(rank_classes(probabilities.view()), vec![1, 3, 0, 2]);
	}

	#[test]
	fn test_confidence() {
		assert_eq!(Confidence::of(0.71), Confidence::High);
		assert_eq!(Confidence::of(0.7), Confidence::Medium);
		assert_eq!(Confidence::of(0.41), Confidence::Medium);
		assert_eq!(Confidence::of(0.4), Confidence::Low);
	}

	#[test]
	fn test_untrained_service() {
		let service = PredictionService::new();
		assert!(!service.is_trained());
		let error = service.predict(&sample_input(), None).unwrap_err();
		assert_eq!(
			error.to_string(),
			"Model not trained. Please train the model first."
		);
		assert!(service.model_info().is_err());
		let error = PredictionService::load(Path::new("/nonexistent/model.wayfarer")).unwrap_err();
		assert!(matches!(
			error.downcast_ref::<Error>(),
			Some(Error::ModelLoad { .. })
		));
	}
}
