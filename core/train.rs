/*!
This module trains a wayfarer model. [`TrainingPipeline`](struct.TrainingPipeline.html) runs the stages in order and refuses to run a stage before the ones it depends on:

| stage | method |
|---|---|
| Unfitted | `TrainingPipeline::new` |
| DataLoaded | `load_data` |
| Split | `split` |
| FeaturesPrepared | `prepare_features` |
| Trained | `train` |
| Persisted | `persist` |

[`train`](fn.train.html) runs every stage.
*/

use crate::{
	bias::BiasReport,
	config::TrainingOptions,
	explain::Explainer,
	load::{chronological_split, clean_destinations, load_trips},
	model::{Model, ModelSummary},
	round,
	search::{accuracy, fit_resampled, randomized_search, HyperParameters, SearchOutput},
	stats::DatasetStats,
};
use anyhow::{format_err, Result};
use chrono::NaiveDate;
use ndarray::prelude::*;
use rand::{seq::index::sample, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::{collections::BTreeMap, fmt, path::Path};
use wayfarer_dataframe::DataFrame;
use wayfarer_features::{text_values, EncoderRegistry, FeatureTransformer, DESTINATION};
use wayfarer_metrics::{
	argmax, ClassificationMetrics, ClassificationReport, Mean, StreamingMetric,
};

pub const MODEL_NAME: &str = "GradientBoosted_Tuned_SMOTE";

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Stage {
	Unfitted,
	DataLoaded,
	Split,
	FeaturesPrepared,
	Trained,
	Persisted,
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let name = match self {
			Stage::Unfitted => "unfitted",
			Stage::DataLoaded => "data loaded",
			Stage::Split => "split",
			Stage::FeaturesPrepared => "features prepared",
			Stage::Trained => "trained",
			Stage::Persisted => "persisted",
		};
		write!(f, "{}", name)
	}
}

enum State {
	Unfitted,
	DataLoaded(DataFrame),
	Split(SplitData),
	FeaturesPrepared(Box<PreparedFeatures>),
	Trained(Box<TrainOutput>),
	Persisted(Box<TrainOutput>),
}

struct SplitData {
	train: DataFrame,
	test: DataFrame,
}

/// The encoded training and test sets. The test set is kept whole for evaluation, and `shap_rows` indexes the subsample SHAP values are computed for.
struct PreparedFeatures {
	transformer: FeatureTransformer,
	registry: EncoderRegistry,
	stats: DatasetStats,
	train_features: Array2<f32>,
	train_labels: Vec<usize>,
	/// The transformed, unencoded test set.
	test_frame: DataFrame,
	test_features: Array2<f32>,
	test_labels: Vec<usize>,
	shap_rows: Vec<usize>,
	background_pool: Array2<f32>,
}

struct TrainOutput {
	model: Model,
	report: TrainReport,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TrainReport {
	pub status: String,
	pub model_name: String,
	pub test_accuracy: f32,
	pub train_accuracy: f32,
	pub best_parameters: HyperParameters,
	pub training_samples: usize,
	pub test_samples: usize,
	pub test_samples_shap: usize,
	pub unique_destinations: usize,
	pub feature_count: usize,
	pub classification_report: ClassificationReport,
	/// Rows are true destinations and columns are predicted destinations, both in class order.
	pub confusion_matrix: Vec<Vec<u64>>,
	pub search: SearchOutput,
	pub bias: BiasReport,
	/// The mean absolute SHAP value of each feature over the SHAP subsample, for the predicted class. Empty when the explainer is unavailable.
	pub mean_abs_shap: BTreeMap<String, f32>,
	pub training_timestamp: String,
}

pub struct TrainingPipeline {
	options: TrainingOptions,
	today: NaiveDate,
	state: State,
}

impl TrainingPipeline {
	pub fn new(options: TrainingOptions) -> Self {
		Self {
			options,
			today: chrono::Local::now().naive_local().date(),
			state: State::Unfitted,
		}
	}

	/// Compute ages against `today` instead of the current date.
	pub fn with_today(mut self, today: NaiveDate) -> Self {
		self.today = today;
		self
	}

	pub fn stage(&self) -> Stage {
		match self.state {
			State::Unfitted => Stage::Unfitted,
			State::DataLoaded(_) => Stage::DataLoaded,
			State::Split(_) => Stage::Split,
			State::FeaturesPrepared(_) => Stage::FeaturesPrepared,
			State::Trained(_) => Stage::Trained,
			State::Persisted(_) => Stage::Persisted,
		}
	}

	fn out_of_order(&self, method: &str, expected: Stage) -> anyhow::Error {
		format_err!(
			"cannot {} a training pipeline that is {}, it must be {}",
			method,
			self.stage(),
			expected
		)
	}

	/// Load the trips at `path` and clean their destinations.
	pub fn load_data(&mut self, path: &Path) -> Result<()> {
		if self.stage() != Stage::Unfitted {
			return Err(self.out_of_order("load data into", Stage::Unfitted));
		}
		log::info!("loading trips from {}", path.display());
		let mut data = load_trips(path)?;
		let n_loaded = data.nrows();
		let n_dropped = clean_destinations(&mut data)?;
		log::info!(
			"loaded {} trips, dropped {} without a \"city, country\" destination",
			n_loaded,
			n_dropped
		);
		if data.nrows() == 0 {
			return Err(format_err!("no trips remain after cleaning the destinations"));
		}
		self.state = State::DataLoaded(data);
		Ok(())
	}

	/// Split the trips chronologically into a training and a test set.
	pub fn split(&mut self) -> Result<()> {
		let data = match &self.state {
			State::DataLoaded(data) => data,
			_ => return Err(self.out_of_order("split", Stage::DataLoaded)),
		};
		let split = chronological_split(data, self.options.test_fraction)?;
		if split.n_dropped > 0 {
			log::warn!(
				"dropped {} trips whose start date could not be parsed",
				split.n_dropped
			);
		}
		if split.train.nrows() == 0 || split.test.nrows() == 0 {
			return Err(format_err!(
				"splitting {} trips gave {} training and {} test trips",
				split.train.nrows() + split.test.nrows(),
				split.train.nrows(),
				split.test.nrows()
			));
		}
		log::info!(
			"split into {} training and {} test trips, the test set starts on {}",
			split.train.nrows(),
			split.test.nrows(),
			split
				.boundary
				.map(|date| date.to_string())
				.unwrap_or_default()
		);
		self.state = State::Split(SplitData {
			train: split.train,
			test: split.test,
		});
		Ok(())
	}

	/// Compute the dataset statistics, fit the encoders on the training set, and encode both sets.
	pub fn prepare_features(&mut self) -> Result<()> {
		let SplitData { train, test } = match &self.state {
			State::Split(split) => split,
			_ => return Err(self.out_of_order("prepare features for", Stage::Split)),
		};
		let options = &self.options;
		let mut rng = Xoshiro256Plus::seed_from_u64(options.seed);

		let stats = DatasetStats::compute(train).unwrap_or_else(|error| {
			log::warn!("failed to compute the dataset statistics: {}", error);
			DatasetStats::basic(train.nrows())
		});

		let transformer = FeatureTransformer::new(options.extra_categorical_features.clone());
		let train_frame = transformer.transform(train, self.today);
		let train_targets = destinations(train)?;
		let train_targets: Vec<&str> = train_targets.iter().map(|target| target.as_str()).collect();
		let mut registry = EncoderRegistry::new();
		let train_features = registry.fit(&train_frame, &train_targets)?;
		let train_labels = registry
			.encode_targets(&train_targets)?
			.into_iter()
			.collect::<Option<Vec<usize>>>()
			.ok_or_else(|| format_err!("a training destination is missing from the target encoder"))?;

		let test_frame = transformer.transform(test, self.today);
		let test_features = registry.transform(&test_frame, false)?;
		let test_targets = destinations(test)?;
		let test_targets: Vec<&str> = test_targets.iter().map(|target| target.as_str()).collect();
		let (known_rows, test_labels): (Vec<usize>, Vec<usize>) = registry
			.encode_targets(&test_targets)?
			.into_iter()
			.enumerate()
			.filter_map(|(row, label)| label.map(|label| (row, label)))
			.unzip();
		let n_unknown = test_targets.len() - known_rows.len();
		if n_unknown > 0 {
			log::warn!(
				"dropped {} test trips to destinations that never appear in the training set",
				n_unknown
			);
		}
		if known_rows.is_empty() {
			return Err(format_err!(
				"none of the test trips go to a destination in the training set"
			));
		}
		let test_frame = test_frame.take_rows(&known_rows);
		let test_features = test_features.select(Axis(0), &known_rows);

		let n_test = test_labels.len();
		let shap_rows = sample(&mut rng, n_test, options.shap_sample_size.min(n_test)).into_vec();
		let n_train = train_labels.len();
		let pool_rows = sample(&mut rng, n_train, options.background_pool_size.min(n_train)).into_vec();
		let background_pool = train_features.select(Axis(0), &pool_rows);
		log::info!(
			"encoded {} features for {} destinations, {} test trips are sampled for SHAP values",
			registry.feature_names.len(),
			registry.target_classes()?.len(),
			shap_rows.len()
		);

		self.state = State::FeaturesPrepared(Box::new(PreparedFeatures {
			transformer,
			registry,
			stats,
			train_features,
			train_labels,
			test_frame,
			test_features,
			test_labels,
			shap_rows,
			background_pool,
		}));
		Ok(())
	}

	/// Search the hyperparameters, fit the final classifier, build the explainer, and evaluate on the full test set.
	pub fn train(&mut self) -> Result<()> {
		let prepared = match &self.state {
			State::FeaturesPrepared(prepared) => prepared,
			_ => return Err(self.out_of_order("train", Stage::FeaturesPrepared)),
		};
		let options = &self.options;
		let destinations = prepared.registry.target_classes()?.to_vec();
		let feature_names = prepared.registry.feature_names.clone();
		let n_classes = destinations.len();

		log::info!("searching {} hyperparameter candidates", options.search.n_iter);
		let search = randomized_search(
			prepared.train_features.view(),
			&prepared.train_labels,
			n_classes,
			&options.search,
			options.k_neighbors,
			options.seed,
		)?;
		log::info!(
			"best parameters {:?} with cross validated accuracy {:.4}",
			search.best_parameters,
			search.best_score
		);
		let classifier = fit_resampled(
			prepared.train_features.view(),
			&prepared.train_labels,
			n_classes,
			&search.best_parameters,
			options.k_neighbors,
			options.seed,
		);

		let train_accuracy = accuracy(
			&classifier,
			prepared.train_features.view(),
			&prepared.train_labels,
		);
		let test_probabilities = classifier.predict(prepared.test_features.view());
		let test_predictions: Vec<usize> = test_probabilities
			.rows()
			.into_iter()
			.map(argmax)
			.collect();
		let mut metrics = ClassificationMetrics::new(n_classes);
		for (prediction, label) in test_predictions.iter().zip(prepared.test_labels.iter()) {
			metrics.update_with_prediction(*prediction, *label);
		}
		let metrics = metrics.finalize();
		let test_accuracy = metrics.accuracy;
		log::info!(
			"train accuracy {:.4}, test accuracy {:.4} on {} test trips",
			train_accuracy,
			test_accuracy,
			prepared.test_labels.len()
		);

		let explainer = build_explainer(
			&classifier,
			prepared.background_pool.view(),
			options.background_size,
			options.seed,
		);
		let mean_abs_shap = match &explainer {
			Some(explainer) => {
				let mut means: Vec<Mean> = vec![Mean::new(); feature_names.len()];
				for row in prepared.shap_rows.iter() {
					let example = prepared.test_features.row(*row).to_vec();
					let shap_values =
						explainer.shap_values(&classifier, &example, test_predictions[*row]);
					for (mean, value) in means.iter_mut().zip(shap_values.values.iter()) {
						mean.update(value.abs());
					}
				}
				let mean_abs_shap: BTreeMap<String, f32> = feature_names
					.iter()
					.cloned()
					.zip(means.into_iter().map(|mean| mean.finalize().unwrap_or(0.0)))
					.collect();
				for (feature, value) in mean_abs_shap.iter() {
					log::info!("mean |SHAP| {}: {:.4}", feature, value);
				}
				mean_abs_shap
			}
			None => BTreeMap::new(),
		};

		let bias = BiasReport::compute(
			&prepared.test_frame,
			&prepared.test_labels,
			&test_predictions,
		);

		let training_timestamp = chrono::Utc::now().to_rfc3339();
		let summary = ModelSummary {
			model_name: MODEL_NAME.to_owned(),
			test_accuracy,
			train_accuracy,
			best_parameters: search.best_parameters.clone(),
			training_samples: prepared.train_labels.len(),
			full_test_samples: prepared.test_labels.len(),
			shap_test_samples: prepared.shap_rows.len(),
			training_timestamp: training_timestamp.clone(),
		};
		let report = TrainReport {
			status: "success".to_owned(),
			model_name: MODEL_NAME.to_owned(),
			test_accuracy: round(test_accuracy, 4),
			train_accuracy: round(train_accuracy, 4),
			best_parameters: search.best_parameters.clone(),
			training_samples: summary.training_samples,
			test_samples: summary.full_test_samples,
			test_samples_shap: summary.shap_test_samples,
			unique_destinations: n_classes,
			feature_count: feature_names.len(),
			classification_report: metrics.report(&destinations),
			confusion_matrix: metrics.confusion_matrix.clone(),
			search,
			bias,
			mean_abs_shap,
			training_timestamp,
		};
		let model = Model {
			summary,
			transformer: prepared.transformer.clone(),
			registry: prepared.registry.clone(),
			classifier,
			explainer,
			stats: prepared.stats.clone(),
			is_trained: true,
		};
		self.state = State::Trained(Box::new(TrainOutput { model, report }));
		Ok(())
	}

	/// Write the trained model to `path`.
	pub fn persist(&mut self, path: &Path) -> Result<()> {
		let output = match std::mem::replace(&mut self.state, State::Unfitted) {
			State::Trained(output) | State::Persisted(output) => output,
			state => {
				self.state = state;
				return Err(self.out_of_order("persist", Stage::Trained));
			}
		};
		let result = output.model.to_file(path);
		self.state = if result.is_ok() {
			log::info!("wrote the model to {}", path.display());
			State::Persisted(output)
		} else {
			State::Trained(output)
		};
		result
	}

	pub fn model(&self) -> Option<&Model> {
		match &self.state {
			State::Trained(output) | State::Persisted(output) => Some(&output.model),
			_ => None,
		}
	}

	pub fn report(&self) -> Option<&TrainReport> {
		match &self.state {
			State::Trained(output) | State::Persisted(output) => Some(&output.report),
			_ => None,
		}
	}

	/// Consume the pipeline, returning the model and its report if training has finished.
	pub fn into_output(self) -> Option<(Model, TrainReport)> {
		match self.state {
			State::Trained(output) | State::Persisted(output) => {
				let TrainOutput { model, report } = *output;
				Some((model, report))
			}
			_ => None,
		}
	}
}

/// Run every stage of the pipeline on the trips at `file_path`, writing the model to `output_path` if one is given.
pub fn train(
	file_path: &Path,
	options: TrainingOptions,
	output_path: Option<&Path>,
) -> Result<(Model, TrainReport)> {
	let mut pipeline = TrainingPipeline::new(options);
	pipeline.load_data(file_path)?;
	pipeline.split()?;
	pipeline.prepare_features()?;
	pipeline.train()?;
	if let Some(output_path) = output_path {
		pipeline.persist(output_path)?;
	}
	pipeline
		.into_output()
		.ok_or_else(|| format_err!("the training pipeline did not finish"))
}

fn destinations(data: &DataFrame) -> Result<Vec<String>> {
	text_values(data, DESTINATION)
		.ok_or_else(|| format_err!("the trips have no {} column", DESTINATION))
}

/// Build the explainer from a random sample of the background pool. A failure disables explanations instead of failing training.
fn build_explainer(
	classifier: &wayfarer_tree::MulticlassClassifier,
	background_pool: ArrayView2<f32>,
	background_size: usize,
	seed: u64,
) -> Option<Explainer> {
	let mut rng = Xoshiro256Plus::seed_from_u64(seed);
	let n_pool = background_pool.nrows();
	let rows = sample(&mut rng, n_pool, background_size.min(n_pool)).into_vec();
	let background = background_pool.select(Axis(0), &rows);
	match Explainer::new(classifier, background.view()) {
		Ok(explainer) => {
			log::info!(
				"built the explainer from {} background trips",
				explainer.background_size
			);
			Some(explainer)
		}
		Err(error) => {
			log::warn!("explanations are disabled: {}", error);
			None
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_stages_run_in_order() {
		let mut pipeline = TrainingPipeline::new(TrainingOptions::default());
		assert_eq!(pipeline.stage(), Stage::Unfitted);
		let error = pipeline.split().unwrap_err();
		assert_eq!(
			error.to_string(),
			"cannot split a training pipeline that is unfitted, it must be data loaded"
		);
		assert!(pipeline.prepare_features().is_err());
		assert!(pipeline.train().is_err());
		assert!(pipeline
			.persist(&std::env::temp_dir().join("never_written.wayfarer"))
			.is_err());
		assert_eq!(pipeline.stage(), Stage::Unfitted);
		assert!(pipeline.model().is_none());
	}

	#[test]
	fn test_missing_data_file() {
		let mut pipeline = TrainingPipeline::new(TrainingOptions::default());
		let error = pipeline
			.load_data(Path::new("/nonexistent/trips.csv"))
			.unwrap_err();
		assert!(matches!(
			error.downcast_ref::<crate::Error>(),
			Some(crate::Error::DataNotFound { .. })
		));
		assert_eq!(pipeline.stage(), Stage::Unfitted);
	}
}
