use crate::{explain::Explainer, search::HyperParameters, stats::DatasetStats, Error};
use anyhow::{format_err, Result};
use std::{
	io::Write,
	path::{Path, PathBuf},
};
use wayfarer_features::{EncoderRegistry, FeatureTransformer};
use wayfarer_tree::MulticlassClassifier;

/// The major version written as the first byte of every model file.
const MAJOR_VERSION: u8 = 0;

/// A trained model and everything needed to serve it: the fitted encoders, the explainer covers, and the statistics the narratives quote.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Model {
	pub summary: ModelSummary,
	pub transformer: FeatureTransformer,
	pub registry: EncoderRegistry,
	pub classifier: MulticlassClassifier,
	/// `None` when the explainer could not be built. Predictions then use the fallback explanation.
	pub explainer: Option<Explainer>,
	pub stats: DatasetStats,
	pub is_trained: bool,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ModelSummary {
	pub model_name: String,
	pub test_accuracy: f32,
	pub train_accuracy: f32,
	pub best_parameters: HyperParameters,
	pub training_samples: usize,
	pub full_test_samples: usize,
	pub shap_test_samples: usize,
	pub training_timestamp: String,
}

impl Model {
	/// Deserialize a `Model` from a slice.
	pub fn from_slice(slice: &[u8]) -> Result<Self> {
		let (major_version, slice) = slice
			.split_first()
			.ok_or_else(|| format_err!("the model is empty"))?;
		if *major_version != MAJOR_VERSION {
			return Err(format_err!("unknown major version {}", major_version));
		}
		let model: Self = rmp_serde::from_slice(slice)?;
		model.check_trained()?;
		Ok(model)
	}

	/// Deserialize a `Model` by reading the file at `path`. Any failure is reported as `Error::ModelLoad`.
	pub fn from_path(path: &Path) -> Result<Self> {
		Self::read(path).map_err(|error| {
			Error::ModelLoad {
				path: path.to_owned(),
				reason: error.to_string(),
			}
			.into()
		})
	}

	fn read(path: &Path) -> Result<Self> {
		let data = std::fs::read(path)?;
		Self::from_slice(&data)
	}

	/// Write this model to the file at `path`. The model is written to a temporary file next to `path` which is then renamed into place, so `path` never holds a partial model.
	pub fn to_file(&self, path: &Path) -> Result<()> {
		let temp_path = temp_path(path)?;
		let result = (|| -> Result<()> {
			let file = std::fs::File::create(&temp_path)?;
			let mut writer = std::io::BufWriter::new(file);
			writer.write_all(&[MAJOR_VERSION])?;
			rmp_serde::encode::write_named(&mut writer, self)?;
			writer.flush()?;
			Ok(())
		})();
		if let Err(error) = result {
			std::fs::remove_file(&temp_path).ok();
			return Err(error);
		}
		std::fs::rename(&temp_path, path)?;
		Ok(())
	}

	/// The destination labels, indexed by class.
	pub fn destinations(&self) -> &[String] {
		self.registry.target_classes().unwrap_or(&[])
	}

	fn check_trained(&self) -> Result<()> {
		if !self.is_trained {
			return Err(Error::NotFitted.into());
		}
		if !self.registry.is_fitted() {
			return Err(format_err!("the model's encoders were not fit"));
		}
		if self.destinations().len() != self.classifier.n_classes {
			return Err(format_err!(
				"the model has {} destinations but its classifier has {} classes",
				self.destinations().len(),
				self.classifier.n_classes
			));
		}
		Ok(())
	}
}

fn temp_path(path: &Path) -> Result<PathBuf> {
	let file_name = path
		.file_name()
		.ok_or_else(|| format_err!("{} is not a file path", path.display()))?;
	Ok(path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy())))
}

#[cfg(test)]
mod test {
	use super::*;
	use wayfarer_dataframe::{Column, DataFrame, TextColumn};

	fn model() -> Model {
		let data = DataFrame::new(vec![Column::Text(TextColumn {
			name: "Traveler gender".to_owned(),
			data: vec!["Female".to_owned(), "Male".to_owned()],
		})]);
		let mut registry = EncoderRegistry::new();
		registry
			.fit(&data, &["Paris, France", "Tokyo, Japan"])
			.unwrap();
		Model {
			summary: ModelSummary {
				model_name: "GradientBoosted_Tuned_SMOTE".to_owned(),
				test_accuracy: 0.5,
				train_accuracy: 1.0,
				best_parameters: HyperParameters {
					n_estimators: 100,
					learning_rate: 0.1,
					max_depth: 3,
				},
				training_samples: 2,
				full_test_samples: 1,
				shap_test_samples: 1,
				training_timestamp: "2023-01-01T00:00:00+00:00".to_owned(),
			},
			transformer: FeatureTransformer::default(),
			registry,
			classifier: MulticlassClassifier {
				biases: vec![0.0, 0.0],
				trees: Vec::new(),
				n_classes: 2,
				n_rounds: 0,
			},
			explainer: None,
			stats: DatasetStats::basic(2),
			is_trained: true,
		}
	}

	fn temp_dir(name: &str) -> PathBuf {
		let dir = std::env::temp_dir().join(format!("wayfarer_model_{}_{}", name, std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		dir
	}

	#[test]
	fn test_to_file_then_from_path() {
		let dir = temp_dir("save");
		let path = dir.join("trips.wayfarer");
		model().to_file(&path).unwrap();
		assert!(!temp_path(&path).unwrap().exists());
		let loaded = Model::from_path(&path).unwrap();
		assert!(loaded.is_trained);
		assert_eq!(loaded.destinations(), &["Paris, France", "Tokyo, Japan"]);
		assert_eq!(loaded.summary.best_parameters.max_depth, 3);
		std::fs::remove_dir_all(dir).ok();
	}

	#[test]
	fn test_load_failures() {
		let dir = temp_dir("load");
		let error = Model::from_path(&dir.join("missing.wayfarer")).unwrap_err();
		assert!(matches!(
			error.downcast_ref::<Error>(),
			Some(Error::ModelLoad { .. })
		));
		let path = dir.join("wrong_version.wayfarer");
		std::fs::write(&path, &[1, 2, 3]).unwrap();
		let error = Model::from_path(&path).unwrap_err();
		assert!(error.to_string().contains("unknown major version 1"));
		let mut untrained = model();
		untrained.is_trained = false;
		untrained.to_file(&path).unwrap();
		assert!(Model::from_path(&path).is_err());
		std::fs::write(&path, b"").unwrap();
		let error = Model::from_path(&path).unwrap_err();
		assert!(error.to_string().contains("the model is empty"));
		std::fs::remove_dir_all(dir).ok();
	}
}
