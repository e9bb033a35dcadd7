/*!
This module defines the `Config` struct, which is used to configure training with [`train`](../train/fn.train.html). Every field is optional, and [`TrainingOptions`](struct.TrainingOptions.html) resolves the fields that are absent to their defaults.

```yaml
test_fraction: 0.2
seed: 42
search:
  n_iter: 2
  n_folds: 2
  grid:
    n_estimators: [100, 200]
    learning_rate: [0.05, 0.1]
    max_depth: [3, 5]
smote:
  k_neighbors: 5
extra_categorical_features: []
```
*/

use anyhow::{format_err, Context, Result};
use std::path::Path;

#[derive(Debug, Default, serde::Deserialize)]
pub struct Config {
	pub test_fraction: Option<f32>,
	pub background_size: Option<usize>,
	pub background_pool_size: Option<usize>,
	pub shap_sample_size: Option<usize>,
	pub seed: Option<u64>,
	pub search: Option<SearchConfig>,
	pub smote: Option<SmoteConfig>,
	pub extra_categorical_features: Option<Vec<String>>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct SearchConfig {
	pub n_iter: Option<usize>,
	pub n_folds: Option<usize>,
	pub grid: Option<GridConfig>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct GridConfig {
	pub n_estimators: Option<Vec<usize>>,
	pub learning_rate: Option<Vec<f32>>,
	pub max_depth: Option<Vec<usize>>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct SmoteConfig {
	pub k_neighbors: Option<usize>,
}

/// Load the config from the yaml file at `config_path`. Without a path, every option takes its default.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
	if let Some(config_path) = config_path {
		let config = std::fs::read_to_string(config_path)
			.with_context(|| format!("failed to read config file {}", config_path.display()))?;
		let config = serde_yaml::from_str(&config)
			.with_context(|| format!("failed to parse config file {}", config_path.display()))?;
		Ok(config)
	} else {
		Ok(Config::default())
	}
}

/// The options training runs with, after defaults are applied to a `Config`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainingOptions {
	pub test_fraction: f32,
	/// The number of training rows the explainer's covers are computed from.
	pub background_size: usize,
	/// The number of training rows drawn as the pool the background is sampled from.
	pub background_pool_size: usize,
	/// The maximum number of test rows SHAP values are computed for at training time.
	pub shap_sample_size: usize,
	pub seed: u64,
	pub search: SearchOptions,
	pub k_neighbors: usize,
	pub extra_categorical_features: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchOptions {
	/// The number of grid points to evaluate, drawn without replacement.
	pub n_iter: usize,
	pub n_folds: usize,
	pub grid: GridOptions,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GridOptions {
	pub n_estimators: Vec<usize>,
	pub learning_rate: Vec<f32>,
	pub max_depth: Vec<usize>,
}

impl Default for TrainingOptions {
	fn default() -> Self {
		Self {
			test_fraction: 0.2,
			background_size: 50,
			background_pool_size: 100,
			shap_sample_size: 50,
			seed: 42,
			search: SearchOptions::default(),
			k_neighbors: 5,
			extra_categorical_features: Vec::new(),
		}
	}
}

impl Default for SearchOptions {
	fn default() -> Self {
		Self {
			n_iter: 2,
			n_folds: 2,
			grid: GridOptions::default(),
		}
	}
}

impl Default for GridOptions {
	fn default() -> Self {
		Self {
			n_estimators: vec![100, 200],
			learning_rate: vec![0.05, 0.1],
			max_depth: vec![3, 5],
		}
	}
}

impl TrainingOptions {
	pub fn from_config(config: &Config) -> Result<Self> {
		let defaults = Self::default();
		let search = config.search.as_ref();
		let grid = search.and_then(|search| search.grid.as_ref());
		let options = Self {
			test_fraction: config.test_fraction.unwrap_or(defaults.test_fraction),
			background_size: config.background_size.unwrap_or(defaults.background_size),
			background_pool_size: config
				.background_pool_size
				.unwrap_or(defaults.background_pool_size),
			shap_sample_size: config.shap_sample_size.unwrap_or(defaults.shap_sample_size),
			seed: config.seed.unwrap_or(defaults.seed),
			search: SearchOptions {
				n_iter: search
					.and_then(|search| search.n_iter)
					.unwrap_or(defaults.search.n_iter),
				n_folds: search
					.and_then(|search| search.n_folds)
					.unwrap_or(defaults.search.n_folds),
				grid: GridOptions {
					n_estimators: grid
						.and_then(|grid| grid.n_estimators.clone())
						.unwrap_or(defaults.search.grid.n_estimators),
					learning_rate: grid
						.and_then(|grid| grid.learning_rate.clone())
						.unwrap_or(defaults.search.grid.learning_rate),
					max_depth: grid
						.and_then(|grid| grid.max_depth.clone())
						.unwrap_or(defaults.search.grid.max_depth),
				},
			},
			k_neighbors: config
				.smote
				.as_ref()
				.and_then(|smote| smote.k_neighbors)
				.unwrap_or(defaults.k_neighbors),
			extra_categorical_features: config
				.extra_categorical_features
				.clone()
				.unwrap_or_default(),
		};
		options.validate()?;
		Ok(options)
	}

	fn validate(&self) -> Result<()> {
		if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
			return Err(format_err!(
				"test_fraction must be between 0 and 1, got {}",
				self.test_fraction
			));
		}
		if self.search.n_iter == 0 {
			return Err(format_err!("search.n_iter must be at least 1"));
		}
		if self.search.n_folds < 2 {
			return Err(format_err!(
				"search.n_folds must be at least 2, got {}",
				self.search.n_folds
			));
		}
		let grid = &self.search.grid;
		if grid.n_estimators.is_empty() || grid.learning_rate.is_empty() || grid.max_depth.is_empty()
		{
			return Err(format_err!("every search.grid list must have at least one value"));
		}
		if self.background_size == 0 || self.k_neighbors == 0 {
			return Err(format_err!(
				"background_size and smote.k_neighbors must be at least 1"
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_defaults() {
		let options = TrainingOptions::from_config(&Config::default()).unwrap();
		assert_eq!(options, TrainingOptions::default());
	}

	#[test]
	fn test_partial_config() {
		let config: Config = serde_yaml::from_str(
			"
test_fraction: 0.25
search:
  grid:
    max_depth: [4]
smote:
  k_neighbors: 3
extra_categorical_features: [Season]
",
		)
		.unwrap();
		let options = TrainingOptions::from_config(&config).unwrap();
		assert_eq!(options.test_fraction, 0.25);
		assert_eq!(options.search.n_iter, 2);
		assert_eq!(options.search.grid.max_depth, vec![4]);
		assert_eq!(options.search.grid.n_estimators, vec![100, 200]);
		assert_eq!(options.k_neighbors, 3);
		assert_eq!(options.extra_categorical_features, vec!["Season".to_owned()]);
	}

	#[test]
	fn test_invalid_config() {
		let config = Config {
			test_fraction: Some(1.5),
			..Default::default()
		};
		assert!(TrainingOptions::from_config(&config).is_err());
		let config: Config = serde_yaml::from_str("search:\n  n_folds: 1\n").unwrap();
		assert!(TrainingOptions::from_config(&config).is_err());
	}

	#[test]
	fn test_missing_config_file() {
		let error = load_config(Some(Path::new("/nonexistent/wayfarer.yaml"))).unwrap_err();
		assert!(error.to_string().contains("failed to read config file"));
	}
}
