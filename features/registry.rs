use crate::{text_values, LabelEncoder, StandardScaler};
use anyhow::Result;
use fnv::FnvHashMap;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use std::collections::BTreeMap;
use wayfarer_dataframe::{Column, DataFrame};

#[derive(Debug, thiserror::Error)]
#[error("the encoder registry has not been fit")]
pub struct NotFittedError;

/**
The `EncoderRegistry` owns every fitted encoder: one [`LabelEncoder`](struct.LabelEncoder.html) per categorical feature, one [`StandardScaler`](struct.StandardScaler.html) over all feature columns, and the target encoder for destinations. It is fit once on the training set and saved with the model.
*/
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EncoderRegistry {
	pub feature_names: Vec<String>,
	pub label_encoders: BTreeMap<String, LabelEncoder>,
	pub scaler: Option<StandardScaler>,
	pub target_encoder: Option<LabelEncoder>,
}

impl EncoderRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_fitted(&self) -> bool {
		self.scaler.is_some() && self.target_encoder.is_some()
	}

	/// Fit the feature encoders, the scaler and the target encoder, and return the encoded training features.
	pub fn fit(&mut self, data: &DataFrame, targets: &[&str]) -> Result<Array2<f32>> {
		let features = self.transform(data, true)?;
		self.target_encoder = Some(LabelEncoder::fit(
			targets.iter().map(|target| target.trim()),
		));
		Ok(features)
	}

	/**
	Encode `data` into a matrix with one column per feature, in feature name order.

	When `is_fitting` is true, the feature names are taken from `data`, every text column gets a new label encoder, and the scaler is fit. Otherwise each label encoder gets the fallback class appended if it does not have one yet, so values unseen during fitting have a class to map to.
	*/
	pub fn transform(&mut self, data: &DataFrame, is_fitting: bool) -> Result<Array2<f32>> {
		if is_fitting {
			self.feature_names = data
				.column_names()
				.into_iter()
				.map(|name| name.to_owned())
				.collect();
			self.label_encoders = data
				.columns
				.iter()
				.filter_map(|column| match column {
					Column::Text(column) => Some((
						column.name.clone(),
						LabelEncoder::fit(column.data.iter().map(|value| value.as_str())),
					)),
					Column::Number(_) => None,
				})
				.collect();
			let features = self.label_encode(data);
			self.scaler = Some(StandardScaler::fit(features.view()));
		} else {
			self.ensure_fitted()?;
			for encoder in self.label_encoders.values_mut() {
				encoder.ensure_fallback();
			}
		}
		self.encode(data)
	}

	/// Encode `data` without modifying any encoder. Unseen categorical values map to the fallback class index.
	pub fn encode(&self, data: &DataFrame) -> Result<Array2<f32>> {
		let scaler = self.scaler.as_ref().ok_or(NotFittedError)?;
		let mut features = self.label_encode(data);
		scaler.transform(features.view_mut());
		Ok(features)
	}

	fn label_encode(&self, data: &DataFrame) -> Array2<f32> {
		let n_rows = data.nrows();
		let mut features = Array::zeros((n_rows, self.feature_names.len()));
		for (mut feature_column, name) in features
			.axis_iter_mut(Axis(1))
			.zip(self.feature_names.iter())
		{
			match self.label_encoders.get(name) {
				Some(encoder) => {
					let values = text_values(data, name).unwrap_or_default();
					for (row, feature) in feature_column.iter_mut().enumerate() {
						let index = match values.get(row) {
							Some(value) => encoder.transform_or_fallback(value),
							None => encoder.fallback_index(),
						};
						*feature = index.to_f32().unwrap();
					}
				}
				None => {
					if let Some(Column::Number(column)) = data.column(name) {
						for (feature, value) in feature_column.iter_mut().zip(column.data.iter()) {
							*feature = if value.is_nan() { 0.0 } else { *value };
						}
					}
				}
			}
		}
		features
	}

	fn ensure_fitted(&self) -> Result<()> {
		if self.is_fitted() {
			Ok(())
		} else {
			Err(NotFittedError.into())
		}
	}

	fn target_encoder(&self) -> Result<&LabelEncoder> {
		Ok(self.target_encoder.as_ref().ok_or(NotFittedError)?)
	}

	/// The destination labels, indexed by class.
	pub fn target_classes(&self) -> Result<&[String]> {
		Ok(self.target_encoder()?.classes.as_slice())
	}

	/// Map each destination label to its class index. Labels unseen during fitting map to `None`.
	pub fn encode_targets(&self, labels: &[&str]) -> Result<Vec<Option<usize>>> {
		let encoder = self.target_encoder()?;
		let indices: FnvHashMap<&str, usize> = encoder
			.classes
			.iter()
			.enumerate()
			.map(|(index, class)| (class.as_str(), index))
			.collect();
		Ok(labels
			.iter()
			.map(|label| indices.get(label.trim()).cloned())
			.collect())
	}

	pub fn decode_target(&self, index: usize) -> Result<Option<&str>> {
		Ok(self.target_encoder()?.inverse_transform(index))
	}

	/// Map an encoded categorical feature value back to its label.
	pub fn decode_feature(&self, feature_name: &str, index: usize) -> Option<&str> {
		self.label_encoders
			.get(feature_name)
			.and_then(|encoder| encoder.inverse_transform(index))
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use wayfarer_dataframe::{NumberColumn, TextColumn};

	fn data(types: &[&str], costs: &[f32]) -> DataFrame {
		DataFrame::new(vec![
			Column::Text(TextColumn {
				name: "Accommodation type".to_owned(),
				data: types.iter().map(|value| (*value).to_owned()).collect(),
			}),
			Column::Number(NumberColumn {
				name: "Accommodation cost".to_owned(),
				data: costs.to_vec(),
			}),
		])
	}

	#[test]
	fn test_fit_then_transform() {
		let mut registry = EncoderRegistry::new();
		let train = data(&["Hotel", "Airbnb", "Hostel", "Hotel"], &[100.0, 200.0, 300.0, 400.0]);
		let features = registry
			.fit(&train, &["London, UK ", "Paris, France", "London, UK", "Rome, Italy"])
			.unwrap();
		assert_eq!(features.dim(), (4, 2));
		assert!((features.column(1).sum()).abs() < 1e-5);
		assert_eq!(
			registry.target_classes().unwrap(),
			&["London, UK", "Paris, France", "Rome, Italy"]
		);
		assert_eq!(
			registry.encode_targets(&["Rome, Italy", "Oslo, Norway"]).unwrap(),
			vec![Some(2), None]
		);
		assert_eq!(registry.decode_target(1).unwrap(), Some("Paris, France"));
		let index = registry.label_encoders["Accommodation type"]
			.transform("Hostel")
			.unwrap();
		assert_eq!(
			registry.decode_feature("Accommodation type", index),
			Some("Hostel")
		);
	}

	#[test]
	fn test_unseen_values_map_to_fallback() {
		let mut registry = EncoderRegistry::new();
		let train = data(&["Hotel", "Airbnb", "Hostel"], &[100.0, 200.0, 300.0]);
		registry.fit(&train, &["a", "b", "c"]).unwrap();
		let test = data(&["Villa", "Hotel"], &[std::f32::NAN, 200.0]);
		let encoded = registry.encode(&test).unwrap();
		let transformed = registry.transform(&test, false).unwrap();
		assert_eq!(encoded, transformed);
		assert_eq!(
			registry.label_encoders["Accommodation type"].classes.last().unwrap(),
			"nan"
		);
		// A missing number scales as zero.
		assert_eq!(transformed[(0, 1)], registry.scaler.as_ref().unwrap().columns[1].scale(0.0));
	}

	#[test]
	fn test_not_fitted() {
		let mut registry = EncoderRegistry::new();
		let test = data(&["Hotel"], &[1.0]);
		let error = registry.transform(&test, false).unwrap_err();
		assert!(error.downcast_ref::<NotFittedError>().is_some());
		assert!(registry.encode(&test).is_err());
		assert!(registry.encode_targets(&["a"]).is_err());
	}
}
