use ndarray::prelude::*;
use wayfarer_metrics::{MeanVariance, StreamingMetric};

/**
A `StandardScaler` transforms every feature column to zero mean and unit variance. [Learn more](https://en.wikipedia.org/wiki/Feature_scaling#Standardization_(Z-score_Normalization).

`feature_value = (value - mean) / std`

A column whose variance is zero scales to zero.
*/
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StandardScaler {
	pub columns: Vec<ScaledColumn>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScaledColumn {
	pub mean: f32,
	pub variance: f32,
}

impl StandardScaler {
	pub fn fit(features: ArrayView2<f32>) -> Self {
		let columns = features
			.axis_iter(Axis(1))
			.map(|column| {
				let mut mean_variance = MeanVariance::new();
				for value in column.iter() {
					mean_variance.update(*value);
				}
				let output = mean_variance.finalize();
				ScaledColumn {
					mean: output.mean,
					variance: output.variance,
				}
			})
			.collect();
		Self { columns }
	}

	pub fn transform(&self, mut features: ArrayViewMut2<f32>) {
		for (mut column, scaled) in features.axis_iter_mut(Axis(1)).zip(self.columns.iter()) {
			for value in column.iter_mut() {
				*value = scaled.scale(*value);
			}
		}
	}
}

impl ScaledColumn {
	pub fn scale(&self, value: f32) -> f32 {
		if value.is_nan() || self.variance == 0.0 {
			0.0
		} else {
			(value - self.mean) / f32::sqrt(self.variance)
		}
	}
}

#[test]
fn test_standard_scaler() {
	let features = arr2(&[[0.0, 3.0], [5.2, 3.0], [1.3, 3.0]]);
	let scaler = StandardScaler::fit(features.view());
	let mut scaled = features.clone();
	scaler.transform(scaled.view_mut());
	let mean = scaled.column(0).sum() / 3.0;
	let variance = scaled.column(0).mapv(|v| (v - mean) * (v - mean)).sum() / 3.0;
	assert!(mean.abs() < 1e-6);
	assert!((variance - 1.0).abs() < 1e-5);
	assert!(scaled.column(1).iter().all(|value| *value == 0.0));
}
