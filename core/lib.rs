/*!
This crate trains and serves the wayfarer destination classifier.

Training is driven by [`TrainingPipeline`](train/struct.TrainingPipeline.html): it loads a csv of historical trips, splits it chronologically, fits the feature encoders, searches the hyperparameter grid with SMOTE inside each cross validation fold, and produces a [`Model`](model/struct.Model.html). Predictions are made through a [`PredictionService`](predict/struct.PredictionService.html), which attaches SHAP attributions and a narrative explanation to every ranked destination.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod error;
mod smote;

pub mod bias;
pub mod config;
pub mod explain;
pub mod load;
pub mod model;
pub mod predict;
pub mod search;
pub mod stats;
pub mod train;

pub use self::{
	error::Error,
	model::Model,
	predict::PredictionService,
	train::{train, TrainReport, TrainingPipeline},
};

/// Round `value` to `decimals` decimal places.
pub(crate) fn round(value: f32, decimals: i32) -> f32 {
	let scale = 10f64.powi(decimals);
	((f64::from(value) * scale).round() / scale) as f32
}

#[cfg(test)]
mod test;
