/*!
This module attributes each prediction to the features that drove it. The [`Explainer`](struct.Explainer.html) computes Tree SHAP values against covers derived from a background sample of training examples, and [`narrative`](narrative/index.html) turns the strongest contributions into text.
*/

use anyhow::{format_err, Result};
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use std::{cmp::Ordering, collections::BTreeMap};
use wayfarer_dataframe::{DataFrame, Value};
use wayfarer_tree::{softmax, MulticlassClassifier, Node, ShapValues};

pub mod narrative;

pub use self::narrative::{
	confidence_explanation, destination_insight, fallback_explanation, Narrator,
};

/// The weight of the background sample in the covers. The rest is the training fractions, so nodes the background never reaches still have cover.
pub const BACKGROUND_WEIGHT: f32 = 0.9;

/// The number of positive contributors reported for a prediction.
pub const N_POSITIVE_CONTRIBUTORS: usize = 3;

/// The number of negative contributors reported for a prediction.
pub const N_NEGATIVE_CONTRIBUTORS: usize = 2;

/// An `Explainer` is bound to the classifier it was built for. It stores one cover per tree node, in the order of the classifier's trees.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Explainer {
	pub covers: Vec<Vec<f32>>,
	/// The expected logit of each class under the covers.
	pub expected_values: Vec<f32>,
	pub background_size: usize,
}

impl Explainer {
	pub fn new(classifier: &MulticlassClassifier, background: ArrayView2<f32>) -> Result<Self> {
		if background.nrows() == 0 {
			return Err(format_err!(
				"the explainer needs at least one background example"
			));
		}
		let max_feature_index = classifier
			.trees
			.iter()
			.flat_map(|tree| tree.nodes.iter())
			.filter_map(|node| match node {
				Node::Branch(branch) => Some(branch.split.feature_index),
				Node::Leaf(_) => None,
			})
			.max();
		if let Some(max_feature_index) = max_feature_index {
			if max_feature_index >= background.ncols() {
				return Err(format_err!(
					"the background has {} features but the classifier splits on feature {}",
					background.ncols(),
					max_feature_index
				));
			}
		}
		let covers = classifier.compute_covers(background, BACKGROUND_WEIGHT);
		let expected_values = classifier.compute_expected_values(Some(&covers));
		Ok(Self {
			covers,
			expected_values,
			background_size: background.nrows(),
		})
	}

	pub fn shap_values(
		&self,
		classifier: &MulticlassClassifier,
		example: &[f32],
		class_index: usize,
	) -> ShapValues {
		classifier.compute_shap_values(example, class_index, Some(&self.covers))
	}

	/// The probability of each class at the expected logits. This is the prediction before any feature of the example is taken into account.
	pub fn base_probabilities(&self) -> Vec<f32> {
		let mut probabilities = Array1::from(self.expected_values.clone());
		if !probabilities.is_empty() {
			softmax(probabilities.view_mut());
		}
		probabilities.to_vec()
	}

	/**
	Explain the probability of `class_index` for one example. `example` is the encoded feature row, and `row` is its index in `features`, the unencoded output of the feature transformer, which is where the values shown to the user come from.
	*/
	#[allow(clippy::too_many_arguments)]
	pub fn shap_details(
		&self,
		classifier: &MulticlassClassifier,
		feature_names: &[String],
		example: &[f32],
		features: &DataFrame,
		row: usize,
		class_index: usize,
		probability: f32,
	) -> ShapDetails {
		let shap_values = self.shap_values(classifier, example, class_index);
		let base_value = self
			.base_probabilities()
			.get(class_index)
			.cloned()
			.unwrap_or(0.0);
		let contributions = top_contributors(&shap_values.values)
			.into_iter()
			.filter_map(|feature_index| {
				let feature = feature_names.get(feature_index)?;
				let value = features.value(row, feature)?;
				let contribution = shap_values.values[feature_index];
				Some(Contribution {
					feature: feature.clone(),
					contribution,
					user_value: format_user_value(feature, value),
					raw_value: raw_value(value),
					impact_strength: ImpactStrength::of(contribution),
				})
			})
			.collect();
		let feature_impacts = feature_names
			.iter()
			.cloned()
			.zip(shap_values.values.iter().cloned())
			.collect();
		ShapDetails {
			final_probability: probability,
			base_value,
			contributions,
			feature_impacts,
		}
	}
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShapDetails {
	pub final_probability: f32,
	/// The probability of the class before the example's features are taken into account.
	pub base_value: f32,
	pub contributions: Vec<Contribution>,
	/// The SHAP value of every feature, in logit space.
	pub feature_impacts: BTreeMap<String, f32>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Contribution {
	pub feature: String,
	pub contribution: f32,
	/// The feature value formatted for display, such as `$1,200` or `28 years old`.
	pub user_value: String,
	pub raw_value: serde_json::Value,
	pub impact_strength: ImpactStrength,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ImpactStrength {
	Strong,
	Moderate,
	Mild,
}

impl ImpactStrength {
	pub fn of(contribution: f32) -> Self {
		let magnitude = contribution.abs();
		if magnitude > 0.1 {
			ImpactStrength::Strong
		} else if magnitude > 0.05 {
			ImpactStrength::Moderate
		} else {
			ImpactStrength::Mild
		}
	}
}

/**
Choose the features to report: the three largest positive values, largest first, followed by the two most negative values, most negative first. Features with equal values keep their feature order.
*/
pub fn top_contributors(values: &[f32]) -> Vec<usize> {
	let mut positive: Vec<usize> = (0..values.len()).filter(|i| values[*i] > 0.0).collect();
	positive.sort_by(|a, b| values[*b].partial_cmp(&values[*a]).unwrap_or(Ordering::Equal));
	let mut negative: Vec<usize> = (0..values.len()).filter(|i| values[*i] < 0.0).collect();
	negative.sort_by(|a, b| values[*a].partial_cmp(&values[*b]).unwrap_or(Ordering::Equal));
	positive
		.into_iter()
		.take(N_POSITIVE_CONTRIBUTORS)
		.chain(negative.into_iter().take(N_NEGATIVE_CONTRIBUTORS))
		.collect()
}

/// Format a feature value for display. Costs are whole dollars, ages are years, durations are days, other numbers have one decimal, and categories are shown as they are.
pub fn format_user_value(feature: &str, value: Value) -> String {
	let value = match value {
		Value::Text(value) => return value.to_owned(),
		Value::Number(value) => value,
	};
	let feature = feature.to_lowercase();
	if !value.is_finite() {
		value.to_string()
	} else if feature.contains("cost") {
		format_dollars(value)
	} else if feature.contains("age") {
		format!("{:.0} years old", value)
	} else if feature.contains("duration") {
		format!("{:.0} days", value)
	} else {
		format!("{:.1}", value)
	}
}

/// Format a dollar amount rounded to whole dollars, with thousands separators.
pub fn format_dollars(value: f32) -> String {
	let rounded = value.abs().round().to_u64().unwrap_or(0);
	let digits = rounded.to_string();
	let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
	for (i, digit) in digits.chars().enumerate() {
		if i > 0 && (digits.len() - i) % 3 == 0 {
			grouped.push(',');
		}
		grouped.push(digit);
	}
	let sign = if value < 0.0 && rounded > 0 { "-" } else { "" };
	format!("${}{}", sign, grouped)
}

fn raw_value(value: Value) -> serde_json::Value {
	match value {
		Value::Number(value) => serde_json::Number::from_f64(value.to_f64().unwrap())
			.map(serde_json::Value::Number)
			.unwrap_or(serde_json::Value::Null),
		Value::Text(value) => serde_json::Value::String(value.to_owned()),
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_top_contributors() {
		let values = [0.2, -0.3, 0.0, 0.5, 0.2, -0.1, 0.05, -0.4];
		assert_eq!(top_contributors(&values), vec![3, 0, 4, 7, 1]);
		assert_eq!(top_contributors(&[-0.1]), vec![0]);
		assert!(top_contributors(&[0.0, 0.0]).is_empty());
	}

	#[test]
	fn test_format_user_value() {
		assert_eq!(
			format_user_value("Accommodation cost", Value::Number(1200.0)),
			"$1,200"
		);
		assert_eq!(
			format_user_value("Total_Trip_Cost", Value::Number(1234567.4)),
			"$1,234,567"
		);
		assert_eq!(format_user_value("Cost_Per_Day", Value::Number(171.42)), "$171");
		assert_eq!(format_user_value("Age", Value::Number(28.0)), "28 years old");
		assert_eq!(
			format_user_value("Duration (days)", Value::Number(7.0)),
			"7 days"
		);
		assert_eq!(format_user_value("Rating", Value::Number(4.26)), "4.3");
		assert_eq!(format_user_value("Age_Group", Value::Text("26-35")), "26-35");
		assert_eq!(format_dollars(-45.0), "$-45");
		assert_eq!(format_dollars(999.6), "$1,000");
	}

	#[test]
	fn test_impact_strength() {
		assert_eq!(ImpactStrength::of(-0.2), ImpactStrength::Strong);
		assert_eq!(ImpactStrength::of(0.1), ImpactStrength::Moderate);
		assert_eq!(ImpactStrength::of(0.05), ImpactStrength::Mild);
	}
}
