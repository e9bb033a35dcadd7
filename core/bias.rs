/*!
This module measures how evenly the classifier performs across groups of travelers. Accuracy is computed per group on the full test set for demographic, economic and geographic groupings of the transformed features.
*/

use std::collections::BTreeMap;
use wayfarer_dataframe::DataFrame;
use wayfarer_features::{
	text_values, ACCOMMODATION_BUDGET, AGE_GROUP, TRANSPORTATION_BUDGET, TRAVELER_GENDER,
	TRAVELER_NATIONALITY,
};
use wayfarer_metrics::{Accuracy, StreamingMetric};

/// The feature columns accuracy is broken down by, with the dimension each belongs to.
pub const GROUPINGS: &[(&str, BiasDimension)] = &[
	(AGE_GROUP, BiasDimension::Demographic),
	(TRAVELER_GENDER, BiasDimension::Demographic),
	(ACCOMMODATION_BUDGET, BiasDimension::Economic),
	(TRANSPORTATION_BUDGET, BiasDimension::Economic),
	(TRAVELER_NATIONALITY, BiasDimension::Geographic),
];

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasDimension {
	Demographic,
	Economic,
	Geographic,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct BiasReport {
	pub groupings: Vec<GroupingReport>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GroupingReport {
	pub feature: String,
	pub dimension: BiasDimension,
	pub groups: BTreeMap<String, GroupAccuracy>,
	/// The difference between the best and worst group accuracy.
	pub accuracy_gap: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GroupAccuracy {
	pub count: usize,
	pub accuracy: f32,
}

impl BiasReport {
	/**
	Compute per group accuracy. `features` is the transformed, unencoded test set, and `labels` and `predictions` are class indices aligned with its rows. Groupings whose column is absent are skipped.
	*/
	pub fn compute(features: &DataFrame, labels: &[usize], predictions: &[usize]) -> Self {
		let groupings = GROUPINGS
			.iter()
			.filter_map(|(feature, dimension)| {
				let values = text_values(features, feature)?;
				let mut accuracies: BTreeMap<String, (usize, Accuracy)> = BTreeMap::new();
				for (value, label, prediction) in
					itertools::izip!(values.iter(), labels.iter(), predictions.iter())
				{
					let (count, accuracy) = accuracies
						.entry(value.clone())
						.or_insert_with(|| (0, Accuracy::new()));
					*count += 1;
					accuracy.update((*prediction, *label));
				}
				let groups: BTreeMap<String, GroupAccuracy> = accuracies
					.into_iter()
					.map(|(value, (count, accuracy))| {
						let accuracy = accuracy.finalize().unwrap_or(0.0);
						(value, GroupAccuracy { count, accuracy })
					})
					.collect();
				let accuracy_gap = accuracy_gap(&groups);
				log::info!(
					"{} accuracy ranges over {} groups with a gap of {:.4}",
					feature,
					groups.len(),
					accuracy_gap
				);
				Some(GroupingReport {
					feature: (*feature).to_owned(),
					dimension: *dimension,
					groups,
					accuracy_gap,
				})
			})
			.collect();
		BiasReport { groupings }
	}

	pub fn grouping(&self, feature: &str) -> Option<&GroupingReport> {
		self.groupings
			.iter()
			.find(|grouping| grouping.feature == feature)
	}
}

fn accuracy_gap(groups: &BTreeMap<String, GroupAccuracy>) -> f32 {
	if groups.is_empty() {
		return 0.0;
	}
	let accuracies = groups.values().map(|group| group.accuracy);
	let max = accuracies.clone().fold(std::f32::NEG_INFINITY, f32::max);
	let min = accuracies.fold(std::f32::INFINITY, f32::min);
	max - min
}

#[cfg(test)]
mod test {
	use super::*;
	use wayfarer_dataframe::{Column, TextColumn};

	fn text(name: &str, values: &[&str]) -> Column {
		Column::Text(TextColumn {
			name: name.to_owned(),
			data: values.iter().map(|value| (*value).to_owned()).collect(),
		})
	}

	#[test]
	fn test_compute() {
		let features = DataFrame::new(vec![
			text(TRAVELER_GENDER, &["Female", "Male", "Female", "Male", "Female"]),
			text(AGE_GROUP, &["26-35", "26-35", "36-50", "36-50", "26-35"]),
		]);
		let labels = [0, 1, 2, 0, 1];
		let predictions = [0, 1, 0, 0, 2];
		let report = BiasReport::compute(&features, &labels, &predictions);
		assert_eq!(report.groupings.len(), 2);
		let gender = report.grouping(TRAVELER_GENDER).unwrap();
		assert_eq!(gender.dimension, BiasDimension::Demographic);
		assert_eq!(gender.groups["Female"].count, 3);
		assert!((gender.groups["Female"].accuracy - 1.0 / 3.0).abs() < 1e-6);
		assert_eq!(gender.groups["Male"].accuracy, 1.0);
		assert!((gender.accuracy_gap - 2.0 / 3.0).abs() < 1e-6);
		let age_group = report.grouping(AGE_GROUP).unwrap();
		assert!((age_group.groups["26-35"].accuracy - 2.0 / 3.0).abs() < 1e-6);
		assert_eq!(age_group.groups["36-50"].count, 2);
		assert!(report.grouping(TRAVELER_NATIONALITY).is_none());
	}

	#[test]
	fn test_accuracy_gap() {
		assert_eq!(accuracy_gap(&BTreeMap::new()), 0.0);
		let report = BiasReport::compute(
			&DataFrame::new(vec![text(TRAVELER_GENDER, &[])]),
			&[],
			&[],
		);
		let gender = report.grouping(TRAVELER_GENDER).unwrap();
		assert!(gender.groups.is_empty());
		assert_eq!(gender.accuracy_gap, 0.0);
		let mut groups = BTreeMap::new();
		groups.insert(
			"Female".to_owned(),
			GroupAccuracy {
				count: 4,
				accuracy: 0.75,
			},
		);
		assert_eq!(accuracy_gap(&groups), 0.0);
	}
}
