/*!
This module computes the statistics of the training trips that the narrative explanations quote: per destination averages and ranges, popular accommodation and transportation types, and traveler demographics.
*/

use crate::load::parse_start_date;
use anyhow::{format_err, Result};
use chrono::Datelike;
use num_traits::ToPrimitive;
use std::collections::BTreeMap;
use wayfarer_dataframe::DataFrame;
use wayfarer_features::{
	number_values, text_values, ACCOMMODATION_COST, ACCOMMODATION_TYPE, DESTINATION, DURATION,
	START_DATE, TRANSPORTATION_COST, TRANSPORTATION_TYPE, TRAVELER_AGE, TRAVELER_GENDER,
	TRAVELER_NATIONALITY,
};

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DatasetStats {
	pub destinations: BTreeMap<String, DestinationStats>,
	pub overall: OverallStats,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OverallStats {
	pub total_trips: usize,
	pub unique_destinations: usize,
	pub destination_popularity: BTreeMap<String, usize>,
}

/// Averages are over the trips where the value is present, and are zero when it never is. Ranges are (min, max).
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DestinationStats {
	pub total_trips: usize,
	pub avg_duration: f32,
	pub duration_range: (f32, f32),
	pub avg_accommodation_cost: f32,
	pub accommodation_cost_range: (f32, f32),
	pub avg_transportation_cost: f32,
	pub transportation_cost_range: (f32, f32),
	pub avg_total_cost: f32,
	pub popular_accommodation_types: BTreeMap<String, usize>,
	pub popular_transportation_types: BTreeMap<String, usize>,
	pub age_demographics: AgeDemographics,
	pub gender_distribution: BTreeMap<String, usize>,
	pub nationality_distribution: BTreeMap<String, usize>,
	/// Trips per start month, 1 through 12.
	pub seasonal_patterns: BTreeMap<u32, usize>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AgeDemographics {
	pub avg_age: f32,
	pub age_range: (f32, f32),
	/// Travelers per age bracket. The brackets are closed on the right: (0, 25] is `18-25`, (25, 35] is `26-35`, and so on.
	pub age_distribution: BTreeMap<String, usize>,
}

/// The age brackets of `AgeDemographics::age_distribution`, as (upper bound, label).
pub const AGE_BRACKETS: &[(f32, &str)] = &[
	(25.0, "18-25"),
	(35.0, "26-35"),
	(50.0, "36-50"),
	(65.0, "51-65"),
	(100.0, "65+"),
];

/// The age bracket `age` falls in, if any.
pub fn age_bracket(age: f32) -> Option<&'static str> {
	if !(age > 0.0) {
		return None;
	}
	AGE_BRACKETS
		.iter()
		.find(|(upper, _)| age <= *upper)
		.map(|(_, label)| *label)
}

impl DatasetStats {
	/// Compute the statistics of the raw training trips in `data`.
	pub fn compute(data: &DataFrame) -> Result<Self> {
		let n_rows = data.nrows();
		let destinations = text_values(data, DESTINATION)
			.ok_or_else(|| format_err!("the trips have no {} column", DESTINATION))?;
		let numbers = |name: &str| {
			number_values(data, name).unwrap_or_else(|| vec![std::f32::NAN; n_rows])
		};
		let categories = |name: &str| {
			text_values(data, name).unwrap_or_else(|| vec![String::new(); n_rows])
		};
		let duration = numbers(DURATION);
		let accommodation_cost = numbers(ACCOMMODATION_COST);
		let transportation_cost = numbers(TRANSPORTATION_COST);
		let age = numbers(TRAVELER_AGE);
		let accommodation_type = categories(ACCOMMODATION_TYPE);
		let transportation_type = categories(TRANSPORTATION_TYPE);
		let gender = categories(TRAVELER_GENDER);
		let nationality = categories(TRAVELER_NATIONALITY);
		let start_month: Vec<Option<u32>> = match data.text_column(START_DATE) {
			Some(column) => column
				.data
				.iter()
				.map(|value| parse_start_date(value).map(|date| date.month()))
				.collect(),
			None => vec![None; n_rows],
		};

		let mut rows_by_destination: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
		for (row, destination) in destinations.iter().enumerate() {
			rows_by_destination
				.entry(destination.as_str())
				.or_default()
				.push(row);
		}

		let mut stats = DatasetStats::default();
		for (destination, rows) in rows_by_destination.iter() {
			let select = |values: &[f32]| -> Vec<f32> { rows.iter().map(|row| values[*row]).collect() };
			let duration = select(&duration);
			let accommodation_cost = select(&accommodation_cost);
			let transportation_cost = select(&transportation_cost);
			let total_cost: Vec<f32> = accommodation_cost
				.iter()
				.zip(transportation_cost.iter())
				.map(|(a, b)| a + b)
				.collect();
			let age = select(&age);
			let mut age_distribution = BTreeMap::new();
			for bracket in age.iter().filter_map(|age| age_bracket(*age)) {
				*age_distribution.entry(bracket.to_owned()).or_insert(0) += 1;
			}
			let mut seasonal_patterns = BTreeMap::new();
			for month in rows.iter().filter_map(|row| start_month[*row]) {
				*seasonal_patterns.entry(month).or_insert(0) += 1;
			}
			let destination_stats = DestinationStats {
				total_trips: rows.len(),
				avg_duration: mean(&duration),
				duration_range: range(&duration),
				avg_accommodation_cost: mean(&accommodation_cost),
				accommodation_cost_range: range(&accommodation_cost),
				avg_transportation_cost: mean(&transportation_cost),
				transportation_cost_range: range(&transportation_cost),
				avg_total_cost: mean(&total_cost),
				popular_accommodation_types: value_counts(rows, &accommodation_type),
				popular_transportation_types: value_counts(rows, &transportation_type),
				age_demographics: AgeDemographics {
					avg_age: mean(&age),
					age_range: range(&age),
					age_distribution,
				},
				gender_distribution: value_counts(rows, &gender),
				nationality_distribution: value_counts(rows, &nationality),
				seasonal_patterns,
			};
			stats
				.overall
				.destination_popularity
				.insert((*destination).to_owned(), rows.len());
			stats
				.destinations
				.insert((*destination).to_owned(), destination_stats);
		}
		stats.overall.total_trips = n_rows;
		stats.overall.unique_destinations = stats.destinations.len();
		Ok(stats)
	}

	/// The statistics used when `compute` fails: only the trip count is known.
	pub fn basic(n_trips: usize) -> Self {
		Self {
			overall: OverallStats {
				total_trips: n_trips,
				..Default::default()
			},
			..Default::default()
		}
	}

	pub fn destination(&self, destination: &str) -> Option<&DestinationStats> {
		self.destinations.get(destination)
	}
}

fn mean(values: &[f32]) -> f32 {
	let valid: Vec<f64> = values
		.iter()
		.filter(|value| value.is_finite())
		.map(|value| value.to_f64().unwrap())
		.collect();
	if valid.is_empty() {
		return 0.0;
	}
	(valid.iter().sum::<f64>() / valid.len().to_f64().unwrap())
		.to_f32()
		.unwrap_or(0.0)
}

fn range(values: &[f32]) -> (f32, f32) {
	values
		.iter()
		.filter(|value| value.is_finite())
		.fold(None, |range: Option<(f32, f32)>, value| match range {
			None => Some((*value, *value)),
			Some((min, max)) => Some((min.min(*value), max.max(*value))),
		})
		.unwrap_or((0.0, 0.0))
}

/// Count the present values at `rows`. Missing values are not counted.
fn value_counts(rows: &[usize], values: &[String]) -> BTreeMap<String, usize> {
	let mut counts = BTreeMap::new();
	for value in rows.iter().map(|row| values[*row].as_str()) {
		if value.is_empty() || value == wayfarer_features::MISSING_CATEGORY {
			continue;
		}
		*counts.entry(value.to_owned()).or_insert(0) += 1;
	}
	counts
}

#[cfg(test)]
mod test {
	use super::*;
	use wayfarer_dataframe::FromCsvOptions;
	use wayfarer_features::RAW_NUMBER_COLUMNS;

	#[test]
	fn test_compute() {
		let csv = "Trip ID,Destination,Start date,Duration (days),Traveler age,Traveler gender,Traveler nationality,Accommodation type,Accommodation cost,Transportation type,Transportation cost
1,\"Paris, France\",5/1/2023,7,30,Female,American,Hotel,\"$1,000\",Flight,600
2,\"Paris, France\",6/1/2023,5,,Male,British,Airbnb,800,Train,
3,\"Paris, France\",5/20/2023,9,62,Female,American,Hotel,1200,Flight,900
4,\"Tokyo, Japan\",7/1/2023,10,25,Male,Japanese,Hostel,400,Flight,1500
";
		let data = DataFrame::from_csv(
			&mut csv::Reader::from_reader(std::io::Cursor::new(csv)),
			FromCsvOptions {
				number_columns: RAW_NUMBER_COLUMNS,
				..Default::default()
			},
		)
		.unwrap();
		let stats = DatasetStats::compute(&data).unwrap();
		assert_eq!(stats.overall.total_trips, 4);
		assert_eq!(stats.overall.unique_destinations, 2);
		assert_eq!(stats.overall.destination_popularity["Paris, France"], 3);
		let paris = stats.destination("Paris, France").unwrap();
		assert_eq!(paris.total_trips, 3);
		assert_eq!(paris.avg_duration, 7.0);
		assert_eq!(paris.duration_range, (5.0, 9.0));
		assert_eq!(paris.avg_accommodation_cost, 1000.0);
		assert_eq!(paris.avg_transportation_cost, 750.0);
		// The trip without a transportation cost has no total.
		assert_eq!(paris.avg_total_cost, 1850.0);
		assert_eq!(paris.age_demographics.avg_age, 46.0);
		assert_eq!(paris.age_demographics.age_range, (30.0, 62.0));
		insta::assert_debug_snapshot!(paris.age_demographics.age_distribution, @r###"
  {
      "26-35": 1,
      "51-65": 1,
  }
  "###);
		assert_eq!(paris.popular_accommodation_types["Hotel"], 2);
		assert_eq!(paris.gender_distribution["Female"], 2);
		assert_eq!(paris.seasonal_patterns[&5], 2);
		assert_eq!(paris.seasonal_patterns[&6], 1);
		let tokyo = stats.destination("Tokyo, Japan").unwrap();
		assert_eq!(tokyo.age_demographics.age_distribution["18-25"], 1);
	}

	#[test]
	fn test_age_bracket() {
		assert_eq!(age_bracket(25.0), Some("18-25"));
		assert_eq!(age_bracket(25.5), Some("26-35"));
		assert_eq!(age_bracket(0.0), None);
		assert_eq!(age_bracket(101.0), None);
		assert_eq!(age_bracket(std::f32::NAN), None);
	}

	#[test]
	fn test_compute_without_destinations() {
		assert!(DatasetStats::compute(&DataFrame::new(Vec::new())).is_err());
	}
}
