use chrono::NaiveDate;
use num_traits::ToPrimitive;
use wayfarer_dataframe::{
	is_invalid_value, parse_number, Column, DataFrame, NumberColumn, TextColumn,
	DEFAULT_INVALID_VALUES,
};

pub const DESTINATION: &str = "Destination";
pub const START_DATE: &str = "Start date";
pub const DURATION: &str = "Duration (days)";
pub const TRAVELER_AGE: &str = "Traveler age";
pub const TRAVELER_DOB: &str = "Traveler DOB";
pub const TRAVELER_GENDER: &str = "Traveler gender";
pub const TRAVELER_NATIONALITY: &str = "Traveler nationality";
pub const ACCOMMODATION_TYPE: &str = "Accommodation type";
pub const ACCOMMODATION_COST: &str = "Accommodation cost";
pub const TRANSPORTATION_TYPE: &str = "Transportation type";
pub const TRANSPORTATION_COST: &str = "Transportation cost";
pub const AGE: &str = "Age";
pub const AGE_GROUP: &str = "Age_Group";
pub const ACCOMMODATION_BUDGET: &str = "Accommodation_Budget";
pub const TRANSPORTATION_BUDGET: &str = "Transportation_Budget";
pub const COST_PER_DAY: &str = "Cost_Per_Day";
pub const TOTAL_TRIP_COST: &str = "Total_Trip_Cost";

/// The raw columns that are parsed as numbers and imputed with their median.
pub const RAW_NUMBER_COLUMNS: &[&str] = &[
	ACCOMMODATION_COST,
	TRANSPORTATION_COST,
	DURATION,
	TRAVELER_AGE,
];

/// The age used when a record has neither a date of birth nor an age.
pub const DEFAULT_AGE: f32 = 35.0;

pub const DOB_FORMAT: &str = "%m/%d/%Y";

/// The value every missing or unbucketed categorical value becomes.
pub const MISSING_CATEGORY: &str = "nan";

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FeatureKind {
	Number,
	Categorical,
}

/// The features every model is trained on, in column order.
pub const BASE_FEATURES: &[(&str, FeatureKind)] = &[
	(DURATION, FeatureKind::Number),
	(AGE, FeatureKind::Number),
	(TRAVELER_GENDER, FeatureKind::Categorical),
	(TRAVELER_NATIONALITY, FeatureKind::Categorical),
	(ACCOMMODATION_TYPE, FeatureKind::Categorical),
	(ACCOMMODATION_COST, FeatureKind::Number),
	(TRANSPORTATION_TYPE, FeatureKind::Categorical),
	(TRANSPORTATION_COST, FeatureKind::Number),
	(AGE_GROUP, FeatureKind::Categorical),
	(ACCOMMODATION_BUDGET, FeatureKind::Categorical),
	(TRANSPORTATION_BUDGET, FeatureKind::Categorical),
	(COST_PER_DAY, FeatureKind::Number),
	(TOTAL_TRIP_COST, FeatureKind::Number),
];

/**
A `FeatureTransformer` derives the fixed feature columns from raw trip records.

| feature | derivation |
|---------|------------|
| Age | years since `Traveler DOB`, else `Traveler age`, else 35 |
| Age_Group | `[0,25)` 18-25, `[25,35)` 26-35, `[35,50)` 36-50, `[50,65)` 51-65, `[65,100)` 65+ |
| Accommodation_Budget | `(0,500]` Budget, `(500,1500]` Mid_Range, above Luxury |
| Transportation_Budget | `(0,400]` Budget, `(400,1000]` Mid_Range, above Premium |
| Cost_Per_Day | accommodation cost / max(duration, 1) |
| Total_Trip_Cost | accommodation cost + transportation cost |

Missing raw numbers are imputed with the median of the batch being transformed, so a batch of one record imputes nothing.
*/
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureTransformer {
	/// Raw columns passed through as additional categorical features.
	pub extra_categorical_features: Vec<String>,
}

impl FeatureTransformer {
	pub fn new(extra_categorical_features: Vec<String>) -> Self {
		Self {
			extra_categorical_features,
		}
	}

	pub fn features(&self) -> Vec<(String, FeatureKind)> {
		BASE_FEATURES
			.iter()
			.map(|(name, kind)| ((*name).to_owned(), *kind))
			.chain(
				self.extra_categorical_features
					.iter()
					.map(|name| (name.clone(), FeatureKind::Categorical)),
			)
			.collect()
	}

	pub fn feature_names(&self) -> Vec<String> {
		self.features().into_iter().map(|(name, _)| name).collect()
	}

	/// Derive the feature columns for every row in `data`. `today` is the date ages are computed against.
	pub fn transform(&self, data: &DataFrame, today: NaiveDate) -> DataFrame {
		let n_rows = data.nrows();
		let mut raw_numbers: Vec<Vec<f32>> = RAW_NUMBER_COLUMNS
			.iter()
			.map(|name| number_values(data, name).unwrap_or_else(|| vec![std::f32::NAN; n_rows]))
			.collect();
		for values in raw_numbers.iter_mut() {
			impute_median(values);
		}
		let accommodation_cost = &raw_numbers[0];
		let transportation_cost = &raw_numbers[1];
		let duration = &raw_numbers[2];
		let traveler_age = &raw_numbers[3];
		let dob = text_values(data, TRAVELER_DOB);
		let age: Vec<f32> = (0..n_rows)
			.map(|row| {
				let dob = dob.as_ref().map(|dob| dob[row].as_str());
				compute_age(dob, traveler_age[row], today)
			})
			.collect();
		let mut columns = Vec::new();
		for (name, kind) in self.features() {
			let column = match name.as_str() {
				DURATION => number_column(name, duration.clone()),
				AGE => number_column(name, age.clone()),
				ACCOMMODATION_COST => number_column(name, accommodation_cost.clone()),
				TRANSPORTATION_COST => number_column(name, transportation_cost.clone()),
				AGE_GROUP => text_column(name, age.iter().map(|age| age_group(*age))),
				ACCOMMODATION_BUDGET => text_column(
					name,
					accommodation_cost.iter().map(|cost| accommodation_budget(*cost)),
				),
				TRANSPORTATION_BUDGET => text_column(
					name,
					transportation_cost
						.iter()
						.map(|cost| transportation_budget(*cost)),
				),
				COST_PER_DAY => number_column(
					name,
					accommodation_cost
						.iter()
						.zip(duration.iter())
						.map(|(cost, duration)| cost_per_day(*cost, *duration))
						.collect(),
				),
				TOTAL_TRIP_COST => number_column(
					name,
					accommodation_cost
						.iter()
						.zip(transportation_cost.iter())
						.map(|(a, b)| a + b)
						.collect(),
				),
				_ => match kind {
					FeatureKind::Categorical => {
						let values = text_values(data, &name)
							.unwrap_or_else(|| vec![MISSING_CATEGORY.to_owned(); n_rows]);
						Column::Text(TextColumn { name, data: values })
					}
					FeatureKind::Number => {
						let values = number_values(data, &name)
							.unwrap_or_else(|| vec![std::f32::NAN; n_rows]);
						number_column(name, values)
					}
				},
			};
			columns.push(column);
		}
		DataFrame::new(columns)
	}
}

fn number_column(name: String, data: Vec<f32>) -> Column {
	Column::Number(NumberColumn { name, data })
}

fn text_column<'a>(name: String, values: impl Iterator<Item = &'a str>) -> Column {
	Column::Text(TextColumn {
		name,
		data: values.map(|value| value.to_owned()).collect(),
	})
}

/// Read the column named `name` as numbers, parsing text columns. Returns `None` if the column is absent.
pub fn number_values(data: &DataFrame, name: &str) -> Option<Vec<f32>> {
	match data.column(name)? {
		Column::Number(column) => Some(column.data.clone()),
		Column::Text(column) => Some(
			column
				.data
				.iter()
				.map(|value| parse_number(value, DEFAULT_INVALID_VALUES))
				.collect(),
		),
	}
}

/// Read the column named `name` as categories. Missing values become `"nan"`. Returns `None` if the column is absent.
pub fn text_values(data: &DataFrame, name: &str) -> Option<Vec<String>> {
	match data.column(name)? {
		Column::Text(column) => Some(
			column
				.data
				.iter()
				.map(|value| {
					if is_invalid_value(value) {
						MISSING_CATEGORY.to_owned()
					} else {
						value.trim().to_owned()
					}
				})
				.collect(),
		),
		Column::Number(column) => Some(
			column
				.data
				.iter()
				.map(|value| {
					if value.is_finite() {
						value.to_string()
					} else {
						MISSING_CATEGORY.to_owned()
					}
				})
				.collect(),
		),
	}
}

fn impute_median(values: &mut Vec<f32>) {
	let mut column = NumberColumn {
		name: String::new(),
		data: std::mem::take(values),
	};
	if let Some(median) = column.median() {
		column.fill_nan(median);
	}
	*values = column.data;
}

/// Age in years from a `%m/%d/%Y` date of birth, falling back to `age` and then to 35.
pub fn compute_age(dob: Option<&str>, age: f32, today: NaiveDate) -> f32 {
	let dob = dob.and_then(|dob| NaiveDate::parse_from_str(dob.trim(), DOB_FORMAT).ok());
	if let Some(dob) = dob {
		return (today - dob).num_days().to_f32().unwrap() / 365.25;
	}
	if age.is_finite() {
		age
	} else {
		DEFAULT_AGE
	}
}

pub fn age_group(age: f32) -> &'static str {
	match age {
		age if (0.0..25.0).contains(&age) => "18-25",
		age if (25.0..35.0).contains(&age) => "26-35",
		age if (35.0..50.0).contains(&age) => "36-50",
		age if (50.0..65.0).contains(&age) => "51-65",
		age if (65.0..100.0).contains(&age) => "65+",
		_ => MISSING_CATEGORY,
	}
}

pub fn accommodation_budget(cost: f32) -> &'static str {
	budget(cost, 500.0, 1500.0, "Luxury")
}

pub fn transportation_budget(cost: f32) -> &'static str {
	budget(cost, 400.0, 1000.0, "Premium")
}

fn budget(cost: f32, low: f32, high: f32, top: &'static str) -> &'static str {
	if cost.is_nan() || cost <= 0.0 {
		MISSING_CATEGORY
	} else if cost <= low {
		"Budget"
	} else if cost <= high {
		"Mid_Range"
	} else {
		top
	}
}

pub fn cost_per_day(accommodation_cost: f32, duration: f32) -> f32 {
	if duration.is_nan() {
		std::f32::NAN
	} else {
		accommodation_cost / duration.max(1.0)
	}
}
