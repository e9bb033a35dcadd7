/*!
This module loads the historical trips csv, cleans its destinations, and splits it chronologically into a training and a test set.
*/

use crate::Error;
use anyhow::{format_err, Result};
use chrono::NaiveDate;
use num_traits::ToPrimitive;
use std::path::Path;
use wayfarer_dataframe::{is_invalid_value, Column, DataFrame, FromCsvOptions};
use wayfarer_features::{DESTINATION, RAW_NUMBER_COLUMNS, START_DATE};

/// Known variants of destination names, mapped to the name they are merged into.
pub const CONSOLIDATION_MAP: &[(&str, &str)] = &[
	("Bangkok, Thai", "Bangkok, Thailand"),
	("Cape Town, SA", "Cape Town, South Africa"),
	("New York City, USA", "New York, USA"),
	("London, UK", "London, United Kingdom"),
	("Sydney, AUS", "Sydney, Australia"),
	("Sydney, Aus", "Sydney, Australia"),
	("Phuket, Thai", "Phuket, Thailand"),
];

/// The formats `Start date` values are accepted in, tried in order.
pub const START_DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%m/%d/%y"];

/// Read the trips csv at `path`. The raw cost, duration and age columns are parsed as numbers and everything else is kept as text.
pub fn load_trips(path: &Path) -> Result<DataFrame> {
	if !path.exists() {
		return Err(Error::DataNotFound {
			path: path.to_owned(),
		}
		.into());
	}
	DataFrame::from_path(
		path,
		FromCsvOptions {
			number_columns: RAW_NUMBER_COLUMNS,
			..Default::default()
		},
	)
}

/// Merge a known variant of a destination name into its canonical name.
pub fn consolidate_destination(destination: &str) -> String {
	let destination = destination.trim();
	CONSOLIDATION_MAP
		.iter()
		.find(|(variant, _)| *variant == destination)
		.map(|(_, canonical)| (*canonical).to_owned())
		.unwrap_or_else(|| destination.to_owned())
}

/**
Drop the rows whose destination is missing or is not in "city, country" form, and consolidate the names of the rest. Returns the number of rows dropped.
*/
pub fn clean_destinations(data: &mut DataFrame) -> Result<usize> {
	let column = data
		.column_mut(DESTINATION)
		.and_then(|column| column.as_text_mut())
		.ok_or_else(|| format_err!("the trips file has no {} column", DESTINATION))?;
	let mask: Vec<bool> = column
		.data
		.iter()
		.map(|destination| !is_invalid_value(destination) && destination.contains(','))
		.collect();
	for destination in column.data.iter_mut() {
		*destination = consolidate_destination(destination);
	}
	let n_dropped = mask.iter().filter(|keep| !**keep).count();
	data.retain_rows(&mask);
	Ok(n_dropped)
}

/// Parse a start date in any of the `START_DATE_FORMATS`.
pub fn parse_start_date(value: &str) -> Option<NaiveDate> {
	let value = value.trim();
	START_DATE_FORMATS
		.iter()
		.find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

#[derive(Debug)]
pub struct ChronologicalSplit {
	pub train: DataFrame,
	pub test: DataFrame,
	/// The start date of the first test row. Every test row starts on or after it.
	pub boundary: Option<NaiveDate>,
	/// The number of rows dropped because their start date did not parse.
	pub n_dropped: usize,
}

/**
Order the rows by start date and split them by position, so the test set holds the latest `test_fraction` of trips. Rows with the same start date keep their order from the file.
*/
pub fn chronological_split(data: &DataFrame, test_fraction: f32) -> Result<ChronologicalSplit> {
	let start_dates: Vec<Option<NaiveDate>> = match data.column(START_DATE) {
		Some(Column::Text(column)) => column
			.data
			.iter()
			.map(|value| parse_start_date(value))
			.collect(),
		_ => return Err(format_err!("the trips file has no {} column", START_DATE)),
	};
	let mut dated: Vec<(usize, NaiveDate)> = start_dates
		.iter()
		.enumerate()
		.filter_map(|(index, date)| date.map(|date| (index, date)))
		.collect();
	let n_dropped = data.nrows() - dated.len();
	dated.sort_by_key(|(_, date)| *date);
	let n_rows = dated.len();
	let n_train = ((1.0 - test_fraction) * n_rows.to_f32().unwrap())
		.to_usize()
		.unwrap_or(0)
		.min(n_rows);
	let train_indices: Vec<usize> = dated[..n_train].iter().map(|(index, _)| *index).collect();
	let test_indices: Vec<usize> = dated[n_train..].iter().map(|(index, _)| *index).collect();
	Ok(ChronologicalSplit {
		train: data.take_rows(&train_indices),
		test: data.take_rows(&test_indices),
		boundary: dated.get(n_train).map(|(_, date)| *date),
		n_dropped,
	})
}

#[cfg(test)]
mod test {
	use super::*;
	use wayfarer_dataframe::TextColumn;

	fn text(name: &str, values: &[&str]) -> Column {
		Column::Text(TextColumn {
			name: name.to_owned(),
			data: values.iter().map(|value| (*value).to_owned()).collect(),
		})
	}

	#[test]
	fn test_clean_destinations() {
		let mut data = DataFrame::new(vec![text(
			DESTINATION,
			&["London, UK", "Paris", "", " Sydney, Aus ", "Tokyo, Japan", "nan"],
		)]);
		let n_dropped = clean_destinations(&mut data).unwrap();
		assert_eq!(n_dropped, 3);
		insta::assert_debug_snapshot!(data.text_column(DESTINATION).unwrap().data, @r###"
  [
      "London, United Kingdom",
      "Sydney, Australia",
      "Tokyo, Japan",
  ]
  "###);
	}

	#[test]
	fn test_parse_start_date() {
		let date = NaiveDate::from_ymd_opt(2023, 5, 1).unwrap();
		assert_eq!(parse_start_date("5/1/2023"), Some(date));
		assert_eq!(parse_start_date("2023-05-01"), Some(date));
		assert_eq!(parse_start_date("05/01/23"), Some(date));
		assert_eq!(parse_start_date("yesterday"), None);
	}

	#[test]
	fn test_chronological_split() {
		let data = DataFrame::new(vec![
			text(
				START_DATE,
				&[
					"3/1/2023", "1/1/2023", "bad", "5/1/2023", "2/1/2023", "4/1/2023", "1/1/2023",
				],
			),
			text("Trip ID", &["a", "b", "c", "d", "e", "f", "g"]),
		]);
		let split = chronological_split(&data, 0.4).unwrap();
		assert_eq!(split.n_dropped, 1);
		assert_eq!(
			split.train.text_column("Trip ID").unwrap().data,
			vec!["b", "g", "e"]
		);
		assert_eq!(split.test.text_column("Trip ID").unwrap().data, vec!["a", "f", "d"]);
		let boundary = split.boundary.unwrap();
		for value in split.test.text_column(START_DATE).unwrap().data.iter() {
			assert!(parse_start_date(value).unwrap() >= boundary);
		}
		for value in split.train.text_column(START_DATE).unwrap().data.iter() {
			assert!(parse_start_date(value).unwrap() <= boundary);
		}
	}

	#[test]
	fn test_missing_file() {
		let error = load_trips(Path::new("/nonexistent/trips.csv")).unwrap_err();
		assert!(matches!(
			error.downcast_ref::<Error>(),
			Some(Error::DataNotFound { .. })
		));
	}
}
