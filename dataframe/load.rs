use super::*;
use anyhow::Result;
use num_traits::ToPrimitive;
use std::path::Path;

#[derive(Clone)]
pub struct FromCsvOptions<'a> {
	/// These columns are parsed as numbers. Every other column is loaded as text.
	pub number_columns: &'a [&'a str],
	pub invalid_values: &'a [&'a str],
}

impl<'a> Default for FromCsvOptions<'a> {
	fn default() -> Self {
		Self {
			number_columns: &[],
			invalid_values: DEFAULT_INVALID_VALUES,
		}
	}
}

/// These values are the default values that are considered invalid.
pub const DEFAULT_INVALID_VALUES: &[&str] = &[
	"", "null", "NULL", "n/a", "N/A", "nan", "-nan", "NaN", "-NaN", "?",
];

/// Returns true if `value` is one of the default invalid values, ignoring surrounding whitespace.
pub fn is_invalid_value(value: &str) -> bool {
	DEFAULT_INVALID_VALUES.contains(&value.trim())
}

/// Parse a number that may be written as a currency amount, such as `$1,200.50`. Invalid values and anything that does not parse to a finite number become `NaN`.
pub fn parse_number(value: &str, invalid_values: &[&str]) -> f32 {
	let value = value.trim();
	if invalid_values.contains(&value) {
		return std::f32::NAN;
	}
	let cleaned: String = value.chars().filter(|c| *c != '$' && *c != ',').collect();
	match lexical::parse::<f32, _>(cleaned.trim().as_bytes()) {
		Ok(value) if value.is_finite() => value,
		_ => std::f32::NAN,
	}
}

impl DataFrame {
	pub fn from_path(path: &Path, options: FromCsvOptions) -> Result<Self> {
		Self::from_csv(&mut csv::Reader::from_path(path)?, options)
	}

	pub fn from_csv<R>(reader: &mut csv::Reader<R>, options: FromCsvOptions) -> Result<Self>
	where
		R: std::io::Read,
	{
		let column_names: Vec<String> = reader
			.headers()?
			.into_iter()
			.map(|column_name| column_name.trim().to_owned())
			.collect();
		let mut columns: Vec<Column> = column_names
			.into_iter()
			.map(|column_name| {
				if options.number_columns.contains(&column_name.as_str()) {
					Column::Number(NumberColumn::new(column_name))
				} else {
					Column::Text(TextColumn::new(column_name))
				}
			})
			.collect();
		let mut record = csv::StringRecord::new();
		while reader.read_record(&mut record)? {
			for (index, column) in columns.iter_mut().enumerate() {
				// Short rows are padded with invalid values.
				let value = record.get(index).unwrap_or("");
				match column {
					Column::Number(column) => {
						column.data.push(parse_number(value, options.invalid_values))
					}
					Column::Text(column) => column.data.push(value.to_owned()),
				}
			}
		}
		Ok(Self { columns })
	}

	/// Build a dataframe from json objects, one row per object. Columns named in `number_columns` hold numbers, accepting json numbers and numeric strings. Every other key becomes a text column. Values missing from an object are `NaN` or the empty string.
	pub fn from_records(
		records: &[serde_json::Map<String, serde_json::Value>],
		number_columns: &[&str],
	) -> Self {
		let mut column_names: Vec<String> = Vec::new();
		for record in records {
			for key in record.keys() {
				if !column_names.contains(key) {
					column_names.push(key.clone());
				}
			}
		}
		let columns = column_names
			.into_iter()
			.map(|column_name| {
				let values = records.iter().map(|record| record.get(&column_name));
				if number_columns.contains(&column_name.as_str()) {
					let data = values.map(json_to_number).collect();
					Column::Number(NumberColumn {
						name: column_name,
						data,
					})
				} else {
					let data = values.map(json_to_text).collect();
					Column::Text(TextColumn {
						name: column_name,
						data,
					})
				}
			})
			.collect();
		Self { columns }
	}
}

fn json_to_number(value: Option<&serde_json::Value>) -> f32 {
	match value {
		Some(serde_json::Value::Number(number)) => number
			.as_f64()
			.and_then(|value| value.to_f32())
			.filter(|value| value.is_finite())
			.unwrap_or(std::f32::NAN),
		Some(serde_json::Value::String(value)) => parse_number(value, DEFAULT_INVALID_VALUES),
		_ => std::f32::NAN,
	}
}

fn json_to_text(value: Option<&serde_json::Value>) -> String {
	match value {
		Some(serde_json::Value::String(value)) => value.clone(),
		Some(serde_json::Value::Number(number)) => number.to_string(),
		Some(serde_json::Value::Bool(value)) => value.to_string(),
		_ => String::new(),
	}
}

#[test]
fn test_from_csv_cleans_currency() {
	let csv = "Trip ID,Destination,Accommodation cost,Duration (days)
1,\"London, UK\",\"$1,200\",7
2,\"Paris, France\",n/a,
";
	let df = DataFrame::from_csv(
		&mut csv::Reader::from_reader(std::io::Cursor::new(csv)),
		FromCsvOptions {
			number_columns: &["Accommodation cost", "Duration (days)"],
			..Default::default()
		},
	)
	.unwrap();
	let cost = df.number_column("Accommodation cost").unwrap();
	assert_eq!(cost.data[0], 1200.0);
	assert!(cost.data[1].is_nan());
	let duration = df.number_column("Duration (days)").unwrap();
	assert_eq!(duration.data[0], 7.0);
	assert!(duration.data[1].is_nan());
	insta::assert_debug_snapshot!(df.text_column("Destination").unwrap(), @r###"
 TextColumn {
     name: "Destination",
     data: [
         "London, UK",
         "Paris, France",
     ],
 }
 "###);
}

#[test]
fn test_from_records() {
	let record: serde_json::Map<String, serde_json::Value> = serde_json::from_str(
		r#"{"Traveler age": 28, "Accommodation cost": "$1,200", "Traveler gender": "Female", "Flag": true}"#,
	)
	.unwrap();
	let df = DataFrame::from_records(
		&[record],
		&["Traveler age", "Accommodation cost", "Duration (days)"],
	);
	assert_eq!(df.nrows(), 1);
	assert_eq!(df.value(0, "Traveler age"), Some(Value::Number(28.0)));
	assert_eq!(df.value(0, "Accommodation cost"), Some(Value::Number(1200.0)));
	assert_eq!(df.value(0, "Traveler gender"), Some(Value::Text("Female")));
	assert_eq!(df.value(0, "Flag"), Some(Value::Text("true")));
	assert!(df.column("Duration (days)").is_none());
}

#[test]
fn test_parse_number() {
	assert_eq!(parse_number(" $2,500.5 ", DEFAULT_INVALID_VALUES), 2500.5);
	assert!(parse_number("?", DEFAULT_INVALID_VALUES).is_nan());
	assert!(parse_number("abc", DEFAULT_INVALID_VALUES).is_nan());
	assert!(is_invalid_value(" N/A "));
	assert!(!is_invalid_value("Hotel"));
}
