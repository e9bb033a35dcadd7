use itertools::Itertools;

/// The reserved class that values unseen during fitting are mapped to.
pub const FALLBACK_CLASS: &str = "nan";

/**
A `LabelEncoder` maps each distinct string to its index in the sorted list of values seen during fitting.

| value     | encoding |
|-----------|----------|
| "Airbnb"  | 0        |
| "Hostel"  | 1        |
| "Hotel"   | 2        |
*/
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LabelEncoder {
	pub classes: Vec<String>,
}

impl LabelEncoder {
	pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
		let classes = values
			.into_iter()
			.sorted()
			.dedup()
			.map(|value| value.to_owned())
			.collect();
		Self { classes }
	}

	pub fn len(&self) -> usize {
		self.classes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.classes.is_empty()
	}

	pub fn transform(&self, value: &str) -> Option<usize> {
		self.classes.iter().position(|class| class == value)
	}

	pub fn inverse_transform(&self, index: usize) -> Option<&str> {
		self.classes.get(index).map(|class| class.as_str())
	}

	/// The index of the fallback class, which is one past the last class until the fallback has been appended.
	pub fn fallback_index(&self) -> usize {
		self.transform(FALLBACK_CLASS).unwrap_or_else(|| self.classes.len())
	}

	pub fn transform_or_fallback(&self, value: &str) -> usize {
		self.transform(value)
			.unwrap_or_else(|| self.fallback_index())
	}

	/// Append the fallback class if it is not already a class.
	pub fn ensure_fallback(&mut self) {
		if self.transform(FALLBACK_CLASS).is_none() {
			self.classes.push(FALLBACK_CLASS.to_owned());
		}
	}
}

#[test]
fn test_label_encoder() {
	let mut encoder = LabelEncoder::fit(vec!["Hotel", "Airbnb", "Hotel", "Hostel"]);
	insta::assert_debug_snapshot!(encoder.classes, @r###"
 [
     "Airbnb",
     "Hostel",
     "Hotel",
 ]
 "###);
	assert_eq!(encoder.transform("Hostel"), Some(1));
	assert_eq!(encoder.inverse_transform(2), Some("Hotel"));
	assert_eq!(encoder.transform_or_fallback("Villa"), 3);
	encoder.ensure_fallback();
	encoder.ensure_fallback();
	assert_eq!(encoder.len(), 4);
	assert_eq!(encoder.transform_or_fallback("Villa"), 3);
	assert_eq!(encoder.inverse_transform(3), Some(FALLBACK_CLASS));
}

#[test]
fn test_fitted_fallback_keeps_its_sorted_index() {
	let encoder = LabelEncoder::fit(vec!["nan", "Budget", "Luxury"]);
	assert_eq!(encoder.fallback_index(), 2);
	assert_eq!(encoder.transform_or_fallback("Premium"), 2);
}
