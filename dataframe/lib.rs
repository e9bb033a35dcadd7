/*!
This crate provides a small dataframe: a two dimensional table where each column is either numbers or text, like a spreadsheet. It implements only what the wayfarer pipeline needs: loading trip records from csv or json, selecting rows, and reading columns by name.
*/

use itertools::Itertools;
use num_traits::ToPrimitive;
use wayfarer_util::finite::{Finite, ToFinite};

pub mod load;

pub use self::load::*;

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
	pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
	Number(NumberColumn),
	Text(TextColumn),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberColumn {
	pub name: String,
	pub data: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextColumn {
	pub name: String,
	pub data: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value<'a> {
	Number(f32),
	Text(&'a str),
}

impl DataFrame {
	pub fn new(columns: Vec<Column>) -> Self {
		Self { columns }
	}

	pub fn ncols(&self) -> usize {
		self.columns.len()
	}

	pub fn nrows(&self) -> usize {
		self.columns.first().map(|column| column.len()).unwrap_or(0)
	}

	pub fn column_names(&self) -> Vec<&str> {
		self.columns.iter().map(|column| column.name()).collect()
	}

	pub fn column(&self, name: &str) -> Option<&Column> {
		self.columns.iter().find(|column| column.name() == name)
	}

	pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
		self.columns.iter_mut().find(|column| column.name() == name)
	}

	pub fn number_column(&self, name: &str) -> Option<&NumberColumn> {
		self.column(name).and_then(|column| column.as_number())
	}

	pub fn text_column(&self, name: &str) -> Option<&TextColumn> {
		self.column(name).and_then(|column| column.as_text())
	}

	/// Add a column, replacing any existing column with the same name.
	pub fn set_column(&mut self, column: Column) {
		match self.column_mut(column.name()) {
			Some(existing) => *existing = column,
			None => self.columns.push(column),
		}
	}

	/// Read the value at `row` in the column named `name`.
	pub fn value(&self, row: usize, name: &str) -> Option<Value> {
		self.column(name).and_then(|column| column.value(row))
	}

	/// Create a new dataframe with the rows at `indices`, in that order.
	pub fn take_rows(&self, indices: &[usize]) -> Self {
		let columns = self
			.columns
			.iter()
			.map(|column| column.take_rows(indices))
			.collect();
		Self { columns }
	}

	/// Keep only the rows where `mask` is true.
	pub fn retain_rows(&mut self, mask: &[bool]) {
		let indices: Vec<usize> = mask
			.iter()
			.enumerate()
			.filter(|(_, keep)| **keep)
			.map(|(index, _)| index)
			.collect();
		*self = self.take_rows(&indices);
	}

	pub fn split_at_row(&self, index: usize) -> (Self, Self) {
		let index = index.min(self.nrows());
		let left: Vec<usize> = (0..index).collect();
		let right: Vec<usize> = (index..self.nrows()).collect();
		(self.take_rows(&left), self.take_rows(&right))
	}
}

impl Column {
	pub fn len(&self) -> usize {
		match self {
			Self::Number(s) => s.data.len(),
			Self::Text(s) => s.data.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn name(&self) -> &str {
		match self {
			Self::Number(s) => s.name.as_str(),
			Self::Text(s) => s.name.as_str(),
		}
	}

	pub fn as_number(&self) -> Option<&NumberColumn> {
		match self {
			Self::Number(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_text(&self) -> Option<&TextColumn> {
		match self {
			Self::Text(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_text_mut(&mut self) -> Option<&mut TextColumn> {
		match self {
			Self::Text(s) => Some(s),
			_ => None,
		}
	}

	pub fn value(&self, row: usize) -> Option<Value> {
		match self {
			Self::Number(s) => s.data.get(row).map(|value| Value::Number(*value)),
			Self::Text(s) => s.data.get(row).map(|value| Value::Text(value.as_str())),
		}
	}

	pub fn take_rows(&self, indices: &[usize]) -> Self {
		match self {
			Self::Number(s) => Self::Number(NumberColumn {
				name: s.name.clone(),
				data: indices.iter().map(|index| s.data[*index]).collect(),
			}),
			Self::Text(s) => Self::Text(TextColumn {
				name: s.name.clone(),
				data: indices.iter().map(|index| s.data[*index].clone()).collect(),
			}),
		}
	}
}

impl NumberColumn {
	pub fn new(name: String) -> Self {
		Self {
			name,
			data: Vec::new(),
		}
	}

	/// The median of the finite values in this column, or `None` if there are none. With an even count the two middle values are averaged.
	pub fn median(&self) -> Option<f32> {
		let values: Vec<Finite<f32>> = self
			.data
			.iter()
			.filter_map(|value| value.to_finite().ok())
			.sorted()
			.collect();
		let n = values.len();
		if n == 0 {
			return None;
		}
		let median = if n % 2 == 1 {
			values[n / 2].get()
		} else {
			(values[n / 2 - 1].get() + values[n / 2].get()) / 2.0
		};
		Some(median)
	}

	/// The mean of the finite values in this column, or `None` if there are none.
	pub fn mean(&self) -> Option<f32> {
		let (sum, count) = self
			.data
			.iter()
			.filter(|value| value.is_finite())
			.fold((0.0f64, 0usize), |(sum, count), value| {
				(sum + value.to_f64().unwrap(), count + 1)
			});
		if count == 0 {
			None
		} else {
			Some((sum / count.to_f64().unwrap()).to_f32().unwrap())
		}
	}

	/// Replace every `NaN` in this column with `value`.
	pub fn fill_nan(&mut self, value: f32) {
		for v in self.data.iter_mut() {
			if v.is_nan() {
				*v = value;
			}
		}
	}
}

impl TextColumn {
	pub fn new(name: String) -> Self {
		Self {
			name,
			data: Vec::new(),
		}
	}
}

impl<'a> Value<'a> {
	pub fn as_number(&self) -> Option<f32> {
		match self {
			Value::Number(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_text(&self) -> Option<&'a str> {
		match self {
			Value::Text(value) => Some(value),
			_ => None,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn dataframe() -> DataFrame {
		DataFrame::new(vec![
			Column::Number(NumberColumn {
				name: "cost".to_owned(),
				data: vec![3.0, std::f32::NAN, 1.0, 10.0],
			}),
			Column::Text(TextColumn {
				name: "city".to_owned(),
				data: vec!["a".to_owned(), "b".to_owned(), "c".to_owned(), "d".to_owned()],
			}),
		])
	}

	#[test]
	fn test_median_ignores_nan() {
		let df = dataframe();
		assert_eq!(df.number_column("cost").unwrap().median(), Some(3.0));
		let even = NumberColumn {
			name: "x".to_owned(),
			data: vec![4.0, 1.0, 2.0, 3.0],
		};
		assert_eq!(even.median(), Some(2.5));
		let empty = NumberColumn {
			name: "x".to_owned(),
			data: vec![std::f32::NAN],
		};
		assert_eq!(empty.median(), None);
	}

	#[test]
	fn test_take_and_retain_rows() {
		let mut df = dataframe();
		let taken = df.take_rows(&[3, 0]);
		assert_eq!(taken.value(0, "city"), Some(Value::Text("d")));
		assert_eq!(taken.value(1, "cost"), Some(Value::Number(3.0)));
		df.retain_rows(&[false, true, true, false]);
		assert_eq!(df.nrows(), 2);
		assert_eq!(df.value(1, "city"), Some(Value::Text("c")));
		let (left, right) = dataframe().split_at_row(1);
		assert_eq!(left.nrows(), 1);
		assert_eq!(right.nrows(), 3);
	}
}
