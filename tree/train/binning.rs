use crate::TrainOptions;
use itertools::Itertools;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use std::{cmp::Ordering, collections::BTreeMap};
use wayfarer_util::finite::Finite;

/*
This struct specifies how to bin a feature.

The first bin is reserved for invalid values, and after that feature values are binned by comparing them with a set of thresholds. For example, given the thresholds `[0.5, 1.5, 2]`, the bins will be:
0. invalid values
1. (-infinity, 0.5]
2. (0.5, 1.5]
3. (1.5, 2]
4. (2, infinity)
*/
#[derive(Clone, Debug, PartialEq)]
pub struct BinningInstruction {
	pub thresholds: Vec<f32>,
}

impl BinningInstruction {
	pub fn n_bins(&self) -> usize {
		self.thresholds.len() + 2
	}

	pub fn bin(&self, value: f32) -> u8 {
		if !value.is_finite() {
			return 0;
		}
		// Use binary search on the thresholds to find the bin for the feature value.
		let bin = self
			.thresholds
			.binary_search_by(|threshold| threshold.partial_cmp(&value).unwrap_or(Ordering::Less))
			.unwrap_or_else(|bin| bin);
		(bin + 1).to_u8().unwrap()
	}

	/// Examples in bins `0..=bin` go left. This is the split value that sends the same examples left.
	pub fn split_value(&self, bin: usize) -> f32 {
		self.thresholds[bin - 1]
	}
}

/// Compute the binning instructions for each column in `features`.
pub fn compute_binning_instructions(
	features: ArrayView2<f32>,
	train_options: &TrainOptions,
) -> Vec<BinningInstruction> {
	features
		.axis_iter(Axis(1))
		.map(|column| compute_binning_instruction_for_feature(column, train_options))
		.collect()
}

fn compute_binning_instruction_for_feature(
	column: ArrayView1<f32>,
	train_options: &TrainOptions,
) -> BinningInstruction {
	// Create a histogram of values in the number feature.
	let mut histogram: BTreeMap<Finite<f32>, usize> = BTreeMap::new();
	let mut histogram_values_count = 0;
	for value in column
		.iter()
		.take(train_options.max_examples_for_computing_bin_thresholds)
	{
		if let Ok(value) = Finite::new(*value) {
			*histogram.entry(value).or_insert(0) += 1;
			histogram_values_count += 1;
		}
	}
	// If the number of unique values is less than `max_valid_bins_for_number_features`, then create one bin per unique value. Otherwise, create bins at quantiles.
	let thresholds = if histogram.len()
		< train_options
			.max_valid_bins_for_number_features
			.to_usize()
			.unwrap()
	{
		histogram
			.keys()
			.tuple_windows()
			.map(|(a, b)| (a.get() + b.get()) / 2.0)
			.collect()
	} else {
		compute_thresholds_as_quantiles(histogram, histogram_values_count, train_options)
	};
	BinningInstruction { thresholds }
}

fn compute_thresholds_as_quantiles(
	histogram: BTreeMap<Finite<f32>, usize>,
	histogram_values_count: usize,
	train_options: &TrainOptions,
) -> Vec<f32> {
	let max_valid_bins = train_options.max_valid_bins_for_number_features;
	let total_values_count = histogram_values_count.to_f32().unwrap();
	let quantiles: Vec<f32> = (1..max_valid_bins.to_usize().unwrap())
		.map(|i| i.to_f32().unwrap() / max_valid_bins.to_f32().unwrap())
		.collect();
	let quantile_indexes: Vec<usize> = quantiles
		.iter()
		.map(|q| ((total_values_count - 1.0) * q).trunc().to_usize().unwrap())
		.collect();
	let quantile_fracts: Vec<f32> = quantiles
		.iter()
		.map(|q| ((total_values_count - 1.0) * q).fract())
		.collect();
	let mut quantiles: Vec<Option<f32>> = vec![None; quantiles.len()];
	let mut current_count: usize = 0;
	let mut iter = histogram.iter().peekable();
	while let Some((value, count)) = iter.next() {
		let value = value.get();
		current_count += count;
		let next_value = iter.peek().map(|(next, _)| next.get()).unwrap_or(value);
		let quantiles_iter = quantiles
			.iter_mut()
			.zip(quantile_indexes.iter().zip(quantile_fracts.iter()))
			.filter(|(q, (_, _))| q.is_none());
		for (quantile, (index, fract)) in quantiles_iter {
			match (current_count - 1).cmp(index) {
				Ordering::Equal => {
					*quantile = Some(value * (1.0 - fract) + next_value * fract);
				}
				Ordering::Greater => *quantile = Some(value),
				Ordering::Less => {}
			}
		}
	}
	// Repeated values produce repeated quantiles, which would leave empty bins.
	quantiles.into_iter().flatten().dedup().collect()
}

/// Bin every value in `features`. The result has the same shape as `features`.
pub fn compute_binned_features(
	features: ArrayView2<f32>,
	binning_instructions: &[BinningInstruction],
) -> Array2<u8> {
	let mut binned_features = Array2::zeros(features.raw_dim());
	for (mut binned_column, column, binning_instruction) in itertools::izip!(
		binned_features.axis_iter_mut(Axis(1)),
		features.axis_iter(Axis(1)),
		binning_instructions,
	) {
		for (binned_value, value) in binned_column.iter_mut().zip(column.iter()) {
			*binned_value = binning_instruction.bin(*value);
		}
	}
	binned_features
}

#[test]
fn test_binning_instructions_use_midpoints() {
	let features = arr2(&[[1.0], [3.0], [3.0], [2.0], [std::f32::NAN]]);
	let instructions = compute_binning_instructions(features.view(), &TrainOptions::default());
	assert_eq!(instructions[0].thresholds, vec![1.5, 2.5]);
	let binned = compute_binned_features(features.view(), &instructions);
	assert_eq!(binned.column(0).to_vec(), vec![1, 3, 3, 2, 0]);
	assert_eq!(instructions[0].n_bins(), 4);
	assert_eq!(instructions[0].split_value(2), 2.5);
}

#[test]
fn test_binning_instructions_use_quantiles() {
	let values: Vec<f32> = (0..1000).map(|i| i.to_f32().unwrap()).collect();
	let features = Array2::from_shape_vec((1000, 1), values).unwrap();
	let options = TrainOptions {
		max_valid_bins_for_number_features: 4,
		..Default::default()
	};
	let instructions = compute_binning_instructions(features.view(), &options);
	assert_eq!(instructions[0].thresholds, vec![249.75, 499.5, 749.25]);
}
