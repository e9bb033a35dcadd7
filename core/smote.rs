use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::Rng;
use rand_xoshiro::Xoshiro256Plus;
use std::cmp::Ordering;

/**
Oversample every class up to the size of the largest class with SMOTE. Each synthetic example lies on the segment between a random example of the class and one of its `k_neighbors` nearest neighbors in the same class. A class with a single example is oversampled by duplicating it.

The original examples come first in the output, followed by the synthetic examples class by class.
*/
pub fn smote(
	features: ArrayView2<f32>,
	labels: &[usize],
	n_classes: usize,
	k_neighbors: usize,
	rng: &mut Xoshiro256Plus,
) -> (Array2<f32>, Vec<usize>) {
	let mut rows_by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
	for (row, label) in labels.iter().enumerate() {
		rows_by_class[*label].push(row);
	}
	let max_count = rows_by_class.iter().map(|rows| rows.len()).max().unwrap_or(0);
	let mut synthetic_features: Vec<f32> = Vec::new();
	let mut synthetic_labels: Vec<usize> = Vec::new();
	for (class, rows) in rows_by_class.iter().enumerate() {
		if rows.is_empty() || rows.len() == max_count {
			continue;
		}
		let k = k_neighbors.min(rows.len() - 1);
		let neighbors = nearest_neighbors(features, rows, k);
		for _ in 0..max_count - rows.len() {
			let sample = rng.gen_range(0..rows.len());
			let origin = features.row(rows[sample]);
			if k == 0 {
				synthetic_features.extend(origin.iter());
			} else {
				let neighbor = features.row(neighbors[sample][rng.gen_range(0..k)]);
				let gap: f32 = rng.gen();
				synthetic_features.extend(
					origin
						.iter()
						.zip(neighbor.iter())
						.map(|(origin, neighbor)| origin + gap * (neighbor - origin)),
				);
			}
			synthetic_labels.push(class);
		}
	}
	let n_synthetic = synthetic_labels.len();
	// The synthetic rows have exactly one value per feature.
	let synthetic_features =
		Array2::from_shape_vec((n_synthetic, features.ncols()), synthetic_features).unwrap();
	let resampled_features = ndarray::concatenate(
		Axis(0),
		&[features.view(), synthetic_features.view()],
	)
	.unwrap();
	let mut resampled_labels = labels.to_vec();
	resampled_labels.extend(synthetic_labels);
	(resampled_features, resampled_labels)
}

/// For each of `rows`, the `k` other rows closest to it by euclidean distance. Ties go to the earlier row.
fn nearest_neighbors(features: ArrayView2<f32>, rows: &[usize], k: usize) -> Vec<Vec<usize>> {
	rows.iter()
		.map(|row| {
			let origin = features.row(*row);
			let mut distances: Vec<(usize, f32)> = rows
				.iter()
				.filter(|other| *other != row)
				.map(|other| {
					let distance = origin
						.iter()
						.zip(features.row(*other).iter())
						.map(|(a, b)| (a - b).powi(2))
						.sum::<f32>();
					(*other, distance)
				})
				.collect();
			distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
			distances.into_iter().take(k).map(|(other, _)| other).collect()
		})
		.collect()
}

/// The number of examples of each class.
pub fn class_counts(labels: &[usize], n_classes: usize) -> Vec<usize> {
	let mut counts = vec![0; n_classes];
	for label in labels {
		counts[*label] += 1;
	}
	counts
}

/// The fraction of examples in each class.
pub fn class_proportions(labels: &[usize], n_classes: usize) -> Vec<f32> {
	let n_examples = labels.len().max(1).to_f32().unwrap();
	class_counts(labels, n_classes)
		.into_iter()
		.map(|count| count.to_f32().unwrap() / n_examples)
		.collect()
}
