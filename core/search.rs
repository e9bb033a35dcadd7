/*!
This module implements the randomized hyperparameter search: a handful of grid points are drawn without replacement and each is scored by stratified k-fold cross validation, with SMOTE applied to the training folds only.
*/

use crate::{config::SearchOptions, smote::smote};
use anyhow::{format_err, Result};
use itertools::iproduct;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use wayfarer_metrics::{argmax, Accuracy, StreamingMetric};
use wayfarer_tree::{MulticlassClassifier, TrainOptions, TrainProgress};
use wayfarer_util::progress_counter::ProgressCounter;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HyperParameters {
	/// The number of boosting rounds. Each round trains one tree per class.
	pub n_estimators: usize,
	pub learning_rate: f32,
	pub max_depth: usize,
}

impl HyperParameters {
	pub fn train_options(&self) -> TrainOptions {
		TrainOptions {
			max_rounds: self.n_estimators,
			learning_rate: self.learning_rate,
			max_depth: self.max_depth,
			..Default::default()
		}
	}
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CandidateScore {
	pub parameters: HyperParameters,
	pub fold_accuracies: Vec<f32>,
	pub mean_accuracy: f32,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SearchOutput {
	pub best_parameters: HyperParameters,
	pub best_score: f32,
	pub candidates: Vec<CandidateScore>,
}

/// Every combination of the grid's values, varying `max_depth` fastest.
pub fn parameter_grid(options: &SearchOptions) -> Vec<HyperParameters> {
	let grid = &options.grid;
	iproduct!(
		grid.n_estimators.iter(),
		grid.learning_rate.iter(),
		grid.max_depth.iter()
	)
	.map(|(n_estimators, learning_rate, max_depth)| HyperParameters {
		n_estimators: *n_estimators,
		learning_rate: *learning_rate,
		max_depth: *max_depth,
	})
	.collect()
}

/// Draw `n_iter` distinct grid points. When the grid has no more than `n_iter` points, all of them are used in grid order.
pub fn sample_candidates(
	grid: Vec<HyperParameters>,
	n_iter: usize,
	rng: &mut Xoshiro256Plus,
) -> Vec<HyperParameters> {
	if grid.len() <= n_iter {
		return grid;
	}
	grid.choose_multiple(rng, n_iter).cloned().collect()
}

/**
Assign each example to one of `n_folds` folds so that every fold has close to the same class proportions as the whole set. The examples of each class are shuffled, then the classes are dealt out to the folds in turn.
*/
pub fn stratified_folds(
	labels: &[usize],
	n_classes: usize,
	n_folds: usize,
	rng: &mut Xoshiro256Plus,
) -> Vec<usize> {
	let mut rows_by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
	for (row, label) in labels.iter().enumerate() {
		rows_by_class[*label].push(row);
	}
	let mut folds = vec![0; labels.len()];
	let mut position = 0;
	for rows in rows_by_class.iter_mut() {
		rows.shuffle(rng);
		for row in rows.iter() {
			folds[*row] = position % n_folds;
			position += 1;
		}
	}
	folds
}

/// Score each candidate by cross validation and return the one with the best mean accuracy. Ties go to the candidate drawn first.
pub fn randomized_search(
	features: ArrayView2<f32>,
	labels: &[usize],
	n_classes: usize,
	options: &SearchOptions,
	k_neighbors: usize,
	seed: u64,
) -> Result<SearchOutput> {
	let n_folds = options.n_folds;
	if labels.len() < n_folds {
		return Err(format_err!(
			"cannot cross validate {} training examples with {} folds",
			labels.len(),
			n_folds
		));
	}
	let mut rng = Xoshiro256Plus::seed_from_u64(seed);
	let candidates = sample_candidates(parameter_grid(options), options.n_iter, &mut rng);
	let folds = stratified_folds(labels, n_classes, n_folds, &mut rng);
	log::info!(
		"fitting {} folds for each of {} candidates, totalling {} fits",
		n_folds,
		candidates.len(),
		n_folds * candidates.len()
	);
	let progress_counter = ProgressCounter::new((n_folds * candidates.len()).to_u64().unwrap());
	let mut scores = Vec::with_capacity(candidates.len());
	for parameters in candidates {
		let mut fold_accuracies = Vec::with_capacity(n_folds);
		for fold in 0..n_folds {
			let train_rows: Vec<usize> = (0..labels.len()).filter(|row| folds[*row] != fold).collect();
			let test_rows: Vec<usize> = (0..labels.len()).filter(|row| folds[*row] == fold).collect();
			let model = fit_resampled(
				features.select(Axis(0), &train_rows).view(),
				&train_rows.iter().map(|row| labels[*row]).collect::<Vec<_>>(),
				n_classes,
				&parameters,
				k_neighbors,
				seed,
			);
			let accuracy = accuracy(
				&model,
				features.select(Axis(0), &test_rows).view(),
				&test_rows.iter().map(|row| labels[*row]).collect::<Vec<_>>(),
			);
			fold_accuracies.push(accuracy);
			progress_counter.inc(1);
			log::info!(
				"[{}/{}] {:?} fold {}: accuracy {:.4}",
				progress_counter.get(),
				progress_counter.total(),
				parameters,
				fold,
				accuracy
			);
		}
		let mean_accuracy =
			fold_accuracies.iter().sum::<f32>() / fold_accuracies.len().to_f32().unwrap();
		scores.push(CandidateScore {
			parameters,
			fold_accuracies,
			mean_accuracy,
		});
	}
	let best = scores
		.iter()
		.fold(None, |best: Option<&CandidateScore>, score| match best {
			Some(best) if best.mean_accuracy >= score.mean_accuracy => Some(best),
			_ => Some(score),
		})
		.ok_or_else(|| format_err!("the hyperparameter search has no candidates"))?;
	Ok(SearchOutput {
		best_parameters: best.parameters.clone(),
		best_score: best.mean_accuracy,
		candidates: scores.clone(),
	})
}

/// Oversample the training examples with SMOTE, then train a classifier on them.
pub fn fit_resampled(
	features: ArrayView2<f32>,
	labels: &[usize],
	n_classes: usize,
	parameters: &HyperParameters,
	k_neighbors: usize,
	seed: u64,
) -> MulticlassClassifier {
	let mut rng = Xoshiro256Plus::seed_from_u64(seed);
	let (features, labels) = smote(features, labels, n_classes, k_neighbors, &mut rng);
	MulticlassClassifier::train(
		features.view(),
		ArrayView1::from(labels.as_slice()),
		n_classes,
		&parameters.train_options(),
		&mut |progress| {
			if let TrainProgress::Training(progress_counter) = progress {
				log::debug!("training {} rounds", progress_counter.total());
			}
		},
	)
}

/// The fraction of `labels` the classifier's most probable class matches.
pub fn accuracy(model: &MulticlassClassifier, features: ArrayView2<f32>, labels: &[usize]) -> f32 {
	let probabilities = model.predict(features);
	let mut accuracy = Accuracy::new();
	for (probabilities, label) in probabilities.rows().into_iter().zip(labels.iter()) {
		accuracy.update((argmax(probabilities), *label));
	}
	accuracy.finalize().unwrap_or(0.0)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{config::GridOptions, smote::class_proportions};

	#[test]
	fn test_parameter_grid() {
		let grid = parameter_grid(&SearchOptions::default());
		assert_eq!(grid.len(), 8);
		assert_eq!(
			grid[1],
			HyperParameters {
				n_estimators: 100,
				learning_rate: 0.05,
				max_depth: 5,
			}
		);
		let mut rng = Xoshiro256Plus::seed_from_u64(42);
		let candidates = sample_candidates(grid.clone(), 2, &mut rng);
		assert_eq!(candidates.len(), 2);
		assert_ne!(candidates[0], candidates[1]);
		assert_eq!(sample_candidates(grid.clone(), 10, &mut rng), grid);
	}

	#[test]
	fn test_stratified_folds_preserve_proportions() {
		let labels: Vec<usize> = (0..60).map(|i| if i % 3 == 0 { 1 } else { 0 }).collect();
		let mut rng = Xoshiro256Plus::seed_from_u64(42);
		let folds = stratified_folds(&labels, 2, 2, &mut rng);
		for fold in 0..2 {
			let fold_labels: Vec<usize> = labels
				.iter()
				.zip(folds.iter())
				.filter(|(_, f)| **f == fold)
				.map(|(label, _)| *label)
				.collect();
			assert_eq!(fold_labels.len(), 30);
			let proportions = class_proportions(&fold_labels, 2);
			assert!((proportions[1] - 1.0 / 3.0).abs() < 1e-6);
		}
	}

	#[test]
	fn test_randomized_search() {
		// Two classes separated on the first feature, with the second class in the minority.
		let n = 40;
		let features = Array2::from_shape_fn((n, 2), |(row, column)| {
			let row = row.to_f32().unwrap();
			if column == 0 {
				if row < 30.0 {
					row / 30.0
				} else {
					5.0 + row / 30.0
				}
			} else {
				(row * 7.0) % 3.0
			}
		});
		let labels: Vec<usize> = (0..n).map(|row| if row < 30 { 0 } else { 1 }).collect();
		let options = SearchOptions {
			n_iter: 2,
			n_folds: 2,
			grid: GridOptions {
				n_estimators: vec![5, 10],
				learning_rate: vec![0.1, 0.3],
				max_depth: vec![2],
			},
		};
		let output = randomized_search(features.view(), &labels, 2, &options, 5, 42).unwrap();
		assert_eq!(output.candidates.len(), 2);
		assert_eq!(output.best_score, 1.0);
		for candidate in output.candidates.iter() {
			assert_eq!(candidate.fold_accuracies.len(), 2);
		}
	}
}
