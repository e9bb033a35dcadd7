use crate::{shap, train::train, ShapValues, TrainOptions, TrainProgress, Tree};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::{clamp, ToPrimitive};

/// This struct represents a tree multiclass classifier model. Multiclass classifier models are used to predict multiclass target values, for example which of several destinations a traveler will visit next.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MulticlassClassifier {
	/// The initial prediction of the model given no trained trees. The bias is calculated using the distribution of the unique values in target column in the training dataset.
	pub biases: Vec<f32>,
	/// The trees for this model. It has shape (n_rounds, n_classes) because for each round, we train n_classes trees.
	pub trees: Vec<Tree>,
	/// The number of classes.
	pub n_classes: usize,
	/// The number of rounds.
	pub n_rounds: usize,
}

impl MulticlassClassifier {
	/// Train a multiclass classifier. `labels` are class indexes in `0..n_classes`.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &TrainOptions,
		update_progress: &mut dyn FnMut(TrainProgress),
	) -> Self {
		train(features, labels, n_classes, options, update_progress)
	}

	/// Compute the raw scores for each class before softmax. The result has shape (n_examples, n_classes).
	pub fn compute_logits(&self, features: ArrayView2<f32>) -> Array2<f32> {
		let features = features.as_standard_layout();
		let biases = ArrayView1::from(self.biases.as_slice());
		let mut logits = Array::zeros((features.nrows(), self.n_classes));
		for (mut logits, example) in izip!(logits.axis_iter_mut(Axis(0)), features.rows()) {
			// Rows of a standard layout array are contiguous.
			let example = example.as_slice().unwrap();
			logits.assign(&biases);
			for trees in self.trees.chunks(self.n_classes.max(1)) {
				for (logit, tree) in logits.iter_mut().zip(trees.iter()) {
					*logit += tree.predict(example);
				}
			}
		}
		logits
	}

	/// Make predictions. The result has shape (n_examples, n_classes) and each row sums to one.
	pub fn predict(&self, features: ArrayView2<f32>) -> Array2<f32> {
		let mut probabilities = self.compute_logits(features);
		for probabilities in probabilities.axis_iter_mut(Axis(0)) {
			softmax(probabilities);
		}
		probabilities
	}

	/**
	Compute the cover of every node of every tree, in the order of `self.trees`. A node's cover is the fraction of `background` examples that pass through it, blended with the fraction of training examples so that no node has zero cover: `background_weight * background_fraction + (1 - background_weight) * examples_fraction`. With an empty background, the covers are the training fractions.
	*/
	pub fn compute_covers(
		&self,
		background: ArrayView2<f32>,
		background_weight: f32,
	) -> Vec<Vec<f32>> {
		let background = background.as_standard_layout();
		let n_background = background.nrows();
		let background_weight = if n_background == 0 {
			0.0
		} else {
			background_weight
		};
		self.trees
			.iter()
			.map(|tree| {
				let mut counts = vec![0usize; tree.nodes.len()];
				for example in background.rows() {
					// Rows of a standard layout array are contiguous.
					for node_index in tree.decision_path(example.as_slice().unwrap()) {
						counts[node_index] += 1;
					}
				}
				izip!(tree.nodes.iter(), counts.iter())
					.map(|(node, count)| {
						let background_fraction = if n_background == 0 {
							0.0
						} else {
							count.to_f32().unwrap() / n_background.to_f32().unwrap()
						};
						background_weight * background_fraction
							+ (1.0 - background_weight) * node.examples_fraction()
					})
					.collect()
			})
			.collect()
	}

	/**
	Compute SHAP values for a single example and the class at `class_index`. The values are in logit space, so their sum plus the expected value equals the class's logit. `covers` must come from `compute_covers`; when it is `None`, the training fractions stored in the nodes are used.
	*/
	pub fn compute_shap_values(
		&self,
		example: &[f32],
		class_index: usize,
		covers: Option<&[Vec<f32>]>,
	) -> ShapValues {
		let n_classes = self.n_classes.max(1);
		let trees_and_covers: Vec<(&Tree, Vec<f32>)> = self
			.trees
			.iter()
			.enumerate()
			.filter(|(tree_index, _)| tree_index % n_classes == class_index)
			.map(|(tree_index, tree)| {
				let covers = covers
					.and_then(|covers| covers.get(tree_index))
					.cloned()
					.unwrap_or_else(|| tree.examples_fractions());
				(tree, covers)
			})
			.collect();
		let bias = self.biases.get(class_index).cloned().unwrap_or(0.0);
		shap::compute_shap(example, &trees_and_covers, bias)
	}

	/// The expected logit of each class under `covers`. These are the `expected_value`s `compute_shap_values` returns.
	pub fn compute_expected_values(&self, covers: Option<&[Vec<f32>]>) -> Vec<f32> {
		let n_classes = self.n_classes.max(1);
		let mut expected_values = self.biases.clone();
		for (tree_index, tree) in self.trees.iter().enumerate() {
			let tree_covers = covers
				.and_then(|covers| covers.get(tree_index))
				.cloned()
				.unwrap_or_else(|| tree.examples_fractions());
			if let Some(expected_value) = expected_values.get_mut(tree_index % n_classes) {
				*expected_value += shap::compute_expectation(tree, &tree_covers, 0);
			}
		}
		expected_values
	}
}

/// Compute the biases.
pub fn compute_biases(labels: ArrayView1<usize>, n_classes: usize) -> Array1<f32> {
	let mut baseline: Array1<f32> = Array::zeros(n_classes);
	for label in labels {
		baseline[*label] += 1.0;
	}
	let n_examples = labels.len().max(1).to_f32().unwrap();
	baseline.mapv_inplace(|b| {
		let proba = b / n_examples;
		let clamped_proba = clamp(proba, std::f32::EPSILON, 1.0 - std::f32::EPSILON);
		clamped_proba.ln()
	});
	baseline
}

/// Compute the gradients and hessians for each example given the labels and predictions.
pub fn update_gradients_and_hessians(
	// (n_classes, n_examples)
	mut gradients: ArrayViewMut2<f32>,
	// (n_classes, n_examples)
	mut hessians: ArrayViewMut2<f32>,
	// (n_examples)
	labels: ArrayView1<usize>,
	// (n_classes, n_examples)
	logits: ArrayView2<f32>,
) {
	let mut predictions = logits.to_owned();
	izip!(
		gradients.axis_iter_mut(Axis(1)),
		hessians.axis_iter_mut(Axis(1)),
		predictions.axis_iter_mut(Axis(1)),
		labels
	)
	.for_each(|(mut gradients, mut hessians, mut predictions, label)| {
		softmax(predictions.view_mut());
		izip!(
			predictions.iter().enumerate(),
			gradients.iter_mut(),
			hessians.iter_mut()
		)
		.for_each(|((class_index, prediction), gradient, hessian)| {
			let label = if *label == class_index { 1.0 } else { 0.0 };
			*gradient = *prediction - label;
			*hessian = *prediction * (1.0 - *prediction);
		});
	});
}

pub fn softmax(mut logits: ArrayViewMut1<f32>) {
	let max = logits.iter().fold(std::f32::MIN, |a, &b| a.max(b));
	for logit in logits.iter_mut() {
		*logit = (*logit - max).exp();
	}
	let sum = logits.iter().sum::<f32>();
	logits /= sum;
}

#[cfg(test)]
mod test {
	use super::*;
	use rand::Rng;
	use rand::SeedableRng;
	use rand_xoshiro::Xoshiro256Plus;

	/// Three well separated clusters in two dimensions, with a third noise feature.
	fn clusters() -> (Array2<f32>, Array1<usize>) {
		let mut rng = Xoshiro256Plus::seed_from_u64(42);
		let centers = [(0.0, 0.0), (5.0, 5.0), (0.0, 10.0)];
		let mut features = Vec::new();
		let mut labels = Vec::new();
		for i in 0..150 {
			let label = i % 3;
			let (x, y) = centers[label];
			features.push(x + rng.gen_range(-1.0..1.0));
			features.push(y + rng.gen_range(-1.0..1.0));
			features.push(rng.gen_range(0.0..1.0));
			labels.push(label);
		}
		(
			Array2::from_shape_vec((150, 3), features).unwrap(),
			Array1::from(labels),
		)
	}

	fn options() -> TrainOptions {
		TrainOptions {
			max_rounds: 20,
			max_depth: 3,
			..Default::default()
		}
	}

	#[test]
	fn test_learns_clusters() {
		let (features, labels) = clusters();
		let model =
			MulticlassClassifier::train(features.view(), labels.view(), 3, &options(), &mut |_| {});
		assert_eq!(model.trees.len(), 60);
		let probabilities = model.predict(features.view());
		for row in probabilities.rows() {
			assert!((row.sum() - 1.0).abs() < 1e-5);
		}
		let n_correct = probabilities
			.rows()
			.into_iter()
			.zip(labels.iter())
			.filter(|(row, label)| wayfarer_metrics::argmax(*row) == **label)
			.count();
		assert!(n_correct >= 145);
	}

	#[test]
	fn test_shap_values_sum_to_logits() {
		let (features, labels) = clusters();
		let model =
			MulticlassClassifier::train(features.view(), labels.view(), 3, &options(), &mut |_| {});
		let background = features.slice(s![0..30, ..]);
		let covers = model.compute_covers(background, 0.9);
		let logits = model.compute_logits(features.view());
		for example_index in &[0, 1, 2, 77] {
			let example = features.row(*example_index).to_vec();
			for class_index in 0..3 {
				for covers in &[None, Some(covers.as_slice())] {
					let shap_values = model.compute_shap_values(&example, class_index, *covers);
					let total = shap_values.values.iter().sum::<f32>() + shap_values.expected_value;
					assert!((total - logits[(*example_index, class_index)]).abs() < 1e-3);
						let expected_values = model.compute_expected_values(*covers);
						assert!((expected_values[class_index] - shap_values.expected_value).abs() < 1e-4);
				}
			}
		}
	}

	#[test]
	fn test_compute_biases() {
		let biases = compute_biases(arr1(&[0, 0, 1, 2]).view(), 3);
		assert!((biases[0] - 0.5f32.ln()).abs() < 1e-6);
		assert!((biases[1] - 0.25f32.ln()).abs() < 1e-6);
	}
}
