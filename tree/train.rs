use self::binning::{compute_binned_features, compute_binning_instructions, BinningInstruction};
use crate::{
	multiclass_classifier::{compute_biases, update_gradients_and_hessians},
	BranchNode, BranchSplit, LeafNode, MulticlassClassifier, Node, SplitDirection, TrainOptions,
	TrainProgress, Tree,
};
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rayon::prelude::*;
use wayfarer_util::progress_counter::ProgressCounter;

mod binning;

/// Train a multiclass classifier with one tree per class in each round.
pub fn train(
	features: ArrayView2<f32>,
	labels: ArrayView1<usize>,
	n_classes: usize,
	options: &TrainOptions,
	update_progress: &mut dyn FnMut(TrainProgress),
) -> MulticlassClassifier {
	update_progress(TrainProgress::Initializing);
	let features = features.as_standard_layout();
	let binning_instructions = compute_binning_instructions(features.view(), options);
	let binned_features = compute_binned_features(features.view(), &binning_instructions);
	let n_examples = features.nrows();
	// The biases are the logs of each class's proportion in the training set, so the baseline prediction is the class distribution.
	let biases = compute_biases(labels, n_classes);
	// (n_classes, n_examples)
	let mut logits: Array2<f32> = Array::zeros((n_classes, n_examples));
	for mut column in logits.axis_iter_mut(Axis(1)) {
		column.assign(&biases);
	}
	let mut gradients: Array2<f32> = Array::zeros((n_classes, n_examples));
	let mut hessians: Array2<f32> = Array::zeros((n_classes, n_examples));
	let progress_counter = ProgressCounter::new(options.max_rounds.to_u64().unwrap());
	update_progress(TrainProgress::Training(progress_counter.clone()));
	let mut trees = Vec::with_capacity(options.max_rounds * n_classes);
	if n_examples > 0 {
		for _ in 0..options.max_rounds {
			update_gradients_and_hessians(
				gradients.view_mut(),
				hessians.view_mut(),
				labels,
				logits.view(),
			);
			let trees_for_round: Vec<Tree> = (0..n_classes)
				.into_par_iter()
				.map(|class_index| {
					train_tree(
						binned_features.view(),
						&binning_instructions,
						gradients.row(class_index),
						hessians.row(class_index),
						options,
					)
				})
				.collect();
			for (tree, mut logits) in trees_for_round.iter().zip(logits.axis_iter_mut(Axis(0))) {
				// Rows of a standard layout array are contiguous.
				for (logit, example) in logits.iter_mut().zip(features.rows()) {
					*logit += tree.predict(example.as_slice().unwrap());
				}
			}
			trees.extend(trees_for_round);
			progress_counter.inc(1);
		}
	}
	let n_rounds = if n_examples > 0 { options.max_rounds } else { 0 };
	MulticlassClassifier {
		biases: biases.to_vec(),
		trees,
		n_classes,
		n_rounds,
	}
}

struct SplitCandidate {
	feature_index: usize,
	bin: usize,
	gain: f64,
}

#[derive(Clone, Copy, Default)]
struct BinStats {
	sum_gradients: f64,
	sum_hessians: f64,
	count: usize,
}

impl std::ops::AddAssign for BinStats {
	fn add_assign(&mut self, other: Self) {
		self.sum_gradients += other.sum_gradients;
		self.sum_hessians += other.sum_hessians;
		self.count += other.count;
	}
}

impl std::ops::Sub for BinStats {
	type Output = Self;
	fn sub(self, other: Self) -> Self {
		Self {
			sum_gradients: self.sum_gradients - other.sum_gradients,
			sum_hessians: self.sum_hessians - other.sum_hessians,
			count: self.count - other.count,
		}
	}
}

struct TreeTrainer<'a> {
	binned_features: ArrayView2<'a, u8>,
	binning_instructions: &'a [BinningInstruction],
	gradients: ArrayView1<'a, f32>,
	hessians: ArrayView1<'a, f32>,
	options: &'a TrainOptions,
	n_examples: f32,
	nodes: Vec<Node>,
}

/// Grow a single tree greedily, splitting each node on the bin boundary with the largest gain until `max_depth` is reached or no split is valid.
fn train_tree<'a>(
	binned_features: ArrayView2<'a, u8>,
	binning_instructions: &'a [BinningInstruction],
	gradients: ArrayView1<'a, f32>,
	hessians: ArrayView1<'a, f32>,
	options: &'a TrainOptions,
) -> Tree {
	let mut trainer = TreeTrainer {
		binned_features,
		binning_instructions,
		gradients,
		hessians,
		options,
		n_examples: binned_features.nrows().to_f32().unwrap(),
		nodes: Vec::new(),
	};
	let examples_index: Vec<usize> = (0..binned_features.nrows()).collect();
	trainer.train_node(examples_index, 0);
	Tree {
		nodes: trainer.nodes,
	}
}

impl<'a> TreeTrainer<'a> {
	fn train_node(&mut self, examples_index: Vec<usize>, depth: usize) -> usize {
		let node_index = self.nodes.len();
		let examples_fraction = examples_index.len().to_f32().unwrap() / self.n_examples;
		let stats = self.compute_stats(&examples_index);
		let leaf = Node::Leaf(LeafNode {
			value: self.leaf_value(stats),
			examples_fraction,
		});
		self.nodes.push(leaf);
		if depth >= self.options.max_depth {
			return node_index;
		}
		let candidate = match self.choose_best_split(&examples_index, stats) {
			Some(candidate) => candidate,
			None => return node_index,
		};
		let (left_examples_index, right_examples_index): (Vec<usize>, Vec<usize>) = examples_index
			.into_iter()
			.partition(|example_index| {
				self.binned_features[(*example_index, candidate.feature_index)].to_usize().unwrap()
					<= candidate.bin
			});
		let left_child_index = self.train_node(left_examples_index, depth + 1);
		let right_child_index = self.train_node(right_examples_index, depth + 1);
		self.nodes[node_index] = Node::Branch(BranchNode {
			left_child_index,
			right_child_index,
			split: BranchSplit {
				feature_index: candidate.feature_index,
				split_value: self.binning_instructions[candidate.feature_index]
					.split_value(candidate.bin),
				// The invalid values bin is the first bin, so it always goes left.
				invalid_values_direction: SplitDirection::Left,
			},
			examples_fraction,
		});
		node_index
	}

	fn compute_stats(&self, examples_index: &[usize]) -> BinStats {
		let mut stats = BinStats::default();
		for example_index in examples_index {
			stats += BinStats {
				sum_gradients: self.gradients[*example_index].to_f64().unwrap(),
				sum_hessians: self.hessians[*example_index].to_f64().unwrap(),
				count: 1,
			};
		}
		stats
	}

	fn leaf_value(&self, stats: BinStats) -> f32 {
		let l2 = self.options.l2_regularization.to_f64().unwrap();
		let value = -stats.sum_gradients / (stats.sum_hessians + l2);
		(value * self.options.learning_rate.to_f64().unwrap())
			.to_f32()
			.unwrap_or(0.0)
	}

	fn score(&self, stats: BinStats) -> f64 {
		let l2 = self.options.l2_regularization.to_f64().unwrap();
		stats.sum_gradients * stats.sum_gradients / (stats.sum_hessians + l2)
	}

	fn choose_best_split(&self, examples_index: &[usize], total: BinStats) -> Option<SplitCandidate> {
		let min_examples_per_child = self.options.min_examples_per_child.max(1);
		let min_sum_hessians_per_child = self.options.min_sum_hessians_per_child.to_f64().unwrap();
		let min_gain_to_split = self.options.min_gain_to_split.to_f64().unwrap();
		if total.count < 2 * min_examples_per_child {
			return None;
		}
		let parent_score = self.score(total);
		let mut best: Option<SplitCandidate> = None;
		for (feature_index, binning_instruction) in self.binning_instructions.iter().enumerate() {
			let n_bins = binning_instruction.n_bins();
			if n_bins < 3 {
				continue;
			}
			let mut histogram = vec![BinStats::default(); n_bins];
			for example_index in examples_index {
				let bin = self.binned_features[(*example_index, feature_index)]
					.to_usize()
					.unwrap();
				histogram[bin] += BinStats {
					sum_gradients: self.gradients[*example_index].to_f64().unwrap(),
					sum_hessians: self.hessians[*example_index].to_f64().unwrap(),
					count: 1,
				};
			}
			let mut left = BinStats::default();
			for (bin, bin_stats) in histogram.iter().enumerate().take(n_bins - 1) {
				left += *bin_stats;
				if bin == 0 {
					continue;
				}
				let right = total - left;
				if left.count < min_examples_per_child || right.count < min_examples_per_child {
					continue;
				}
				if left.sum_hessians < min_sum_hessians_per_child
					|| right.sum_hessians < min_sum_hessians_per_child
				{
					continue;
				}
				let gain = self.score(left) + self.score(right) - parent_score;
				if gain <= min_gain_to_split {
					continue;
				}
				if best.as_ref().map(|best| gain > best.gain).unwrap_or(true) {
					best = Some(SplitCandidate {
						feature_index,
						bin,
						gain,
					});
				}
			}
		}
		best
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_tree_splits_on_informative_feature() {
		// The second feature separates the gradients, the first is noise.
		let features = arr2(&[
			[1.0, 0.0],
			[2.0, 0.0],
			[1.0, 0.0],
			[2.0, 0.0],
			[1.0, 1.0],
			[2.0, 1.0],
			[1.0, 1.0],
			[2.0, 1.0],
		]);
		let options = TrainOptions {
			min_sum_hessians_per_child: 0.0,
			..Default::default()
		};
		let binning_instructions = compute_binning_instructions(features.view(), &options);
		let binned_features = compute_binned_features(features.view(), &binning_instructions);
		let gradients = arr1(&[-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0]);
		let hessians = arr1(&[0.25; 8]);
		let tree = train_tree(
			binned_features.view(),
			&binning_instructions,
			gradients.view(),
			hessians.view(),
			&options,
		);
		match &tree.nodes[0] {
			Node::Branch(node) => {
				assert_eq!(node.split.feature_index, 1);
				assert_eq!(node.split.split_value, 0.5);
			}
			Node::Leaf(_) => panic!("expected the root to split"),
		}
		assert!(tree.predict(&[1.0, 0.0]) > 0.0);
		assert!(tree.predict(&[1.0, 1.0]) < 0.0);
		let leaf_fractions: f32 = tree
			.nodes
			.iter()
			.filter_map(|node| match node {
				Node::Leaf(leaf) => Some(leaf.examples_fraction),
				_ => None,
			})
			.sum();
		assert!((leaf_fractions - 1.0).abs() < 1e-6);
	}
}
