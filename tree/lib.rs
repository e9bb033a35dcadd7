/*!
This crate implements a gradient boosted decision tree classifier for multiclass targets, in the spirit of [XGBoost](github.com/xgboost/xgboost) and [LightGBM](github.com/microsoft/lightgbm), along with [Tree SHAP](https://arxiv.org/abs/1802.03888) for explaining its predictions.

Each round trains one tree per class on the softmax gradients and hessians. Trees are grown greedily to a maximum depth from histograms of binned feature values.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod multiclass_classifier;
mod shap;
mod train;

pub use self::multiclass_classifier::{softmax, MulticlassClassifier};
pub use self::shap::ShapValues;
pub use wayfarer_util::progress_counter::ProgressCounter;

/// These are the options passed to `MulticlassClassifier::train`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainOptions {
	/// This option sets the L2 regularization value, which helps avoid overfitting.
	pub l2_regularization: f32,
	/// The learning rate scales the leaf values to control the effect each tree has on the output.
	pub learning_rate: f32,
	/// The depth of a single tree will never exceed this value.
	pub max_depth: usize,
	/// This is the number of rounds of training. Each round trains one tree per class.
	pub max_rounds: usize,
	/// When computing the bin thresholds for number features, this is the maximum number of bins for valid values to create. If the number of unique values in the number feature is less than this value, the thresholds will be the midpoints between the unique values.
	pub max_valid_bins_for_number_features: u8,
	/// A split will only be considered valid if the number of training examples sent to each of the resulting children is at least this value.
	pub min_examples_per_child: usize,
	/// A node will only be split if the best split achieves more than this minimum gain.
	pub min_gain_to_split: f32,
	/// A split will only be considered valid if the sum of hessians in each of the resulting children is at least this value.
	pub min_sum_hessians_per_child: f32,
	/// This is the maximum number of examples to consider when determining the bin thresholds for number features.
	pub max_examples_for_computing_bin_thresholds: usize,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			l2_regularization: 1.0,
			learning_rate: 0.1,
			max_depth: 6,
			max_rounds: 100,
			max_valid_bins_for_number_features: 255,
			min_examples_per_child: 1,
			min_gain_to_split: 0.0,
			min_sum_hessians_per_child: 1.0,
			max_examples_for_computing_bin_thresholds: 200_000,
		}
	}
}

/// This struct reports the training progress.
#[derive(Debug)]
pub enum TrainProgress {
	Initializing,
	Training(ProgressCounter),
}

/// Trees are stored as a `Vec` of `Node`s. Each branch in the tree has two indexes into the `Vec`, one for each of its children. The root is the first node.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tree {
	pub nodes: Vec<Node>,
}

impl Tree {
	/// Make a prediction for a given example.
	pub fn predict(&self, features: &[f32]) -> f32 {
		let mut node_index = 0;
		loop {
			match &self.nodes[node_index] {
				Node::Branch(node) => {
					node_index = match node.split.direction(features) {
						SplitDirection::Left => node.left_child_index,
						SplitDirection::Right => node.right_child_index,
					};
				}
				Node::Leaf(LeafNode { value, .. }) => return *value,
			}
		}
	}

	/// The index of the leaf `features` ends up in, along with every node visited on the way.
	pub fn decision_path(&self, features: &[f32]) -> Vec<usize> {
		let mut path = vec![0];
		let mut node_index = 0;
		while let Node::Branch(node) = &self.nodes[node_index] {
			node_index = match node.split.direction(features) {
				SplitDirection::Left => node.left_child_index,
				SplitDirection::Right => node.right_child_index,
			};
			path.push(node_index);
		}
		path
	}

	/// The fraction of training examples that reached each node.
	pub fn examples_fractions(&self) -> Vec<f32> {
		self.nodes.iter().map(|node| node.examples_fraction()).collect()
	}
}

/// A node is either a branch or a leaf.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
	Branch(BranchNode),
	Leaf(LeafNode),
}

impl Node {
	pub fn examples_fraction(&self) -> f32 {
		match self {
			Self::Leaf(LeafNode {
				examples_fraction, ..
			}) => *examples_fraction,
			Self::Branch(BranchNode {
				examples_fraction, ..
			}) => *examples_fraction,
		}
	}
}

/// A `BranchNode` is a branch in a tree.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BranchNode {
	/// This is the index in the tree's node vector for this node's left child.
	pub left_child_index: usize,
	/// This is the index in the tree's node vector for this node's right child.
	pub right_child_index: usize,
	/// When making predictions, an example will be sent either to the right or left child. The `split` contains the information necessary to determine which way it will go.
	pub split: BranchSplit,
	/// Branch nodes store the fraction of training examples that passed through them during training. This is used to compute SHAP values.
	pub examples_fraction: f32,
}

/// A branch split takes the value of a single number feature, compares it with a `split_value`, and if the value is <= `split_value`, the example is sent left, and if it is > `split_value`, it is sent right.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BranchSplit {
	/// This is the index of the feature to get the value for.
	pub feature_index: usize,
	/// This is the threshold value of the split.
	pub split_value: f32,
	/// This is the direction invalid values should be sent.
	pub invalid_values_direction: SplitDirection,
}

impl BranchSplit {
	pub fn direction(&self, features: &[f32]) -> SplitDirection {
		let value = features[self.feature_index];
		if value.is_nan() {
			self.invalid_values_direction
		} else if value <= self.split_value {
			SplitDirection::Left
		} else {
			SplitDirection::Right
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SplitDirection {
	Left,
	Right,
}

/// The leaves in a tree hold the values to output for examples that get sent to them.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LeafNode {
	/// This is the value to output.
	pub value: f32,
	/// Leaf nodes store the fraction of training examples that were sent to them during training. This is used to compute SHAP values.
	pub examples_fraction: f32,
}

#[cfg(test)]
mod test {
	use super::*;

	fn stump() -> Tree {
		Tree {
			nodes: vec![
				Node::Branch(BranchNode {
					left_child_index: 1,
					right_child_index: 2,
					split: BranchSplit {
						feature_index: 1,
						split_value: 2.5,
						invalid_values_direction: SplitDirection::Right,
					},
					examples_fraction: 1.0,
				}),
				Node::Leaf(LeafNode {
					value: -1.0,
					examples_fraction: 0.25,
				}),
				Node::Leaf(LeafNode {
					value: 3.0,
					examples_fraction: 0.75,
				}),
			],
		}
	}

	#[test]
	fn test_predict() {
		let tree = stump();
		assert_eq!(tree.predict(&[0.0, 2.5]), -1.0);
		assert_eq!(tree.predict(&[0.0, 2.6]), 3.0);
		assert_eq!(tree.predict(&[0.0, std::f32::NAN]), 3.0);
		assert_eq!(tree.decision_path(&[0.0, 1.0]), vec![0, 1]);
		assert_eq!(tree.examples_fractions(), vec![1.0, 0.25, 0.75]);
	}
}
