use crate::{BranchNode, Node, SplitDirection, Tree};
use num_traits::ToPrimitive;

/// The SHAP values for one example and one class.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShapValues {
	/// One signed value per feature.
	pub values: Vec<f32>,
	/// The output expected under the covers, which is where the values start from.
	pub expected_value: f32,
}

/// Compute the SHAP values for a single example from the trees of one class. Each tree is paired with its node covers.
pub fn compute_shap(example: &[f32], trees: &[(&Tree, Vec<f32>)], bias: f32) -> ShapValues {
	let n_features = example.len();
	let mut values = vec![0.0; n_features];
	let mut expected_value = bias;
	for (tree, covers) in trees {
		let tree_values = tree_shap(example, tree, covers);
		for (value, tree_value) in values.iter_mut().zip(tree_values) {
			*value += tree_value;
		}
		expected_value += compute_expectation(tree, covers, 0);
	}
	ShapValues {
		values,
		expected_value,
	}
}

/// This function, and the helper functions below it, are a direct port from https://github.com/slundberg/shap.
fn tree_shap(example: &[f32], tree: &Tree, covers: &[f32]) -> Vec<f32> {
	let n_features = example.len();
	let mut phi = vec![0.0; n_features];
	let max_depth = max_depth(tree, 0) + 2;
	let mut unique_path = vec![PathItem::new(); max_depth * (max_depth + 1) / 2];
	let context = Context {
		example,
		tree,
		covers,
	};
	tree_shap_recursive(
		&context,
		phi.as_mut_slice(),
		0,
		unique_path.as_mut_slice(),
		0,
		1.0,
		1.0,
		None,
	);
	phi
}

struct Context<'a> {
	example: &'a [f32],
	tree: &'a Tree,
	covers: &'a [f32],
}

#[derive(Debug, Clone)]
struct PathItem {
	feature_index: Option<usize>,
	zero_fraction: f32,
	one_fraction: f32,
	pweight: f32,
}

impl PathItem {
	fn new() -> Self {
		Self {
			feature_index: None,
			zero_fraction: 0.0,
			one_fraction: 0.0,
			pweight: 0.0,
		}
	}
}

#[allow(clippy::too_many_arguments)]
fn tree_shap_recursive(
	context: &Context,
	phi: &mut [f32],
	node_index: usize,
	unique_path: &mut [PathItem],
	unique_depth: usize,
	parent_zero_fraction: f32,
	parent_one_fraction: f32,
	parent_feature_index: Option<usize>,
) {
	extend_path(
		unique_path,
		unique_depth,
		parent_zero_fraction,
		parent_one_fraction,
		parent_feature_index,
	);
	let mut unique_depth = unique_depth;
	match &context.tree.nodes[node_index] {
		Node::Leaf(n) => {
			for path_index in 1..=unique_depth {
				let weight = unwound_path_sum(unique_path, unique_depth, path_index);
				let path_item = &unique_path[path_index];
				let scale = weight * (path_item.one_fraction - path_item.zero_fraction);
				if let Some(feature_index) = path_item.feature_index {
					phi[feature_index] += scale * n.value;
				}
			}
		}
		Node::Branch(n) => {
			let (hot_child_index, cold_child_index) = compute_hot_cold_child(n, context.example);
			let cover = context.covers[node_index];
			let hot_zero_fraction = context.covers[hot_child_index] / cover;
			let cold_zero_fraction = context.covers[cold_child_index] / cover;
			let mut incoming_zero_fraction = 1.0;
			let mut incoming_one_fraction = 1.0;
			let feature_index = n.split.feature_index;
			// If this feature was already split on along the path, undo its previous entry.
			if let Some(path_index) = (1..=unique_depth)
				.find(|i| unique_path[*i].feature_index == Some(feature_index))
			{
				incoming_zero_fraction = unique_path[path_index].zero_fraction;
				incoming_one_fraction = unique_path[path_index].one_fraction;
				unwind_path(unique_path, unique_depth, path_index);
				unique_depth -= 1;
			};
			let (parent_path, child_path) = unique_path.split_at_mut(unique_depth + 1);
			child_path[0..parent_path.len()].clone_from_slice(parent_path);
			tree_shap_recursive(
				context,
				phi,
				hot_child_index,
				child_path,
				unique_depth + 1,
				hot_zero_fraction * incoming_zero_fraction,
				incoming_one_fraction,
				Some(feature_index),
			);
			child_path[0..parent_path.len()].clone_from_slice(parent_path);
			tree_shap_recursive(
				context,
				phi,
				cold_child_index,
				child_path,
				unique_depth + 1,
				cold_zero_fraction * incoming_zero_fraction,
				0.0,
				Some(feature_index),
			);
		}
	};
}

fn extend_path(
	unique_path: &mut [PathItem],
	unique_depth: usize,
	zero_fraction: f32,
	one_fraction: f32,
	feature_index: Option<usize>,
) {
	unique_path[unique_depth] = PathItem {
		feature_index,
		zero_fraction,
		one_fraction,
		pweight: if unique_depth == 0 { 1.0 } else { 0.0 },
	};
	if unique_depth == 0 {
		return;
	}
	for i in (0..unique_depth).rev() {
		unique_path[i + 1].pweight +=
			one_fraction * unique_path[i].pweight * (i + 1).to_f32().unwrap()
				/ (unique_depth + 1).to_f32().unwrap();
		unique_path[i].pweight =
			zero_fraction * unique_path[i].pweight * (unique_depth - i).to_f32().unwrap()
				/ (unique_depth + 1).to_f32().unwrap();
	}
}

fn unwind_path(unique_path: &mut [PathItem], unique_depth: usize, path_index: usize) {
	let one_fraction = unique_path[path_index].one_fraction;
	let zero_fraction = unique_path[path_index].zero_fraction;
	let mut next_one_portion = unique_path[unique_depth].pweight;
	for i in (0..unique_depth).rev() {
		if one_fraction != 0.0 {
			let tmp = unique_path[i].pweight;
			unique_path[i].pweight = next_one_portion * (unique_depth + 1).to_f32().unwrap()
				/ ((i + 1).to_f32().unwrap() * one_fraction);
			next_one_portion = tmp
				- unique_path[i].pweight * zero_fraction * (unique_depth - i).to_f32().unwrap()
					/ (unique_depth + 1).to_f32().unwrap();
		} else {
			unique_path[i].pweight = unique_path[i].pweight * (unique_depth + 1).to_f32().unwrap()
				/ (zero_fraction * (unique_depth - i).to_f32().unwrap());
		}
	}
	for i in path_index..unique_depth {
		unique_path[i].feature_index = unique_path[i + 1].feature_index;
		unique_path[i].zero_fraction = unique_path[i + 1].zero_fraction;
		unique_path[i].one_fraction = unique_path[i + 1].one_fraction;
	}
}

fn unwound_path_sum(unique_path: &[PathItem], unique_depth: usize, path_index: usize) -> f32 {
	let one_fraction = unique_path[path_index].one_fraction;
	let zero_fraction = unique_path[path_index].zero_fraction;
	let mut next_one_portion = unique_path[unique_depth].pweight;
	let mut total = 0.0;
	if one_fraction != 0.0 {
		for i in (0..unique_depth).rev() {
			let tmp = next_one_portion / ((i + 1).to_f32().unwrap() * one_fraction);
			total += tmp;
			next_one_portion =
				unique_path[i].pweight - tmp * zero_fraction * (unique_depth - i).to_f32().unwrap();
		}
	} else {
		for i in (0..unique_depth).rev() {
			total +=
				unique_path[i].pweight / (zero_fraction * (unique_depth - i).to_f32().unwrap());
		}
	}
	total * (unique_depth + 1).to_f32().unwrap()
}

fn compute_hot_cold_child(node: &BranchNode, example: &[f32]) -> (usize, usize) {
	match node.split.direction(example) {
		SplitDirection::Left => (node.left_child_index, node.right_child_index),
		SplitDirection::Right => (node.right_child_index, node.left_child_index),
	}
}

fn max_depth(tree: &Tree, node_index: usize) -> usize {
	match &tree.nodes[node_index] {
		Node::Leaf(_) => 0,
		Node::Branch(n) => {
			let left_depth = max_depth(tree, n.left_child_index);
			let right_depth = max_depth(tree, n.right_child_index);
			left_depth.max(right_depth) + 1
		}
	}
}

/// The expected output of `tree` when examples are distributed over its nodes in proportion to `covers`.
pub fn compute_expectation(tree: &Tree, covers: &[f32], node_index: usize) -> f32 {
	match &tree.nodes[node_index] {
		Node::Leaf(n) => n.value,
		Node::Branch(n) => {
			let cover = covers[node_index];
			let left_value = compute_expectation(tree, covers, n.left_child_index);
			let right_value = compute_expectation(tree, covers, n.right_child_index);
			(covers[n.left_child_index] / cover) * left_value
				+ (covers[n.right_child_index] / cover) * right_value
		}
	}
}

#[test]
fn test_stump_shap() {
	use crate::{BranchSplit, LeafNode};
	let tree = Tree {
		nodes: vec![
			Node::Branch(BranchNode {
				left_child_index: 1,
				right_child_index: 2,
				split: BranchSplit {
					feature_index: 1,
					split_value: 2.5,
					invalid_values_direction: SplitDirection::Left,
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
	};
	let covers = tree.examples_fractions();
	let shap = compute_shap(&[7.0, 1.0], &[(&tree, covers)], 0.5);
	// The expectation is 0.25 * -1 + 0.75 * 3 = 2, so the split feature gets -3.
	assert!((shap.expected_value - 2.5).abs() < 1e-6);
	assert!((shap.values[1] + 3.0).abs() < 1e-6);
	assert_eq!(shap.values[0], 0.0);
}
