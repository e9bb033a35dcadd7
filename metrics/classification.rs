use super::StreamingMetric;
use ndarray::prelude::*;
use num_traits::ToPrimitive;

/// `ClassificationMetrics` accumulates a confusion matrix over multiclass predictions and finalizes it into per class and averaged precision, recall and f1 scores. Any ratio whose denominator is zero is reported as zero.
#[derive(Debug, Clone)]
pub struct ClassificationMetrics {
	/// The shape of the confusion matrix is (n_classes x n_classes). Rows are labels and columns are predictions.
	confusion_matrix: Array2<u64>,
}

pub struct ClassificationMetricsInput<'a> {
	/// (n_examples, n_classes)
	pub probabilities: ArrayView2<'a, f32>,
	/// (n_examples), 0-indexed
	pub labels: ArrayView1<'a, usize>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClassificationMetricsOutput {
	pub class_metrics: Vec<ClassMetrics>,
	pub accuracy: f32,
	pub precision_unweighted: f32,
	pub precision_weighted: f32,
	pub recall_unweighted: f32,
	pub recall_weighted: f32,
	pub f1_score_unweighted: f32,
	pub f1_score_weighted: f32,
	pub baseline_accuracy: f32,
	pub n_examples: u64,
	/// Rows are labels and columns are predictions.
	pub confusion_matrix: Vec<Vec<u64>>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClassMetrics {
	pub true_positives: u64,
	pub false_positives: u64,
	pub true_negatives: u64,
	pub false_negatives: u64,
	pub support: u64,
	pub accuracy: f32,
	pub precision: f32,
	pub recall: f32,
	pub f1_score: f32,
}

/// A per class summary in the shape of scikit-learn's `classification_report`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClassificationReport {
	pub classes: Vec<ClassReport>,
	pub accuracy: f32,
	pub macro_avg: AverageReport,
	pub weighted_avg: AverageReport,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClassReport {
	pub label: String,
	pub precision: f32,
	pub recall: f32,
	pub f1_score: f32,
	pub support: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AverageReport {
	pub precision: f32,
	pub recall: f32,
	pub f1_score: f32,
	pub support: u64,
}

impl ClassificationMetrics {
	pub fn new(n_classes: usize) -> Self {
		let confusion_matrix = <Array2<u64>>::zeros((n_classes, n_classes));
		Self { confusion_matrix }
	}

	/// Record a single (prediction, label) pair.
	pub fn update_with_prediction(&mut self, prediction: usize, label: usize) {
		self.confusion_matrix[(label, prediction)] += 1;
	}
}

/// The index of the largest probability. Ties go to the lowest index.
pub fn argmax(probabilities: ArrayView1<f32>) -> usize {
	let mut best_index = 0;
	let mut best_value = std::f32::NEG_INFINITY;
	for (index, value) in probabilities.iter().enumerate() {
		if *value > best_value {
			best_index = index;
			best_value = *value;
		}
	}
	best_index
}

fn ratio(numerator: f32, denominator: f32) -> f32 {
	if denominator == 0.0 {
		0.0
	} else {
		numerator / denominator
	}
}

impl<'a> StreamingMetric<'a> for ClassificationMetrics {
	type Input = ClassificationMetricsInput<'a>;
	type Output = ClassificationMetricsOutput;

	fn update(&mut self, value: ClassificationMetricsInput) {
		for (label, probabilities) in value.labels.iter().zip(value.probabilities.rows()) {
			let prediction = argmax(probabilities);
			self.update_with_prediction(prediction, *label);
		}
	}

	fn merge(&mut self, other: Self) {
		self.confusion_matrix += &other.confusion_matrix;
	}

	fn finalize(self) -> ClassificationMetricsOutput {
		let n_classes = self.confusion_matrix.nrows();
		let n_examples = self.confusion_matrix.sum();
		let confusion_matrix = self.confusion_matrix;
		let class_metrics: Vec<_> = (0..n_classes)
			.map(|class_index| {
				let true_positives = confusion_matrix[(class_index, class_index)];
				let false_positives = confusion_matrix.column(class_index).sum() - true_positives;
				let false_negatives = confusion_matrix.row(class_index).sum() - true_positives;
				let true_negatives =
					n_examples - true_positives - false_positives - false_negatives;
				let accuracy = ratio(
					(true_positives + true_negatives).to_f32().unwrap(),
					n_examples.to_f32().unwrap(),
				);
				let precision = ratio(
					true_positives.to_f32().unwrap(),
					(true_positives + false_positives).to_f32().unwrap(),
				);
				let recall = ratio(
					true_positives.to_f32().unwrap(),
					(true_positives + false_negatives).to_f32().unwrap(),
				);
				let f1_score = ratio(2.0 * (precision * recall), precision + recall);
				ClassMetrics {
					true_positives,
					false_positives,
					true_negatives,
					false_negatives,
					support: true_positives + false_negatives,
					accuracy,
					precision,
					recall,
					f1_score,
				}
			})
			.collect();
		let n_correct: u64 = confusion_matrix.diag().sum();
		let n_examples_f32 = n_examples.to_f32().unwrap();
		let n_classes_f32 = n_classes.to_f32().unwrap();
		let accuracy = ratio(n_correct.to_f32().unwrap(), n_examples_f32);
		let unweighted = |f: fn(&ClassMetrics) -> f32| {
			ratio(class_metrics.iter().map(f).sum::<f32>(), n_classes_f32)
		};
		let weighted = |f: fn(&ClassMetrics) -> f32| {
			ratio(
				class_metrics
					.iter()
					.map(|class| f(class) * class.support.to_f32().unwrap())
					.sum::<f32>(),
				n_examples_f32,
			)
		};
		let precision_unweighted = unweighted(|class| class.precision);
		let precision_weighted = weighted(|class| class.precision);
		let recall_unweighted = unweighted(|class| class.recall);
		let recall_weighted = weighted(|class| class.recall);
		let f1_score_unweighted = unweighted(|class| class.f1_score);
		let f1_score_weighted = weighted(|class| class.f1_score);
		let baseline_accuracy = ratio(
			class_metrics
				.iter()
				.map(|class| class.support)
				.max()
				.unwrap_or(0)
				.to_f32()
				.unwrap(),
			n_examples_f32,
		);
		let confusion_matrix = confusion_matrix
			.rows()
			.into_iter()
			.map(|row| row.to_vec())
			.collect();
		ClassificationMetricsOutput {
			class_metrics,
			accuracy,
			precision_unweighted,
			precision_weighted,
			recall_unweighted,
			recall_weighted,
			f1_score_unweighted,
			f1_score_weighted,
			baseline_accuracy,
			n_examples,
			confusion_matrix,
		}
	}
}

impl ClassificationMetricsOutput {
	/// Label the per class metrics with `class_names` and add the macro and weighted averages.
	pub fn report(&self, class_names: &[String]) -> ClassificationReport {
		let classes = self
			.class_metrics
			.iter()
			.zip(class_names.iter())
			.map(|(class, label)| ClassReport {
				label: label.clone(),
				precision: class.precision,
				recall: class.recall,
				f1_score: class.f1_score,
				support: class.support,
			})
			.collect();
		ClassificationReport {
			classes,
			accuracy: self.accuracy,
			macro_avg: AverageReport {
				precision: self.precision_unweighted,
				recall: self.recall_unweighted,
				f1_score: self.f1_score_unweighted,
				support: self.n_examples,
			},
			weighted_avg: AverageReport {
				precision: self.precision_weighted,
				recall: self.recall_weighted,
				f1_score: self.f1_score_weighted,
				support: self.n_examples,
			},
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_binary() {
		let mut metrics = ClassificationMetrics::new(2);
		let labels = arr1(&[0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1]);
		let probabilities = arr2(&[
			[1.0, 0.0], // correct
			[1.0, 0.0], // correct
			[1.0, 0.0], // correct
			[1.0, 0.0], // correct
			[1.0, 0.0], // correct
			[0.0, 1.0], // incorrect
			[0.0, 1.0], // incorrect
			[0.0, 1.0], // incorrect
			[0.0, 1.0], // correct
			[0.0, 1.0], // correct
			[0.0, 1.0], // correct
			[1.0, 0.0], // incorrect
			[1.0, 0.0], // incorrect
		]);
		metrics.update(ClassificationMetricsInput {
			probabilities: probabilities.view(),
			labels: labels.view(),
		});
		let metrics = metrics.finalize();
		insta::assert_debug_snapshot!(metrics.class_metrics, @r###"
  [
      ClassMetrics {
          true_positives: 5,
          false_positives: 2,
          true_negatives: 3,
          false_negatives: 3,
          support: 8,
          accuracy: 0.61538464,
          precision: 0.71428573,
          recall: 0.625,
          f1_score: 0.6666667,
      },
      ClassMetrics {
          true_positives: 3,
          false_positives: 3,
          true_negatives: 5,
          false_negatives: 2,
          support: 5,
          accuracy: 0.61538464,
          precision: 0.5,
          recall: 0.6,
          f1_score: 0.54545456,
      },
  ]
  "###);
		assert!((metrics.accuracy - 8.0 / 13.0).abs() < 1e-6);
		assert!((metrics.baseline_accuracy - 8.0 / 13.0).abs() < 1e-6);
		assert_eq!(metrics.confusion_matrix, vec![vec![5, 3], vec![2, 3]]);
	}

	#[test]
	fn test_multiclass() {
		// example taken from https://en.wikipedia.org/wiki/Confusion_matrix
		let classes = vec![
			String::from("Cat"),
			String::from("Dog"),
			String::from("Rabbit"),
		];
		let mut metrics = ClassificationMetrics::new(classes.len());
		let labels = arr1(&[
			0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 1, 1, 1, 2, 2, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
		]);
		let predictions = [
			0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
		];
		for (prediction, label) in predictions.iter().zip(labels.iter()) {
			metrics.update_with_prediction(*prediction, *label);
		}
		let metrics = metrics.finalize();
		let trace: u64 = (0..3).map(|i| metrics.confusion_matrix[i][i]).sum();
		assert!((trace as f32 / metrics.n_examples as f32 - metrics.accuracy).abs() < 1e-6);
		let report = metrics.report(&classes);
		assert_eq!(report.classes[2].label, "Rabbit");
		assert_eq!(report.classes[2].support, 13);
		assert!((report.classes[2].precision - 0.9166667).abs() < 1e-6);
		assert!((report.classes[1].recall - 0.5).abs() < 1e-6);
		assert!((report.accuracy - 19.0 / 27.0).abs() < 1e-6);
		assert!((report.macro_avg.precision - 0.6686508).abs() < 1e-5);
		assert!((report.weighted_avg.recall - 19.0 / 27.0).abs() < 1e-5);
		assert_eq!(report.weighted_avg.support, 27);
	}

	#[test]
	fn test_zero_division_is_zero() {
		let mut metrics = ClassificationMetrics::new(3);
		metrics.update_with_prediction(0, 0);
		metrics.update_with_prediction(0, 1);
		let metrics = metrics.finalize();
		// Class 2 never appears as a label or a prediction.
		assert_eq!(metrics.class_metrics[2].precision, 0.0);
		assert_eq!(metrics.class_metrics[2].recall, 0.0);
		assert_eq!(metrics.class_metrics[2].f1_score, 0.0);
		assert_eq!(metrics.class_metrics[1].precision, 0.0);
		assert_eq!(metrics.accuracy, 0.5);
	}
}
