/*!
This crate defines the [`StreamingMetric`](trait.StreamingMetric.html) trait and the metrics wayfarer reports: [`Accuracy`](struct.Accuracy.html), [`ClassificationMetrics`](struct.ClassificationMetrics.html) with its per class report, and [`MeanVariance`](struct.MeanVariance.html), which the feature scaler is fit with.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod accuracy;
mod classification;
mod mean;
mod mean_variance;

pub use self::accuracy::Accuracy;
pub use self::classification::{
	argmax, AverageReport, ClassMetrics, ClassReport, ClassificationMetrics, ClassificationMetricsInput,
	ClassificationMetricsOutput, ClassificationReport,
};
pub use self::mean::Mean;
pub use self::mean_variance::{MeanVariance, MeanVarianceOutput};

/**
The `StreamingMetric` trait defines a common interface to metrics that can be computed in a streaming manner, where the input is available in chunks, such as accuracy.

After being initialized, a value of type `T` implementing the `StreamingMetric` trait can have `update()` called on it with values of the associated type `Input`. Multiple values of `T` can be merged together by calling `merge()`, which is how the cross validation folds are combined. When finished aggregating, call `finalize()` on the metric to produce the associated type `Output`.

# Examples

```
use wayfarer_metrics::StreamingMetric;

struct Max(f32);

impl StreamingMetric<'_> for Max {
	type Input = f32;
	type Output = f32;
	fn update(&mut self, input: Self::Input) {
		self.0 = self.0.max(input)
	}
	fn merge(&mut self, other: Self) { self.0 = self.0.max(other.0) }
	fn finalize(self) -> Self::Output { self.0 }
}
```

The generic lifetime `'a` allows `Input`s to borrow from their enclosing scope.
*/
pub trait StreamingMetric<'a> {
	/// `Input` is the type to aggregate in calls to `update()`.
	type Input;
	/// `Output` is the return type of `finalize()`.
	type Output;
	/// Update this streaming metric with the `Input` `input`.
	fn update(&mut self, input: Self::Input);
	/// Merge multiple independently computed streaming metrics.
	fn merge(&mut self, other: Self);
	/// When you are done aggregating `Input`s, call `finalize()` to produce an `Output`.
	fn finalize(self) -> Self::Output;
}
