//! https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Parallel_algorithm

use super::StreamingMetric;
use num_traits::ToPrimitive;

/// Computes the mean and the population variance of a stream of values with Welford's algorithm. Non-finite values are skipped.
#[derive(Debug, Default, Clone)]
pub struct MeanVariance {
	n: u64,
	mean: f64,
	m2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanVarianceOutput {
	pub n: u64,
	pub mean: f32,
	pub variance: f32,
}

impl MeanVariance {
	pub fn new() -> Self {
		Self::default()
	}
}

impl StreamingMetric<'_> for MeanVariance {
	type Input = f32;
	type Output = MeanVarianceOutput;

	fn update(&mut self, value: f32) {
		if !value.is_finite() {
			return;
		}
		let value = value.to_f64().unwrap();
		self.n += 1;
		let delta = value - self.mean;
		self.mean += delta / self.n.to_f64().unwrap();
		self.m2 += delta * (value - self.mean);
	}

	fn merge(&mut self, other: Self) {
		if other.n == 0 {
			return;
		}
		if self.n == 0 {
			*self = other;
			return;
		}
		let n_a = self.n.to_f64().unwrap();
		let n_b = other.n.to_f64().unwrap();
		let delta = other.mean - self.mean;
		self.mean = (n_a * self.mean + n_b * other.mean) / (n_a + n_b);
		self.m2 += other.m2 + delta * delta * (n_a * n_b / (n_a + n_b));
		self.n += other.n;
	}

	fn finalize(self) -> MeanVarianceOutput {
		let variance = if self.n == 0 {
			0.0
		} else {
			self.m2 / self.n.to_f64().unwrap()
		};
		MeanVarianceOutput {
			n: self.n,
			mean: self.mean.to_f32().unwrap(),
			variance: variance.to_f32().unwrap(),
		}
	}
}

#[test]
fn test_mean_variance() {
	let mut a = MeanVariance::new();
	for value in &[2.0, 4.0, 4.0, 4.0] {
		a.update(*value);
	}
	let mut b = MeanVariance::new();
	for value in &[5.0, 5.0, 7.0, 9.0, std::f32::NAN] {
		b.update(*value);
	}
	a.merge(b);
	let output = a.finalize();
	assert_eq!(output.n, 8);
	assert!((output.mean - 5.0).abs() < 1e-6);
	assert!((output.variance - 4.0).abs() < 1e-6);
}
