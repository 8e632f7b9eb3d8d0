use crate::errors::MetricError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub maximum: f64,
    pub counter: u64,
}

/// Cumulative histogram. Bucket 0 is always the `+Inf` bucket and the remaining buckets are kept
/// in decreasing order of their upper bound, so `buckets()[i].counter` counts every observation
/// less than or equal to `buckets()[i].maximum`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    sum: f64,
    buckets: Vec<Bucket>,
}

impl Default for Histogram {
    fn default() -> Self {
        Histogram::new()
    }
}

fn inf_bucket() -> Bucket {
    Bucket {
        maximum: f64::INFINITY,
        counter: 0,
    }
}

impl Histogram {
    /// A histogram holding only the `+Inf` bucket, to be filled with `bucket_append`.
    pub fn new() -> Self {
        Histogram {
            sum: 0.0,
            buckets: vec![inf_bucket()],
        }
    }

    fn with_bounds<I>(num_buckets: usize, bounds: I) -> Result<Self, MetricError>
    where
        I: Iterator<Item = f64>,
    {
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(num_buckets + 1)?;
        buckets.push(inf_bucket());
        buckets.extend(bounds.map(|maximum| Bucket {
            maximum,
            counter: 0,
        }));
        Ok(Histogram { sum: 0.0, buckets })
    }

    /// `num_buckets` finite buckets of equal `size`: the bounds are `size, 2*size, ..`.
    pub fn new_linear(num_buckets: usize, size: f64) -> Result<Self, MetricError> {
        if num_buckets == 0 || !(size > 0.0) {
            return Err(MetricError::InvalidHistogram(
                "linear buckets need a positive count and size",
            ));
        }
        Histogram::with_bounds(
            num_buckets,
            (1..=num_buckets).rev().map(|i| i as f64 * size),
        )
    }

    /// `num_buckets` finite buckets with bounds `factor * base^i` for `i` in `1..=num_buckets`.
    pub fn new_exp(num_buckets: usize, base: f64, factor: f64) -> Result<Self, MetricError> {
        if num_buckets == 0 || !(base > 1.0) || !(factor > 0.0) {
            return Err(MetricError::InvalidHistogram(
                "exponential buckets need a positive count, a base above 1 and a positive factor",
            ));
        }
        Histogram::with_bounds(
            num_buckets,
            (1..=num_buckets).rev().map(|i| factor * base.powi(i as i32)),
        )
    }

    /// Buckets from increasing, positive, finite upper bounds.
    pub fn new_custom(boundaries: &[f64]) -> Result<Self, MetricError> {
        let mut previous = 0.0;
        for &bound in boundaries {
            if !(bound > previous) {
                return Err(MetricError::InvalidHistogram(
                    "custom boundaries must be positive and strictly increasing",
                ));
            }
            previous = bound;
        }
        if boundaries.last() == Some(&f64::INFINITY) {
            return Err(MetricError::InvalidHistogram(
                "the +Inf bucket is implicit",
            ));
        }
        Histogram::with_bounds(boundaries.len(), boundaries.iter().rev().copied())
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Total number of observations, the `+Inf` bucket's counter.
    pub fn count(&self) -> u64 {
        self.buckets[0].counter
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Records one observation. Negative values are rejected.
    pub fn update(&mut self, gauge: f64) -> Result<(), MetricError> {
        if gauge < 0.0 || gauge.is_nan() {
            return Err(MetricError::InvalidHistogram(
                "observations must not be negative",
            ));
        }

        self.buckets[0].counter += 1;
        for bucket in self.buckets[1..].iter_mut() {
            if bucket.maximum < gauge {
                break;
            }
            bucket.counter += 1;
        }
        self.sum += gauge;
        Ok(())
    }

    /// Zeroes the counters and the sum, keeping the bucket layout.
    pub fn reset(&mut self) {
        self.sum = 0.0;
        for bucket in self.buckets.iter_mut() {
            bucket.counter = 0;
        }
    }

    /// Sets the sum when rebuilding a histogram from an exposition format.
    pub fn set_sum(&mut self, sum: f64) {
        self.sum = sum;
    }

    /// Adds a bucket read from an exposition format. A `+Inf` maximum sets the total count.
    pub fn bucket_append(&mut self, maximum: f64, counter: u64) -> Result<(), MetricError> {
        if maximum == f64::INFINITY {
            self.buckets[0].counter = counter;
            return Ok(());
        }

        self.buckets.try_reserve(1)?;
        self.buckets.push(Bucket { maximum, counter });
        self.buckets[1..].sort_by(|a, b| {
            b.maximum
                .partial_cmp(&a.maximum)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantile {
    pub quantile: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub sum: f64,
    pub count: u64,
    pub quantiles: Vec<Quantile>,
}

impl Summary {
    pub fn new(sum: f64, count: u64) -> Self {
        Summary {
            sum,
            count,
            quantiles: Vec::new(),
        }
    }

    pub fn quantile_append(&mut self, quantile: f64, value: f64) -> Result<(), MetricError> {
        self.quantiles.try_reserve(1)?;
        self.quantiles.push(Quantile { quantile, value });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maxima(h: &Histogram) -> Vec<f64> {
        h.buckets().iter().map(|b| b.maximum).collect()
    }

    #[test]
    fn test_linear() {
        let h = Histogram::new_linear(3, 10.0).unwrap();
        assert_eq!(maxima(&h), vec![f64::INFINITY, 30.0, 20.0, 10.0]);
        assert!(Histogram::new_linear(0, 1.0).is_err());
        assert!(Histogram::new_linear(2, 0.0).is_err());
    }

    #[test]
    fn test_exp() {
        let h = Histogram::new_exp(3, 2.0, 0.5).unwrap();
        assert_eq!(maxima(&h), vec![f64::INFINITY, 4.0, 2.0, 1.0]);
        assert!(Histogram::new_exp(3, 1.0, 1.0).is_err());
        assert!(Histogram::new_exp(3, 2.0, 0.0).is_err());
    }

    #[test]
    fn test_custom() {
        let h = Histogram::new_custom(&[0.1, 1.0, 5.0]).unwrap();
        assert_eq!(maxima(&h), vec![f64::INFINITY, 5.0, 1.0, 0.1]);
        assert!(Histogram::new_custom(&[1.0, 1.0]).is_err());
        assert!(Histogram::new_custom(&[0.0, 1.0]).is_err());
        assert!(Histogram::new_custom(&[1.0, f64::INFINITY]).is_err());
        assert_eq!(maxima(&Histogram::new_custom(&[]).unwrap()), vec![f64::INFINITY]);
    }

    #[test]
    fn test_update_is_cumulative() {
        let mut h = Histogram::new_linear(3, 10.0).unwrap();
        for v in [5.0, 10.0, 15.0, 100.0].iter() {
            h.update(*v).unwrap();
        }
        let counters: Vec<u64> = h.buckets().iter().map(|b| b.counter).collect();
        assert_eq!(counters, vec![4, 3, 3, 2]);
        assert_eq!(h.count(), 4);
        assert_eq!(h.sum(), 130.0);
        assert!(h.update(-1.0).is_err());

        h.reset();
        assert_eq!(h.count(), 0);
        assert_eq!(h.sum(), 0.0);
        assert_eq!(h.buckets().len(), 4);
    }

    #[test]
    fn test_bucket_append_keeps_decreasing_order() {
        let mut h = Histogram::new();
        h.bucket_append(1.0, 3).unwrap();
        h.bucket_append(5.0, 7).unwrap();
        h.bucket_append(f64::INFINITY, 9).unwrap();
        h.bucket_append(2.5, 5).unwrap();
        assert_eq!(maxima(&h), vec![f64::INFINITY, 5.0, 2.5, 1.0]);
        assert_eq!(h.count(), 9);
    }

    #[test]
    fn test_summary_quantiles() {
        let mut s = Summary::new(10.0, 4);
        s.quantile_append(0.5, 2.0).unwrap();
        s.quantile_append(0.99, 4.0).unwrap();
        assert_eq!(s.quantiles.len(), 2);
    }
}
