/// Fixed-width histogram over `[0, ∞)` that grows as larger values arrive.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    width: f64,
    bins: Vec<f64>,
}

impl Histogram {
    pub fn new(width: f64) -> Self {
        Self {
            width,
            bins: Vec::new(),
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Adds `weight` to the bin containing `value`. Negative and non-finite values are ignored.
    pub fn add(&mut self, value: f64, weight: f64) {
        if !value.is_finite() || value < 0.0 {
            return;
        }
        let bin = (value / self.width) as usize;
        if bin >= self.bins.len() {
            self.bins.resize(bin + 1, 0.0);
        }
        self.bins[bin] += weight;
    }

    pub fn total(&self) -> f64 {
        self.bins.iter().sum()
    }

    /// `(lower edge, weight)` of every bin.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.bins
            .iter()
            .enumerate()
            .map(|(k, &w)| (k as f64 * self.width, w))
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_land_in_their_bins() {
        let mut h = Histogram::new(0.5);
        h.add(0.2, 1.0);
        h.add(1.49, 2.0);
        h.add(1.5, 1.0);
        let bins: Vec<(f64, f64)> = h.iter().collect();
        assert_eq!(bins, vec![(0.0, 1.0), (0.5, 0.0), (1.0, 2.0), (1.5, 1.0)]);
        assert_eq!(h.total(), 4.0);
    }

    #[test]
    fn invalid_values_are_ignored() {
        let mut h = Histogram::new(1.0);
        h.add(-1.0, 1.0);
        h.add(f64::NAN, 1.0);
        h.add(f64::INFINITY, 1.0);
        assert!(h.is_empty());
    }
}
