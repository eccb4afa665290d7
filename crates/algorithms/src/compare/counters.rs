//! Change buckets and the area-weighted difference rating

use geomask_core::Error;
use std::str::FromStr;

/// Count and ground area (km²) of one change category
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bucket {
    pub count: usize,
    pub area_km2: f64,
}

impl Bucket {
    pub fn add(&mut self, area_km2: f64) {
        self.count += 1;
        self.area_km2 += area_km2;
    }

    pub fn merge(&mut self, other: &Bucket) {
        self.count += other.count;
        self.area_km2 += other.area_km2;
    }
}

/// Multipliers applied to each bucket's area in the weighted sum.
///
/// Isolated changes (not explained by the buffer tolerance) weigh more than
/// normal ones, lost foreground most of all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingWeights {
    pub fg_normal: f64,
    pub fg_isolated: f64,
    pub bg_normal: f64,
    pub bg_isolated: f64,
}

impl Default for RatingWeights {
    fn default() -> Self {
        Self {
            fg_normal: 1.0,
            fg_isolated: 3.0,
            bg_normal: 1.0,
            bg_isolated: 10.0,
        }
    }
}

impl FromStr for RatingWeights {
    type Err = Error;

    /// Four comma-separated numbers in the order
    /// `fg_normal,fg_isolated,bg_normal,bg_isolated`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::InvalidParameter {
            name: "weights",
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid("not a number"))?;
        let [fg_normal, fg_isolated, bg_normal, bg_isolated] = values[..] else {
            return Err(invalid("expected four comma-separated values"));
        };
        if values.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(invalid("weights must be finite and non-negative"));
        }
        Ok(Self {
            fg_normal,
            fg_isolated,
            bg_normal,
            bg_isolated,
        })
    }
}

/// Totals of one classification scan
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassificationCounters {
    /// Newly foreground, within buffer distance of the reference foreground
    pub fg_normal: Bucket,
    /// Newly foreground, beyond buffer distance
    pub fg_isolated: Bucket,
    /// Newly background, within buffer distance of the reference background
    pub bg_normal: Bucket,
    /// Newly background, beyond buffer distance
    pub bg_isolated: Bucket,
    /// Ground area of every successfully sampled pixel
    pub total_area_km2: f64,
}

impl ClassificationCounters {
    pub fn merge(&mut self, other: &ClassificationCounters) {
        self.fg_normal.merge(&other.fg_normal);
        self.fg_isolated.merge(&other.fg_isolated);
        self.bg_normal.merge(&other.bg_normal);
        self.bg_isolated.merge(&other.bg_isolated);
        self.total_area_km2 += other.total_area_km2;
    }

    /// Number of changed pixels in all four buckets
    pub fn changed(&self) -> usize {
        self.fg_normal.count + self.fg_isolated.count + self.bg_normal.count + self.bg_isolated.count
    }

    pub fn weighted_area(&self, weights: &RatingWeights) -> f64 {
        weights.fg_normal * self.fg_normal.area_km2
            + weights.bg_normal * self.bg_normal.area_km2
            + weights.fg_isolated * self.fg_isolated.area_km2
            + weights.bg_isolated * self.bg_isolated.area_km2
    }

    /// Weighted changed area over total area; 0 for an empty total
    pub fn difference_rating(&self, weights: &RatingWeights) -> f64 {
        if self.total_area_km2 > 0.0 {
            self.weighted_area(weights) / self.total_area_km2
        } else {
            0.0
        }
    }

    /// The ten colon-separated fields of the machine-readable summary
    pub fn summary_line(&self, weights: &RatingWeights) -> String {
        format!(
            "{}:{:.2}:{}:{:.2}:{}:{:.2}:{}:{:.2}:{:.8}:{:.2}",
            self.fg_normal.count,
            self.fg_normal.area_km2,
            self.fg_isolated.count,
            self.fg_isolated.area_km2,
            self.bg_normal.count,
            self.bg_normal.area_km2,
            self.bg_isolated.count,
            self.bg_isolated.area_km2,
            self.difference_rating(weights),
            self.weighted_area(weights),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn synthetic() -> ClassificationCounters {
        ClassificationCounters {
            fg_normal: Bucket { count: 20, area_km2: 2.0 },
            fg_isolated: Bucket { count: 10, area_km2: 1.0 },
            bg_normal: Bucket { count: 30, area_km2: 3.0 },
            bg_isolated: Bucket { count: 5, area_km2: 0.5 },
            total_area_km2: 100.0,
        }
    }

    #[test]
    fn rating_formula() {
        let c = synthetic();
        let w = RatingWeights::default();
        assert_relative_eq!(c.weighted_area(&w), 13.0);
        assert_relative_eq!(c.difference_rating(&w), 0.13);
        assert_eq!(c.changed(), 65);
    }

    #[test]
    fn summary_line_format() {
        let line = synthetic().summary_line(&RatingWeights::default());
        assert_eq!(line, "20:2.00:10:1.00:30:3.00:5:0.50:0.13000000:13.00");
        assert_eq!(line.split(':').count(), 10);
    }

    #[test]
    fn empty_total_rates_zero() {
        let c = ClassificationCounters::default();
        assert_eq!(c.difference_rating(&RatingWeights::default()), 0.0);
    }

    #[test]
    fn merge_adds_everything() {
        let mut a = synthetic();
        a.merge(&synthetic());
        assert_eq!(a.fg_isolated.count, 20);
        assert_relative_eq!(a.total_area_km2, 200.0);
        assert_relative_eq!(a.difference_rating(&RatingWeights::default()), 0.13);
    }

    #[test]
    fn weights_parse() {
        let w: RatingWeights = "1, 2,3 ,4.5".parse().unwrap();
        assert_eq!(w.bg_isolated, 4.5);
        assert!("1,2,3".parse::<RatingWeights>().is_err());
        assert!("1,2,x,4".parse::<RatingWeights>().is_err());
        assert!("1,2,3,-4".parse::<RatingWeights>().is_err());
    }

    #[test]
    fn custom_weights_change_rating() {
        let w = RatingWeights {
            fg_normal: 0.0,
            fg_isolated: 0.0,
            bg_normal: 0.0,
            bg_isolated: 1.0,
        };
        assert_relative_eq!(synthetic().difference_rating(&w), 0.005);
    }
}
