use serde::{Deserialize, Serialize};

/// Averaged loss terms for one pass over a split.
///
/// `recon` and `total` are always present; `albedo` is absent for unlabeled
/// splits and `shading` only appears when a shading term is configured.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LossTerms {
    pub total: f32,
    pub recon: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub albedo: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shading: Option<f32>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub terms: LossTerms,
}

/// Running sums over the batches of an epoch, averaged on demand.
#[derive(Clone, Copy, Debug, Default)]
pub struct LossAccumulator {
    total: f64,
    recon: f64,
    albedo: Option<f64>,
    shading: Option<f64>,
    batches: usize,
}

impl LossAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, terms: &LossTerms) {
        self.total += terms.total as f64;
        self.recon += terms.recon as f64;
        if let Some(albedo) = terms.albedo {
            *self.albedo.get_or_insert(0.0) += albedo as f64;
        }
        if let Some(shading) = terms.shading {
            *self.shading.get_or_insert(0.0) += shading as f64;
        }
        self.batches += 1;
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Per-batch averages. Panics if no batches were accumulated.
    pub fn average(&self) -> LossTerms {
        assert!(self.batches > 0, "no batches accumulated");
        let n = self.batches as f64;
        LossTerms {
            total: (self.total / n) as f32,
            recon: (self.recon / n) as f32,
            albedo: self.albedo.map(|sum| (sum / n) as f32),
            shading: self.shading.map(|sum| (sum / n) as f32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn accumulator_averages_per_batch() {
        let mut accumulator = LossAccumulator::new();
        accumulator.add(&LossTerms {
            total: 1.0,
            recon: 0.5,
            albedo: Some(0.25),
            shading: None,
        });
        accumulator.add(&LossTerms {
            total: 3.0,
            recon: 1.5,
            albedo: Some(0.75),
            shading: None,
        });

        let average = accumulator.average();
        assert_eq!(accumulator.batches(), 2);
        assert_relative_eq!(average.total, 2.0);
        assert_relative_eq!(average.recon, 1.0);
        assert_relative_eq!(average.albedo.unwrap(), 0.5);
        assert!(average.shading.is_none());
    }

    #[test]
    #[should_panic(expected = "no batches accumulated")]
    fn average_of_empty_accumulator_panics() {
        LossAccumulator::new().average();
    }
}
