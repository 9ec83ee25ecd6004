// src/features/schema.rs

/// Number of dimensions every model row carries.
pub const N_FEATURES: usize = 5;

/// Dimension names in model order. This order is fixed for the lifetime of
/// the process and defines the positional layout of raw `X` arrays.
pub const FEATURES_ORDER: [&str; N_FEATURES] =
    ["acctAgeHours", "device24h", "ip10m", "user24h", "value"];

/// Typical behaviour. Used only to explain a score, never to compute one.
pub const REFERENCE_CENTER: [f64; N_FEATURES] = [100.0, 1.0, 0.0, 0.0, 5.0];

/// Per-dimension spread of the synthetic training population.
pub const SYNTHETIC_SPREAD: [f64; N_FEATURES] = [50.0, 1.0, 1.0, 1.0, 3.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    AcctAgeHours,
    Device24h,
    Ip10m,
    User24h,
    Value,
}

impl Feature {
    pub const ALL: [Feature; N_FEATURES] = [
        Feature::AcctAgeHours,
        Feature::Device24h,
        Feature::Ip10m,
        Feature::User24h,
        Feature::Value,
    ];

    pub const fn index(self) -> usize {
        match self {
            Feature::AcctAgeHours => 0,
            Feature::Device24h => 1,
            Feature::Ip10m => 2,
            Feature::User24h => 3,
            Feature::Value => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        FEATURES_ORDER[self.index()]
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    pub const fn center(self) -> f64 {
        REFERENCE_CENTER[self.index()]
    }
}

/// One extracted row, laid out per [`FEATURES_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureVector([f64; N_FEATURES]);

impl FeatureVector {
    pub const fn new(values: [f64; N_FEATURES]) -> Self {
        FeatureVector(values)
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        self.0[feature.index()] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub const fn values(&self) -> [f64; N_FEATURES] {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_index_lookups_agree() {
        for (i, name) in FEATURES_ORDER.iter().enumerate() {
            let by_name = Feature::from_name(name).unwrap();
            let by_index = Feature::from_index(i).unwrap();
            assert_eq!(by_name, by_index);
            assert_eq!(by_name.index(), i);
            assert_eq!(by_name.name(), *name);
        }
        assert_eq!(Feature::from_name("couponValue"), None);
        assert_eq!(Feature::from_index(N_FEATURES), None);
    }

    #[test]
    fn center_matches_reference() {
        assert_eq!(Feature::AcctAgeHours.center(), 100.0);
        assert_eq!(Feature::Value.center(), 5.0);
    }

    #[test]
    fn vector_set_and_get() {
        let mut v = FeatureVector::default();
        v.set(Feature::Ip10m, 7.0);
        assert_eq!(v.values(), [0.0, 0.0, 7.0, 0.0, 0.0]);
    }
}
