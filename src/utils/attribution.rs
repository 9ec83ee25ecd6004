use crate::features::schema::{Feature, FeatureVector};

/// Number of contributors reported when the caller does not ask for more.
pub const DEFAULT_TOP_K: usize = 3;

/// Names the `k` dimensions furthest from the reference center, largest
/// absolute deviation first. Ties keep schema order. Explanatory only; the
/// score does not depend on it.
pub fn top_contributors(x: &FeatureVector, k: usize) -> Vec<&'static str> {
    let mut ranked: Vec<(Feature, f64)> = Feature::ALL
        .iter()
        .map(|&f| (f, (x.get(f) - f.center()).abs()))
        .collect();

    // Stable sort, descending.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranked.into_iter().take(k).map(|(f, _)| f.name()).collect()
}
