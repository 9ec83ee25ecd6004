// src/features/extract.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::features::schema::{Feature, FeatureVector, N_FEATURES};

/// Length of the legacy positional layout, see [`legacy_remap`].
pub const LEGACY_ARITY: usize = 4;

/// A scoring request as it arrives from the transport.
///
/// Every field is kept as a raw JSON value so that a wrongly typed field
/// degrades to zero during extraction instead of rejecting the request.
/// A field sent as `null` is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRequest {
    #[serde(rename = "couponValue", default, skip_serializing_if = "Option::is_none")]
    pub coupon_value: Option<Value>,
    #[serde(rename = "acctAgeHours", default, skip_serializing_if = "Option::is_none")]
    pub acct_age_hours: Option<Value>,
    #[serde(rename = "device_redemptions24h", default, skip_serializing_if = "Option::is_none")]
    pub device_redemptions_24h: Option<Value>,
    #[serde(rename = "ip_uniqueAccounts10m", default, skip_serializing_if = "Option::is_none")]
    pub ip_unique_accounts_10m: Option<Value>,
    #[serde(rename = "user_redemptions24h", default, skip_serializing_if = "Option::is_none")]
    pub user_redemptions_24h: Option<Value>,
    /// Free-form name -> value mapping keyed by schema names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Value>,
    /// Raw positional row.
    #[serde(rename = "X", default, skip_serializing_if = "Option::is_none")]
    pub x: Option<Value>,
}

impl ScoreRequest {
    /// Builds a request from any JSON value. Anything that is not an object
    /// yields an empty request, which extracts to the zero vector.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    /// Convenience fields paired with the schema dimension they overlay.
    fn named_fields(&self) -> [(Feature, Option<&Value>); N_FEATURES] {
        [
            (Feature::Value, self.coupon_value.as_ref()),
            (Feature::AcctAgeHours, self.acct_age_hours.as_ref()),
            (Feature::Device24h, self.device_redemptions_24h.as_ref()),
            (Feature::Ip10m, self.ip_unique_accounts_10m.as_ref()),
            (Feature::User24h, self.user_redemptions_24h.as_ref()),
        ]
    }
}

/// Strict numeric coercion. Numbers, numeric strings and booleans convert;
/// everything else, and any non-finite result, does not.
pub fn coerce(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }?;
    n.is_finite().then_some(n)
}

/// Lenient coercion used for every dimension: missing or unparsable is 0.0.
pub fn coerce_or_default(value: Option<&Value>) -> f64 {
    value.and_then(coerce).unwrap_or(0.0)
}

/// Maps the legacy 4-element layout `[a, b, c, d]` onto `[b, c, d, 0.0, a]`.
///
/// `a` is the coupon value; `user24h` has no source in this layout.
pub fn legacy_remap(xs: [f64; LEGACY_ARITY]) -> FeatureVector {
    let [a, b, c, d] = xs;
    FeatureVector::new([b, c, d, 0.0, a])
}

/// Interprets a raw positional array. Returns `None` when the caller should
/// fall through to the named channel: the array is empty, has an unsupported
/// length, or contains any element that fails coercion.
pub fn positional(xs: &[Value]) -> Option<FeatureVector> {
    let parsed: Vec<f64> = xs.iter().map(coerce).collect::<Option<_>>()?;

    match parsed.len() {
        LEGACY_ARITY => Some(legacy_remap([parsed[0], parsed[1], parsed[2], parsed[3]])),
        n if n >= N_FEATURES => {
            let mut row = [0.0; N_FEATURES];
            row.copy_from_slice(&parsed[..N_FEATURES]);
            Some(FeatureVector::new(row))
        }
        _ => None,
    }
}

/// Reads one row out of a name -> value mapping using schema names.
pub fn row_from_mapping(map: &Map<String, Value>) -> FeatureVector {
    let mut row = FeatureVector::default();
    for feature in Feature::ALL {
        row.set(feature, coerce_or_default(map.get(feature.name())));
    }
    row
}

/// Produces exactly one schema-ordered row from a request. Never fails.
pub fn extract_vector(req: &ScoreRequest) -> FeatureVector {
    if let Some(Value::Array(xs)) = &req.x {
        if let Some(row) = positional(xs) {
            return row;
        }
    }

    let mut src = match &req.features {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    // Named fields win over same-named keys in the mapping.
    for (feature, value) in req.named_fields() {
        if let Some(value) = value {
            src.insert(feature.name().to_string(), value.clone());
        }
    }

    row_from_mapping(&src)
}
