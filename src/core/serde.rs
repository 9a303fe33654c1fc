/*!
 * Serde Helpers
 *
 * Predicates for `#[serde(skip_serializing_if = "...")]` and validating
 * deserializers for configuration fields.
 */

use serde::{Deserialize, Deserializer};

/// Skip serializing if value is zero
#[inline]
pub const fn is_zero_u64(value: &u64) -> bool {
    *value == 0
}

/// Skip serializing if value is zero
#[inline]
pub const fn is_zero_usize(value: &usize) -> bool {
    *value == 0
}

/// Skip serializing if value is false
#[inline]
pub const fn is_false(value: &bool) -> bool {
    !*value
}

/// Deserialize and validate that a usize is non-zero
pub fn deserialize_nonzero_usize<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = usize::deserialize(deserializer)?;
    if value == 0 {
        return Err(serde::de::Error::custom("value must be non-zero"));
    }
    Ok(value)
}
