//! Canonical hashing of generated rigs.
//!
//! A fingerprint is computed as:
//! ```text
//! fingerprint = hex(BLAKE3(canonical_json(skeleton)))
//! ```
//! where canonical JSON has lexicographically sorted object keys, no
//! whitespace and every float rounded with [`quantize`].

use serde_json::{Number, Value};

use crate::error::RigResult;
use crate::math::quantize;
use crate::rig::Skeleton;

/// Computes the canonical BLAKE3 fingerprint of a skeleton.
///
/// Two skeletons with the same bones, transforms, constraints and settings
/// have the same fingerprint regardless of floating noise below 1e-9.
///
/// # Example
/// ```
/// use glam::DVec3;
/// use mechrig_core::hash::skeleton_fingerprint;
/// use mechrig_core::rig::{Bone, Skeleton};
///
/// let mut skeleton = Skeleton::new("Rig");
/// skeleton.insert(Bone::new("Root", DVec3::ZERO, DVec3::Y)).unwrap();
///
/// let hash = skeleton_fingerprint(&skeleton).unwrap();
/// assert_eq!(hash.len(), 64);
/// ```
pub fn skeleton_fingerprint(skeleton: &Skeleton) -> RigResult<String> {
    let value = serde_json::to_value(skeleton)?;
    Ok(canonical_value_hash(&value))
}

/// BLAKE3 hex digest of the canonical form of a JSON value.
pub fn canonical_value_hash(value: &Value) -> String {
    let canonical = canonicalize_json(value);
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

/// Canonical JSON text: sorted keys, no whitespace, quantized floats.
pub fn canonicalize_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(obj) => {
            let mut entries: Vec<(&String, &Value)> = obj.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

/// Integers verbatim. Floats are snapped to the [`quantize`] grid and printed
/// with that grid's nine fixed decimals, trailing zeros dropped.
fn write_number(out: &mut String, n: &Number) {
    if n.is_i64() || n.is_u64() {
        out.push_str(&n.to_string());
        return;
    }
    match n.as_f64().map(quantize) {
        Some(f) if f == 0.0 => out.push('0'),
        Some(f) if f.is_finite() => {
            let fixed = format!("{:.9}", f);
            out.push_str(fixed.trim_end_matches('0').trim_end_matches('.'));
        }
        _ => out.push_str("null"),
    }
}

/// Bone and constraint names go through serde_json's own escaping.
fn write_string(out: &mut String, s: &str) {
    out.push_str(&Value::from(s).to_string());
}
