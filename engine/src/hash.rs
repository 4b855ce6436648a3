//! Content identity hashing.
//!
//! Array elements are identified by a hash of their content instead of their
//! position, so an element keeps its identity when the array is reordered.
//! The hash is a cheap non-cryptographic 53-bit hash built from two 32-bit
//! accumulators. Collisions are possible and accepted: the data is local UI
//! state, not a security boundary.

use crate::flatten::DiffElement;
use crate::path::ID_KEY;
use crate::schema::{SchemaNode, TypeStruct};
use serde_json::Value;

/// Width of an encoded hash. 36^11 exceeds 2^53, so every hash fits.
pub const HASH_WIDTH: usize = 11;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Hash the UTF-16 code units of `input` into a 53-bit value.
pub fn hash_code_units(input: &str, seed: u32) -> u64 {
    let mut h1: u32 = 0xdead_beef ^ seed;
    let mut h2: u32 = 0x41c6_ce57 ^ seed;
    for unit in input.encode_utf16() {
        let unit = u32::from(unit);
        h1 = (h1 ^ unit).wrapping_mul(2_654_435_761);
        h2 = (h2 ^ unit).wrapping_mul(1_597_334_677);
    }
    h1 = (h1 ^ (h1 >> 16)).wrapping_mul(2_246_822_507);
    h1 ^= (h2 ^ (h2 >> 13)).wrapping_mul(3_266_489_909);
    h2 = (h2 ^ (h2 >> 16)).wrapping_mul(2_246_822_507);
    h2 ^= (h1 ^ (h1 >> 13)).wrapping_mul(3_266_489_909);
    (u64::from(h2 & 0x1f_ffff) << 32) | u64::from(h1)
}

/// Hash a string into a fixed-width base-36 identifier.
pub fn hash_string(input: &str) -> String {
    let mut value = hash_code_units(input, 0);
    let mut digits = [b'0'; HASH_WIDTH];
    for slot in digits.iter_mut().rev() {
        *slot = BASE36[(value % 36) as usize];
        value /= 36;
    }
    // Only ASCII digits were written.
    String::from_utf8_lossy(&digits).into_owned()
}

/// Content hash of an object element, computed over the fields its schema
/// declares. The synthetic `(id)` field is never part of its own hash.
pub fn get_state_id(fields: &TypeStruct, element: &Value) -> String {
    let parts: Vec<String> = fields
        .iter()
        .filter(|(name, _)| name.as_str() != ID_KEY)
        .map(|(name, node)| {
            let value = element.get(name).unwrap_or(&Value::Null);
            format!("{}:{}", name, hash_value(node, value))
        })
        .collect();
    hash_string(&parts.join("/"))
}

fn hash_value(node: &SchemaNode, value: &Value) -> String {
    match node {
        SchemaNode::Object { fields } => get_state_id(fields, value),
        SchemaNode::Set { values } | SchemaNode::Array { values } => {
            let mut items: Vec<String> = value
                .as_array()
                .map(|items| items.iter().map(|item| hash_value(values, item)).collect())
                .unwrap_or_default();
            // Order-insensitive: reordering a collection is not a content change.
            items.sort();
            hash_string(&items.join(","))
        }
        SchemaNode::Primitive { .. } | SchemaNode::Ref { .. } | SchemaNode::File { .. } => {
            hash_string(&value.to_string())
        }
    }
}

/// Hash of a flattened entry; the alphabet of the sequence differ.
pub fn get_row_hash(element: &DiffElement) -> String {
    hash_string(&format!("{}{}", element.key, element.value))
}
