//! Size-limited property field codec.
//!
//! The vendor caps the byte length of a single property field. Values are
//! stored base64-encoded; an encoded value that exceeds the ceiling is split
//! across numbered sibling fields (`name0`, `name1`, …) with a `name_count`
//! field recording the chunk count, and reassembled transparently on read.

use crate::error::{DirectoryError, DirectoryResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::HashMap;

/// Upper bound on split chunks; the template pre-declares this many
/// numbered fields per splittable property.
pub const MAX_SPLIT_FIELDS: usize = 8;

/// The property-field names a template must carry for one splittable value.
#[must_use]
pub fn template_fields(name: &str) -> Vec<String> {
    let mut fields = Vec::with_capacity(MAX_SPLIT_FIELDS + 2);
    fields.push(name.to_string());
    fields.push(format!("{name}_count"));
    for i in 0..MAX_SPLIT_FIELDS {
        fields.push(format!("{name}{i}"));
    }
    fields
}

/// Encodes a value into one or more property fields.
///
/// Returns `[(name, encoded)]` when the encoded value fits the ceiling,
/// otherwise the numbered chunk fields plus the count field.
pub fn encode_value(
    name: &str,
    value: &[u8],
    ceiling: usize,
) -> DirectoryResult<Vec<(String, String)>> {
    let encoded = BASE64.encode(value);
    if encoded.len() <= ceiling {
        return Ok(vec![(name.to_string(), encoded)]);
    }

    let chunks: Vec<&str> = encoded
        .as_bytes()
        .chunks(ceiling)
        // base64 output is ASCII, so byte chunks are valid UTF-8
        .map(|c| std::str::from_utf8(c).unwrap_or_default())
        .collect();
    if chunks.len() > MAX_SPLIT_FIELDS {
        return Err(DirectoryError::Property(format!(
            "value for '{name}' needs {} chunks, template holds {MAX_SPLIT_FIELDS}",
            chunks.len()
        )));
    }

    let mut fields = Vec::with_capacity(chunks.len() + 1);
    fields.push((format!("{name}_count"), chunks.len().to_string()));
    for (i, chunk) in chunks.iter().enumerate() {
        fields.push((format!("{name}{i}"), (*chunk).to_string()));
    }
    Ok(fields)
}

/// Reassembles a value previously written by [`encode_value`].
///
/// Returns `Ok(None)` when neither the plain field nor a split count field
/// is present.
pub fn decode_value(
    name: &str,
    fields: &HashMap<String, String>,
) -> DirectoryResult<Option<Vec<u8>>> {
    if let Some(encoded) = fields.get(name) {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| DirectoryError::Property(format!("invalid base64 in '{name}': {e}")))?;
        return Ok(Some(bytes));
    }

    let Some(count_str) = fields.get(&format!("{name}_count")) else {
        return Ok(None);
    };
    let count: usize = count_str
        .parse()
        .map_err(|_| DirectoryError::Property(format!("invalid count field for '{name}'")))?;

    let mut encoded = String::new();
    for i in 0..count {
        let chunk = fields.get(&format!("{name}{i}")).ok_or_else(|| {
            DirectoryError::Property(format!("missing chunk {i} of {count} for '{name}'"))
        })?;
        encoded.push_str(chunk);
    }
    let bytes = BASE64
        .decode(&encoded)
        .map_err(|e| DirectoryError::Property(format!("invalid base64 in '{name}': {e}")))?;
    Ok(Some(bytes))
}
