use serde_json::Value;
use thiserror::Error;

use crate::graph::Measurement;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid JSON payload")]
    Json(#[from] serde_json::Error),
    #[error("payload must be a JSON array of [idA, idB, distance] triples")]
    NotArray,
    #[error("entry {index} must be a three-element array")]
    Arity { index: usize },
    #[error("entry {index} has a non-string node id")]
    Id { index: usize },
    #[error("entry {index} has a non-numeric distance")]
    Distance { index: usize },
}

/// Decodes `[["idA", "idB", 2.0], ...]`. Shape is checked here; the values
/// themselves are validated again on submission.
pub fn decode_triples(raw: &str) -> Result<Vec<Measurement>, PayloadError> {
    let parsed: Value = serde_json::from_str(raw)?;
    let entries = parsed.as_array().ok_or(PayloadError::NotArray)?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let [id_a, id_b, distance] = entry
                .as_array()
                .map(Vec::as_slice)
                .ok_or(PayloadError::Arity { index })?
            else {
                return Err(PayloadError::Arity { index });
            };

            let id_a = id_a.as_str().ok_or(PayloadError::Id { index })?;
            let id_b = id_b.as_str().ok_or(PayloadError::Id { index })?;
            let distance = distance.as_f64().ok_or(PayloadError::Distance { index })?;

            Ok(Measurement::new(id_a, id_b, distance as f32))
        })
        .collect()
}
