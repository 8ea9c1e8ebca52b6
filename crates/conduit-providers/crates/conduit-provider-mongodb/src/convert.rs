//! Extended JSON <-> BSON

use bson::{Bson, Document};
use conduit_core::{ConduitError, Result};
use serde_json::Value as Json;

#[cfg(test)]
mod tests;

fn to_bson(value: Json) -> Result<Bson> {
    Bson::try_from(value).map_err(|e| ConduitError::Exec(format!("Invalid BSON value: {}", e)))
}

/// Convert an object literal (with `$oid`/`$date`/`$numberLong` markers) to
/// a document
pub fn json_to_document(value: Json) -> Result<Document> {
    match to_bson(value)? {
        Bson::Document(doc) => Ok(doc),
        other => Err(ConduitError::Exec(format!(
            "Expected a document, got {:?}",
            other.element_type()
        ))),
    }
}

/// Convert an array literal of objects to documents
pub(crate) fn json_to_documents(value: Json) -> Result<Vec<Document>> {
    match value {
        Json::Array(items) => items.into_iter().map(json_to_document).collect(),
        _ => Err(ConduitError::Exec("Expected an array of documents".into())),
    }
}

/// Relaxed extended JSON for a result document
pub fn document_to_json(doc: Document) -> Json {
    Bson::Document(doc).into_relaxed_extjson()
}

pub(crate) fn bson_to_json(value: Bson) -> Json {
    value.into_relaxed_extjson()
}
