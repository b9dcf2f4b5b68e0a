use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// A dataset record. `doc_id` is the only stable join key across indexes;
/// `lang` and `translation` are carried for display, never for scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub lang: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// Validate a freshly loaded corpus before any index sees it.
///
/// A record with an empty required field, or a `doc_id` collision, aborts the
/// whole load. No partial corpus ever reaches the indexes.
pub fn validate_corpus(docs: &[Document]) -> Result<()> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(docs.len());
    for (index, doc) in docs.iter().enumerate() {
        for (field, value) in [("doc_id", &doc.doc_id), ("lang", &doc.lang), ("text", &doc.text)] {
            if value.trim().is_empty() {
                return Err(Error::Schema {
                    index,
                    reason: format!("missing required field `{field}`"),
                });
            }
        }
        if let Some(first) = seen.insert(doc.doc_id.as_str(), index) {
            return Err(Error::Schema {
                index,
                reason: format!("duplicate doc_id `{}` (first seen at record {first})", doc.doc_id),
            });
        }
    }
    Ok(())
}
