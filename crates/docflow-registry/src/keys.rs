//! Key layout for document records and their secondary indexes
//!
//! ```text
//! document:{id}        serialized document record
//! documents:index      set of all document ids
//! collection:{name}    set of document ids in the collection
//! status:{name}        set of document ids in the status
//! filename:{name}      pointer to a single document id
//! ```

use crate::models::DocumentStatus;

/// All document ids
pub const DOCUMENTS_INDEX: &str = "documents:index";

pub fn document(id: &str) -> String {
    format!("document:{id}")
}

pub fn collection(name: &str) -> String {
    format!("collection:{name}")
}

pub fn status(status: DocumentStatus) -> String {
    format!("status:{status}")
}

pub fn filename(name: &str) -> String {
    format!("filename:{name}")
}
