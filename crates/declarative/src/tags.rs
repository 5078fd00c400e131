//! Tag resolution
//!
//! Pure lookup of tag labels against a known tag list. Creating the missing
//! tags is the engine's job (see [`crate::planner`]).

use crate::types::{Tag, TagRef};

/// Find a known tag by label, ignoring case
pub fn find_label<'a>(known: &'a [Tag], label: &str) -> Option<&'a Tag> {
    known
        .iter()
        .find(|t| t.label.to_lowercase() == label.to_lowercase())
}

/// Resolve tag references to ids
///
/// Numeric references pass straight through without being checked against
/// `known`. Labels are matched case-insensitively; unmatched labels are
/// returned in `missing` (deduplicated, first spelling kept) rather than
/// dropped. Returned ids keep the order of `tag_refs`.
pub fn resolve(tag_refs: &[TagRef], known: &[Tag]) -> (Vec<i64>, Vec<String>) {
    let mut ids = Vec::with_capacity(tag_refs.len());
    let mut missing: Vec<String> = Vec::new();

    for tag_ref in tag_refs {
        match tag_ref {
            TagRef::Id(id) => ids.push(*id),
            TagRef::Name(label) => match find_label(known, label) {
                Some(tag) => ids.push(tag.id),
                None => {
                    if !missing.iter().any(|m| m.to_lowercase() == label.to_lowercase()) {
                        missing.push(label.clone());
                    }
                }
            },
        }
    }

    (ids, missing)
}
