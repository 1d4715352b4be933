//! Call sites — mappings that describe an external call.
//!
//! A call site is a mapping whose `call` key (see [`CallConventions`]) holds
//! the target name. Parameters live under `params`; a batched descriptor
//! carries a `batch` sequence of parameter values instead. Every other key is
//! part of the call's shape.

use dt_core::{CallConventions, Document, Mapping};

/// Target of a call site, if `doc` is one.
pub fn target<'a>(doc: &'a Document, conv: &CallConventions) -> Option<&'a str> {
    doc.get(&conv.call_key).and_then(Document::as_str)
}

pub fn is_call_site(doc: &Document, conv: &CallConventions) -> bool {
    target(doc, conv).is_some()
}

/// Items of a batched descriptor.
pub fn batch_items<'a>(doc: &'a Document, conv: &CallConventions) -> Option<&'a [Document]> {
    if !is_call_site(doc, conv) {
        return None;
    }
    doc.get(&conv.batch_key).and_then(Document::as_sequence)
}

/// True when the call's method is one of the configured read-only verbs.
pub fn is_read_only(doc: &Document, conv: &CallConventions) -> bool {
    is_call_site(doc, conv)
        && doc
            .get(&conv.method_key)
            .and_then(Document::as_str)
            .is_some_and(|m| conv.is_read_only(m))
}

/// True when `doc` holds a call site anywhere that is not read-only.
pub fn has_side_effects(doc: &Document, conv: &CallConventions) -> bool {
    let mut found = false;
    doc.walk(&mut |_, node| {
        if is_call_site(node, conv) && !is_read_only(node, conv) {
            found = true;
        }
    });
    found
}

/// The call's shape: the mapping without its params/batch payload.
///
/// `None` for non-call nodes and for ambiguous descriptors (both `params`
/// and `batch`, or a `batch` that is not a sequence), which are never merged.
pub fn shape(doc: &Document, conv: &CallConventions) -> Option<Mapping> {
    let map = doc.as_mapping()?;
    target(doc, conv)?;
    let batch = map.get(&conv.batch_key);
    if batch.is_some_and(|b| b.as_sequence().is_none()) {
        return None;
    }
    if batch.is_some() && map.contains_key(&conv.params_key) {
        return None;
    }
    Some(
        map.iter()
            .filter(|(k, _)| **k != conv.params_key && **k != conv.batch_key)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

/// Parameter payloads of a call site, in order. A plain call without
/// `params` contributes an empty mapping.
pub fn payloads(doc: &Document, conv: &CallConventions) -> Vec<Document> {
    if let Some(items) = batch_items(doc, conv) {
        return items.to_vec();
    }
    vec![doc.get(&conv.params_key).cloned().unwrap_or_else(Document::mapping)]
}

/// Number of call sites anywhere in the tree. A batch counts once.
pub fn count(doc: &Document, conv: &CallConventions) -> usize {
    let mut total = 0;
    doc.walk(&mut |_, node| {
        if is_call_site(node, conv) {
            total += 1;
        }
    });
    total
}

/// Billable requests and the number of items carried inside batches.
pub fn billable(doc: &Document, conv: &CallConventions) -> (usize, usize) {
    let mut requests = 0;
    let mut batch_items_total = 0;
    doc.walk(&mut |_, node| {
        if is_call_site(node, conv) {
            requests += 1;
            if let Some(items) = batch_items(node, conv) {
                batch_items_total += items.len();
            }
        }
    });
    (requests, batch_items_total)
}
