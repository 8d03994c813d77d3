//! Shadow table for attributes a lossy stage might drop.
//!
//! Elements carrying custom attributes are stamped with a synthetic marker
//! id before the stage runs. Afterwards the recorded attributes are put back
//! on whichever element still carries the marker.

use indexmap::IndexMap;
use log::debug;

use crate::ast::{Attribute, Document, Element};
use crate::attrs::{
    EDITOR_PREFIXES, KNOWN_SVG_ATTRS, PRESERVED_NAMES, PRESERVED_PREFIXES, contains_ci,
};

/// Reserved attribute holding the synthetic id.
pub const MARKER_ATTR: &str = "data-svgcrush-keep";

/// Whether an attribute should survive the lossy stage verbatim.
pub fn is_preserve_worthy(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();

    if lower == MARKER_ATTR || lower.starts_with("xmlns") {
        return false;
    }
    if EDITOR_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return false;
    }
    if PRESERVED_NAMES.contains(&lower.as_str())
        || PRESERVED_PREFIXES.iter().any(|p| lower.starts_with(p))
    {
        return true;
    }
    lower.contains(':') || !contains_ci(KNOWN_SVG_ATTRS, &lower)
}

/// Attributes recorded for one run, keyed by marker id.
#[derive(Debug, Default)]
pub struct AttributeGuard {
    records: IndexMap<String, Vec<Attribute>>,
}

impl AttributeGuard {
    /// Stamp every element that carries preserve-worthy attributes.
    pub fn mark(doc: &mut Document) -> Self {
        let mut guard = Self::default();
        doc.for_each_element_mut(|elem| guard.mark_element(elem));
        debug!("preserving attributes on {} elements", guard.records.len());
        guard
    }

    fn mark_element(&mut self, elem: &mut Element) {
        elem.remove_attr(MARKER_ATTR);

        let kept: Vec<Attribute> = elem
            .attributes
            .iter()
            .filter(|a| is_preserve_worthy(&a.name.full_name()))
            .cloned()
            .collect();
        if kept.is_empty() {
            return;
        }

        let id = format!("k{}", self.records.len() + 1);
        elem.set_attr(MARKER_ATTR, id.clone());
        self.records.insert(id, kept);
    }

    /// Number of elements holding recorded attributes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Put recorded attributes back and strip every marker.
    ///
    /// Attributes the element already has are left as they are. Records
    /// whose element no longer exists are dropped.
    pub fn restore(mut self, doc: &mut Document) {
        doc.for_each_element_mut(|elem| {
            let Some(id) = elem.remove_attr(MARKER_ATTR) else {
                return;
            };
            if let Some(attrs) = self.records.shift_remove(&id) {
                for attr in attrs {
                    let name = attr.name.full_name();
                    if !elem.has_attr(&name) {
                        elem.attributes.push(attr);
                    }
                }
            }
        });

        if !self.records.is_empty() {
            debug!(
                "{} preserved attribute sets lost with their elements",
                self.records.len()
            );
        }
    }
}
