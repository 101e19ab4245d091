//! C10 — Scan Result.
//!
//! The immutable, queryable product of one scan. Wraps the [`ClassArena`]
//! C9 produced with the by-name and relation-query surface the end-user API
//! builds on, plus the CE order and `file → lastModified` map (not itself
//! persisted state — a snapshot the caller may persist).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

use crate::classfile::AnnotationInfo;
use crate::cross_linker::{ClassArena, ClassInfo};

/// One entry in the final, shadow-resolved classpath element order.
#[derive(Clone, Debug, Serialize)]
pub struct ClasspathElementSummary {
    pub canonical_path: PathBuf,
    pub zip_base_dir: Option<String>,
    pub scan_order_key: String,
}

#[derive(Debug, Serialize)]
pub struct ScanResult {
    classes: ClassArena,
    classpath_elements: Vec<ClasspathElementSummary>,
    file_timestamps: HashMap<String, SystemTime>,
    environment_fingerprint: String,
}

fn sorted_names(set: &std::collections::BTreeSet<Arc<str>>) -> Vec<Arc<str>> {
    set.iter().cloned().collect()
}

impl ScanResult {
    pub fn build(
        classes: ClassArena,
        classpath_elements: Vec<ClasspathElementSummary>,
        file_timestamps: HashMap<String, SystemTime>,
        environment_fingerprint: String,
    ) -> Self {
        Self { classes, classpath_elements, file_timestamps, environment_fingerprint }
    }

    /// Look up a scanned class by name. Returns `None` for names that only
    /// exist in the arena as external placeholders (referenced but never
    /// themselves scanned) — callers can't distinguish "never referenced"
    /// from "referenced but not on the classpath" otherwise.
    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name).filter(|c| !c.is_external)
    }

    pub fn classpath_elements(&self) -> &[ClasspathElementSummary] {
        &self.classpath_elements
    }

    pub fn file_timestamps(&self) -> &HashMap<String, SystemTime> {
        &self.file_timestamps
    }

    pub fn environment_fingerprint(&self) -> &str {
        &self.environment_fingerprint
    }

    /// Number of classes actually scanned, excluding external placeholder
    /// nodes the cross-linker creates for referenced-but-unscanned names.
    pub fn class_count(&self) -> usize {
        self.classes.values().filter(|c| !c.is_external).count()
    }

    /// Direct subclasses of `class_name`.
    pub fn subclasses_of(&self, class_name: &str) -> Vec<Arc<str>> {
        self.classes.get(class_name).map(|c| sorted_names(&c.subclasses)).unwrap_or_default()
    }

    /// The full ancestor chain of `class_name`, nearest first, following
    /// `superclass` links until an external or rootless node is reached.
    pub fn superclasses_of(&self, class_name: &str) -> Vec<Arc<str>> {
        let mut chain = Vec::new();
        let mut current = self.classes.get(class_name).and_then(|c| c.superclass.clone());
        while let Some(name) = current {
            let next = self.classes.get(name.as_ref()).and_then(|c| c.superclass.clone());
            chain.push(name);
            current = next;
        }
        chain
    }

    /// Interfaces `class_name` directly implements or extends.
    pub fn implementations_of(&self, class_name: &str) -> Vec<Arc<str>> {
        self.classes.get(class_name).map(|c| sorted_names(&c.interfaces)).unwrap_or_default()
    }

    /// Classes/interfaces that directly implement or extend `interface_name`.
    pub fn implementors_of(&self, interface_name: &str) -> Vec<Arc<str>> {
        self.classes.get(interface_name).map(|c| sorted_names(&c.implementors)).unwrap_or_default()
    }

    /// Classes carrying an application of annotation type `annotation_name`
    /// at any site — class, method, or field.
    pub fn classes_annotated_by(&self, annotation_name: &str) -> Vec<Arc<str>> {
        let Some(info) = self.classes.get(annotation_name) else { return Vec::new() };
        let mut names: std::collections::BTreeSet<Arc<str>> = std::collections::BTreeSet::new();
        names.extend(info.annotated_via_class.iter().cloned());
        names.extend(info.annotated_via_method.iter().cloned());
        names.extend(info.annotated_via_field.iter().cloned());
        names.into_iter().collect()
    }

    /// Every annotation applied anywhere on `class_name`, with defaults
    /// already merged in by C9.
    pub fn annotations_on(&self, class_name: &str) -> Vec<AnnotationInfo> {
        let Some(info) = self.classes.get(class_name) else { return Vec::new() };
        let mut all = Vec::with_capacity(info.class_annotations.len() + info.method_annotations.len() + info.field_annotations.len());
        all.extend(info.class_annotations.iter().cloned());
        all.extend(info.method_annotations.iter().cloned());
        all.extend(info.field_annotations.iter().cloned());
        all.sort();
        all
    }

    /// Classes with at least one field declared of type `type_name`.
    pub fn classes_with_field_of_type(&self, type_name: &str) -> Vec<Arc<str>> {
        self.classes.get(type_name).map(|c| sorted_names(&c.used_as_field_type_by)).unwrap_or_default()
    }

    pub fn enclosing_of(&self, class_name: &str) -> Option<Arc<str>> {
        self.classes.get(class_name).and_then(|c| c.contained_in.clone())
    }

    pub fn enclosed_by(&self, class_name: &str) -> Vec<Arc<str>> {
        self.classes.get(class_name).map(|c| sorted_names(&c.contains)).unwrap_or_default()
    }
}
