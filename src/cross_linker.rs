//! C9 — Cross-Linker.
//!
//! Single-threaded pass promoting [`ClassfileUnlinked`] records into a
//! connected class graph: an arena of `ClassInfo` records keyed by name.
//! A `HashMap<Arc<str>, ClassInfo>` keyed by interned name, edges stored as
//! name sets, resolved to full records only at query time (C10) — this
//! sidesteps the ownership cycles a graph of `Rc<RefCell<_>>` nodes would
//! otherwise require.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::classfile::{AnnotationInfo, ClassfileUnlinked, FieldInfo, MethodInfo, Value};
use crate::intern::Interner;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ClassKind {
    Class,
    Interface,
    Annotation,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClassInfo {
    pub name: Arc<str>,
    pub modifiers: u16,
    pub kind: ClassKind,
    pub owning_ce_key: Option<String>,
    pub is_external: bool,
    pub is_denied: bool,

    pub superclass: Option<Arc<str>>,
    pub subclasses: BTreeSet<Arc<str>>,
    pub interfaces: BTreeSet<Arc<str>>,
    pub implementors: BTreeSet<Arc<str>>,

    pub class_annotations: Vec<AnnotationInfo>,
    pub method_annotations: Vec<AnnotationInfo>,
    pub field_annotations: Vec<AnnotationInfo>,
    pub annotated_via_class: BTreeSet<Arc<str>>,
    pub annotated_via_method: BTreeSet<Arc<str>>,
    pub annotated_via_field: BTreeSet<Arc<str>>,

    pub contained_in: Option<Arc<str>>,
    pub contains: BTreeSet<Arc<str>>,
    pub enclosing_method: Option<String>,

    pub field_type_refs: BTreeSet<Arc<str>>,
    pub used_as_field_type_by: BTreeSet<Arc<str>>,

    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
}

impl ClassInfo {
    fn placeholder(name: Arc<str>, is_denied: bool) -> Self {
        Self {
            name,
            modifiers: 0,
            kind: ClassKind::Class,
            owning_ce_key: None,
            is_external: true,
            is_denied,
            superclass: None,
            subclasses: BTreeSet::new(),
            interfaces: BTreeSet::new(),
            implementors: BTreeSet::new(),
            class_annotations: Vec::new(),
            method_annotations: Vec::new(),
            field_annotations: Vec::new(),
            annotated_via_class: BTreeSet::new(),
            annotated_via_method: BTreeSet::new(),
            annotated_via_field: BTreeSet::new(),
            contained_in: None,
            contains: BTreeSet::new(),
            enclosing_method: None,
            field_type_refs: BTreeSet::new(),
            used_as_field_type_by: BTreeSet::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }
}

/// Arena of cross-linked classes, keyed by interned name.
pub type ClassArena = HashMap<Arc<str>, ClassInfo>;

/// Link a set of unlinked records into a class graph. `records` must already
/// be in shadowing order (first-seen wins), which is the order C6/C5 emit
/// them in within the final CE order.
pub fn link(records: &[ClassfileUnlinked], interner: &Interner, is_denied: impl Fn(&str) -> bool) -> ClassArena {
    let mut arena: ClassArena = HashMap::new();

    let defaults_by_type: HashMap<&str, Vec<(String, Value)>> = records
        .iter()
        .filter(|r| !r.annotation_defaults.is_empty())
        .map(|r| (r.class_name.as_str(), r.annotation_defaults.clone().into_iter().collect()))
        .collect();

    for record in records {
        if let Some(existing) = arena.get(record.class_name.as_str()) {
            if !existing.is_external {
                debug!(class = %record.class_name, "duplicate class binding shadowed; keeping earlier occurrence");
                continue;
            }
        }

        let name = interner.intern(&record.class_name);
        let kind = if record.is_annotation {
            ClassKind::Annotation
        } else if record.is_interface {
            ClassKind::Interface
        } else {
            ClassKind::Class
        };

        let mut info = arena
            .remove(name.as_ref())
            .unwrap_or_else(|| ClassInfo::placeholder(name.clone(), false));
        info.modifiers = record.modifiers;
        info.kind = kind;
        info.owning_ce_key = Some(record.source_ce_key.clone());
        info.is_external = false;
        info.enclosing_method = record.enclosing_method.clone();
        info.fields = record.fields.clone();
        info.methods = record.methods.clone();

        if let Some(super_name) = &record.superclass_name {
            let super_key = ensure_node(&mut arena, interner, super_name, &is_denied);
            arena.get_mut(super_key.as_ref()).expect("just ensured").subclasses.insert(name.clone());
            info.superclass = Some(super_key);
        }

        for interface_name in &record.interfaces {
            let interface_key = ensure_node(&mut arena, interner, interface_name, &is_denied);
            arena.get_mut(interface_key.as_ref()).expect("just ensured").implementors.insert(name.clone());
            info.interfaces.insert(interface_key);
        }

        for annotation in &record.class_annotations {
            let merged = merge_defaults(annotation, &defaults_by_type);
            let ann_key = ensure_node(&mut arena, interner, &merged.name, &is_denied);
            arena.get_mut(ann_key.as_ref()).expect("just ensured").annotated_via_class.insert(name.clone());
            info.class_annotations.push(merged);
        }
        for annotation in &record.method_annotations {
            let merged = merge_defaults(annotation, &defaults_by_type);
            let ann_key = ensure_node(&mut arena, interner, &merged.name, &is_denied);
            arena.get_mut(ann_key.as_ref()).expect("just ensured").annotated_via_method.insert(name.clone());
            info.method_annotations.push(merged);
        }
        for annotation in &record.field_annotations {
            let merged = merge_defaults(annotation, &defaults_by_type);
            let ann_key = ensure_node(&mut arena, interner, &merged.name, &is_denied);
            arena.get_mut(ann_key.as_ref()).expect("just ensured").annotated_via_field.insert(name.clone());
            info.field_annotations.push(merged);
        }

        for field in &record.fields {
            if let Some(type_name) = class_type_of_descriptor(&field.descriptor_internal) {
                let type_key = ensure_node(&mut arena, interner, &type_name, &is_denied);
                arena.get_mut(type_key.as_ref()).expect("just ensured").used_as_field_type_by.insert(name.clone());
                info.field_type_refs.insert(type_key);
            }
        }

        arena.insert(name.clone(), info);

        for (inner, outer) in &record.containments {
            let inner_key = ensure_node(&mut arena, interner, inner, &is_denied);
            let outer_key = ensure_node(&mut arena, interner, outer, &is_denied);
            arena.get_mut(outer_key.as_ref()).expect("just ensured").contains.insert(inner_key.clone());
            arena.get_mut(inner_key.as_ref()).expect("just ensured").contained_in = Some(outer_key);
        }
    }

    arena
}

fn ensure_node(arena: &mut ClassArena, interner: &Interner, raw_name: &str, is_denied: &impl Fn(&str) -> bool) -> Arc<str> {
    let name = interner.intern(raw_name);
    if !arena.contains_key(name.as_ref()) {
        let denied = is_denied(raw_name);
        arena.insert(name.clone(), ClassInfo::placeholder(name.clone(), denied));
    }
    name
}

fn merge_defaults(annotation: &AnnotationInfo, defaults_by_type: &HashMap<&str, Vec<(String, Value)>>) -> AnnotationInfo {
    match defaults_by_type.get(annotation.name.as_str()) {
        Some(defaults) => annotation.add_defaults(defaults),
        None => annotation.clone(),
    }
}

/// Extract the class name referenced by a field descriptor, stripping any
/// array prefix, or `None` for primitives.
fn class_type_of_descriptor(descriptor: &str) -> Option<String> {
    let inner = descriptor.trim_start_matches('[');
    let body = inner.strip_prefix('L')?.strip_suffix(';')?;
    Some(body.replace('/', "."))
}
