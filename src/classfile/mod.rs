//! C7/C8 — Classfile Decoder and Annotation & Signature Model.
//!
//! Self-contained: no external classfile-parsing crate (see DESIGN.md for
//! why the `jclassfile` git dependency isn't carried forward).
//! Submodules mirror the natural decode order: bytes → constant pool →
//! class/field/method structures → annotations/signatures within them.

mod annotation;
mod constant_pool;
mod decoder;
mod reader;
mod signature;

pub use annotation::{AnnotationInfo, Value};
pub use constant_pool::ConstantPool;
pub use decoder::{decode, ClassfileUnlinked, ConstantLiteral, FieldInfo, MethodInfo};
pub use reader::Reader;
pub use signature::{
    descriptor_to_human, encode_type_signature, generic_signature_to_human, human_readable,
    method_descriptor_to_human, parse_method_descriptor, parse_type_signature, TypeSignature,
};
