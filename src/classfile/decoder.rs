//! C7 — Classfile Decoder.
//!
//! Parses the binary classfile format into the unlinked per-class record
//! C9 will later cross-link. Grounded in mokapot's
//! `Class::from_reader` (magic check → constant pool → access flags →
//! this/super → interfaces → fields → methods → attributes) and its
//! `extract_attributes!` macro's "decode known, skip unknown by length"
//! discipline.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::ClassFileError;

use super::annotation::{decode_annotation, decode_element_value, AnnotationInfo, Value};
use super::constant_pool::ConstantPool;
use super::reader::Reader;
use super::signature::{descriptor_to_human, generic_signature_to_human, method_descriptor_to_human, parse_method_descriptor, TypeSignature};

const MAGIC: u32 = 0xCAFE_BABE;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ANNOTATION: u16 = 0x2000;

/// A `ConstantValue` literal: int, long, float, double, or string.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ConstantLiteral {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

#[derive(Clone, Debug, Serialize)]
pub struct FieldInfo {
    pub class_name: String,
    pub name: String,
    pub modifiers: u16,
    pub descriptor_internal: String,
    pub descriptor_human_readable: Option<String>,
    pub annotations: Vec<AnnotationInfo>,
    pub const_value: Option<ConstantLiteral>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MethodInfo {
    pub class_name: String,
    pub name: String,
    pub modifiers: u16,
    pub descriptor_internal: String,
    pub descriptor_human_readable: Option<String>,
    pub annotations: Vec<AnnotationInfo>,
    pub parameters: Vec<TypeSignature>,
    pub annotation_default: Option<Value>,
}

/// Per-class decoded record, unlinked until C9 resolves its name references.
#[derive(Clone, Debug)]
pub struct ClassfileUnlinked {
    pub class_name: String,
    pub modifiers: u16,
    pub is_interface: bool,
    pub is_annotation: bool,
    pub superclass_name: Option<String>,
    pub interfaces: Vec<String>,
    pub class_annotations: Vec<AnnotationInfo>,
    pub method_annotations: Vec<AnnotationInfo>,
    pub field_annotations: Vec<AnnotationInfo>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub static_final_values: HashMap<String, ConstantLiteral>,
    pub containments: Vec<(String, String)>,
    pub enclosing_method: Option<String>,
    pub annotation_defaults: HashMap<String, Value>,
    /// Non-owning back reference to the owning classpath element, kept as
    /// its `scanOrderKey` rather than a live handle — the arena-of-records
    /// design avoids ownership cycles; see C9.
    pub source_ce_key: String,
}

/// Decode one classfile's bytes into an unlinked record.
pub fn decode(bytes: &[u8], source_ce_key: &str) -> Result<ClassfileUnlinked, ClassFileError> {
    let mut reader = Reader::new(bytes);

    let magic = reader.u4()?;
    if magic != MAGIC {
        return Err(ClassFileError::BadMagic(magic));
    }
    let _minor_version = reader.u2()?;
    let _major_version = reader.u2()?;

    let pool = ConstantPool::parse(&mut reader)?;

    let access_flags = reader.u2()?;
    let this_class_index = reader.u2()?;
    let super_class_index = reader.u2()?;
    let class_name = pool.class_name(this_class_index)?;
    let superclass_name = if super_class_index == 0 { None } else { Some(pool.class_name(super_class_index)?) };

    let interfaces_count = reader.u2()?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        interfaces.push(pool.class_name(reader.u2()?)?);
    }

    let fields_count = reader.u2()?;
    let mut fields = Vec::with_capacity(fields_count as usize);
    for _ in 0..fields_count {
        fields.push(decode_field(&mut reader, &pool, &class_name)?);
    }

    let methods_count = reader.u2()?;
    let mut methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        methods.push(decode_method(&mut reader, &pool, &class_name)?);
    }

    let mut class_annotations = Vec::new();
    let mut containments = Vec::new();
    let mut enclosing_method = None;

    let attributes_count = reader.u2()?;
    for _ in 0..attributes_count {
        let name_index = reader.u2()?;
        let attr_name = pool.utf8(name_index)?.to_string();
        let length = reader.u4()? as usize;
        let attr_start = reader.position();

        match attr_name.as_str() {
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                let count = reader.u2()?;
                for _ in 0..count {
                    class_annotations.push(decode_annotation(&mut reader, &pool)?);
                }
            }
            "InnerClasses" => {
                let count = reader.u2()?;
                for _ in 0..count {
                    let inner_class_info_index = reader.u2()?;
                    let outer_class_info_index = reader.u2()?;
                    let _inner_name_index = reader.u2()?;
                    let _inner_class_access_flags = reader.u2()?;
                    if outer_class_info_index != 0 {
                        let inner = pool.class_name(inner_class_info_index)?;
                        let outer = pool.class_name(outer_class_info_index)?;
                        containments.push((inner, outer));
                    }
                }
            }
            "EnclosingMethod" => {
                let class_index = reader.u2()?;
                let method_index = reader.u2()?;
                let owner = pool.class_name(class_index)?;
                enclosing_method = Some(if method_index == 0 {
                    owner
                } else {
                    let (name, descriptor) = pool.name_and_type(method_index)?;
                    format!("{owner}.{name}{descriptor}")
                });
            }
            _ => {}
        }

        realign(&mut reader, attr_start, length, &attr_name)?;
    }

    let modifiers = access_flags;
    let is_interface = modifiers & ACC_INTERFACE != 0;
    let is_annotation = modifiers & ACC_ANNOTATION != 0;

    let method_annotations = methods.iter().flat_map(|m| m.annotations.clone()).collect();
    let field_annotations = fields.iter().flat_map(|f| f.annotations.clone()).collect();
    let static_final_values = fields
        .iter()
        .filter_map(|f| f.const_value.clone().map(|v| (f.name.clone(), v)))
        .collect();
    let annotation_defaults = methods
        .iter()
        .filter_map(|m| m.annotation_default.clone().map(|v| (m.name.clone(), v)))
        .collect();

    Ok(ClassfileUnlinked {
        class_name,
        modifiers,
        is_interface,
        is_annotation,
        superclass_name,
        interfaces,
        class_annotations,
        method_annotations,
        field_annotations,
        fields,
        methods,
        static_final_values,
        containments,
        enclosing_method,
        annotation_defaults,
        source_ce_key: source_ce_key.to_string(),
    })
}

fn decode_field(reader: &mut Reader, pool: &ConstantPool, class_name: &str) -> Result<FieldInfo, ClassFileError> {
    let modifiers = reader.u2()?;
    let name_index = reader.u2()?;
    let descriptor_index = reader.u2()?;
    let name = pool.utf8(name_index)?.to_string();
    let descriptor_internal = pool.utf8(descriptor_index)?.to_string();
    let mut descriptor_human_readable = descriptor_to_human(&descriptor_internal).ok();

    let mut annotations = Vec::new();
    let mut const_value = None;

    let attributes_count = reader.u2()?;
    for _ in 0..attributes_count {
        let attr_name_index = reader.u2()?;
        let attr_name = pool.utf8(attr_name_index)?.to_string();
        let length = reader.u4()? as usize;
        let attr_start = reader.position();

        match attr_name.as_str() {
            "ConstantValue" => {
                let index = reader.u2()?;
                match decode_constant_value(&descriptor_internal, index, pool) {
                    Ok(literal) => const_value = Some(literal),
                    Err(err) => debug!(field = %name, error = %err, "skipping malformed ConstantValue"),
                }
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                let count = reader.u2()?;
                for _ in 0..count {
                    annotations.push(decode_annotation(reader, pool)?);
                }
            }
            "Signature" => {
                let sig_index = reader.u2()?;
                let raw = pool.utf8(sig_index)?.to_string();
                match generic_signature_to_human(&raw, false) {
                    Ok(human) => descriptor_human_readable = Some(human),
                    Err(err) => debug!(field = %name, error = %err, "skipping malformed field Signature"),
                }
            }
            _ => {}
        }

        realign(reader, attr_start, length, &attr_name)?;
    }

    Ok(FieldInfo {
        class_name: class_name.to_string(),
        name,
        modifiers,
        descriptor_internal,
        descriptor_human_readable,
        annotations,
        const_value,
    })
}

fn decode_method(reader: &mut Reader, pool: &ConstantPool, class_name: &str) -> Result<MethodInfo, ClassFileError> {
    let modifiers = reader.u2()?;
    let name_index = reader.u2()?;
    let descriptor_index = reader.u2()?;
    let name = pool.utf8(name_index)?.to_string();
    let descriptor_internal = pool.utf8(descriptor_index)?.to_string();
    let mut descriptor_human_readable = method_descriptor_to_human(&descriptor_internal).ok();
    let parameters = parse_method_descriptor(&descriptor_internal).map(|(params, _)| params).unwrap_or_default();

    let mut annotations = Vec::new();
    let mut annotation_default = None;

    let attributes_count = reader.u2()?;
    for _ in 0..attributes_count {
        let attr_name_index = reader.u2()?;
        let attr_name = pool.utf8(attr_name_index)?.to_string();
        let length = reader.u4()? as usize;
        let attr_start = reader.position();

        match attr_name.as_str() {
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                let count = reader.u2()?;
                for _ in 0..count {
                    annotations.push(decode_annotation(reader, pool)?);
                }
            }
            "Signature" => {
                let sig_index = reader.u2()?;
                let raw = pool.utf8(sig_index)?.to_string();
                match generic_signature_to_human(&raw, true) {
                    Ok(human) => descriptor_human_readable = Some(human),
                    Err(err) => debug!(method = %name, error = %err, "skipping malformed method Signature"),
                }
            }
            "AnnotationDefault" => match decode_element_value(reader, pool) {
                Ok(value) => annotation_default = Some(value),
                Err(err) => debug!(method = %name, error = %err, "skipping malformed AnnotationDefault"),
            },
            // Code, Exceptions, MethodParameters, etc. are not decoded —
            // bytecode verification/rewriting is out of scope here.
            _ => {}
        }

        realign(reader, attr_start, length, &attr_name)?;
    }

    Ok(MethodInfo {
        class_name: class_name.to_string(),
        name,
        modifiers,
        descriptor_internal,
        descriptor_human_readable,
        annotations,
        parameters,
        annotation_default,
    })
}

fn decode_constant_value(field_descriptor: &str, index: u16, pool: &ConstantPool) -> Result<ConstantLiteral, ClassFileError> {
    match field_descriptor {
        "I" | "S" | "C" | "B" | "Z" => Ok(ConstantLiteral::Int(pool.integer(index)?)),
        "J" => Ok(ConstantLiteral::Long(pool.long(index)?)),
        "F" => Ok(ConstantLiteral::Float(pool.float(index)?)),
        "D" => Ok(ConstantLiteral::Double(pool.double(index)?)),
        "Ljava/lang/String;" => Ok(ConstantLiteral::Str(pool.string_value(index)?.to_string())),
        other => Err(ClassFileError::MalformedAttribute {
            name: "ConstantValue".to_string(),
            reason: format!("unsupported field descriptor for constant value: {other}"),
        }),
    }
}

/// Reconcile the reader's position with the attribute's declared `length`:
/// skip any unconsumed trailing bytes (the normal "unknown attribute"
/// path), or report a mismatch if a decoded attribute somehow read past its
/// own declared bound.
fn realign(reader: &mut Reader, attr_start: usize, length: usize, attr_name: &str) -> Result<(), ClassFileError> {
    let consumed = reader.position() - attr_start;
    if consumed < length {
        reader.skip(length - consumed)?;
    } else if consumed > length {
        return Err(ClassFileError::MalformedAttribute {
            name: attr_name.to_string(),
            reason: format!("decoded {consumed} bytes but attribute declared length {length}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_u2(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_be_bytes());
    }
    fn write_u4(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Build a minimal valid classfile: `class pkg.Foo extends java.lang.Object`,
    /// no fields/methods/attributes, one interface `java.io.Serializable`.
    fn minimal_classfile() -> Vec<u8> {
        let mut buf = Vec::new();
        write_u4(&mut buf, MAGIC);
        write_u2(&mut buf, 0); // minor
        write_u2(&mut buf, 61); // major

        // constant pool: 1=Utf8("pkg/Foo"), 2=Class(1), 3=Utf8("java/lang/Object"),
        // 4=Class(3), 5=Utf8("java/io/Serializable"), 6=Class(5)
        write_u2(&mut buf, 7); // count = max_index+1
        buf.push(1);
        write_u2(&mut buf, 7);
        buf.extend_from_slice(b"pkg/Foo");
        buf.push(7);
        write_u2(&mut buf, 1);
        buf.push(1);
        write_u2(&mut buf, 16);
        buf.extend_from_slice(b"java/lang/Object");
        buf.push(7);
        write_u2(&mut buf, 3);
        buf.push(1);
        write_u2(&mut buf, 20);
        buf.extend_from_slice(b"java/io/Serializable");
        buf.push(7);
        write_u2(&mut buf, 5);

        write_u2(&mut buf, 0x0021); // access_flags: ACC_PUBLIC | ACC_SUPER
        write_u2(&mut buf, 2); // this_class
        write_u2(&mut buf, 4); // super_class
        write_u2(&mut buf, 1); // interfaces_count
        write_u2(&mut buf, 6); // interfaces[0]
        write_u2(&mut buf, 0); // fields_count
        write_u2(&mut buf, 0); // methods_count
        write_u2(&mut buf, 0); // attributes_count
        buf
    }

    #[test]
    fn decodes_minimal_class_header() {
        let bytes = minimal_classfile();
        let class = decode(&bytes, "000").expect("decode");
        assert_eq!(class.class_name, "pkg.Foo");
        assert_eq!(class.superclass_name.as_deref(), Some("java.lang.Object"));
        assert_eq!(class.interfaces, vec!["java.io.Serializable".to_string()]);
        assert!(!class.is_interface);
        assert!(!class.is_annotation);
        assert_eq!(class.source_ce_key, "000");
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = minimal_classfile();
        bytes[0] = 0x00;
        let err = decode(&bytes, "000").unwrap_err();
        assert!(matches!(err, ClassFileError::BadMagic(_)));
    }

    #[test]
    fn reports_truncated_classfile() {
        let bytes = minimal_classfile();
        let truncated = &bytes[..40];
        let err = decode(truncated, "000").unwrap_err();
        assert!(matches!(err, ClassFileError::Truncated { .. }));
    }
}
