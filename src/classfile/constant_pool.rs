//! Constant pool parsing: variable-length tagged entries, where long/double
//! occupy two slots.
//!
//! Grounded in mokapot's `class_parser.rs` constant pool loop, which reads
//! tag-dispatched entries into a flat `Vec` indexed 1-based with a dummy
//! placeholder after every 8/16-byte (long/double) entry.

use crate::error::ClassFileError;

use super::reader::Reader;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

#[derive(Clone, Debug)]
pub enum Entry {
    /// Occupies the slot after a Long/Double entry and index 0; never a
    /// valid lookup target.
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    Fieldref { class_index: u16, name_and_type_index: u16 },
    Methodref { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
}

pub struct ConstantPool {
    entries: Vec<Entry>,
}

impl ConstantPool {
    pub fn parse(reader: &mut Reader) -> Result<Self, ClassFileError> {
        let count = reader.u2()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Entry::Unusable); // index 0 is never used.

        let mut index = 1u16;
        while index < count {
            let tag = reader.u1()?;
            let entry = match tag {
                TAG_UTF8 => {
                    let len = reader.u2()? as usize;
                    Entry::Utf8(reader.modified_utf8(len, index)?)
                }
                TAG_INTEGER => Entry::Integer(reader.i4()?),
                TAG_FLOAT => Entry::Float(reader.f4()?),
                TAG_LONG => Entry::Long(reader.i8()?),
                TAG_DOUBLE => Entry::Double(reader.f8()?),
                TAG_CLASS => Entry::Class { name_index: reader.u2()? },
                TAG_STRING => Entry::String { string_index: reader.u2()? },
                TAG_FIELDREF => Entry::Fieldref {
                    class_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                TAG_METHODREF => Entry::Methodref {
                    class_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                TAG_INTERFACE_METHODREF => Entry::InterfaceMethodref {
                    class_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                TAG_NAME_AND_TYPE => Entry::NameAndType {
                    name_index: reader.u2()?,
                    descriptor_index: reader.u2()?,
                },
                TAG_METHOD_HANDLE => Entry::MethodHandle {
                    reference_kind: reader.u1()?,
                    reference_index: reader.u2()?,
                },
                TAG_METHOD_TYPE => Entry::MethodType { descriptor_index: reader.u2()? },
                TAG_DYNAMIC => Entry::Dynamic {
                    bootstrap_method_attr_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                TAG_INVOKE_DYNAMIC => Entry::InvokeDynamic {
                    bootstrap_method_attr_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                TAG_MODULE => Entry::Module { name_index: reader.u2()? },
                TAG_PACKAGE => Entry::Package { name_index: reader.u2()? },
                other => {
                    return Err(ClassFileError::UnexpectedConstantTag {
                        index,
                        expected: tag_name(other),
                    })
                }
            };

            let occupies_two_slots = matches!(entry, Entry::Long(_) | Entry::Double(_));
            entries.push(entry);
            index += 1;
            if occupies_two_slots {
                entries.push(Entry::Unusable);
                index += 1;
            }
        }

        Ok(Self { entries })
    }

    fn entry(&self, index: u16) -> Result<&Entry, ClassFileError> {
        self.entries
            .get(index as usize)
            .filter(|entry| !matches!(entry, Entry::Unusable))
            .ok_or(ClassFileError::InvalidConstantPoolIndex(index))
    }

    pub fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.entry(index)? {
            Entry::Utf8(s) => Ok(s.as_str()),
            _ => Err(ClassFileError::UnexpectedConstantTag { index, expected: "Utf8" }),
        }
    }

    /// Resolve a `CONSTANT_Class` entry's internal name (`pkg/Name`) into
    /// dotted form (`pkg.Name`), matching every other `className` field.
    pub fn class_name(&self, index: u16) -> Result<String, ClassFileError> {
        match self.entry(index)? {
            Entry::Class { name_index } => Ok(self.utf8(*name_index)?.replace('/', ".")),
            _ => Err(ClassFileError::UnexpectedConstantTag { index, expected: "Class" }),
        }
    }

    pub fn string_value(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.entry(index)? {
            Entry::String { string_index } => self.utf8(*string_index),
            _ => Err(ClassFileError::UnexpectedConstantTag { index, expected: "String" }),
        }
    }

    pub fn integer(&self, index: u16) -> Result<i32, ClassFileError> {
        match self.entry(index)? {
            Entry::Integer(v) => Ok(*v),
            _ => Err(ClassFileError::UnexpectedConstantTag { index, expected: "Integer" }),
        }
    }

    pub fn float(&self, index: u16) -> Result<f32, ClassFileError> {
        match self.entry(index)? {
            Entry::Float(v) => Ok(*v),
            _ => Err(ClassFileError::UnexpectedConstantTag { index, expected: "Float" }),
        }
    }

    pub fn long(&self, index: u16) -> Result<i64, ClassFileError> {
        match self.entry(index)? {
            Entry::Long(v) => Ok(*v),
            _ => Err(ClassFileError::UnexpectedConstantTag { index, expected: "Long" }),
        }
    }

    pub fn double(&self, index: u16) -> Result<f64, ClassFileError> {
        match self.entry(index)? {
            Entry::Double(v) => Ok(*v),
            _ => Err(ClassFileError::UnexpectedConstantTag { index, expected: "Double" }),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassFileError> {
        match self.entry(index)? {
            Entry::NameAndType { name_index, descriptor_index } => {
                Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?))
            }
            _ => Err(ClassFileError::UnexpectedConstantTag { index, expected: "NameAndType" }),
        }
    }
}

fn tag_name(tag: u8) -> &'static str {
    match tag {
        TAG_UTF8 => "Utf8",
        TAG_INTEGER => "Integer",
        TAG_FLOAT => "Float",
        TAG_LONG => "Long",
        TAG_DOUBLE => "Double",
        TAG_CLASS => "Class",
        TAG_STRING => "String",
        TAG_FIELDREF => "Fieldref",
        TAG_METHODREF => "Methodref",
        TAG_INTERFACE_METHODREF => "InterfaceMethodref",
        TAG_NAME_AND_TYPE => "NameAndType",
        TAG_METHOD_HANDLE => "MethodHandle",
        TAG_METHOD_TYPE => "MethodType",
        TAG_DYNAMIC => "Dynamic",
        TAG_INVOKE_DYNAMIC => "InvokeDynamic",
        TAG_MODULE => "Module",
        TAG_PACKAGE => "Package",
        _ => "<unknown>",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(entries_bytes: &[u8], count: u16) -> ConstantPool {
        let mut full = Vec::new();
        full.extend_from_slice(&count.to_be_bytes());
        full.extend_from_slice(entries_bytes);
        let mut reader = Reader::new(&full);
        ConstantPool::parse(&mut reader).expect("parse")
    }

    #[test]
    fn parses_utf8_and_class_entries() {
        // count=3: index1=Utf8("Foo"), index2=Class(name_index=1)
        let mut bytes = Vec::new();
        bytes.push(TAG_UTF8);
        bytes.extend_from_slice(&3u16.to_be_bytes());
        bytes.extend_from_slice(b"Foo");
        bytes.push(TAG_CLASS);
        bytes.extend_from_slice(&1u16.to_be_bytes());

        let pool = pool_with(&bytes, 3);
        assert_eq!(pool.utf8(1).unwrap(), "Foo");
        assert_eq!(pool.class_name(2).unwrap(), "Foo");
    }

    #[test]
    fn long_and_double_occupy_two_slots() {
        // count=4: index1=Long, index2=unusable, index3=Utf8
        let mut bytes = Vec::new();
        bytes.push(TAG_LONG);
        bytes.extend_from_slice(&5i64.to_be_bytes());
        bytes.push(TAG_UTF8);
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.push(b'x');

        let pool = pool_with(&bytes, 4);
        assert_eq!(pool.long(1).unwrap(), 5);
        assert!(pool.utf8(2).is_err());
        assert_eq!(pool.utf8(3).unwrap(), "x");
    }

    #[test]
    fn invalid_index_reports_error() {
        let pool = pool_with(&[], 1);
        assert!(pool.utf8(1).is_err());
    }
}
