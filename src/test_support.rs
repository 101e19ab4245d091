//! Fixture builders shared by this crate's tests, integration tests, and
//! benchmarks: raw classfile bytes and on-disk jars/class directories,
//! built without a real `javac`/`jar` toolchain. Not part of the scanning
//! API proper — kept out of the crate's prelude but public so `tests/` and
//! `benches/` can reach it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;

const MAGIC: u32 = 0xCAFE_BABE;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_PUBLIC: u16 = 0x0001;

fn write_u2(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}
fn write_u4(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Build a classfile with a constant pool of just this/super/interfaces
/// names, no fields, methods, or attributes. `access_flags` controls
/// `ACC_INTERFACE`/`ACC_ANNOTATION` for cross-linker fixtures.
pub fn build_classfile(class_name: &str, superclass: Option<&str>, interfaces: &[&str], access_flags: u16) -> Vec<u8> {
    let mut names = vec![class_name.replace('.', "/")];
    if let Some(sup) = superclass {
        names.push(sup.replace('.', "/"));
    }
    let interfaces_start = names.len();
    for iface in interfaces {
        names.push(iface.replace('.', "/"));
    }

    let mut buf = Vec::new();
    write_u4(&mut buf, MAGIC);
    write_u2(&mut buf, 0);
    write_u2(&mut buf, 61);

    let mut utf8_index = vec![0u16; names.len()];
    let mut class_index = vec![0u16; names.len()];
    let mut next_index = 1u16;
    for i in 0..names.len() {
        utf8_index[i] = next_index;
        next_index += 1;
        class_index[i] = next_index;
        next_index += 1;
    }
    write_u2(&mut buf, next_index);

    for (i, name) in names.iter().enumerate() {
        buf.push(1); // Utf8
        write_u2(&mut buf, name.len() as u16);
        buf.extend_from_slice(name.as_bytes());
        buf.push(7); // Class
        write_u2(&mut buf, utf8_index[i]);
    }

    write_u2(&mut buf, access_flags);
    write_u2(&mut buf, class_index[0]); // this_class
    write_u2(&mut buf, superclass.map(|_| class_index[1]).unwrap_or(0)); // super_class
    write_u2(&mut buf, interfaces.len() as u16);
    for i in 0..interfaces.len() {
        write_u2(&mut buf, class_index[interfaces_start + i]);
    }
    write_u2(&mut buf, 0); // fields_count
    write_u2(&mut buf, 0); // methods_count
    write_u2(&mut buf, 0); // attributes_count
    buf
}

/// Write a jar at `path` containing `entries` (relative path → bytes).
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    let file = fs::File::create(path).expect("create jar fixture");
    let mut writer = zip::ZipWriter::new(file);
    for (name, bytes) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).expect("start jar entry");
        writer.write_all(bytes).expect("write jar entry");
    }
    writer.finish().expect("finish jar");
}

/// Materialize `entries` (relative path → bytes) as real files under `root`.
pub fn write_class_dir(root: &Path, entries: &[(&str, &[u8])]) {
    for (name, bytes) in entries {
        let full = root.join(name);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("mkdir for class dir fixture");
        }
        fs::write(full, bytes).expect("write class dir fixture");
    }
}

/// A manifest jar naming `class_path` entries, for exercising C2/C4's
/// `Class-Path` chasing.
pub fn manifest_jar_bytes(class_path: &str) -> Vec<u8> {
    format!("Manifest-Version: 1.0\nClass-Path: {class_path}\n\n").into_bytes()
}

pub fn jar_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}
