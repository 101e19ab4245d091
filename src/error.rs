use std::path::PathBuf;

use thiserror::Error;

/// Disposition-relevant errors surfaced while resolving classpath locations.
///
/// Most internal plumbing uses `anyhow::Result` (see module docs), but the
/// outcomes a caller needs to branch on — "this location was skipped, here
/// is why" — get a concrete enum so `match`ing doesn't require string
/// sniffing.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("classpath location does not exist: {0}")]
    NotFound(PathBuf),

    #[error("non-local URI cannot be used as a classpath element without a fetcher: {0}")]
    NonLocalUri(String),

    #[error("failed to canonicalize {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("location is neither a file nor a directory: {0}")]
    NeitherFileNorDirectory(PathBuf),

    #[error("archive denied by jar-name filter: {0}")]
    DeniedByFilter(PathBuf),

    #[error("archive denied as a system archive: {0}")]
    DeniedSystemArchive(PathBuf),

    #[error("malformed nested-archive path expression: {0}")]
    MalformedNestedPath(String),
}

/// Per-classfile decode failure, kept concrete so the recursive scanner can
/// log-and-skip (spec §7) without downcasting an opaque `anyhow::Error`.
#[derive(Debug, Error)]
pub enum ClassFileError {
    #[error("truncated classfile: expected {expected} more bytes at offset {offset}")]
    Truncated { offset: usize, expected: usize },

    #[error("bad magic number: {0:#010x}")]
    BadMagic(u32),

    #[error("invalid constant pool index {0}")]
    InvalidConstantPoolIndex(u16),

    #[error("constant pool entry at index {index} has unexpected tag (expected {expected})")]
    UnexpectedConstantTag { index: u16, expected: &'static str },

    #[error("invalid modified-UTF-8 in constant pool entry {0}")]
    InvalidModifiedUtf8(u16),

    #[error("malformed attribute {name}: {reason}")]
    MalformedAttribute { name: String, reason: String },

    #[error("malformed annotation: {0}")]
    MalformedAnnotation(String),

    #[error("malformed type signature: {0}")]
    MalformedSignature(String),

    #[error("unsupported opcode 0x{0:02x}")]
    UnsupportedOpcode(u8),
}
