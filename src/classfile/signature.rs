//! C8 (signature half) — `TypeSignature` parsing and rendering.
//!
//! Hand-written peek/expect scanner over the JVM type-descriptor and
//! generic-signature grammars, grounded in mokapot's
//! `extract_attributes!`-adjacent descriptor handling and the general
//! peek/expect recursive-descent style `class_parser.rs` uses for the rest
//! of the classfile. On parse failure the whole descriptor is discarded
//! with a log entry by the caller (C7), not here — this module only
//! reports the error.

use serde::Serialize;

use crate::error::ClassFileError;

/// Parsed representation of a type or method signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TypeSignature {
    Primitive(char),
    Array { element: Box<TypeSignature>, dims: u32 },
    ClassRef {
        name: String,
        type_args: Vec<TypeSignature>,
        nested_suffixes: Vec<(String, Vec<TypeSignature>)>,
    },
    TypeVariable(String),
}

const PRIMITIVE_CODES: &str = "BCDFIJSZV";

struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.rest = &self.rest[c.len_utf8()..];
        Some(c)
    }

    fn expect(&mut self, want: char) -> Result<(), ClassFileError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            other => Err(ClassFileError::MalformedSignature(format!(
                "expected '{want}', found {other:?}"
            ))),
        }
    }

    fn read_name(&mut self) -> String {
        let stop_at = self
            .rest
            .find(|c| c == '<' || c == ';' || c == '.')
            .unwrap_or(self.rest.len());
        let (name, rest) = self.rest.split_at(stop_at);
        self.rest = rest;
        name.to_string()
    }

    fn at_end(&self) -> bool {
        self.rest.is_empty()
    }
}

/// Parse a single type signature (field descriptor or generic field-type
/// signature grammar): primitive code, array prefix, class reference with
/// optional generic arguments and nested-class suffixes, or type variable.
pub fn parse_type_signature(raw: &str) -> Result<TypeSignature, ClassFileError> {
    let mut scanner = Scanner::new(raw);
    let sig = parse_one(&mut scanner)?;
    if !scanner.at_end() {
        return Err(ClassFileError::MalformedSignature(format!(
            "trailing characters after signature: {raw}"
        )));
    }
    Ok(sig)
}

fn parse_one(scanner: &mut Scanner) -> Result<TypeSignature, ClassFileError> {
    match scanner.peek() {
        Some('[') => {
            scanner.bump();
            let mut dims = 1;
            while scanner.peek() == Some('[') {
                scanner.bump();
                dims += 1;
            }
            let element = parse_one(scanner)?;
            Ok(TypeSignature::Array { element: Box::new(element), dims })
        }
        Some('L') => parse_class_ref(scanner),
        Some('T') => {
            scanner.bump();
            let name = scanner.read_name();
            scanner.expect(';')?;
            Ok(TypeSignature::TypeVariable(name))
        }
        Some('*') => {
            scanner.bump();
            Ok(TypeSignature::TypeVariable("?".to_string()))
        }
        Some('+') | Some('-') => {
            scanner.bump();
            parse_one(scanner)
        }
        Some(c) if PRIMITIVE_CODES.contains(c) => {
            scanner.bump();
            Ok(TypeSignature::Primitive(c))
        }
        other => Err(ClassFileError::MalformedSignature(format!("unexpected character: {other:?}"))),
    }
}

fn parse_class_ref(scanner: &mut Scanner) -> Result<TypeSignature, ClassFileError> {
    scanner.expect('L')?;
    let name = scanner.read_name().replace('/', ".");
    let type_args = parse_type_args(scanner)?;

    let mut nested_suffixes = Vec::new();
    while scanner.peek() == Some('.') {
        scanner.bump();
        let seg_name = scanner.read_name();
        let seg_args = parse_type_args(scanner)?;
        nested_suffixes.push((seg_name, seg_args));
    }

    scanner.expect(';')?;
    Ok(TypeSignature::ClassRef { name, type_args, nested_suffixes })
}

fn parse_type_args(scanner: &mut Scanner) -> Result<Vec<TypeSignature>, ClassFileError> {
    if scanner.peek() != Some('<') {
        return Ok(Vec::new());
    }
    scanner.bump();
    let mut args = Vec::new();
    while scanner.peek() != Some('>') {
        if scanner.at_end() {
            return Err(ClassFileError::MalformedSignature("unterminated type argument list".to_string()));
        }
        args.push(parse_one(scanner)?);
    }
    scanner.expect('>')?;
    Ok(args)
}

/// Re-encode a [`TypeSignature`] back into JVM descriptor/signature text,
/// the inverse of [`parse_type_signature`].
pub fn encode_type_signature(sig: &TypeSignature) -> String {
    match sig {
        TypeSignature::Primitive(c) => c.to_string(),
        TypeSignature::Array { element, dims } => {
            "[".repeat(*dims as usize) + &encode_type_signature(element)
        }
        TypeSignature::TypeVariable(name) if name == "?" => "*".to_string(),
        TypeSignature::TypeVariable(name) => format!("T{name};"),
        TypeSignature::ClassRef { name, type_args, nested_suffixes } => {
            let mut out = format!("L{}", name.replace('.', "/"));
            out.push_str(&encode_type_args(type_args));
            for (seg, args) in nested_suffixes {
                out.push('.');
                out.push_str(seg);
                out.push_str(&encode_type_args(args));
            }
            out.push(';');
            out
        }
    }
}

fn encode_type_args(args: &[TypeSignature]) -> String {
    if args.is_empty() {
        return String::new();
    }
    let mut out = String::from("<");
    for arg in args {
        out.push_str(&encode_type_signature(arg));
    }
    out.push('>');
    out
}

fn primitive_name(code: char) -> &'static str {
    match code {
        'B' => "byte",
        'C' => "char",
        'D' => "double",
        'F' => "float",
        'I' => "int",
        'J' => "long",
        'S' => "short",
        'Z' => "boolean",
        'V' => "void",
        _ => "?",
    }
}

/// Render a human-readable, Java-like rendering of a [`TypeSignature`].
pub fn human_readable(sig: &TypeSignature) -> String {
    match sig {
        TypeSignature::Primitive(c) => primitive_name(*c).to_string(),
        TypeSignature::Array { element, dims } => {
            format!("{}{}", human_readable(element), "[]".repeat(*dims as usize))
        }
        TypeSignature::TypeVariable(name) => name.clone(),
        TypeSignature::ClassRef { name, type_args, nested_suffixes } => {
            let mut out = name.clone();
            append_type_args_human(&mut out, type_args);
            for (seg, args) in nested_suffixes {
                out.push('.');
                out.push_str(seg);
                append_type_args_human(&mut out, args);
            }
            out
        }
    }
}

fn append_type_args_human(out: &mut String, args: &[TypeSignature]) {
    if args.is_empty() {
        return;
    }
    out.push('<');
    let rendered: Vec<String> = args.iter().map(human_readable).collect();
    out.push_str(&rendered.join(", "));
    out.push('>');
}

/// Render a plain (non-generic) field/class descriptor in human form.
pub fn descriptor_to_human(descriptor: &str) -> Result<String, ClassFileError> {
    Ok(human_readable(&parse_type_signature(descriptor)?))
}

/// Parse a `(params)return` method descriptor into its component
/// signatures, and separately render it to human form.
pub fn parse_method_descriptor(descriptor: &str) -> Result<(Vec<TypeSignature>, TypeSignature), ClassFileError> {
    let mut scanner = Scanner::new(descriptor);
    scanner.expect('(')?;
    let mut params = Vec::new();
    while scanner.peek() != Some(')') {
        if scanner.at_end() {
            return Err(ClassFileError::MalformedSignature("unterminated parameter list".to_string()));
        }
        params.push(parse_one(&mut scanner)?);
    }
    scanner.expect(')')?;
    let return_type = parse_one(&mut scanner)?;
    if !scanner.at_end() {
        return Err(ClassFileError::MalformedSignature(format!(
            "trailing characters after method descriptor: {descriptor}"
        )));
    }
    Ok((params, return_type))
}

pub fn method_descriptor_to_human(descriptor: &str) -> Result<String, ClassFileError> {
    let (params, return_type) = parse_method_descriptor(descriptor)?;
    let rendered_params: Vec<String> = params.iter().map(human_readable).collect();
    Ok(format!("({}) {}", rendered_params.join(", "), human_readable(&return_type)))
}

/// Render a generic `Signature` attribute value (class, field, or method
/// form) to human-readable text. Formal type-parameter bounds are skipped
/// structurally (their names are kept, bounds discarded) to keep the
/// scanner within the field/class/method grammars this module parses.
pub fn generic_signature_to_human(raw: &str, is_method: bool) -> Result<String, ClassFileError> {
    let mut scanner = Scanner::new(raw);
    let type_params = parse_formal_type_parameters(&mut scanner)?;

    let body = if is_method {
        scanner.expect('(')?;
        let mut params = Vec::new();
        while scanner.peek() != Some(')') {
            if scanner.at_end() {
                return Err(ClassFileError::MalformedSignature("unterminated method signature params".to_string()));
            }
            params.push(parse_one(&mut scanner)?);
        }
        scanner.expect(')')?;
        let return_type = parse_one(&mut scanner)?;
        let mut throws = Vec::new();
        while scanner.peek() == Some('^') {
            scanner.bump();
            throws.push(parse_one(&mut scanner)?);
        }
        let rendered_params: Vec<String> = params.iter().map(human_readable).collect();
        let mut out = format!("({}) {}", rendered_params.join(", "), human_readable(&return_type));
        if !throws.is_empty() {
            let rendered_throws: Vec<String> = throws.iter().map(human_readable).collect();
            out.push_str(" throws ");
            out.push_str(&rendered_throws.join(", "));
        }
        out
    } else if scanner.peek() == Some('(') {
        // Not reached for is_method=false inputs; defensive no-op branch.
        String::new()
    } else {
        let super_class = parse_one(&mut scanner)?;
        let mut interfaces = Vec::new();
        while !scanner.at_end() {
            interfaces.push(parse_one(&mut scanner)?);
        }
        if interfaces.is_empty() {
            human_readable(&super_class)
        } else {
            let rendered_interfaces: Vec<String> = interfaces.iter().map(human_readable).collect();
            format!("{} implements {}", human_readable(&super_class), rendered_interfaces.join(", "))
        }
    };

    if type_params.is_empty() {
        Ok(body)
    } else {
        Ok(format!("<{}> {}", type_params.join(", "), body))
    }
}

fn parse_formal_type_parameters(scanner: &mut Scanner) -> Result<Vec<String>, ClassFileError> {
    if scanner.peek() != Some('<') {
        return Ok(Vec::new());
    }
    scanner.bump();
    let mut names = Vec::new();
    while scanner.peek() != Some('>') {
        let name = scanner.read_name();
        names.push(name);
        scanner.expect(':')?;
        // Optional class bound (may be empty when only interface bounds follow).
        if scanner.peek() != Some(':') && scanner.peek() != Some('>') {
            parse_one(scanner)?;
        }
        while scanner.peek() == Some(':') {
            scanner.bump();
            parse_one(scanner)?;
        }
    }
    scanner.expect('>')?;
    Ok(names)
}
