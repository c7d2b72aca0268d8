use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::{Error, ErrorKind, Field, Member, Method, Result, Typedef, VError, VType, IDL};

/// Maximum nesting of structs, enums and arrays in a single type.
pub(crate) const MAX_DEPTH: usize = 64;

/// Hand-written recursive descent parser over the raw bytes of an interface
/// description. All tokens of the grammar are ASCII, so working on bytes is
/// safe as long as slices end at ASCII delimiters.
pub(crate) struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    position: usize,
    line: usize,
    line_start: usize,
    last_comment: String,
    depth: usize,
    too_deep: bool,
}

fn is_interface_name(name: &str) -> bool {
    if name.len() < 3 || name.len() > 255 {
        return false;
    }

    if !name.as_bytes()[0].is_ascii_lowercase() {
        return false;
    }

    let mut parts = 0;
    for part in name.split('.') {
        if part.is_empty() || part.starts_with('-') || part.ends_with('-') {
            return false;
        }
        parts += 1;
    }

    parts >= 2
}

fn insert_unique<T>(map: &mut BTreeMap<String, T>, name: &str, value: T) -> bool {
    match map.entry(name.to_string()) {
        Entry::Occupied(_) => false,
        Entry::Vacant(e) => {
            e.insert(value);
            true
        }
    }
}

impl<'a> Parser<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Parser {
            input,
            bytes: input.as_bytes(),
            position: 0,
            line: 1,
            line_start: 0,
            last_comment: String::new(),
            depth: 0,
            too_deep: false,
        }
    }

    /// Returns the next byte and moves past it. At the end of the input the
    /// cursor still moves, so `backup()` stays symmetric.
    fn next(&mut self) -> Option<u8> {
        let c = self.bytes.get(self.position).copied();
        self.position += 1;
        c
    }

    fn backup(&mut self) {
        self.position -= 1;
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.position).copied()
    }

    fn at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }

    fn error(&self, kind: ErrorKind) -> Error {
        Error::Syntax {
            kind,
            line: self.line,
            column: self.position.saturating_sub(self.line_start) + 1,
        }
    }

    /// Error for a failed type read, which may have failed on the nesting limit.
    fn type_error(&self, kind: ErrorKind) -> Error {
        if self.too_deep {
            self.error(ErrorKind::NestingTooDeep(MAX_DEPTH))
        } else {
            self.error(kind)
        }
    }

    fn take_while(&mut self, accept: impl Fn(u8) -> bool) -> &'a str {
        let start = self.position;
        while let Some(c) = self.peek() {
            if !accept(c) {
                break;
            }
            self.position += 1;
        }
        &self.input[start..self.position]
    }

    /// Skips whitespace and comments. A newline clears the collected comment
    /// text, so only the comment block directly above a declaration becomes
    /// its documentation. Returns whether input remains.
    fn advance(&mut self) -> bool {
        loop {
            match self.next() {
                Some(b'\n') => {
                    self.line += 1;
                    self.line_start = self.position;
                    self.last_comment.clear();
                }
                Some(b' ') | Some(b'\t') | Some(b'\r') => {}
                Some(b'#') => {
                    if self.peek() == Some(b' ') {
                        self.position += 1;
                    }

                    let text = self.take_while(|c| c != b'\n');
                    let text = text.strip_suffix('\r').unwrap_or(text);

                    if !self.last_comment.is_empty() {
                        self.last_comment.push('\n');
                    }
                    self.last_comment.push_str(text);

                    // The newline ending a comment keeps the block together.
                    if self.peek() == Some(b'\n') {
                        self.position += 1;
                        self.line += 1;
                        self.line_start = self.position;
                    }
                }
                _ => {
                    self.backup();
                    break;
                }
            }
        }

        !self.at_end()
    }

    /// Like `advance()`, but never leaves the current line.
    fn advance_on_line(&mut self) {
        while let Some(b' ') | Some(b'\t') = self.peek() {
            self.position += 1;
        }
    }

    fn read_keyword(&mut self) -> &'a str {
        self.take_while(|c| c.is_ascii_lowercase())
    }

    fn read_interface_name(&mut self) -> Option<&'a str> {
        let name =
            self.take_while(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == b'.' || c == b'-');

        if is_interface_name(name) {
            Some(name)
        } else {
            None
        }
    }

    fn read_field_name(&mut self) -> Option<&'a str> {
        match self.peek() {
            Some(c) if c.is_ascii_lowercase() || c == b'_' => {}
            _ => return None,
        }

        Some(self.take_while(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == b'_'))
    }

    fn read_type_name(&mut self) -> Option<&'a str> {
        let name = self.take_while(|c| c.is_ascii_alphanumeric());

        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Reads `( ... )`. Bare names make an enum, `name: type` pairs make a
    /// struct; mixing both is rejected.
    fn read_struct_type(&mut self) -> Option<VType> {
        if self.next() != Some(b'(') {
            self.backup();
            return None;
        }

        self.advance();
        if self.next() == Some(b')') {
            return Some(VType::Struct(Vec::new()));
        }
        self.backup();

        let mut fields: Vec<Field> = Vec::new();
        let mut names: Vec<String> = Vec::new();
        let mut is_enum: Option<bool> = None;

        loop {
            self.advance();
            let name = self.read_field_name()?.to_string();
            self.advance();

            if self.next() == Some(b':') {
                if is_enum == Some(true) {
                    return None;
                }
                is_enum = Some(false);
                self.advance();
                let vtype = self.read_type()?;
                fields.push(Field { name, vtype });
            } else {
                self.backup();
                if is_enum == Some(false) {
                    return None;
                }
                is_enum = Some(true);
                names.push(name);
            }

            self.advance();
            match self.next() {
                Some(b',') => continue,
                Some(b')') => break,
                _ => {
                    self.backup();
                    return None;
                }
            }
        }

        if is_enum == Some(true) {
            Some(VType::Enum(names))
        } else {
            Some(VType::Struct(fields))
        }
    }

    fn read_type(&mut self) -> Option<VType> {
        if self.depth >= MAX_DEPTH {
            self.too_deep = true;
            return None;
        }

        self.depth += 1;
        let vtype = self.read_nested_type();
        self.depth -= 1;
        vtype
    }

    fn read_nested_type(&mut self) -> Option<VType> {
        let start = self.position;

        let mut vtype = match self.read_keyword() {
            "bool" => Some(VType::Bool),
            "int" => Some(VType::Int),
            "float" => Some(VType::Float),
            "string" => Some(VType::String),
            _ => None,
        };

        if vtype.is_none() {
            self.position = start;
            vtype = match self.read_type_name() {
                Some(name) => Some(VType::Alias(name.into())),
                None => self.read_struct_type(),
            };
        }

        let mut vtype = vtype?;
        let mut arrays = 0;

        // `[]` has to follow the element type directly, without whitespace.
        while self.peek() == Some(b'[') {
            if self.depth + arrays >= MAX_DEPTH {
                self.too_deep = true;
                return None;
            }
            arrays += 1;
            self.position += 1;
            if self.next() != Some(b']') {
                self.backup();
                return None;
            }
            vtype = VType::Array(Box::new(vtype));
        }

        Some(vtype)
    }

    fn read_typedef(&mut self) -> Result<Typedef> {
        self.advance();
        let doc = self.last_comment.clone();

        let name = self
            .read_type_name()
            .ok_or_else(|| self.error(ErrorKind::MissingTypeName))?;

        self.advance();
        let vtype = self
            .read_type()
            .ok_or_else(|| self.type_error(ErrorKind::MissingTypeDeclaration(name.into())))?;

        Ok(Typedef {
            name: name.into(),
            doc,
            vtype,
        })
    }

    fn read_method(&mut self) -> Result<Method> {
        self.advance();
        let doc = self.last_comment.clone();

        let name = self
            .read_type_name()
            .ok_or_else(|| self.error(ErrorKind::MissingMethodName))?;

        self.advance();
        let input = self
            .read_struct_type()
            .ok_or_else(|| self.type_error(ErrorKind::MissingMethodInput(name.into())))?;

        self.advance();
        if self.next() != Some(b'-') || self.next() != Some(b'>') {
            self.backup();
            return Err(self.error(ErrorKind::MissingMethodOperator(name.into())));
        }

        self.advance();
        let output = self
            .read_struct_type()
            .ok_or_else(|| self.type_error(ErrorKind::MissingMethodOutput(name.into())))?;

        Ok(Method {
            name: name.into(),
            doc,
            input,
            output,
        })
    }

    fn read_error(&mut self) -> Result<VError> {
        self.advance();
        let doc = self.last_comment.clone();

        let name = self
            .read_type_name()
            .ok_or_else(|| self.error(ErrorKind::MissingErrorName))?;

        // The parameter list is optional, but must start on the same line.
        self.advance_on_line();
        let parameters = if self.peek() == Some(b'(') {
            Some(
                self.read_struct_type()
                    .ok_or_else(|| self.type_error(ErrorKind::InvalidErrorType(name.into())))?,
            )
        } else {
            None
        };

        Ok(VError {
            name: name.into(),
            doc,
            parameters,
        })
    }

    fn unexpected_input(&self) -> String {
        let rest = self.input.get(self.position..).unwrap_or_default();
        rest.split_whitespace().next().unwrap_or_default().chars().take(32).collect()
    }

    pub(crate) fn parse(mut self) -> Result<IDL> {
        let mut idl = IDL {
            description: self.input.into(),
            ..Default::default()
        };

        self.advance();
        if self.read_keyword() != "interface" {
            return Err(self.error(ErrorKind::MissingInterfaceKeyword));
        }

        self.advance();
        idl.doc = self.last_comment.clone();
        idl.name = self
            .read_interface_name()
            .ok_or_else(|| self.error(ErrorKind::InterfaceName))?
            .into();

        while self.advance() {
            let (line, column) = (self.line, self.position - self.line_start + 1);
            let duplicate = |name: &str| Error::Syntax {
                kind: ErrorKind::Duplicate(name.into()),
                line,
                column,
            };

            match self.read_keyword() {
                "type" => {
                    let t = self.read_typedef()?;
                    let name = t.name.clone();
                    if idl.methods.contains_key(&name)
                        || idl.errors.contains_key(&name)
                        || !insert_unique(&mut idl.typedefs, &name, t)
                    {
                        return Err(duplicate(&name));
                    }
                    idl.members.push(Member::Typedef(name));
                }
                "method" => {
                    let m = self.read_method()?;
                    let name = m.name.clone();
                    if idl.typedefs.contains_key(&name)
                        || idl.errors.contains_key(&name)
                        || !insert_unique(&mut idl.methods, &name, m)
                    {
                        return Err(duplicate(&name));
                    }
                    idl.members.push(Member::Method(name));
                }
                "error" => {
                    let e = self.read_error()?;
                    let name = e.name.clone();
                    if idl.typedefs.contains_key(&name)
                        || idl.methods.contains_key(&name)
                        || !insert_unique(&mut idl.errors, &name, e)
                    {
                        return Err(duplicate(&name));
                    }
                    idl.members.push(Member::Error(name));
                }
                "" => return Err(self.error(ErrorKind::TrailingInput(self.unexpected_input()))),
                keyword => {
                    return Err(Error::Syntax {
                        kind: ErrorKind::UnknownKeyword(keyword.into()),
                        line,
                        column,
                    })
                }
            }
        }

        if idl.methods.is_empty() {
            return Err(Error::NoMethod(idl.name));
        }

        Ok(idl)
    }
}
