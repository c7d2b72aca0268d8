/*!
 varlink_parser crate for parsing [varlink](http://varlink.org) interface definition files.

 # Examples

 ```rust
 use varlink_parser::IDL;
 let v = IDL::from_string("
 ## The Varlink Service Interface is provided by every varlink service. It
 ## describes the service and the interfaces it implements.
 interface org.varlink.service

 ## Get a list of all the interfaces a service provides and information
 ## about the implementation.
 method GetInfo() -> (
 vendor: string,
 product: string,
 version: string,
 url: string,
 interfaces: string[]
 )

 ## Get the description of an interface that is implemented by this service.
 method GetInterfaceDescription(interface: string) -> (description: string)

 ## The requested interface was not found.
 error InterfaceNotFound (interface: string)

 ## The requested method was not found
 error MethodNotFound (method: string)

 ## The interface defines the requested method, but the service does not
 ## implement it.
 error MethodNotImplemented (method: string)

 ## One of the passed parameters is invalid.
 error InvalidParameter (parameter: string)
 ").unwrap();
 assert_eq!(v.name, "org.varlink.service");
 assert!(v.methods.contains_key("GetInfo"));
 ```
!*/

#![doc(
    html_logo_url = "https://varlink.org/images/varlink.png",
    html_favicon_url = "https://varlink.org/images/varlink-small.png"
)]

use std::collections::BTreeMap;

mod format;
mod parser;

#[cfg(test)]
mod test;

pub use crate::format::Format;

/// The reasons a varlink interface description can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("missing interface keyword")]
    MissingInterfaceKeyword,
    #[error("invalid interface name")]
    InterfaceName,
    #[error("missing type name")]
    MissingTypeName,
    #[error("missing type declaration for `{0}`")]
    MissingTypeDeclaration(String),
    #[error("missing method name")]
    MissingMethodName,
    #[error("missing input of method `{0}`")]
    MissingMethodInput(String),
    #[error("missing method '->' operator for `{0}`")]
    MissingMethodOperator(String),
    #[error("missing output of method `{0}`")]
    MissingMethodOutput(String),
    #[error("missing error name")]
    MissingErrorName,
    #[error("invalid parameters of error `{0}`")]
    InvalidErrorType(String),
    #[error("unknown keyword '{0}'")]
    UnknownKeyword(String),
    #[error("unexpected input '{0}'")]
    TrailingInput(String),
    #[error("multiple definitions of `{0}`")]
    Duplicate(String),
    #[error("types nested deeper than {0} levels")]
    NestingTooDeep(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{kind} at line {line}, column {column}")]
    Syntax {
        kind: ErrorKind,
        line: usize,
        column: usize,
    },
    #[error("Interface `{0}` does not define any method")]
    NoMethod(String),
    #[error("Interface `{interface}`: type `{name}` is not defined")]
    UnresolvedAlias { interface: String, name: String },
}

impl Error {
    /// The syntax error kind, if this is a syntax error.
    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            Error::Syntax { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Bool,
    Int,
    Float,
    String,
    Array,
    Struct,
    Enum,
    Alias,
}

/// A varlink type. Method parameters, error parameters and custom types
/// are all built from these nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VType {
    Bool,
    Int,
    Float,
    String,
    Array(Box<VType>),
    Struct(Vec<Field>),
    Enum(Vec<String>),
    /// Reference by name to a `type` declared in the same interface.
    Alias(String),
}

impl VType {
    pub fn kind(&self) -> TypeKind {
        match self {
            VType::Bool => TypeKind::Bool,
            VType::Int => TypeKind::Int,
            VType::Float => TypeKind::Float,
            VType::String => TypeKind::String,
            VType::Array(_) => TypeKind::Array,
            VType::Struct(_) => TypeKind::Struct,
            VType::Enum(_) => TypeKind::Enum,
            VType::Alias(_) => TypeKind::Alias,
        }
    }

    pub fn element_type(&self) -> Option<&VType> {
        match self {
            VType::Array(t) => Some(t),
            _ => None,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            VType::Alias(name) => Some(name),
            _ => None,
        }
    }

    /// The typed fields of a struct; empty for every other kind.
    pub fn fields(&self) -> &[Field] {
        match self {
            VType::Struct(fields) => fields,
            _ => &[],
        }
    }

    /// True for the parenthesised parameter lists: structs and enums.
    pub fn is_struct_or_enum(&self) -> bool {
        matches!(self, VType::Struct(_) | VType::Enum(_))
    }

    fn visit_aliases(&self, f: &mut dyn FnMut(&str) -> Result<()>) -> Result<()> {
        match self {
            VType::Array(t) => t.visit_aliases(f),
            VType::Struct(fields) => {
                for field in fields {
                    field.vtype.visit_aliases(f)?;
                }
                Ok(())
            }
            VType::Alias(name) => f(name),
            _ => Ok(()),
        }
    }
}

/// A named member of a struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub vtype: VType,
}

/// A custom type declared with `type Name ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typedef {
    pub name: String,
    pub doc: String,
    pub vtype: VType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub doc: String,
    pub input: VType,
    pub output: VType,
}

/// An error declared with `error Name (...)`. The parameter list is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VError {
    pub name: String,
    pub doc: String,
    pub parameters: Option<VType>,
}

/// The name of a declaration, tagged with its kind. `IDL::members` keeps
/// these in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Typedef(String),
    Method(String),
    Error(String),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Typedef(n) | Member::Method(n) | Member::Error(n) => n,
        }
    }
}

/// A borrowed declaration, as yielded by [`IDL::iter_members`].
#[derive(Debug, Clone, Copy)]
pub enum MemberRef<'a> {
    Typedef(&'a Typedef),
    Method(&'a Method),
    Error(&'a VError),
}

/// A parsed varlink interface description.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IDL {
    pub name: String,
    pub doc: String,
    /// The full source text the interface was parsed from.
    pub description: String,
    pub members: Vec<Member>,
    pub typedefs: BTreeMap<String, Typedef>,
    pub methods: BTreeMap<String, Method>,
    pub errors: BTreeMap<String, VError>,
}

impl IDL {
    /// Parses a varlink interface description.
    ///
    /// The whole input has to be consumed; the interface must declare at least
    /// one method and every declaration name must be unique.
    pub fn from_string<S: ?Sized + AsRef<str>>(s: &S) -> Result<Self> {
        parser::Parser::new(s.as_ref()).parse()
    }

    /// Walks the declarations in source order.
    pub fn iter_members(&self) -> impl Iterator<Item = MemberRef<'_>> + '_ {
        self.members.iter().filter_map(move |m| match m {
            Member::Typedef(n) => self.typedefs.get(n).map(MemberRef::Typedef),
            Member::Method(n) => self.methods.get(n).map(MemberRef::Method),
            Member::Error(n) => self.errors.get(n).map(MemberRef::Error),
        })
    }

    /// Looks up the custom type an alias refers to.
    pub fn resolve_alias(&self, name: &str) -> Result<&Typedef> {
        self.typedefs
            .get(name)
            .ok_or_else(|| Error::UnresolvedAlias {
                interface: self.name.clone(),
                name: name.into(),
            })
    }

    /// Checks that every alias used anywhere in the interface names a
    /// declared type. The parser does not do this by itself, so consumers
    /// walking the type trees should call this first.
    pub fn validate(&self) -> Result<()> {
        let mut check = |name: &str| self.resolve_alias(name).map(|_| ());
        for member in self.iter_members() {
            match member {
                MemberRef::Typedef(t) => t.vtype.visit_aliases(&mut check)?,
                MemberRef::Method(m) => {
                    m.input.visit_aliases(&mut check)?;
                    m.output.visit_aliases(&mut check)?;
                }
                MemberRef::Error(e) => {
                    if let Some(ref p) = e.parameters {
                        p.visit_aliases(&mut check)?;
                    }
                }
            }
        }
        Ok(())
    }
}
