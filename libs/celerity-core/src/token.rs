//! Injection tokens: the identities used to look up providers in the
//! container and to describe dependency edges in the module graph.
//!
//! Three variants mirror the source framework's token kinds: a class
//! identity, a plain string name, and a symbolic handle carrying a
//! human-readable description. Class and symbol tokens compare by
//! identity; string tokens compare by value.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Identity of a class-like type usable as a token or as a class provider
/// target. Carries both the `TypeId` (for identity comparison) and a
/// `'static` type name (for diagnostics and manifest serialisation).
#[derive(Clone, Copy)]
pub struct ClassId {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl ClassId {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The bare type name without its module path, used to derive
    /// resource/handler names for the manifest (spec.md §6).
    pub fn short_name(&self) -> &'static str {
        self.type_name.rsplit("::").next().unwrap_or(self.type_name)
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassId").field("type_name", &self.type_name).finish()
    }
}

impl PartialEq for ClassId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}
impl Eq for ClassId {}

impl std::hash::Hash for ClassId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

/// A symbolic token. Two symbols with the same description are still
/// distinct identities (mirroring `Symbol("x") !== Symbol("x")` in the
/// source language) -- the identity lives in the `Arc` pointer, not the
/// description text.
#[derive(Clone)]
pub struct Symbol {
    description: Arc<str>,
}

impl Symbol {
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self {
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.description, &other.description)
    }
}
impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.description) as *const ()).hash(state);
    }
}

/// A slot identity in the container: a class identity, a string name, or a
/// symbolic handle.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InjectionToken {
    Class(ClassId),
    Name(String),
    Symbol(Symbol),
}

impl InjectionToken {
    pub fn of<T: 'static>() -> Self {
        InjectionToken::Class(ClassId::of::<T>())
    }

    pub fn name(s: impl Into<String>) -> Self {
        InjectionToken::Name(s.into())
    }

    pub fn symbol(description: impl Into<Arc<str>>) -> Self {
        InjectionToken::Symbol(Symbol::new(description))
    }

    /// True if this token refers to a class identity (governs implicit
    /// construction and auto-adoption eligibility, spec.md §4.C/§4.D).
    pub fn is_class(&self) -> bool {
        matches!(self, InjectionToken::Class(_))
    }

    pub fn as_class(&self) -> Option<&ClassId> {
        match self {
            InjectionToken::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Serialises the token the way the manifest and diagnostics do: the
    /// class name, the string value, or the symbol's description.
    pub fn render(&self) -> String {
        match self {
            InjectionToken::Class(c) => c.type_name.to_string(),
            InjectionToken::Name(s) => s.clone(),
            InjectionToken::Symbol(s) => s.description().to_string(),
        }
    }

    /// The manifest's `tokenType` discriminator (spec.md §6).
    pub fn token_type(&self) -> &'static str {
        match self {
            InjectionToken::Class(_) => "class",
            InjectionToken::Name(_) => "string",
            InjectionToken::Symbol(_) => "symbol",
        }
    }
}

impl fmt::Display for InjectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
