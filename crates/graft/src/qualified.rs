// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Qualified type identities.
//!
//! Everything in the graph compiler is keyed by a [`QualifiedType`]: a
//! structural type identity plus an optional qualifier. Two providers of the
//! same type with different qualifiers are unrelated bindings.

use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// The structural shape of a type, as reported by the declaration-extraction
/// stage.
///
/// The shape drives two resolution behaviors: collection shapes make a type
/// eligible as a multi-bind aggregation target, and [`TypeShape::Deferred`]
/// marks a lazy `Factory<T>`-style wrapper whose inner type is resolved into a
/// deferred invocation rather than an eager one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeShape {
    /// An ordinary type with no resolution-relevant structure.
    Opaque,
    /// An ordered collection; multi-bind parts are concatenated.
    List,
    /// An unordered collection; multi-bind parts are unioned.
    Set,
    /// A keyed collection; multi-bind parts are merged by key.
    Map,
    /// A deferred-invocation wrapper around its single type argument.
    Deferred,
}

impl TypeShape {
    /// Whether this shape can be the target of multi-bind aggregation.
    #[must_use]
    pub fn is_collection(self) -> bool {
        matches!(self, Self::List | Self::Set | Self::Map)
    }
}

/// A structural type identity: a name, its generic arguments, and its
/// [`TypeShape`].
///
/// Equality and hashing are structural over the name and arguments, so
/// `Map<String, Node>` and `Map<String, Leaf>` are distinct keys. The shape is
/// assigned by the constructor used and is excluded from identity; the
/// extraction stage is expected to classify a given host type consistently.
#[derive(Debug, Clone)]
pub struct TypeKey {
    name: Arc<str>,
    args: Vec<TypeKey>,
    shape: TypeShape,
}

impl TypeKey {
    /// A plain, non-generic type.
    #[must_use]
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            shape: TypeShape::Opaque,
        }
    }

    /// A generic type with no resolution-relevant shape.
    #[must_use]
    pub fn generic(name: impl Into<Arc<str>>, args: impl IntoIterator<Item = Self>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().collect(),
            shape: TypeShape::Opaque,
        }
    }

    /// An ordered collection of `element`, e.g. the host's list type.
    #[must_use]
    pub fn list(name: impl Into<Arc<str>>, element: Self) -> Self {
        Self {
            name: name.into(),
            args: vec![element],
            shape: TypeShape::List,
        }
    }

    /// An unordered collection of `element`.
    #[must_use]
    pub fn set(name: impl Into<Arc<str>>, element: Self) -> Self {
        Self {
            name: name.into(),
            args: vec![element],
            shape: TypeShape::Set,
        }
    }

    /// A keyed collection.
    #[must_use]
    pub fn map(name: impl Into<Arc<str>>, key: Self, value: Self) -> Self {
        Self {
            name: name.into(),
            args: vec![key, value],
            shape: TypeShape::Map,
        }
    }

    /// A deferred-invocation wrapper around `inner`, e.g. `Factory<T>`.
    #[must_use]
    pub fn deferred(name: impl Into<Arc<str>>, inner: Self) -> Self {
        Self {
            name: name.into(),
            args: vec![inner],
            shape: TypeShape::Deferred,
        }
    }

    /// The type's name, without generic arguments.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The generic arguments, in declaration order.
    #[must_use]
    pub fn args(&self) -> &[Self] {
        &self.args
    }

    /// The structural shape assigned at construction.
    #[must_use]
    pub fn shape(&self) -> TypeShape {
        self.shape
    }

    /// The single type argument of a deferred wrapper, if this is one.
    #[must_use]
    pub fn deferred_inner(&self) -> Option<&Self> {
        if self.shape == TypeShape::Deferred {
            self.args.first()
        } else {
            None
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args
    }
}

impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.args.hash(state);
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                Display::fmt(arg, f)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// A discriminator distinguishing multiple bindings of the same type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Qualifier {
    /// The unqualified binding.
    #[default]
    None,
    /// A string label, e.g. a named binding.
    Label(Arc<str>),
    /// A marker qualifier identified by its own type identity.
    Attribute(TypeKey),
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Label(label) => write!(f, "@\"{label}\""),
            Self::Attribute(key) => write!(f, "@[{key}]"),
        }
    }
}

/// The universal lookup key of the graph compiler: a [`TypeKey`] plus a
/// [`Qualifier`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedType {
    key: TypeKey,
    qualifier: Qualifier,
}

impl QualifiedType {
    /// An unqualified type.
    #[must_use]
    pub fn plain(key: TypeKey) -> Self {
        Self {
            key,
            qualifier: Qualifier::None,
        }
    }

    /// A type qualified by a string label.
    #[must_use]
    pub fn labeled(key: TypeKey, label: impl Into<Arc<str>>) -> Self {
        Self {
            key,
            qualifier: Qualifier::Label(label.into()),
        }
    }

    /// A type with an explicit qualifier.
    #[must_use]
    pub fn qualified(key: TypeKey, qualifier: Qualifier) -> Self {
        Self { key, qualifier }
    }

    /// The structural type identity.
    #[must_use]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// The qualifier, [`Qualifier::None`] for unqualified bindings.
    #[must_use]
    pub fn qualifier(&self) -> &Qualifier {
        &self.qualifier
    }

    /// Shorthand for the shape of the underlying type.
    #[must_use]
    pub fn shape(&self) -> TypeShape {
        self.key.shape()
    }

    /// For a deferred-shaped type, the qualified inner type it defers.
    ///
    /// The qualifier carries over: a dependency on `Factory<T>` qualified with
    /// a label resolves the same label on `T`.
    #[must_use]
    pub fn deferred_target(&self) -> Option<Self> {
        self.key.deferred_inner().map(|inner| Self {
            key: inner.clone(),
            qualifier: self.qualifier.clone(),
        })
    }
}

impl From<TypeKey> for QualifiedType {
    fn from(key: TypeKey) -> Self {
        Self::plain(key)
    }
}

impl Display for QualifiedType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.key, f)?;
        if self.qualifier != Qualifier::None {
            write!(f, " {}", self.qualifier)?;
        }
        Ok(())
    }
}
