//! Type descriptors: the statically known structure of a model.
//!
//! The compiler never inspects real Rust types. An external facility (the
//! manifest loader, or whatever discovers annotated models) summarizes each
//! model type into a [`TypeDescriptor`]: a member map plus a [`TypeShape`]
//! classification. Name resolution is then a plain map lookup, and the whole
//! catalog is immutable once built so it can be shared across template
//! compilations.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Shared handle to a descriptor. Descriptors are cheap to clone and never
/// mutated after the catalog is built.
pub type TypeRef = Arc<TypeDescriptor>;

/// Classification of a descriptor for section/variable semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    /// Struct/record-like: members resolve against the member map.
    Record,
    /// Map-like with stringish keys; the element is the value type.
    /// Empty maps are still truthy in sections.
    Map(TypeRef),
    /// A general iterable (e.g. `Vec<T>`) of the element type.
    Iterable(TypeRef),
    /// A fixed-shape array or slice of the element type.
    Array(TypeRef),
    /// `bool`: sections over it are truthiness gates.
    Boolean,
    /// Any integer or float type.
    Numeric,
    /// Stringish: `String`, `&str`, anything rendered as text.
    Text,
    /// A callable member; see [`LambdaShape`].
    Lambda(LambdaShape),
    /// `Option<T>`: presence gate in sections, empty when interpolated null.
    Nullable(TypeRef),
}

/// The argument shape of a lambda member. Only the shape matters to the
/// compiler; the binding to actual Rust methods is the model author's
/// concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaShape {
    pub arg: LambdaArg,
    /// Result descriptor: a formattable for variable position, a record for
    /// typed section bodies, or text for raw-body lambdas.
    pub result: TypeRef,
}

/// What the generated code passes to a lambda.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LambdaArg {
    /// `fn(&self) -> R`
    None,
    /// `fn(&self, element) -> R` where element is the current frame value.
    Element,
    /// `fn(&self, raw_body: &str) -> R`
    RawBody,
    /// `fn(&self, raw_body: &str, element) -> R`
    RawBodyAndElement,
}

/// How a member is reached in generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    /// Plain field access: `value.name`.
    Field,
    /// Zero-argument accessor method: `value.name()`.
    Method,
}

/// A named member of a record-like descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub accessor: AccessorKind,
    pub ty: TypeRef,
}

/// The statically known summary of one data type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Display name; for records this is the Rust type path the emitter
    /// references (e.g. `crate::model::Person`).
    name: String,
    shape: TypeShape,
    members: BTreeMap<String, Member>,
    /// Names of the capabilities flattened into this record, transitively.
    capabilities: BTreeSet<String>,
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }

    /// Looks up a member by identifier. Only record-like descriptors carry
    /// members; everything else always misses.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// True when this type is, or has declared, the named capability.
    /// Capability names are recorded when a record flattens one in.
    pub fn implements(&self, name: &str) -> bool {
        self.name == name || self.capabilities.contains(name)
    }

    /// True if a `{{var}}` may interpolate a value of this type: text,
    /// numbers, booleans, and nullables of those.
    pub fn is_formattable(&self) -> bool {
        match &self.shape {
            TypeShape::Text | TypeShape::Numeric | TypeShape::Boolean => true,
            TypeShape::Nullable(inner) => inner.is_formattable(),
            _ => false,
        }
    }

    // --- scalar constructors -------------------------------------------------

    pub fn text() -> TypeRef {
        Arc::new(Self::scalar("str", TypeShape::Text))
    }

    pub fn numeric(name: &str) -> TypeRef {
        Arc::new(Self::scalar(name, TypeShape::Numeric))
    }

    pub fn boolean() -> TypeRef {
        Arc::new(Self::scalar("bool", TypeShape::Boolean))
    }

    pub fn nullable(inner: TypeRef) -> TypeRef {
        let name = format!("Option<{}>", inner.name);
        Arc::new(Self::scalar(&name, TypeShape::Nullable(inner)))
    }

    pub fn iterable(element: TypeRef) -> TypeRef {
        let name = format!("Vec<{}>", element.name);
        Arc::new(Self::scalar(&name, TypeShape::Iterable(element)))
    }

    pub fn array(element: TypeRef) -> TypeRef {
        let name = format!("[{}]", element.name);
        Arc::new(Self::scalar(&name, TypeShape::Array(element)))
    }

    pub fn map(value: TypeRef) -> TypeRef {
        let name = format!("Map<String, {}>", value.name);
        Arc::new(Self::scalar(&name, TypeShape::Map(value)))
    }

    fn scalar(name: &str, shape: TypeShape) -> Self {
        Self {
            name: name.to_string(),
            shape,
            members: BTreeMap::new(),
            capabilities: BTreeSet::new(),
        }
    }

    /// Starts a record descriptor under construction.
    pub fn record(name: &str) -> RecordBuilder {
        RecordBuilder {
            inner: Self::scalar(name, TypeShape::Record),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Builder for record-like descriptors. Capabilities (interfaces the model
/// implements) form a DAG; they are flattened into the single member map
/// here so resolution never has to walk an inheritance graph.
pub struct RecordBuilder {
    inner: TypeDescriptor,
}

impl RecordBuilder {
    pub fn field(mut self, name: &str, ty: TypeRef) -> Self {
        self.insert(name, AccessorKind::Field, ty);
        self
    }

    pub fn method(mut self, name: &str, ty: TypeRef) -> Self {
        self.insert(name, AccessorKind::Method, ty);
        self
    }

    /// A lambda member, always reached as a method in generated code.
    pub fn lambda(mut self, name: &str, arg: LambdaArg, result: TypeRef) -> Self {
        let shape = TypeShape::Lambda(LambdaShape { arg, result });
        let ty = Arc::new(TypeDescriptor::scalar(&format!("fn {name}"), shape));
        self.insert(name, AccessorKind::Method, ty);
        self
    }

    /// Merges all members of `capability` into this record. Later insertions
    /// win, matching override semantics of the flattened DAG. The capability
    /// name is recorded, transitively, so requirements on model types can be
    /// checked against it.
    pub fn capability(mut self, capability: &TypeDescriptor) -> Self {
        for member in capability.members() {
            self.inner.members.insert(member.name.clone(), member.clone());
        }
        self.inner.capabilities.insert(capability.name.clone());
        self.inner.capabilities.extend(capability.capabilities.iter().cloned());
        self
    }

    fn insert(&mut self, name: &str, accessor: AccessorKind, ty: TypeRef) {
        self.inner.members.insert(
            name.to_string(),
            Member {
                name: name.to_string(),
                accessor,
                ty,
            },
        );
    }

    pub fn build(self) -> TypeRef {
        Arc::new(self.inner)
    }
}

/// All descriptors known to one compiler invocation, keyed by type name.
/// Built once by the driver (or manifest loader), then treated as immutable.
#[derive(Debug, Default, Clone)]
pub struct DescriptorCatalog {
    by_name: BTreeMap<String, TypeRef>,
}

impl DescriptorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, descriptor: TypeRef) {
        self.by_name.insert(descriptor.name().to_string(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&TypeRef> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formattable_covers_scalars_and_nullable() {
        assert!(TypeDescriptor::text().is_formattable());
        assert!(TypeDescriptor::numeric("i64").is_formattable());
        assert!(TypeDescriptor::boolean().is_formattable());
        assert!(TypeDescriptor::nullable(TypeDescriptor::text()).is_formattable());
        assert!(!TypeDescriptor::iterable(TypeDescriptor::text()).is_formattable());
        assert!(!TypeDescriptor::map(TypeDescriptor::text()).is_formattable());
    }

    #[test]
    fn capability_members_are_flattened() {
        let support = TypeDescriptor::record("AgeSupport")
            .method("age", TypeDescriptor::numeric("i64"))
            .build();
        let person = TypeDescriptor::record("Person")
            .field("name", TypeDescriptor::text())
            .capability(&support)
            .build();

        assert!(person.member("name").is_some());
        let age = person.member("age").expect("flattened member");
        assert_eq!(age.accessor, AccessorKind::Method);
    }

    #[test]
    fn implements_tracks_declared_capabilities_transitively() {
        let base = TypeDescriptor::record("audit::Traceable")
            .method("trace_id", TypeDescriptor::text())
            .build();
        let stamped = TypeDescriptor::record("clock::Timestamped")
            .capability(&base)
            .method("at", TypeDescriptor::text())
            .build();
        let post = TypeDescriptor::record("Post").capability(&stamped).build();

        assert!(post.implements("Post"));
        assert!(post.implements("clock::Timestamped"));
        assert!(post.implements("audit::Traceable"));
        assert!(!post.implements("serde::Serialize"));
    }

    #[test]
    fn catalog_lookup_by_name() {
        let mut catalog = DescriptorCatalog::new();
        catalog.insert(TypeDescriptor::record("Person").build());
        assert!(catalog.get("Person").is_some());
        assert!(catalog.get("Missing").is_none());
    }
}
