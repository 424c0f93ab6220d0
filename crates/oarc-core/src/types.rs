//! Runtime type descriptors produced by schema resolution.
//!
//! A [`TypeDescriptor`] says how a value is encoded on the wire and decoded in
//! memory. Named object types live in the
//! [`ModelRegistry`](crate::registry::ModelRegistry) arena and are referenced
//! by [`RecordId`], so resolving the same `$ref` twice always yields the same
//! identity.

use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::error::{CodecError, SchemaError};
use crate::value::Value;

/// Stable index of a record type inside a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub(crate) usize);

impl RecordId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Primitive `type` keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Number,
    Integer,
    Boolean,
    String,
    /// Untyped object, passed through as-is.
    Object,
}

impl PrimitiveKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "number" => Some(PrimitiveKind::Number),
            "integer" => Some(PrimitiveKind::Integer),
            "boolean" => Some(PrimitiveKind::Boolean),
            "string" => Some(PrimitiveKind::String),
            "object" => Some(PrimitiveKind::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Number => "number",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::String => "string",
            PrimitiveKind::Object => "object",
        }
    }
}

/// A resolved runtime type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    /// ISO-8601 string on the wire, timezone-aware instant in memory.
    DateTime,
    ArrayOf(Box<TypeDescriptor>),
    Named(RecordId),
    Union(DiscriminatedUnion),
    Any,
}

impl TypeDescriptor {
    pub fn array_of(element: TypeDescriptor) -> Self {
        TypeDescriptor::ArrayOf(Box::new(element))
    }

    /// Whether this descriptor, or anything nested in it, is `Any`.
    pub fn contains_any(&self) -> bool {
        match self {
            TypeDescriptor::Any => true,
            TypeDescriptor::ArrayOf(element) => element.contains_any(),
            TypeDescriptor::Union(union) => union.mapping.values().any(|t| t.contains_any()),
            _ => false,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Primitive(kind) => f.write_str(kind.as_str()),
            TypeDescriptor::DateTime => f.write_str("date-time"),
            TypeDescriptor::ArrayOf(element) => write!(f, "array<{element}>"),
            TypeDescriptor::Named(id) => write!(f, "record#{}", id.0),
            TypeDescriptor::Union(union) => {
                write!(f, "union<{}: ", union.field)?;
                for (i, (tag, ty)) in union.mapping.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{tag}={ty}")?;
                }
                f.write_str(">")
            }
            TypeDescriptor::Any => f.write_str("any"),
        }
    }
}

/// A `oneOf` with a discriminator: the tag field's value picks the member.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatedUnion {
    field: String,
    mapping: IndexMap<String, TypeDescriptor>,
}

impl DiscriminatedUnion {
    pub fn new(field: impl Into<String>, mapping: IndexMap<String, TypeDescriptor>) -> Self {
        Self {
            field: field.into(),
            mapping,
        }
    }

    /// Wire name of the discriminator field.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn mapping(&self) -> &IndexMap<String, TypeDescriptor> {
        &self.mapping
    }

    pub fn member_for(&self, tag: &str) -> Result<&TypeDescriptor, CodecError> {
        self.mapping
            .get(tag)
            .ok_or_else(|| CodecError::UnknownDiscriminatorValue {
                value: tag.to_string(),
            })
    }

    /// Member descriptors in mapping order, each listed once even when
    /// several tags map to it.
    pub fn allowed_types(&self) -> Vec<&TypeDescriptor> {
        let mut seen: Vec<&TypeDescriptor> = Vec::new();
        for ty in self.mapping.values() {
            if !seen.contains(&ty) {
                seen.push(ty);
            }
        }
        seen
    }

    /// The tag that maps to `record`, used when encoding a record as a
    /// union member.
    pub fn tag_for(&self, record: RecordId) -> Option<&str> {
        self.mapping.iter().find_map(|(tag, ty)| match ty {
            TypeDescriptor::Named(id) if *id == record => Some(tag.as_str()),
            _ => None,
        })
    }
}

/// Default applied when a field is missing from a decoded payload.
#[derive(Debug, Clone)]
pub enum FieldDefault {
    /// A wire-form default, decoded against the field type on use.
    Static(serde_json::Value),
    /// Produces a fresh in-memory value per decode.
    Factory(fn() -> Value),
}

/// One field of a record type.
#[derive(Debug, Clone)]
pub struct RecordField {
    pub local_name: String,
    pub wire_name: String,
    pub ty: TypeDescriptor,
    pub default: Option<FieldDefault>,
    pub description: Option<String>,
}

impl RecordField {
    pub fn new(
        local_name: impl Into<String>,
        wire_name: impl Into<String>,
        ty: TypeDescriptor,
    ) -> Self {
        Self {
            local_name: local_name.into(),
            wire_name: wire_name.into(),
            ty,
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// A named object type.
#[derive(Debug, Clone)]
pub struct RecordType {
    name: String,
    description: Option<String>,
    fields: Vec<RecordField>,
    required_fields: IndexSet<String>,
    nullable_fields: IndexSet<String>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
            required_fields: IndexSet::new(),
            nullable_fields: IndexSet::new(),
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Append a field. Local and wire names must both stay unique.
    pub fn add_field(
        &mut self,
        field: RecordField,
        required: bool,
        nullable: bool,
    ) -> Result<(), SchemaError> {
        let clash = self
            .fields
            .iter()
            .find(|f| f.local_name == field.local_name || f.wire_name == field.wire_name);
        if let Some(existing) = clash {
            let field = if existing.wire_name == field.wire_name {
                field.wire_name
            } else {
                field.local_name
            };
            return Err(SchemaError::DuplicateField {
                record: self.name.clone(),
                field,
            });
        }
        if required {
            self.required_fields.insert(field.local_name.clone());
        }
        if nullable {
            self.nullable_fields.insert(field.local_name.clone());
        }
        self.fields.push(field);
        Ok(())
    }

    /// Builder form of [`add_field`](Self::add_field).
    pub fn field(
        mut self,
        field: RecordField,
        required: bool,
        nullable: bool,
    ) -> Result<Self, SchemaError> {
        self.add_field(field, required, nullable)?;
        Ok(self)
    }

    pub(crate) fn set_field_type(&mut self, index: usize, ty: TypeDescriptor) {
        self.fields[index].ty = ty;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn field_by_local(&self, local_name: &str) -> Option<&RecordField> {
        self.fields.iter().find(|f| f.local_name == local_name)
    }

    pub fn field_by_wire(&self, wire_name: &str) -> Option<&RecordField> {
        self.fields.iter().find(|f| f.wire_name == wire_name)
    }

    pub fn required_fields(&self) -> &IndexSet<String> {
        &self.required_fields
    }

    pub fn nullable_fields(&self) -> &IndexSet<String> {
        &self.nullable_fields
    }

    pub fn is_required(&self, local_name: &str) -> bool {
        self.required_fields.contains(local_name)
    }

    pub fn is_nullable(&self, local_name: &str) -> bool {
        self.nullable_fields.contains(local_name)
    }

    /// Neither required nor nullable: an absent value is left off the wire.
    pub fn is_optional(&self, local_name: &str) -> bool {
        !self.is_required(local_name) && !self.is_nullable(local_name)
    }
}
