//! Schema fragment → [`TypeDescriptor`] resolution.

use indexmap::IndexMap;
use log::warn;

use crate::casing::format_type_name;
use crate::error::SchemaError;
use crate::parse::Document;
use crate::parse::schema::{Schema, SchemaOrRef};
use crate::types::{DiscriminatedUnion, PrimitiveKind, RecordId, TypeDescriptor};

/// Pointer prefix of named component schemas.
pub const COMPONENT_SCHEMAS: &str = "#/components/schemas/";

/// Resolve `schema` against `document`, short-circuiting `$ref`s to component
/// schemas that are already present in `realized`.
pub fn resolve(
    schema: &SchemaOrRef,
    document: &Document,
    realized: &IndexMap<String, RecordId>,
) -> Result<TypeDescriptor, SchemaError> {
    TypeResolver::new(document, realized).resolve(schema, "#")
}

/// Depth-first resolver over one document and one table of realized names.
pub struct TypeResolver<'a> {
    document: &'a Document,
    realized: &'a IndexMap<String, RecordId>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(document: &'a Document, realized: &'a IndexMap<String, RecordId>) -> Self {
        Self { document, realized }
    }

    /// `location` only labels errors, e.g. `#/components/schemas/Pet/properties/id`.
    pub fn resolve(
        &self,
        schema: &SchemaOrRef,
        location: &str,
    ) -> Result<TypeDescriptor, SchemaError> {
        let mut chain = Vec::new();
        self.resolve_schema_or_ref(schema, location, &mut chain)
    }

    fn resolve_schema_or_ref(
        &self,
        schema: &SchemaOrRef,
        location: &str,
        chain: &mut Vec<String>,
    ) -> Result<TypeDescriptor, SchemaError> {
        match schema {
            SchemaOrRef::Ref { ref_path } => self.resolve_ref(ref_path, location, chain),
            SchemaOrRef::Schema(schema) => self.resolve_schema(schema, location, chain),
        }
    }

    fn resolve_ref(
        &self,
        ref_path: &str,
        location: &str,
        chain: &mut Vec<String>,
    ) -> Result<TypeDescriptor, SchemaError> {
        let Some(pointer) = ref_path.strip_prefix('#') else {
            return Err(SchemaError::unsupported(
                location,
                format!("only same-document references are supported, got `{ref_path}`"),
            ));
        };

        if let Some(name) = ref_path.strip_prefix(COMPONENT_SCHEMAS) {
            let formatted = format_type_name(&unescape_pointer_token(name));
            if let Some(id) = self.realized.get(&formatted) {
                return Ok(TypeDescriptor::Named(*id));
            }
        }

        if chain.iter().any(|seen| seen == ref_path) {
            return Err(SchemaError::unsupported(
                location,
                format!("circular reference through `{ref_path}`"),
            ));
        }

        let target = self.document.pointer(pointer).ok_or_else(|| {
            SchemaError::unsupported(location, format!("reference target `{ref_path}` not found"))
        })?;
        let target: SchemaOrRef = serde_json::from_value(target.clone()).map_err(|e| {
            SchemaError::unsupported(ref_path, format!("reference target is not a schema: {e}"))
        })?;

        chain.push(ref_path.to_string());
        let resolved = self.resolve_schema_or_ref(&target, ref_path, chain);
        chain.pop();
        resolved
    }

    fn resolve_schema(
        &self,
        schema: &Schema,
        location: &str,
        chain: &mut Vec<String>,
    ) -> Result<TypeDescriptor, SchemaError> {
        if !schema.any_of.is_empty() {
            return Err(SchemaError::unsupported(location, "anyOf is not supported"));
        }

        if !schema.all_of.is_empty() {
            if let [only] = schema.all_of.as_slice() {
                return self.resolve_schema_or_ref(only, &format!("{location}/allOf/0"), chain);
            }
            warn!(
                "{location}: allOf with {} branches is not supported, treating as any",
                schema.all_of.len()
            );
            return Ok(TypeDescriptor::Any);
        }

        if !schema.one_of.is_empty() {
            return self.resolve_one_of(schema, location, chain);
        }

        let Some(keyword) = schema.type_keyword() else {
            let reason = if schema.schema_type.is_some() {
                "type arrays with several non-null types are not supported"
            } else {
                "schemas must have a type or a $ref"
            };
            return Err(SchemaError::unsupported(location, reason));
        };

        match keyword {
            "array" => match &schema.items {
                Some(items) => {
                    let element =
                        self.resolve_schema_or_ref(items, &format!("{location}/items"), chain)?;
                    Ok(TypeDescriptor::array_of(element))
                }
                None => Ok(TypeDescriptor::array_of(TypeDescriptor::Any)),
            },
            "string" if schema.format.as_deref() == Some("date-time") => {
                Ok(TypeDescriptor::DateTime)
            }
            other => PrimitiveKind::from_keyword(other)
                .map(TypeDescriptor::Primitive)
                .ok_or_else(|| {
                    SchemaError::unsupported(location, format!("unknown type keyword `{other}`"))
                }),
        }
    }

    fn resolve_one_of(
        &self,
        schema: &Schema,
        location: &str,
        chain: &mut Vec<String>,
    ) -> Result<TypeDescriptor, SchemaError> {
        if let [only] = schema.one_of.as_slice() {
            return self.resolve_schema_or_ref(only, &format!("{location}/oneOf/0"), chain);
        }

        let discriminator = schema.discriminator.as_ref().ok_or_else(|| {
            SchemaError::ambiguous(
                location,
                "oneOf with several branches requires a discriminator",
            )
        })?;
        if discriminator.property_name.is_empty() || discriminator.mapping.is_empty() {
            return Err(SchemaError::ambiguous(
                location,
                "discriminator property name and mapping are required",
            ));
        }

        let mut branches: Vec<(Option<&str>, TypeDescriptor)> = Vec::new();
        for (i, branch) in schema.one_of.iter().enumerate() {
            let ty = self.resolve_schema_or_ref(branch, &format!("{location}/oneOf/{i}"), chain)?;
            let ref_path = match branch {
                SchemaOrRef::Ref { ref_path } => Some(ref_path.as_str()),
                SchemaOrRef::Schema(_) => None,
            };
            branches.push((ref_path, ty));
        }

        let mut mapping = IndexMap::new();
        for (tag, target) in &discriminator.mapping {
            let ty = branches
                .iter()
                .find(|(ref_path, _)| *ref_path == Some(target.as_str()))
                .map(|(_, ty)| ty.clone())
                .ok_or_else(|| {
                    SchemaError::ambiguous(
                        location,
                        format!("mapping `{tag}` points at `{target}`, not a oneOf branch"),
                    )
                })?;
            mapping.insert(tag.clone(), ty);
        }

        Ok(TypeDescriptor::Union(DiscriminatedUnion::new(
            discriminator.property_name.clone(),
            mapping,
        )))
    }
}

/// Undo JSON pointer escaping (`~1` → `/`, `~0` → `~`).
fn unescape_pointer_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}
