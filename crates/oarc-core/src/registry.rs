//! The model registry: one [`RecordType`] per object-typed component schema.
//!
//! Construction runs in two passes so that forward and mutually recursive
//! references resolve:
//!
//! 1. Allocate every record (stable [`RecordId`]) and register its name
//!    before its fields are resolved. Fields referring to a schema that is
//!    not registered yet get a placeholder descriptor.
//! 2. Re-resolve every field against the complete name table and replace the
//!    placeholders by index.

use indexmap::IndexMap;
use log::{debug, trace};

use crate::casing::{format_type_name, to_local};
use crate::error::SchemaError;
use crate::parse::Document;
use crate::parse::schema::{Schema, SchemaOrRef};
use crate::resolve::{COMPONENT_SCHEMAS, TypeResolver};
use crate::types::{FieldDefault, RecordField, RecordId, RecordType, TypeDescriptor};

/// Arena of record types, addressed by [`RecordId`] or by formatted name.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    records: Vec<RecordType>,
    by_name: IndexMap<String, RecordId>,
    source_names: Vec<String>,
}

/// A field whose descriptor is revisited in pass 2.
struct PendingField<'d> {
    record: RecordId,
    index: usize,
    schema: &'d SchemaOrRef,
    location: String,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the document's component schemas.
    pub fn build(document: &Document) -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        let Some(components) = document.spec.components.as_ref() else {
            return Ok(registry);
        };

        check_component_names(components.schemas.keys())?;
        let mut pending = Vec::new();

        // Pass 1: allocate and register, resolving against the names seen so far.
        for (source_name, schema_or_ref) in &components.schemas {
            let Some(schema) = schema_or_ref.as_schema() else {
                continue;
            };
            if schema.type_keyword() != Some("object") {
                continue;
            }
            let id = registry.allocate(source_name, schema)?;
            let location = format!("{COMPONENT_SCHEMAS}{source_name}");
            for (index, (property, property_schema)) in schema.properties.iter().enumerate() {
                let field_location = format!("{location}/properties/{property}");
                let ty = TypeResolver::new(document, &registry.by_name)
                    .resolve(property_schema, &field_location)?;
                registry.records[id.0].add_field(
                    build_field(property, property_schema, ty),
                    schema.required.contains(property),
                    property_schema.as_schema().is_some_and(Schema::is_nullable),
                )?;
                pending.push(PendingField {
                    record: id,
                    index,
                    schema: property_schema,
                    location: field_location,
                });
            }
        }
        debug!("registered {} record types", registry.records.len());

        // Pass 2: every name now exists; swap placeholders for real descriptors.
        let mut replaced = 0usize;
        for field in pending {
            let ty = TypeResolver::new(document, &registry.by_name)
                .resolve(field.schema, &field.location)?;
            let record = &mut registry.records[field.record.0];
            if record.fields()[field.index].ty != ty {
                trace!("{}: {} -> {}", field.location, record.fields()[field.index].ty, ty);
                record.set_field_type(field.index, ty);
                replaced += 1;
            }
        }
        debug!("replaced {replaced} placeholder field types");

        Ok(registry)
    }

    fn allocate(&mut self, source_name: &str, schema: &Schema) -> Result<RecordId, SchemaError> {
        let formatted = format_type_name(source_name);
        if let Some(existing) = self.by_name.get(&formatted) {
            return Err(SchemaError::NameCollision {
                first: self.source_names[existing.0].clone(),
                second: source_name.to_string(),
                formatted,
            });
        }
        let id = RecordId(self.records.len());
        self.records
            .push(RecordType::new(formatted.clone()).with_description(schema.description.clone()));
        self.source_names.push(source_name.to_string());
        self.by_name.insert(formatted, id);
        Ok(id)
    }

    /// Register a hand-built record type.
    pub fn insert(&mut self, record: RecordType) -> Result<RecordId, SchemaError> {
        if let Some(existing) = self.by_name.get(record.name()) {
            return Err(SchemaError::NameCollision {
                first: self.source_names[existing.0].clone(),
                second: record.name().to_string(),
                formatted: record.name().to_string(),
            });
        }
        let id = RecordId(self.records.len());
        self.source_names.push(record.name().to_string());
        self.by_name.insert(record.name().to_string(), id);
        self.records.push(record);
        Ok(id)
    }

    /// Panics if `id` was minted by a different registry.
    pub fn record(&self, id: RecordId) -> &RecordType {
        &self.records[id.0]
    }

    pub fn id_of(&self, name: &str) -> Option<RecordId> {
        self.by_name.get(name).copied()
    }

    pub fn lookup(&self, name: &str) -> Option<&RecordType> {
        self.id_of(name).map(|id| self.record(id))
    }

    /// Formatted name → id, the `realized` table handed to the resolver.
    pub fn realized(&self) -> &IndexMap<String, RecordId> {
        &self.by_name
    }

    pub fn records(&self) -> impl Iterator<Item = (RecordId, &RecordType)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, record)| (RecordId(i), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Every component name, object or not, must format to a distinct type
/// name: `$ref`s are matched against records by formatted name.
fn check_component_names<'n>(names: impl Iterator<Item = &'n String>) -> Result<(), SchemaError> {
    let mut seen: IndexMap<String, &str> = IndexMap::new();
    for name in names {
        let formatted = format_type_name(name);
        if let Some(first) = seen.get(&formatted) {
            return Err(SchemaError::NameCollision {
                first: first.to_string(),
                second: name.clone(),
                formatted,
            });
        }
        seen.insert(formatted, name);
    }
    Ok(())
}

fn build_field(property: &str, schema: &SchemaOrRef, ty: TypeDescriptor) -> RecordField {
    let inline = schema.as_schema();
    let mut field = RecordField::new(to_local(property), property, ty)
        .with_description(inline.and_then(|s| s.description.clone()));
    if let Some(default) = inline.and_then(|s| s.default_value.clone()) {
        field = field.with_default(FieldDefault::Static(default));
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use crate::types::PrimitiveKind;

    fn doc(schemas: serde_json::Value) -> Document {
        parse::from_value(serde_json::json!({
            "openapi": "3.0.3",
            "info": {"title": "T", "version": "1"},
            "paths": {},
            "components": {"schemas": schemas},
        }))
        .unwrap()
    }

    #[test]
    fn test_only_object_schemas_become_records() {
        let registry = ModelRegistry::build(&doc(serde_json::json!({
            "Pet": {"type": "object", "properties": {"name": {"type": "string"}}},
            "PetId": {"type": "string"},
            "PetAlias": {"$ref": "#/components/schemas/Pet"},
        })))
        .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("Pet").is_some());
        assert!(registry.lookup("PetId").is_none());
    }

    #[test]
    fn test_field_metadata() {
        let registry = ModelRegistry::build(&doc(serde_json::json!({
            "Pet": {
                "type": "object",
                "required": ["petId"],
                "properties": {
                    "petId": {"type": "integer"},
                    "nickName": {"type": "string", "nullable": true},
                    "status": {"type": "string", "default": "available"},
                },
            },
        })))
        .unwrap();
        let pet = registry.lookup("Pet").unwrap();
        let names: Vec<_> = pet
            .fields()
            .iter()
            .map(|f| (f.local_name.as_str(), f.wire_name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("pet_id", "petId"),
                ("nick_name", "nickName"),
                ("status", "status")
            ]
        );
        assert!(pet.is_required("pet_id"));
        assert!(pet.is_nullable("nick_name"));
        assert!(pet.is_optional("status"));
        assert!(matches!(
            pet.field_by_local("status").unwrap().default,
            Some(FieldDefault::Static(serde_json::Value::String(ref s))) if s == "available"
        ));
    }

    #[test]
    fn test_forward_reference_is_backfilled() {
        let registry = ModelRegistry::build(&doc(serde_json::json!({
            "Parent": {
                "type": "object",
                "properties": {"child": {"$ref": "#/components/schemas/Child"}},
            },
            "Child": {"type": "object", "properties": {"name": {"type": "string"}}},
        })))
        .unwrap();
        let parent = registry.lookup("Parent").unwrap();
        let child_id = registry.id_of("Child").unwrap();
        assert_eq!(
            parent.field_by_local("child").unwrap().ty,
            TypeDescriptor::Named(child_id)
        );
    }

    #[test]
    fn test_self_reference() {
        let registry = ModelRegistry::build(&doc(serde_json::json!({
            "Node": {
                "type": "object",
                "properties": {
                    "children": {"type": "array", "items": {"$ref": "#/components/schemas/Node"}},
                },
            },
        })))
        .unwrap();
        let node_id = registry.id_of("Node").unwrap();
        assert_eq!(
            registry.record(node_id).fields()[0].ty,
            TypeDescriptor::array_of(TypeDescriptor::Named(node_id))
        );
    }

    #[test]
    fn test_same_ref_same_identity() {
        let registry = ModelRegistry::build(&doc(serde_json::json!({
            "Owner": {
                "type": "object",
                "properties": {
                    "home": {"$ref": "#/components/schemas/Address"},
                    "work": {"$ref": "#/components/schemas/Address"},
                },
            },
            "Address": {"type": "object", "properties": {"city": {"type": "string"}}},
        })))
        .unwrap();
        let owner = registry.lookup("Owner").unwrap();
        assert_eq!(owner.fields()[0].ty, owner.fields()[1].ty);
        assert!(matches!(owner.fields()[0].ty, TypeDescriptor::Named(_)));
    }

    #[test]
    fn test_ref_to_non_object_schema_is_inlined() {
        let registry = ModelRegistry::build(&doc(serde_json::json!({
            "Pet": {
                "type": "object",
                "properties": {"id": {"$ref": "#/components/schemas/PetId"}},
            },
            "PetId": {"type": "integer"},
        })))
        .unwrap();
        assert_eq!(
            registry.lookup("Pet").unwrap().fields()[0].ty,
            TypeDescriptor::Primitive(PrimitiveKind::Integer)
        );
    }

    #[test]
    fn test_name_collision() {
        let err = ModelRegistry::build(&doc(serde_json::json!({
            "pet-owner": {"type": "object"},
            "Petowner": {"type": "object"},
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::NameCollision { ref formatted, .. } if formatted == "Petowner"
        ));
    }

    #[test]
    fn test_name_collision_with_non_object_schema() {
        let err = ModelRegistry::build(&doc(serde_json::json!({
            "Petowner": {
                "type": "object",
                "properties": {"code": {"$ref": "#/components/schemas/petowner"}},
            },
            "petowner": {"type": "string"},
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::NameCollision { ref first, ref second, ref formatted }
                if first == "Petowner" && second == "petowner" && formatted == "Petowner"
        ));
    }

    #[test]
    fn test_colliding_local_field_names() {
        let err = ModelRegistry::build(&doc(serde_json::json!({
            "Pet": {
                "type": "object",
                "properties": {"petId": {"type": "string"}, "pet_id": {"type": "string"}},
            },
        })))
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { .. }));
    }

    #[test]
    fn test_insert_hand_built_record() {
        let mut registry = ModelRegistry::new();
        let id = registry.insert(RecordType::new("Point")).unwrap();
        assert_eq!(registry.record(id).name(), "Point");
        assert!(registry.insert(RecordType::new("Point")).is_err());
    }
}
