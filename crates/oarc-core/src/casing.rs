//! Wire ↔ local name mapping. Everything here is a pure function of its input.

use heck::{ToLowerCamelCase, ToPascalCase, ToSnakeCase};

/// An operation id (or any wire identifier) with its Rust spellings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedName {
    pub original: String,
    pub snake_case: String,
    pub pascal_case: String,
}

impl std::fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.original)
    }
}

pub fn normalize_name(name: &str) -> NormalizedName {
    let words = split_words(name);
    NormalizedName {
        original: name.to_string(),
        snake_case: words.to_snake_case(),
        pascal_case: words.to_pascal_case(),
    }
}

/// Wire name → local (snake_case) name. `petId` → `pet_id`, `X-Rate-Limit` → `x_rate_limit`.
pub fn to_local(wire_name: &str) -> String {
    split_words(wire_name).to_snake_case()
}

/// Local name → conventional camelCase wire name. Only a guess: records
/// keep their own exact wire names and never rely on this direction.
pub fn to_wire(local_name: &str) -> String {
    local_name.to_lower_camel_case()
}

/// Component schema name → record type name: capitalize the first
/// character and drop spaces and hyphens. `pet-owner` → `Petowner`.
pub fn format_type_name(name: &str) -> String {
    let mut chars = name.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    capitalized.replace(['-', ' '], "")
}

/// Runs of alphanumerics joined by `_`. Punctuation only separates words.
fn split_words(name: &str) -> String {
    let joined = name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if joined.is_empty() {
        "unnamed".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_id_variants() {
        let n = normalize_name("listModels");
        assert_eq!(n.snake_case, "list_models");
        assert_eq!(n.pascal_case, "ListModels");
        assert_eq!(n.to_string(), "listModels");
    }

    #[test]
    fn test_punctuation_separates_words() {
        assert_eq!(normalize_name("pet-store").pascal_case, "PetStore");
        assert_eq!(normalize_name("application/json").snake_case, "application_json");
        assert_eq!(normalize_name("--").snake_case, "unnamed");
    }

    #[test]
    fn test_to_local() {
        assert_eq!(to_local("petId"), "pet_id");
        assert_eq!(to_local("Value"), "value");
        assert_eq!(to_local("X-Rate-Limit"), "x_rate_limit");
        assert_eq!(to_local("already_snake"), "already_snake");
        assert_eq!(to_local("getItem"), "get_item");
        assert_eq!(to_local("Pet Store"), "pet_store");
    }

    #[test]
    fn test_to_wire() {
        assert_eq!(to_wire("pet_id"), "petId");
        assert_eq!(to_wire("created_at"), "createdAt");
    }

    #[test]
    fn test_format_type_name() {
        assert_eq!(format_type_name("pet"), "Pet");
        assert_eq!(format_type_name("pet-owner"), "Petowner");
        assert_eq!(format_type_name("Order Line"), "OrderLine");
        assert_eq!(format_type_name("HTTPStatus"), "HTTPStatus");
        assert_eq!(format_type_name(""), "");
    }
}
