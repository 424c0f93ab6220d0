use oarc_core::{ModelRegistry, PrimitiveKind, TypeDescriptor};

/// Map a descriptor to the Rust argument type a wrapper accepts. Every type
/// produced here converts into `oarc_core::Value`.
pub fn rust_type(ty: &TypeDescriptor) -> String {
    match ty {
        TypeDescriptor::Primitive(PrimitiveKind::String) => "String".to_string(),
        TypeDescriptor::Primitive(PrimitiveKind::Integer) => "i64".to_string(),
        TypeDescriptor::Primitive(PrimitiveKind::Number) => "f64".to_string(),
        TypeDescriptor::Primitive(PrimitiveKind::Boolean) => "bool".to_string(),
        TypeDescriptor::Primitive(PrimitiveKind::Object) | TypeDescriptor::Any => {
            "oarc_core::Value".to_string()
        }
        TypeDescriptor::DateTime => {
            "oarc_core::chrono::DateTime<oarc_core::chrono::FixedOffset>".to_string()
        }
        TypeDescriptor::ArrayOf(element) => format!("Vec<{}>", rust_type(element)),
        TypeDescriptor::Named(_) | TypeDescriptor::Union(_) => "oarc_core::Record".to_string(),
    }
}

/// Human-readable type for doc comments, naming records and union members.
pub fn describe(ty: &TypeDescriptor, registry: &ModelRegistry) -> String {
    match ty {
        TypeDescriptor::Named(id) => format!("`{}`", registry.record(*id).name()),
        TypeDescriptor::Union(union) => union
            .allowed_types()
            .into_iter()
            .map(|member| describe(member, registry))
            .collect::<Vec<_>>()
            .join(" | "),
        TypeDescriptor::ArrayOf(element) => format!("list of {}", describe(element, registry)),
        other => other.to_string(),
    }
}

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false",
    "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where",
    "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv", "try",
    "typeof", "unsized", "virtual", "yield",
];

/// Make a snake_case name usable as a Rust identifier.
pub fn rust_ident(name: &str) -> String {
    match name {
        "self" | "Self" | "super" | "crate" => format!("{name}_"),
        _ if KEYWORDS.contains(&name) => format!("r#{name}"),
        _ if name.starts_with(|c: char| c.is_ascii_digit()) => format!("_{name}"),
        _ => name.to_string(),
    }
}
