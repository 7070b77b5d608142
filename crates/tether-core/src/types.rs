//! Type names as they appear in signatures and creation requests
//!
//! A type name is either a bare name (`Adder`, `Game.Adder`) or an
//! assembly-qualified name (`Game.Adder, Scripts`). Primitive aliases are
//! recognised case-insensitively regardless of qualification.

use std::fmt;

use tether_sdk::ValueType;

use crate::error::{BridgeError, BridgeResult};

/// A parsed type name with an optional module qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    full_name: String,
    module: Option<String>,
}

impl TypeName {
    /// Parse a type name.
    ///
    /// `"Namespace.Type, Module, Version=..."` keeps only the first
    /// qualifier segment as the module name.
    pub fn parse(raw: &str) -> BridgeResult<Self> {
        let mut parts = raw.split(',').map(str::trim);
        let full_name = parts.next().unwrap_or_default();
        if full_name.is_empty() || full_name.chars().any(char::is_whitespace) {
            return Err(BridgeError::InvalidTypeName(raw.to_string()));
        }

        let module = match parts.next() {
            Some("") => return Err(BridgeError::InvalidTypeName(raw.to_string())),
            Some(m) => Some(m.to_string()),
            None => None,
        };

        Ok(Self {
            full_name: full_name.to_string(),
            module,
        })
    }

    /// Type name without the module qualifier
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Module qualifier, if present
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Last dotted segment of the name
    pub fn simple_name(&self) -> &str {
        self.full_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.full_name)
    }

    /// The primitive this name denotes, if any
    pub fn primitive(&self) -> Option<ValueType> {
        primitive(&self.full_name)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}, {}", self.full_name, module),
            None => f.write_str(&self.full_name),
        }
    }
}

/// Resolve a primitive alias or framework name
pub fn primitive(name: &str) -> Option<ValueType> {
    match name.to_ascii_lowercase().as_str() {
        "void" | "system.void" => Some(ValueType::Void),
        "int" | "system.int32" => Some(ValueType::I32),
        "float" | "system.single" => Some(ValueType::F32),
        "bool" | "system.boolean" => Some(ValueType::Bool),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let name = TypeName::parse("  Game.Player ").unwrap();
        assert_eq!(name.full_name(), "Game.Player");
        assert_eq!(name.simple_name(), "Player");
        assert_eq!(name.module(), None);
        assert_eq!(name.to_string(), "Game.Player");
    }

    #[test]
    fn test_parse_assembly_qualified() {
        let name = TypeName::parse("Game.Player, Scripts, Version=1.0.0.0").unwrap();
        assert_eq!(name.full_name(), "Game.Player");
        assert_eq!(name.module(), Some("Scripts"));
        assert_eq!(name.to_string(), "Game.Player, Scripts");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TypeName::parse("").is_err());
        assert!(TypeName::parse("   ").is_err());
        assert!(TypeName::parse(", Scripts").is_err());
        assert!(TypeName::parse("Game.Player, ").is_err());
        assert!(TypeName::parse("Game Player").is_err());
    }

    #[test]
    fn test_primitive_aliases() {
        assert_eq!(primitive("INT"), Some(ValueType::I32));
        assert_eq!(primitive("System.Single"), Some(ValueType::F32));
        assert_eq!(primitive("Bool"), Some(ValueType::Bool));
        assert_eq!(primitive("void"), Some(ValueType::Void));
        assert_eq!(primitive("string"), None);
        assert_eq!(
            TypeName::parse("System.Int32, mscorlib").unwrap().primitive(),
            Some(ValueType::I32)
        );
    }
}
