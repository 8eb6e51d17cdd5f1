//! Structural facts about a single type.
//!
//! Names are kept in the slash-separated binary form (`java/lang/Object`)
//! everywhere inside the crate. The dotted form only appears when a name
//! crosses the public boundary (parsing caller input, rendering output).

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(Arc<str>);

impl TypeName {
    /// Accepts `a.b.C` or `a/b/C` and normalizes to `a/b/C`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.contains('.') {
            Self(Arc::from(trimmed.replace('.', "/")))
        } else {
            Self(Arc::from(trimmed))
        }
    }

    pub fn as_internal(&self) -> &str {
        &self.0
    }

    pub fn to_dotted(&self) -> String {
        self.0.replace('/', ".")
    }

    pub fn simple_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }

    /// Relative path of the compilation unit that declares this type.
    pub fn source_path(&self) -> String {
        format!("{}.java", self.0)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted())
    }
}

impl Serialize for TypeName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_dotted())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeHierarchyElement {
    pub qualified_name: TypeName,
    /// `None` only for the root of the hierarchy.
    pub superclass_name: Option<TypeName>,
    pub interface_names: Vec<TypeName>,
}

impl TypeHierarchyElement {
    pub fn new(
        qualified_name: TypeName,
        superclass_name: Option<TypeName>,
        interface_names: Vec<TypeName>,
    ) -> Self {
        Self {
            qualified_name,
            superclass_name,
            interface_names,
        }
    }

    pub fn declares_interface(&self, name: &TypeName) -> bool {
        self.interface_names.iter().any(|i| i == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_dotted_names() {
        let name = TypeName::parse(" org.example.pkg.Service ");
        assert_eq!(name.as_internal(), "org/example/pkg/Service");
        assert_eq!(name.to_dotted(), "org.example.pkg.Service");
        assert_eq!(name, TypeName::parse("org/example/pkg/Service"));
    }

    #[test]
    fn simple_name_and_source_path() {
        let name = TypeName::parse("java.util.List");
        assert_eq!(name.simple_name(), "List");
        assert_eq!(name.source_path(), "java/util/List.java");

        let unpackaged = TypeName::parse("Main");
        assert_eq!(unpackaged.simple_name(), "Main");
        assert_eq!(unpackaged.source_path(), "Main.java");
    }

    #[test]
    fn element_serializes_dotted_names() {
        let element = TypeHierarchyElement::new(
            TypeName::parse("a.B"),
            Some(TypeName::parse("java.lang.Object")),
            vec![TypeName::parse("a.I")],
        );
        let json = serde_json::to_value(&element).unwrap();
        assert_eq!(json["qualified_name"], "a.B");
        assert_eq!(json["superclass_name"], "java.lang.Object");
        assert_eq!(json["interface_names"][0], "a.I");
        assert!(element.declares_interface(&TypeName::parse("a/I")));
    }
}
