use tree_sitter::{Node, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Dotted name as written, without the trailing `.*`.
    pub path: String,
    pub on_demand: bool,
}

/// A top-level type declaration with its supertypes as written in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclaration {
    pub kind: DeclarationKind,
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilationUnit {
    pub package: String,
    pub imports: Vec<Import>,
    pub declarations: Vec<TypeDeclaration>,
}

impl CompilationUnit {
    pub fn declaration(&self, simple_name: &str) -> Option<&TypeDeclaration> {
        self.declarations.iter().find(|d| d.name == simple_name)
    }
}

pub fn java_parser() -> Option<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .ok()?;
    Some(parser)
}

pub fn parse_compilation_unit(parser: &mut Parser, source: &str) -> Option<CompilationUnit> {
    if source.trim().is_empty() {
        return None;
    }

    let tree = parser.parse(source, None)?;
    let root = tree.root_node();
    let bytes = source.as_bytes();
    let mut unit = CompilationUnit::default();

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "package_declaration" => {
                unit.package = extract_package(&child, bytes);
            }
            "import_declaration" => {
                if let Some(import) = extract_import(&child, bytes) {
                    unit.imports.push(import);
                }
            }
            "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration" => {
                if let Some(declaration) = extract_declaration(&child, bytes) {
                    unit.declarations.push(declaration);
                }
            }
            _ => {}
        }
    }

    Some(unit)
}

fn extract_package(node: &Node, source: &[u8]) -> String {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "scoped_identifier" || child.kind() == "identifier" {
            return node_text(&child, source).to_string();
        }
    }
    String::new()
}

fn extract_import(node: &Node, source: &[u8]) -> Option<Import> {
    let mut path = String::new();
    let mut on_demand = false;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            // Static imports bring members into scope, never types we care about.
            "static" => return None,
            "scoped_identifier" | "identifier" => {
                path = node_text(&child, source).to_string();
            }
            "asterisk" => on_demand = true,
            _ => {}
        }
    }

    if path.is_empty() {
        None
    } else {
        Some(Import { path, on_demand })
    }
}

fn extract_declaration(node: &Node, source: &[u8]) -> Option<TypeDeclaration> {
    let kind = match node.kind() {
        "class_declaration" => DeclarationKind::Class,
        "interface_declaration" => DeclarationKind::Interface,
        "enum_declaration" => DeclarationKind::Enum,
        "record_declaration" => DeclarationKind::Record,
        "annotation_type_declaration" => DeclarationKind::Annotation,
        _ => return None,
    };

    let mut name = None;
    let mut superclass = None;
    let mut interfaces = Vec::new();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "identifier" if name.is_none() => {
                name = Some(node_text(&child, source).to_string());
            }
            "superclass" => {
                superclass = first_named_child(&child).map(|t| type_text(&t, source));
            }
            "super_interfaces" | "extends_interfaces" => {
                interfaces.extend(type_list(&child, source));
            }
            _ => {}
        }
    }

    Some(TypeDeclaration {
        kind,
        name: name?,
        superclass,
        interfaces,
    })
}

fn type_list(node: &Node, source: &[u8]) -> Vec<String> {
    let mut types = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "type_list" {
            let mut inner = child.walk();
            for ty in child.named_children(&mut inner) {
                if ty.is_extra() {
                    continue;
                }
                types.push(type_text(&ty, source));
            }
        }
    }
    types
}

fn first_named_child<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let first = node.named_children(&mut cursor).find(|n| !n.is_extra());
    first
}

/// Written type without generic arguments or whitespace.
fn type_text(node: &Node, source: &[u8]) -> String {
    let text = node_text(node, source);
    let raw = text.split('<').next().unwrap_or(text);
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

fn node_text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}
