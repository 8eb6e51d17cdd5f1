//! Fact reader backed by Java sources.
//!
//! A project is an ordered list of roots, each either a source directory or
//! a source archive (`*.jar`/`*.zip`, e.g. Maven `-sources.jar`). Reading
//! `a/b/C` looks for `a/b/C.java` in every root in order and takes its
//! supertypes from the tree-sitter parse of the top-level declaration.

use memmap2::Mmap;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tree_sitter::Parser;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::element::{TypeHierarchyElement, TypeName};
use crate::reader::{ReadError, TypeHierarchyClassReader, TypeHierarchyClassReaderFactory};
use crate::structure::{
    CompilationUnit, DeclarationKind, TypeDeclaration, java_parser, parse_compilation_unit,
};

const JAVA_LANG_OBJECT: &str = "java/lang/Object";
const JAVA_LANG_ENUM: &str = "java/lang/Enum";
const JAVA_LANG_RECORD: &str = "java/lang/Record";
const ANNOTATION: &str = "java/lang/annotation/Annotation";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectClasspath {
    roots: Vec<PathBuf>,
}

impl ProjectClasspath {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Stable identifier of the root list, used in reports.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for root in &self.roots {
            hasher.update(root.to_string_lossy().as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SourceClassReaderFactory;

impl TypeHierarchyClassReaderFactory<ProjectClasspath> for SourceClassReaderFactory {
    fn create_class_reader(&self, project: &ProjectClasspath) -> Box<dyn TypeHierarchyClassReader> {
        Box::new(SourceClassReader::new(project.roots().to_vec()))
    }
}

enum SourceRoot {
    Directory(PathBuf),
    Archive {
        path: PathBuf,
        archive: ZipArchive<Cursor<Mmap>>,
    },
}

pub struct SourceClassReader {
    roots: Vec<PathBuf>,
    opened: Option<Vec<SourceRoot>>,
    parser: Option<Parser>,
}

impl SourceClassReader {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            opened: None,
            parser: None,
        }
    }

    fn try_read(&mut self, name: &TypeName) -> Result<Option<TypeHierarchyElement>, ReadError> {
        let Some((origin, source)) = self.read_source(name)? else {
            return Ok(None);
        };

        if self.parser.is_none() {
            self.parser = Some(java_parser().ok_or(ReadError::Parser)?);
        }
        let parser = self.parser.as_mut().ok_or(ReadError::Parser)?;

        let missing = || ReadError::MissingDeclaration {
            name: name.to_dotted(),
            origin: origin.clone(),
        };
        let unit = parse_compilation_unit(parser, &source).ok_or_else(missing)?;
        let declaration = unit
            .declaration(name.simple_name())
            .cloned()
            .ok_or_else(missing)?;

        Ok(Some(self.build_element(name, &unit, &declaration)))
    }

    fn build_element(
        &mut self,
        name: &TypeName,
        unit: &CompilationUnit,
        declaration: &TypeDeclaration,
    ) -> TypeHierarchyElement {
        let superclass_name = match declaration.kind {
            DeclarationKind::Class => match declaration.superclass.as_deref() {
                Some(written) => Some(self.resolve_written(written, unit)),
                None if name.as_internal() == JAVA_LANG_OBJECT => None,
                None => Some(TypeName::parse(JAVA_LANG_OBJECT)),
            },
            DeclarationKind::Interface | DeclarationKind::Annotation => {
                Some(TypeName::parse(JAVA_LANG_OBJECT))
            }
            DeclarationKind::Enum => Some(TypeName::parse(JAVA_LANG_ENUM)),
            DeclarationKind::Record => Some(TypeName::parse(JAVA_LANG_RECORD)),
        };

        let mut interface_names: Vec<TypeName> = declaration
            .interfaces
            .iter()
            .map(|written| self.resolve_written(written, unit))
            .collect();
        if declaration.kind == DeclarationKind::Annotation {
            interface_names.push(TypeName::parse(ANNOTATION));
        }

        TypeHierarchyElement::new(name.clone(), superclass_name, interface_names)
    }

    /// Single-type imports win, then the declaring package, then on-demand
    /// imports, then `java.lang`. A qualified name whose first segment is a
    /// type in scope names a member type and gets the binary `$` form.
    fn resolve_written(&mut self, written: &str, unit: &CompilationUnit) -> TypeName {
        let (head, member) = match written.split_once('.') {
            Some((head, member)) => (head, Some(member)),
            None => (written, None),
        };

        let outer = match single_type_import(head, unit) {
            Some(imported) => imported,
            None if member.is_some() && !head.starts_with(char::is_uppercase) => {
                return TypeName::parse(written);
            }
            None => self.resolve_simple(head, unit),
        };

        match member {
            Some(member) => TypeName::parse(&format!(
                "{}${}",
                outer.as_internal(),
                member.replace('.', "$")
            )),
            None => outer,
        }
    }

    fn resolve_simple(&mut self, simple_name: &str, unit: &CompilationUnit) -> TypeName {
        let same_package = qualify(&unit.package, simple_name);
        if self.contains(&same_package) {
            return same_package;
        }

        for import in unit.imports.iter().filter(|i| i.on_demand) {
            let candidate = qualify(&import.path, simple_name);
            if self.contains(&candidate) {
                return candidate;
            }
        }

        qualify("java.lang", simple_name)
    }

    fn contains(&mut self, name: &TypeName) -> bool {
        let relative = name.source_path();
        self.open_roots().iter_mut().any(|root| match root {
            SourceRoot::Directory(dir) => dir.join(&relative).is_file(),
            SourceRoot::Archive { archive, .. } => archive.by_name(&relative).is_ok(),
        })
    }

    fn read_source(&mut self, name: &TypeName) -> Result<Option<(String, String)>, ReadError> {
        let relative = name.source_path();

        for root in self.open_roots().iter_mut() {
            match root {
                SourceRoot::Directory(dir) => {
                    let path = dir.join(&relative);
                    if !path.is_file() {
                        continue;
                    }
                    let source = std::fs::read_to_string(&path).map_err(|source| ReadError::Io {
                        path: path.clone(),
                        source,
                    })?;
                    return Ok(Some((path.display().to_string(), source)));
                }
                SourceRoot::Archive { path, archive } => {
                    let mut entry = match archive.by_name(&relative) {
                        Ok(entry) => entry,
                        Err(ZipError::FileNotFound) => continue,
                        Err(source) => {
                            return Err(ReadError::Archive {
                                path: path.clone(),
                                source,
                            });
                        }
                    };
                    let mut source = String::new();
                    entry
                        .read_to_string(&mut source)
                        .map_err(|source| ReadError::Io {
                            path: path.clone(),
                            source,
                        })?;
                    return Ok(Some((format!("{}!/{relative}", path.display()), source)));
                }
            }
        }

        Ok(None)
    }

    fn open_roots(&mut self) -> &mut Vec<SourceRoot> {
        let roots = &self.roots;
        self.opened.get_or_insert_with(|| {
            let opened: Vec<SourceRoot> = roots
                .par_iter()
                .filter_map(|path| match open_root(path) {
                    Ok(root) => root,
                    Err(err) => {
                        warn!(error = %err, "skipping unreadable source root");
                        None
                    }
                })
                .collect();
            debug!(roots = opened.len(), "opened source roots");
            opened
        })
    }
}

impl TypeHierarchyClassReader for SourceClassReader {
    fn read_type_hierarchy(&mut self, name: &TypeName) -> Option<TypeHierarchyElement> {
        match self.try_read(name) {
            Ok(element) => element,
            Err(err) => {
                warn!(type_name = %name, error = %err, "treating type as unresolved");
                None
            }
        }
    }

    fn release(&mut self) {
        if let Some(opened) = self.opened.take() {
            debug!(roots = opened.len(), "closing source roots");
        }
        self.parser = None;
    }
}

fn open_root(path: &Path) -> Result<Option<SourceRoot>, ReadError> {
    if path.is_dir() {
        return Ok(Some(SourceRoot::Directory(path.to_path_buf())));
    }
    if !path.is_file() {
        warn!(path = %path.display(), "source root does not exist");
        return Ok(None);
    }

    let file = File::open(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // SAFETY: The file is opened read-only and the map is owned by the
    // archive, which the reader drops on release.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let archive = ZipArchive::new(Cursor::new(mmap)).map_err(|source| ReadError::Archive {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(SourceRoot::Archive {
        path: path.to_path_buf(),
        archive,
    }))
}

fn single_type_import(simple_name: &str, unit: &CompilationUnit) -> Option<TypeName> {
    unit.imports
        .iter()
        .filter(|i| !i.on_demand)
        .find(|i| i.path.rsplit('.').next() == Some(simple_name))
        .map(|i| TypeName::parse(&i.path))
}

fn qualify(package: &str, simple_name: &str) -> TypeName {
    if package.is_empty() {
        TypeName::parse(simple_name)
    } else {
        TypeName::parse(&format!("{package}.{simple_name}"))
    }
}
