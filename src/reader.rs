//! Contract between the engine and whatever produces structural facts.

use std::path::PathBuf;
use thiserror::Error;

use crate::element::{TypeHierarchyElement, TypeName};

/// Reads structural facts for one project snapshot.
///
/// Implementations may hold expensive resources (open archives, parsers)
/// until `release` is called. The engine never calls `read_type_hierarchy`
/// concurrently with itself or with `release` on the same instance, and
/// never reads from an instance after releasing it.
pub trait TypeHierarchyClassReader: Send {
    /// Total: a type that cannot be read is reported as `None`.
    fn read_type_hierarchy(&mut self, name: &TypeName) -> Option<TypeHierarchyElement>;

    /// Frees held resources. Calling it twice is a no-op.
    fn release(&mut self);
}

pub trait TypeHierarchyClassReaderFactory<P>: Send + Sync {
    fn create_class_reader(&self, project: &P) -> Box<dyn TypeHierarchyClassReader>;
}

/// Failures inside a concrete reader. They never reach engine callers:
/// readers log them and report the type as unresolved.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("no declaration of {name} in {origin}")]
    MissingDeclaration { name: String, origin: String },

    #[error("failed to initialize the java parser")]
    Parser,
}
