//! # class-hierarchy
//!
//! Superclass and interface queries over Java types, answered from minimal
//! structural facts that are read lazily and cached per project.
//!
//! ## Architecture
//!
//! - **element**: Canonical type names and the per-type structural fact
//! - **cache**: Per-project memo of structural facts
//! - **reader**: Contract for fact readers and their factories
//! - **memory**: Instrumented in-memory fact reader
//! - **engine**: Per-project registry and the hierarchy traversals
//! - **structure**: Java declaration extraction using tree-sitter AST parsing
//! - **source**: Fact reader over source directories and source jars
//! - **scan**: Maven repository discovery of source jars
//! - **config**: Feature flag and classpath resolution
//! - **cli**: Command line definition

pub mod cache;
pub mod cli;
pub mod config;
pub mod element;
pub mod engine;
pub mod memory;
pub mod reader;
pub mod scan;
pub mod source;
pub mod structure;
