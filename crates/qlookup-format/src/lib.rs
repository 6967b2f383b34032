//! Attribute projection: compiles `label:parser:path` specs and applies them to
//! result rows to build summary tags and detail documents.

pub mod attributes;
pub mod document;
pub mod parse;
pub mod path;
pub mod project;

pub use attributes::{compile, AttributeParser, AttributeSpec, SpecCache};
pub use document::{DetailAttribute, DetailDocument};
pub use parse::parse_attribute;
pub use project::{Details, Projector};
