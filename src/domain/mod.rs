//! Domain layer: the structure tree and its JSON mapping
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod entities;
pub mod error;
pub mod invariants;
pub mod json;
pub mod model;
pub mod provider;
pub mod tree_traits;
pub mod url;

pub use arena::{TreeArena, TreeIterator};
pub use entities::*;
pub use error::{TreeError, TreeResult};
pub use generational_arena::Index;
pub use json::NodeJson;
pub use model::{IdFilter, TreeModel};
pub use provider::{
    localized, set_localized, AnyProvider, GenericProvider, NameResolver, NodeFactory, NoResolver,
    ProviderKind, ReportStructureProvider, TestGuideProvider,
};
pub use tree_traits::TreeNodeConvert;
