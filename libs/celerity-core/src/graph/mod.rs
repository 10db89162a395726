mod builder;
mod node;
mod validator;

pub use builder::{ModuleGraph, ModuleGraphBuilder};
pub use node::ModuleNode;
pub use validator::ModuleGraphValidator;
