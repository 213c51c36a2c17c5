pub mod events;
pub mod model;

#[cfg(test)]
mod tests;

pub use events::{ModelChange, WorkspaceProperty};
pub use model::{ModelState, ModelValidationInfo, WorkspaceModel, WorkspaceServices};
