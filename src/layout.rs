pub mod provider;
pub mod validators;

pub use provider::{LayoutProvider, LayoutProviderRegistry, PathKind};
pub use validators::{ArtifactValidator, ValidationContext, ValidatorRegistry};
