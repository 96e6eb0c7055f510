use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::coordinates::ArtifactCoordinates;
use crate::error::ValidationError;
use crate::layout::provider::LayoutProvider;
use crate::storage::repository::{Repository, RepositoryPolicy};

lazy_static! {
    static ref SEMVER_REGEX: Regex = Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$"
    ).unwrap();
}

/// Everything a validator gets to see about a pending deploy
pub struct ValidationContext<'a> {
    pub repository: &'a Repository,
    pub coordinates: &'a ArtifactCoordinates,
    pub artifact_exists: bool,
}

type SupportsFn = dyn Fn(LayoutProvider) -> bool + Send + Sync;
type ValidateFn = dyn Fn(&ValidationContext) -> Result<(), ValidationError> + Send + Sync;

/// A named predicate + function pair: `supports` decides which layouts the validator applies to,
///  `validate` checks a deploy against it.
#[derive(Clone)]
pub struct ArtifactValidator {
    name: String,
    supports: Arc<SupportsFn>,
    validate: Arc<ValidateFn>,
}

impl ArtifactValidator {
    pub fn new(
        name: impl Into<String>,
        supports: impl Fn(LayoutProvider) -> bool + Send + Sync + 'static,
        validate: impl Fn(&ValidationContext) -> Result<(), ValidationError> + Send + Sync + 'static,
    ) -> ArtifactValidator {
        ArtifactValidator {
            name: name.into(),
            supports: Arc::new(supports),
            validate: Arc::new(validate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports(&self, layout: LayoutProvider) -> bool {
        (self.supports)(layout)
    }

    pub fn validate(&self, ctx: &ValidationContext) -> Result<(), ValidationError> {
        (self.validate)(ctx)
    }
}

impl Debug for ArtifactValidator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactValidator").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    validators: Vec<ArtifactValidator>,
}

impl ValidatorRegistry {
    pub fn new() -> ValidatorRegistry {
        ValidatorRegistry::default()
    }

    pub fn with_defaults() -> ValidatorRegistry {
        let mut result = ValidatorRegistry::new();
        result.register(redeployment_validator());
        result.register(maven_release_policy_validator());
        result.register(maven_snapshot_policy_validator());
        result.register(semantic_version_validator());
        result
    }

    pub fn register(&mut self, validator: ArtifactValidator) {
        self.validators.push(validator);
    }

    pub fn validators_for(&self, layout: LayoutProvider) -> impl Iterator<Item = &ArtifactValidator> {
        self.validators.iter().filter(move |v| v.supports(layout))
    }

    /// runs every validator supporting the repository's layout, in registration order; the
    ///  first rejection wins
    pub fn validate(&self, ctx: &ValidationContext) -> Result<(), ValidationError> {
        for validator in self.validators_for(ctx.repository.layout) {
            validator.validate(ctx)?;
        }
        Ok(())
    }
}

fn is_maven_snapshot(coordinates: &ArtifactCoordinates) -> bool {
    coordinates.as_maven()
        .map(|m| m.coordinates.version.is_snapshot())
        .unwrap_or(false)
}

pub fn redeployment_validator() -> ArtifactValidator {
    ArtifactValidator::new(
        "redeployment",
        |_| true,
        |ctx| {
            if ctx.artifact_exists && !ctx.repository.allows_redeployment && !is_maven_snapshot(ctx.coordinates) {
                return Err(ValidationError::new(
                    "redeployment",
                    format!("{} already exists in {} and redeployment is not allowed", ctx.coordinates, ctx.repository.qualified_id()),
                ));
            }
            Ok(())
        },
    )
}

pub fn maven_release_policy_validator() -> ArtifactValidator {
    ArtifactValidator::new(
        "maven-release-policy",
        |layout| layout == LayoutProvider::Maven,
        |ctx| {
            if ctx.repository.policy == RepositoryPolicy::Release && is_maven_snapshot(ctx.coordinates) {
                return Err(ValidationError::new(
                    "maven-release-policy",
                    format!("release repository {} does not accept snapshot {}", ctx.repository.qualified_id(), ctx.coordinates),
                ));
            }
            Ok(())
        },
    )
}

pub fn maven_snapshot_policy_validator() -> ArtifactValidator {
    ArtifactValidator::new(
        "maven-snapshot-policy",
        |layout| layout == LayoutProvider::Maven,
        |ctx| {
            if ctx.repository.policy == RepositoryPolicy::Snapshot && !is_maven_snapshot(ctx.coordinates) {
                return Err(ValidationError::new(
                    "maven-snapshot-policy",
                    format!("snapshot repository {} does not accept release {}", ctx.repository.qualified_id(), ctx.coordinates),
                ));
            }
            Ok(())
        },
    )
}

pub fn semantic_version_validator() -> ArtifactValidator {
    ArtifactValidator::new(
        "semantic-version",
        |layout| matches!(layout, LayoutProvider::Npm | LayoutProvider::Nuget),
        |ctx| {
            let version = ctx.coordinates.version().unwrap_or("");
            if !SEMVER_REGEX.is_match(version) {
                return Err(ValidationError::new("semantic-version", format!("{:?} is not a semantic version", version)));
            }
            Ok(())
        },
    )
}
