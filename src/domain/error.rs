use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("unknown platform `{slug}`")]
    UnknownPlatform { slug: String },
}

impl DomainError {
    pub fn unknown_platform(slug: impl Into<String>) -> Self {
        Self::UnknownPlatform { slug: slug.into() }
    }
}
