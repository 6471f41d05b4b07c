//! Read side: turns cached snapshots into fully-populated profiles for responses.

use futures::future::join_all;
use serde::de::Error as _;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::{
    domain::{entities::PlatformProfile, types::Platform},
    infra::store::{ProfileStore, StoreError},
};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("no cached snapshot for {platform}")]
    Unavailable {
        platform: Platform,
        #[source]
        source: StoreError,
    },
    #[error("cached snapshot for {platform} does not match the profile schema")]
    Corrupt {
        platform: Platform,
        #[source]
        source: serde_json::Error,
    },
}

impl ProfileError {
    pub fn platform(&self) -> Platform {
        match self {
            Self::Unavailable { platform, .. } | Self::Corrupt { platform, .. } => *platform,
        }
    }
}

/// Result of loading every platform at once.
#[derive(Debug, Default)]
pub struct AllProfiles {
    pub loaded: Vec<(Platform, PlatformProfile)>,
    /// Platforms whose snapshot could not be served, in canonical order.
    pub failed: Vec<Platform>,
}

impl AllProfiles {
    pub fn get(&self, platform: Platform) -> Option<&PlatformProfile> {
        self.loaded
            .iter()
            .find(|(candidate, _)| *candidate == platform)
            .map(|(_, profile)| profile)
    }

    pub fn all_failed(&self) -> bool {
        self.loaded.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ProfileFormatter {
    store: ProfileStore,
    handles: [(Platform, String); 4],
}

impl ProfileFormatter {
    /// `handle_for` supplies the seed handle used when a snapshot omits one.
    pub fn new(store: ProfileStore, handle_for: impl Fn(Platform) -> String) -> Self {
        let handles = Platform::ALL.map(|platform| (platform, handle_for(platform)));
        Self { store, handles }
    }

    fn seed_handle(&self, platform: Platform) -> &str {
        self.handles
            .iter()
            .find(|(candidate, _)| *candidate == platform)
            .map(|(_, handle)| handle.as_str())
            .unwrap_or_default()
    }

    /// Cached snapshot merged over the platform's seed record.
    pub async fn load(&self, platform: Platform) -> Result<PlatformProfile, ProfileError> {
        let cached = self
            .store
            .read_value(platform)
            .await
            .map_err(|source| ProfileError::Unavailable { platform, source })?;
        ensure_snapshot_shape(&cached)
            .map_err(|source| ProfileError::Corrupt { platform, source })?;

        let seed = PlatformProfile::seed_for(platform, self.seed_handle(platform));
        let mut merged = serde_json::to_value(&seed)
            .map_err(|source| ProfileError::Corrupt { platform, source })?;
        deep_merge(&mut merged, cached);

        serde_json::from_value(merged).map_err(|source| ProfileError::Corrupt { platform, source })
    }

    /// Load all four platforms concurrently; failures are logged and collected.
    pub async fn load_all(&self) -> AllProfiles {
        let results = join_all(Platform::ALL.map(|platform| self.load(platform))).await;

        let mut all = AllProfiles::default();
        for (platform, result) in Platform::ALL.into_iter().zip(results) {
            match result {
                Ok(profile) => all.loaded.push((platform, profile)),
                Err(err) => {
                    warn!(
                        target = "codefolio::profiles",
                        platform = platform.as_str(),
                        error = %err,
                        "snapshot unavailable"
                    );
                    all.failed.push(platform);
                }
            }
        }
        all
    }
}

/// A snapshot must be an object stamped by the writer; anything else would serve the bare seed.
fn ensure_snapshot_shape(cached: &Value) -> Result<(), serde_json::Error> {
    let Some(object) = cached.as_object() else {
        return Err(serde_json::Error::custom("snapshot is not a JSON object"));
    };
    match object.get("lastUpdated") {
        Some(Value::String(_)) => Ok(()),
        _ => Err(serde_json::Error::custom("snapshot has no lastUpdated timestamp")),
    }
}

/// Merge `overlay` into `base`: objects merge key by key, anything else replaces.
///
/// A `null` in the overlay leaves the base value in place.
pub(crate) fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (slot, value) => *slot = value,
    }
}
