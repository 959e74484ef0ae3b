//! Sources file: the endpoint list and optional custom mapping profiles.
//!
//! ```json
//! {
//!   "sources": [
//!     {"name": "ANZ", "kind": "cdr_api", "url": "https://api.anz/cds-au/v1/banking/products", "version": "3"}
//!   ],
//!   "profiles": []
//! }
//! ```

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{MappingProfile, ProfileRegistry, SourceSpec};
use crate::error::AppError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub profiles: Vec<MappingProfile>,
}

pub fn read_sources_file(path: &Path) -> Result<SourcesFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open sources file '{}': {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::config(format!("Invalid sources file '{}': {e}", path.display())))
}

/// Check a source list against the available profiles.
///
/// Rules:
/// - names are non-empty and unique
/// - URLs are http(s)
/// - every active source names a known profile
pub fn validate_sources(sources: &[SourceSpec], profiles: &ProfileRegistry) -> Result<(), AppError> {
    let mut names = HashSet::new();
    for spec in sources {
        if spec.name.trim().is_empty() {
            return Err(AppError::config(format!("Source with URL '{}' has no name.", spec.url)));
        }
        if !names.insert(spec.name.as_str()) {
            return Err(AppError::config(format!("Duplicate source name '{}'.", spec.name)));
        }
        if !(spec.url.starts_with("https://") || spec.url.starts_with("http://")) {
            return Err(AppError::config(format!("Source '{}' has an invalid URL '{}'.", spec.name, spec.url)));
        }
        if spec.active && profiles.get(spec.profile_name()).is_none() {
            return Err(AppError::config(format!(
                "Source '{}' uses unknown mapping profile '{}'.",
                spec.name,
                spec.profile_name()
            )));
        }
    }
    Ok(())
}
