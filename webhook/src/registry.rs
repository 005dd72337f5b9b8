use crate::source::check_location;
use std::collections::HashMap;

/// Maps repository slugs to the location of their external config.
///
/// Built once before the listener starts and shared read-only between all
/// connections, so lookups need no synchronization.
#[derive(Debug, Default)]
pub struct Registry {
    locations: HashMap<String, String>,
}

impl Registry {
    /// Builds the registry, warning about entries that can never be served.
    ///
    /// Such entries are kept: requests for those repositories fall back to the
    /// config in the repository, the same as for an unregistered repository.
    pub fn new(locations: HashMap<String, String>) -> Self {
        for (slug, location) in &locations {
            if let Err(e) = check_location(location) {
                tracing::warn!(
                    slug = %slug,
                    location = %location,
                    error = %e,
                    "Registered config location is unusable, requests will fall back to the repository config"
                );
            }
        }

        Self { locations }
    }

    pub fn lookup(&self, slug: &str) -> Option<&str> {
        self.locations.get(slug).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

impl FromIterator<(String, String)> for Registry {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Registry::new(iter.into_iter().collect())
    }
}
