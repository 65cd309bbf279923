//! Content providers and their registry.
//!
//! A provider turns an opaque content id into browsable metadata and, for
//! playback, into candidate streaming links. Exactly one provider is active
//! at a time; switching is explicit and there is no automatic fallback to
//! another provider on failure, so error causes stay visible to the caller.

pub mod normalize;
pub mod streamvault;
pub mod tmdb;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::ScraperError;
use crate::models::{Carousel, Content, ExtractedLink, MediaType, SearchPage};

pub use streamvault::StreamVaultProvider;
pub use tmdb::TmdbProvider;

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    fn base_url(&self) -> String;

    fn supported_types(&self) -> &[MediaType];

    /// Home-screen carousels. Optional capability; providers without a
    /// browsable front page keep the default empty result.
    async fn fetch_home(&self) -> Result<Vec<Carousel>, ScraperError> {
        Ok(Vec::new())
    }

    async fn search(&self, query: &str, page: u32) -> Result<SearchPage, ScraperError>;

    async fn fetch_details(&self, id: &str, media_type: MediaType)
    -> Result<Content, ScraperError>;

    /// Candidate links for playback. Episodic types need both `season` and
    /// `episode`; callers guard this, providers may re-check.
    async fn streaming_links(
        &self,
        content_id: &str,
        media_type: MediaType,
        season: Option<&str>,
        episode: Option<&str>,
    ) -> Result<Vec<ExtractedLink>, ScraperError>;
}

/// Holds every registered provider and tracks the active one.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
    by_name: HashMap<&'static str, Arc<dyn Provider>>,
    active: RwLock<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Builds the registry from an ordered provider list.
    ///
    /// # Errors
    ///
    /// Fails when `providers` is empty or `active` names none of them.
    pub fn new(providers: Vec<Arc<dyn Provider>>, active: &str) -> Result<Self, ScraperError> {
        if providers.is_empty() {
            return Err(ScraperError::InvalidConfiguration(
                "no providers registered".to_string(),
            ));
        }

        let mut by_name = HashMap::new();
        for provider in &providers {
            by_name.insert(provider.name(), provider.clone());
        }

        let initial = by_name.get(active).cloned().ok_or_else(|| {
            ScraperError::InvalidConfiguration(format!("unknown provider: {active}"))
        })?;

        Ok(Self {
            providers,
            by_name,
            active: RwLock::new(initial),
        })
    }

    /// Registration order, as shown in provider listings.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.by_name.get(name).cloned()
    }

    /// The provider all browse/resolve calls currently go to.
    pub async fn active(&self) -> Arc<dyn Provider> {
        self.active.read().await.clone()
    }

    pub async fn active_name(&self) -> &'static str {
        self.active.read().await.name()
    }

    /// Switches the active provider. The swap is atomic: concurrent readers
    /// see either the old or the new provider, never an in-between.
    pub async fn set_active(&self, name: &str) -> Result<(), ScraperError> {
        let provider = self.get(name).ok_or_else(|| {
            ScraperError::InvalidConfiguration(format!("unknown provider: {name}"))
        })?;

        *self.active.write().await = provider;
        tracing::info!(provider = name, "active provider changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProvider {
        name: &'static str,
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn base_url(&self) -> String {
            format!("https://{}.example", self.name)
        }

        fn supported_types(&self) -> &[MediaType] {
            &[MediaType::Movie]
        }

        async fn search(&self, _query: &str, page: u32) -> Result<SearchPage, ScraperError> {
            Ok(SearchPage {
                items: Vec::new(),
                page,
                total_pages: 0,
                total_results: 0,
            })
        }

        async fn fetch_details(
            &self,
            id: &str,
            _media_type: MediaType,
        ) -> Result<Content, ScraperError> {
            Err(ScraperError::ContentNotFound(id.to_string()))
        }

        async fn streaming_links(
            &self,
            _content_id: &str,
            _media_type: MediaType,
            _season: Option<&str>,
            _episode: Option<&str>,
        ) -> Result<Vec<ExtractedLink>, ScraperError> {
            Ok(Vec::new())
        }
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(
            vec![
                Arc::new(FakeProvider { name: "alpha" }),
                Arc::new(FakeProvider { name: "beta" }),
            ],
            "alpha",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn default_home_is_empty() {
        let provider = FakeProvider { name: "alpha" };
        assert!(provider.fetch_home().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn switching_active_provider() {
        let registry = registry();
        assert_eq!(registry.active_name().await, "alpha");

        registry.set_active("beta").await.unwrap();
        assert_eq!(registry.active_name().await, "beta");

        let err = registry.set_active("gamma").await.unwrap_err();
        assert!(matches!(err, ScraperError::InvalidConfiguration(_)));
        assert_eq!(registry.active_name().await, "beta");
    }

    #[test]
    fn rejects_unknown_initial_provider() {
        let result = ProviderRegistry::new(vec![Arc::new(FakeProvider { name: "alpha" })], "nope");
        assert!(result.is_err());
    }

    #[test]
    fn names_preserve_registration_order() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["alpha", "beta"]);
    }
}
