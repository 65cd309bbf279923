use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::downloads::{DownloadEngine, EngineHandle, JsonFileStore};
use crate::events::EventBus;
use crate::extractors::{
    ExtractorRegistry, FileMoonExtractor, StreamTapeExtractor, VidCloudExtractor,
};
use crate::net::{RequestEngine, build_shared_http_client, build_transfer_http_client};
use crate::providers::streamvault::StreamVaultProvider;
use crate::providers::tmdb::TmdbProvider;
use crate::providers::{Provider, ProviderRegistry};
use crate::resolver::LinkResolver;

/// Everything the API handlers and CLI commands share.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    pub providers: Arc<ProviderRegistry>,

    pub extractors: Arc<ExtractorRegistry>,

    pub resolver: Arc<LinkResolver>,

    pub engine: EngineHandle,

    pub event_bus: EventBus,
}

impl AppState {
    /// Wires every service from the config. The returned engine is not yet
    /// running: the daemon spawns `engine.run()`, one-shot CLI reads drop it
    /// and only use the catalog side of the state.
    pub fn build(config: Config) -> anyhow::Result<(Arc<Self>, DownloadEngine)> {
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size);
        Self::build_with_event_bus(config, event_bus)
    }

    pub fn build_with_event_bus(
        config: Config,
        event_bus: EventBus,
    ) -> anyhow::Result<(Arc<Self>, DownloadEngine)> {
        // One pooled client behind every catalog and embed request.
        let http_client = build_shared_http_client(&config.network)?;
        let request_engine = RequestEngine::new(http_client, &config.network);

        let tmdb = Arc::new(TmdbProvider::new(
            request_engine.clone(),
            &config.providers.tmdb,
        ));
        let streamvault = Arc::new(StreamVaultProvider::new(
            request_engine.clone(),
            &config.providers.streamvault,
        ));
        let providers = Arc::new(ProviderRegistry::new(
            vec![tmdb as Arc<dyn Provider>, streamvault],
            &config.providers.active,
        )?);

        // Registration order is resolution priority when domains overlap.
        let mut extractors = ExtractorRegistry::new();
        extractors.register(Arc::new(VidCloudExtractor::new(request_engine.clone())));
        extractors.register(Arc::new(FileMoonExtractor::new(request_engine.clone())));
        extractors.register(Arc::new(StreamTapeExtractor::new(request_engine)));
        let extractors = Arc::new(extractors);

        let resolver = Arc::new(LinkResolver::new(providers.clone(), extractors.clone()));

        let store = Arc::new(JsonFileStore::new(config.store_path()));
        let transfer_client = build_transfer_http_client(&config.network)?;
        let (engine, handle) =
            DownloadEngine::new(store, transfer_client, &config, event_bus.clone());

        let state = Arc::new(Self {
            config,
            providers,
            extractors,
            resolver,
            engine: handle,
            event_bus,
        });

        Ok((state, engine))
    }
}
