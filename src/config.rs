// ABOUTME: Client configuration for the Rexec backend connection
// Holds the base URL, bearer credential, and container-creation strategy

/// How `create_container` talks to the backend.
///
/// The streaming protocol reports granular progress over SSE; the fallback
/// is a single request/response for deployments where a proxy buffers or
/// blocks event streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateStrategy {
    #[default]
    Streaming,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub create_strategy: CreateStrategy,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            token: None,
            create_strategy: CreateStrategy::default(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_strategy(mut self, strategy: CreateStrategy) -> Self {
        self.create_strategy = strategy;
        self
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
