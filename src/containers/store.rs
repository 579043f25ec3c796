// ABOUTME: Single source of truth for container lifecycle state
// All mutations funnel through named operations; consumers subscribe to a watch channel

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::config::{ClientConfig, CreateStrategy};
use crate::error::ClientError;
use crate::models::{
    Container, ContainerListResponse, ContainerStatus, CreatingContainer, StartResponse,
};

/// Limit used until the server reports its own.
pub const DEFAULT_CONTAINER_LIMIT: usize = 2;

/// Snapshot of everything the store knows. Derived views are recomputed
/// from the base collection on every call, never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainersState {
    pub containers: Vec<Container>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub limit: usize,
    pub creating: Option<CreatingContainer>,
}

impl Default for ContainersState {
    fn default() -> Self {
        Self {
            containers: Vec::new(),
            is_loading: false,
            error: None,
            limit: DEFAULT_CONTAINER_LIMIT,
            creating: None,
        }
    }
}

impl ContainersState {
    pub fn running(&self) -> Vec<Container> {
        self.containers
            .iter()
            .filter(|c| c.status == ContainerStatus::Running)
            .cloned()
            .collect()
    }

    pub fn stopped(&self) -> Vec<Container> {
        self.containers
            .iter()
            .filter(|c| c.status == ContainerStatus::Stopped)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.containers.len()
    }

    pub fn is_at_limit(&self) -> bool {
        self.containers.len() >= self.limit
    }

    pub fn is_creating(&self) -> bool {
        self.creating.is_some()
    }
}

/// Outcome of a successful start, including server-side identity recreation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub recreated: bool,
    pub new_id: Option<String>,
}

pub struct ContainerStore {
    pub(crate) api: ApiClient,
    pub(crate) strategy: CreateStrategy,
    state: watch::Sender<ContainersState>,
}

impl ContainerStore {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let api = ApiClient::new(config)?;
        let (state, _) = watch::channel(ContainersState::default());
        Ok(Self {
            api,
            strategy: config.create_strategy,
            state,
        })
    }

    /// Current state by value.
    pub fn snapshot(&self) -> ContainersState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes. Every mutation publishes one complete,
    /// consistent state.
    pub fn subscribe(&self) -> watch::Receiver<ContainersState> {
        self.state.subscribe()
    }

    /// Subscription as a `Stream` for callers composing with stream adapters.
    pub fn watch_stream(&self) -> WatchStream<ContainersState> {
        WatchStream::new(self.subscribe())
    }

    pub(crate) fn mutate<F: FnOnce(&mut ContainersState)>(&self, mutation: F) {
        self.state.send_modify(mutation);
    }

    /// Drop back to the initial state.
    pub fn reset(&self) {
        self.state.send_replace(ContainersState::default());
    }

    /// Fetch the container list from the backend.
    pub async fn fetch_containers(&self) -> Result<(), ClientError> {
        self.mutate(|state| {
            state.is_loading = true;
            state.error = None;
        });

        match self
            .api
            .get_json::<ContainerListResponse>("/api/containers")
            .await
        {
            Ok(list) => {
                debug!(count = list.containers.len(), limit = list.limit, "fetched containers");
                self.mutate(|state| {
                    state.containers = list.containers;
                    state.limit = list.limit;
                    state.is_loading = false;
                    state.error = None;
                });
                Ok(())
            }
            Err(err) => {
                let message = err.user_message();
                self.mutate(|state| {
                    state.is_loading = false;
                    state.error = Some(message);
                });
                Err(err)
            }
        }
    }

    /// Refresh a single container, merging the response into the existing
    /// record if present.
    pub async fn get_container(&self, id: &str) -> Result<Container, ClientError> {
        let container = self
            .api
            .get_json::<Container>(&format!("/api/containers/{id}"))
            .await?;

        self.mutate(|state| {
            if let Some(existing) = state.containers.iter_mut().find(|c| c.id == id) {
                *existing = container.clone();
            }
        });

        Ok(container)
    }

    /// Start a stopped container.
    ///
    /// Applies an optimistic busy status before the call and resolves it
    /// after: rollback to the prior status on failure, `running` on
    /// success. A `recreated` response swaps the record's id in place
    /// rather than appending a duplicate.
    pub async fn start_container(&self, id: &str) -> Result<StartOutcome, ClientError> {
        let prior = self.apply_busy_status(id);

        let response = self
            .api
            .post_empty::<StartResponse>(&format!("/api/containers/{id}/start"))
            .await;

        match response {
            Ok(response) => {
                let recreated = response.recreated && response.id != id;
                if recreated {
                    info!(old = id, new = %response.id, "container recreated on start");
                }
                let new_id = response.id.clone();
                self.mutate(|state| {
                    if let Some(container) = state.containers.iter_mut().find(|c| c.id == id) {
                        if recreated {
                            container.id = new_id.clone();
                        }
                        container.status = ContainerStatus::Running;
                    }
                });
                Ok(StartOutcome {
                    recreated,
                    new_id: recreated.then_some(response.id),
                })
            }
            Err(err) => {
                self.rollback_status(id, prior);
                Err(err)
            }
        }
    }

    /// Stop a running container, with the same optimistic transition and
    /// rollback discipline as [`start_container`](Self::start_container).
    pub async fn stop_container(&self, id: &str) -> Result<(), ClientError> {
        let prior = self.apply_busy_status(id);

        match self
            .api
            .post_empty::<serde_json::Value>(&format!("/api/containers/{id}/stop"))
            .await
        {
            Ok(_) => {
                self.update_status(id, ContainerStatus::Stopped);
                Ok(())
            }
            Err(err) => {
                self.rollback_status(id, prior);
                Err(err)
            }
        }
    }

    /// Delete a container and drop it from the collection.
    pub async fn delete_container(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete(&format!("/api/containers/{id}")).await?;
        self.mutate(|state| {
            state.containers.retain(|c| c.id != id);
        });
        Ok(())
    }

    /// Local status mutation, used when another layer (e.g. the terminal
    /// transport) observes a state change out of band.
    pub fn update_status(&self, id: &str, status: ContainerStatus) {
        self.mutate(|state| {
            if let Some(container) = state.containers.iter_mut().find(|c| c.id == id) {
                container.status = status;
            }
        });
    }

    /// Move a container to the interim busy status, returning the status it
    /// held immediately before.
    fn apply_busy_status(&self, id: &str) -> Option<ContainerStatus> {
        let mut prior = None;
        self.mutate(|state| {
            if let Some(container) = state.containers.iter_mut().find(|c| c.id == id) {
                prior = Some(container.status);
                container.status = ContainerStatus::busy();
            }
        });
        prior
    }

    fn rollback_status(&self, id: &str, prior: Option<ContainerStatus>) {
        if let Some(status) = prior {
            self.update_status(id, status);
        }
    }
}
