// ABOUTME: Creation Orchestrator driving the create-container workflow
// Selects the streaming progress protocol or the single-shot fallback per configuration

use chrono::Utc;
use futures_util::StreamExt;
use tracing::{info, warn};

use crate::config::CreateStrategy;
use crate::models::{
    Container, ContainerStatus, CreateContainerRequest, CreatingContainer, ProgressEvent,
};

use super::progress::ProgressStreamParser;
use super::store::ContainerStore;

/// Second creation attempted while one is pending.
pub const IN_FLIGHT_MESSAGE: &str = "A container creation is already in progress";
/// Stream dropped before a terminal event arrived.
pub const STREAM_LOST_MESSAGE: &str = "Connection lost while creating container";

/// Events delivered to the creation handler. `Complete` and `Failed` are
/// terminal; exactly one of them fires per creation.
#[derive(Debug, Clone)]
pub enum CreateEvent {
    Progress(ProgressEvent),
    Complete(Container),
    Failed(String),
}

impl ContainerStore {
    /// Create a container, reporting progress through `on_event`.
    ///
    /// The wire strategy (streaming SSE vs. single request) comes from the
    /// client configuration and is invisible to the caller. Only one
    /// creation may be in flight per store: the progress protocol carries
    /// no request identifier, so a second stream would misattribute
    /// events. A concurrent call fails immediately without touching the
    /// in-flight creation.
    pub async fn create_container<F>(
        &self,
        name: &str,
        image: &str,
        custom_image: Option<&str>,
        mut on_event: F,
    ) where
        F: FnMut(CreateEvent),
    {
        let mut claimed = false;
        self.mutate(|state| {
            if state.creating.is_none() {
                state.creating = Some(CreatingContainer::new(name, image));
                claimed = true;
            }
        });
        if !claimed {
            warn!(name, "rejected concurrent container creation");
            on_event(CreateEvent::Failed(IN_FLIGHT_MESSAGE.to_string()));
            return;
        }

        let request = CreateContainerRequest::new(name, image, custom_image);
        match self.strategy {
            CreateStrategy::Streaming => self.create_streaming(&request, &mut on_event).await,
            CreateStrategy::Fallback => self.create_fallback(&request, &mut on_event).await,
        }
    }

    /// Single request/response creation for deployments where proxies
    /// buffer SSE. Synthesizes the progress events the stream would carry.
    async fn create_fallback<F>(&self, request: &CreateContainerRequest, on_event: &mut F)
    where
        F: FnMut(CreateEvent),
    {
        let event = ProgressEvent {
            stage: "creating".to_string(),
            message: "Creating container (this may take a moment)...".to_string(),
            progress: 10,
            ..ProgressEvent::default()
        };
        self.apply_progress(&event);
        on_event(CreateEvent::Progress(event));

        match self
            .api
            .post_json::<Container, _>("/api/containers", request)
            .await
        {
            Ok(container) => {
                info!(id = %container.id, name = %container.name, "container created");
                self.publish_created(container.clone());
                let done = ProgressEvent {
                    stage: "ready".to_string(),
                    message: "Terminal ready!".to_string(),
                    progress: 100,
                    complete: true,
                    container_id: Some(container.id.clone()),
                    ..ProgressEvent::default()
                };
                on_event(CreateEvent::Progress(done));
                on_event(CreateEvent::Complete(container));
            }
            Err(err) => {
                warn!("container creation failed: {err}");
                self.clear_creating();
                on_event(CreateEvent::Failed(err.user_message()));
            }
        }
    }

    /// Streaming creation over the SSE progress protocol.
    async fn create_streaming<F>(&self, request: &CreateContainerRequest, on_event: &mut F)
    where
        F: FnMut(CreateEvent),
    {
        let response = match self
            .api
            .post_stream("/api/containers/stream", request)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("container creation failed: {err}");
                self.clear_creating();
                on_event(CreateEvent::Failed(err.user_message()));
                return;
            }
        };

        let mut stream = response.bytes_stream();
        let mut parser = ProgressStreamParser::default();
        let mut completed = false;

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in parser.feed(&bytes) {
                        self.handle_progress_event(event, request, on_event, &mut completed);
                    }
                }
                Err(err) => {
                    warn!("progress stream read failed: {err}");
                    if !completed {
                        completed = true;
                        self.clear_creating();
                        on_event(CreateEvent::Failed(STREAM_LOST_MESSAGE.to_string()));
                    }
                    return;
                }
            }
        }

        for event in parser.finish() {
            self.handle_progress_event(event, request, on_event, &mut completed);
        }

        if !completed {
            self.clear_creating();
            on_event(CreateEvent::Failed(STREAM_LOST_MESSAGE.to_string()));
        }
    }

    /// Apply one progress event: update the transient record, notify, and
    /// process a terminal event at most once per creation.
    fn handle_progress_event<F>(
        &self,
        event: ProgressEvent,
        request: &CreateContainerRequest,
        on_event: &mut F,
        completed: &mut bool,
    ) where
        F: FnMut(CreateEvent),
    {
        if *completed {
            return;
        }

        self.apply_progress(&event);
        on_event(CreateEvent::Progress(event.clone()));

        if let Some(error) = event.error.filter(|e| !e.is_empty()) {
            *completed = true;
            self.clear_creating();
            on_event(CreateEvent::Failed(error));
            return;
        }

        if event.complete {
            if let Some(container_id) = event.container_id {
                *completed = true;
                let container = Container {
                    id: container_id,
                    name: request.name.clone(),
                    image: request.image.clone(),
                    status: ContainerStatus::Running,
                    created_at: Utc::now(),
                    ip_address: None,
                };
                info!(id = %container.id, name = %container.name, "container created");
                self.publish_created(container.clone());
                on_event(CreateEvent::Complete(container));
            }
        }
    }

    fn apply_progress(&self, event: &ProgressEvent) {
        self.mutate(|state| {
            if let Some(creating) = state.creating.as_mut() {
                creating.progress = event.progress;
                creating.message = event.message.clone();
                creating.stage = event.stage.clone();
            }
        });
    }

    /// Publish the finished container at the front of the list and clear
    /// the transient creating slot in one state transition.
    fn publish_created(&self, container: Container) {
        self.mutate(|state| {
            state.containers.insert(0, container);
            state.creating = None;
            state.is_loading = false;
        });
    }

    fn clear_creating(&self) {
        self.mutate(|state| {
            state.creating = None;
            state.is_loading = false;
        });
    }
}
