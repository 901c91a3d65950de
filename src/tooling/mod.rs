//! External tooling collaborators
//!
//! The pipeline never builds images or manages containers itself. It talks to
//! an [`ImageBuilder`] and a [`ServiceOrchestrator`]; the docker CLI backed
//! implementations live in [`docker`] and [`compose`].

pub mod compose;
pub mod docker;
pub mod error;
pub mod streaming;
pub mod types;

use async_trait::async_trait;
use std::path::Path;

pub use compose::{ComposeLogStream, ComposeOrchestrator};
pub use docker::DockerImageBuilder;
pub use error::{BuildError, OrchestrationError, StreamError};
pub use streaming::{BoxedLogStream, LogSink, LogStream, NoopSink};
pub use types::{ContainerHandle, ImageRef, LogLine, RecreateMode};

/// Builds a tagged image from a build context
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build `dockerfile` in `context` and tag the result as `tag`
    ///
    /// Building the same tag again overwrites it.
    async fn build(
        &self,
        context: &Path,
        tag: &str,
        dockerfile: &Path,
    ) -> Result<ImageRef, BuildError>;
}

/// Manages the containers of a multi-service environment
#[async_trait]
pub trait ServiceOrchestrator: Send + Sync {
    /// Start `service` on `image`, returning once the container is running
    async fn recreate(
        &self,
        service: &str,
        image: &ImageRef,
        mode: RecreateMode,
    ) -> Result<ContainerHandle, OrchestrationError>;

    /// Attach to the live output of `service`
    async fn follow_logs(&self, service: &str) -> Result<BoxedLogStream, OrchestrationError>;
}

#[async_trait]
impl<T: ImageBuilder + ?Sized> ImageBuilder for std::sync::Arc<T> {
    async fn build(
        &self,
        context: &Path,
        tag: &str,
        dockerfile: &Path,
    ) -> Result<ImageRef, BuildError> {
        (**self).build(context, tag, dockerfile).await
    }
}

#[async_trait]
impl<T: ServiceOrchestrator + ?Sized> ServiceOrchestrator for std::sync::Arc<T> {
    async fn recreate(
        &self,
        service: &str,
        image: &ImageRef,
        mode: RecreateMode,
    ) -> Result<ContainerHandle, OrchestrationError> {
        (**self).recreate(service, image, mode).await
    }

    async fn follow_logs(&self, service: &str) -> Result<BoxedLogStream, OrchestrationError> {
        (**self).follow_logs(service).await
    }
}
