use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use crate::errors::DriverError;
use crate::result::processors::{
    AsyncPage, AsyncPageProcessor, AsyncPrepared, AsyncPreparedProcessor, Blocking,
    BlockingPrepared, BlockingProcessor, Spawned, SpawnedProcessor,
};
use crate::result::{ResultProcessor, ResultShape};

struct Registered {
    name: &'static str,
    // Always an `Arc<dyn ResultProcessor<S>>` for the shape keyed by this entry.
    processor: Box<dyn Any + Send + Sync>,
}

/// Maps result shapes to the processor that produces them.
///
/// Populated during initialization, then frozen behind an `Arc`; lookups
/// never take a lock. Extensions add representations by registering their own
/// marker type.
#[derive(Default)]
pub struct ResultShapeRegistry {
    processors: HashMap<TypeId, Registered>,
}

impl ResultShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in shapes, using `runtime` for the ones that
    /// block or spawn.
    pub fn with_defaults(runtime: Handle) -> Self {
        let mut registry = Self::new();
        let blocking = Arc::new(BlockingProcessor::new(runtime.clone()));
        registry.insert::<Blocking>(blocking.clone());
        registry.insert::<BlockingPrepared>(blocking);
        registry.insert::<AsyncPage>(Arc::new(AsyncPageProcessor));
        registry.insert::<AsyncPrepared>(Arc::new(AsyncPreparedProcessor));
        registry.insert::<Spawned>(Arc::new(SpawnedProcessor::new(runtime)));
        registry
    }

    /// Register the processor for shape `S`. Each shape takes exactly one processor.
    pub fn register<S, P>(&mut self, processor: P) -> Result<(), DriverError>
    where
        S: ResultShape,
        P: ResultProcessor<S> + 'static,
    {
        if self.contains::<S>() {
            return Err(DriverError::Config(format!(
                "a result processor is already registered for shape `{}`",
                S::NAME
            )));
        }
        info!("Registering result processor for shape `{}`", S::NAME);
        self.insert::<S>(Arc::new(processor));
        Ok(())
    }

    fn insert<S: ResultShape>(&mut self, processor: Arc<dyn ResultProcessor<S>>) {
        self.processors.insert(
            TypeId::of::<S>(),
            Registered {
                name: S::NAME,
                processor: Box::new(processor),
            },
        );
    }

    pub fn lookup<S: ResultShape>(&self) -> Option<Arc<dyn ResultProcessor<S>>> {
        self.processors
            .get(&TypeId::of::<S>())
            .and_then(|entry| entry.processor.downcast_ref::<Arc<dyn ResultProcessor<S>>>())
            .cloned()
    }

    pub fn contains<S: ResultShape>(&self) -> bool {
        self.processors.contains_key(&TypeId::of::<S>())
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn shape_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.processors.values().map(|entry| entry.name).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ResultShapeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultShapeRegistry")
            .field("shapes", &self.shape_names())
            .finish()
    }
}
