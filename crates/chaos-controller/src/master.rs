//! In-process control plane
//!
//! Wires an in-memory repository, the experiment controller and one failure
//! agent per node, and runs them until a shutdown signal.

use crate::agent::FailureAgent;
use crate::config::{load_seed, MasterConfig};
use crate::controller::{Controller, ControllerState};
use crate::error::ControllerError;
use crate::scheduler::ExperimentReconciler;
use chaos_client::{ListOptions, MemoryRepository, Repository, RepositoryListerWatcher};
use chaos_core::{downcast, Experiment, Node, SharedObject, TypeMeta, TypeRegistry};
use chaos_informer::WorkQueueInformer;
use chaos_injection::{Clock, MemoryRegistry, Registry, SystemClock};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type ControllerTask = JoinHandle<Result<(), ControllerError>>;

/// Single-process master
#[derive(Debug)]
pub struct Master {
    config: MasterConfig,
    repository: Arc<MemoryRepository>,
    registry: Arc<MemoryRegistry>,
    clock: Arc<dyn Clock>,
}

impl Master {
    /// Create a master with an empty repository and the default attacks
    #[must_use]
    pub fn new(config: MasterConfig) -> Self {
        Self {
            config,
            repository: Arc::new(MemoryRepository::new()),
            registry: Arc::new(MemoryRegistry::with_defaults()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use another clock
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Backing repository
    #[inline]
    #[must_use]
    pub fn repository(&self) -> &Arc<MemoryRepository> {
        &self.repository
    }

    /// Attack registry handed to agents
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<MemoryRegistry> {
        &self.registry
    }

    /// Store objects, filling in default failure timeouts
    ///
    /// # Errors
    /// Stops at the first object the repository rejects.
    pub async fn seed(&self, objects: Vec<SharedObject>) -> Result<usize, ControllerError> {
        let count = objects.len();
        for object in objects {
            let object = match downcast::<Experiment>(object.as_ref()) {
                Some(mut experiment) => {
                    experiment.spec.template = self.config.complete_template(experiment.spec.template);
                    Arc::new(experiment) as SharedObject
                }
                None => object,
            };
            self.repository.create(object).await?;
        }
        info!(count, "repository seeded");
        Ok(count)
    }

    /// Seed from the configured seed file, if any
    ///
    /// # Errors
    /// Propagates read, decode and create errors.
    pub async fn seed_from_config(&self) -> Result<usize, ControllerError> {
        let Some(path) = &self.config.seed_file else {
            return Ok(0);
        };
        let objects = load_seed(path, &TypeRegistry::with_defaults())?;
        self.seed(objects).await
    }

    fn informer(&self, options: ListOptions) -> WorkQueueInformer {
        let repository: Arc<dyn Repository> = self.repository.clone();
        WorkQueueInformer::new(Arc::new(RepositoryListerWatcher::new(repository)), options)
    }

    /// Run every controller until `shutdown` resolves
    ///
    /// Agents are started for the nodes present at startup.
    ///
    /// # Errors
    /// Returns the first controller error.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<(), ControllerError> {
        let repository: Arc<dyn Repository> = self.repository.clone();

        let experiments = Arc::new(
            Controller::new(
                self.informer(ListOptions::new(TypeMeta::experiment())),
                Arc::new(ExperimentReconciler::new(Arc::clone(&repository), Arc::clone(&self.clock))),
            )
            .with_workers(self.config.controller.workers),
        );
        let mut tasks: Vec<ControllerTask> = vec![spawn_controller(&experiments)];

        let mut agents = Vec::new();
        if self.config.controller.agents {
            let registry: Arc<dyn Registry> = self.registry.clone();
            let nodes = self.repository.list(&ListOptions::new(TypeMeta::node())).await?;
            for node in nodes.typed::<Node>() {
                let agent = FailureAgent::new(
                    node.id(),
                    Arc::clone(&repository),
                    Arc::clone(&registry),
                    Arc::clone(&self.clock),
                );
                let controller = Arc::new(Controller::new(
                    self.informer(agent.list_options()),
                    Arc::new(agent),
                ));
                tasks.push(spawn_controller(&controller));
                agents.push(controller);
            }
        }
        info!(agents = agents.len(), "master running");

        shutdown.await;
        info!("master shutting down");

        stop_controller(&experiments).await;
        for agent in &agents {
            stop_controller(agent).await;
        }

        let mut first_error = None;
        for task in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(ControllerError::Task(e.to_string())),
            };
            if let Err(e) = result {
                warn!(error = %e, "controller exited with error");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn spawn_controller<R: crate::Reconciler>(controller: &Arc<Controller<R>>) -> ControllerTask {
    let controller = Arc::clone(controller);
    tokio::spawn(async move { controller.run().await })
}

/// Stop a controller, waiting for a freshly spawned one to start first
async fn stop_controller<R: crate::Reconciler>(controller: &Controller<R>) {
    loop {
        match controller.state() {
            ControllerState::NotRunning => tokio::task::yield_now().await,
            ControllerState::Running => {
                if let Err(e) = controller.stop() {
                    debug!(error = %e, "controller stopped concurrently");
                }
                return;
            }
            // Already exited on its own.
            ControllerState::Stopping | ControllerState::Stopped => return,
        }
    }
}
