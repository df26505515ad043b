//! Daemon bootstrap and lifecycle.
//!
//! [`bootstrap_with`] loads configuration, installs telemetry, prepares the
//! socket directory and builds the router from an [`ActionCatalogue`].
//! [`Daemon::start`] then binds the socket and starts the poll scheduler;
//! [`Daemon::run`] additionally blocks until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::info;

use courier_config::{Config, SocketPreparationError};

use crate::actions::SampleCatalogue;
use crate::dispatch::{CourierConnectionHandler, ErrorPolicy, Router, RouterSettings};
use crate::poll::{EventBroadcaster, PollError, PollJob, PollScheduler, SchedulerHandle};
use crate::registry::{ActionRegistry, RegistryError};
use crate::session::{InMemorySessionStore, SessionStore};
use crate::shutdown::{PROCESS_TARGET, ShutdownError, ShutdownSignal, SystemShutdownSignal};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

/// Loads the daemon configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when no valid configuration results.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// The methods a daemon exposes.
pub trait ActionCatalogue: Send + Sync {
    /// Registers every exposed method.
    ///
    /// # Errors
    ///
    /// Propagates registration failures.
    fn register(&self, registry: &mut ActionRegistry) -> Result<(), RegistryError>;

    /// Poll jobs to schedule at startup.
    fn poll_jobs(&self) -> Vec<PollJob> {
        Vec::new()
    }

    /// Adds exception message mappings to the configured policy.
    fn error_policy(&self, policy: ErrorPolicy) -> ErrorPolicy {
        policy
    }
}

/// Errors surfaced while bringing the daemon up or down.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare daemon socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// A method could not be registered.
    #[error("failed to register methods: {source}")]
    Registry {
        /// Underlying registration error.
        #[source]
        source: RegistryError,
    },
    /// The socket listener failed.
    #[error("socket listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// The poll scheduler failed.
    #[error("poll scheduler failed: {source}")]
    Poll {
        /// Underlying scheduler error.
        #[source]
        source: PollError,
    },
    /// Waiting for the shutdown signal failed.
    #[error("failed to wait for shutdown: {source}")]
    Shutdown {
        /// Underlying signal error.
        #[source]
        source: ShutdownError,
    },
}

/// A bootstrapped daemon that is not yet serving.
#[derive(Debug)]
pub struct Daemon {
    config: Config,
    router: Router,
    jobs: Vec<PollJob>,
    events: Arc<EventBroadcaster>,
    telemetry: TelemetryHandle,
}

impl Daemon {
    /// Resolved configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Router serving the registered methods.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Jobs the scheduler will run.
    pub fn poll_jobs(&self) -> &[PollJob] {
        &self.jobs
    }

    /// Telemetry handle, mainly for tests.
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Binds the socket and starts serving and polling.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Listener`] or [`BootstrapError::Poll`]
    /// when either background service cannot start.
    pub fn start(self) -> Result<RunningDaemon, BootstrapError> {
        let listener = SocketListener::bind(self.config.listen())
            .map_err(|source| BootstrapError::Listener { source })?;
        let local_addr = listener.local_addr();

        let mut scheduler = PollScheduler::new(self.router.clone(), self.events.clone());
        for job in self.jobs {
            scheduler.add(job);
        }
        let scheduler = scheduler
            .start()
            .map_err(|source| BootstrapError::Poll { source })?;

        let handler = Arc::new(CourierConnectionHandler::new(
            self.router,
            self.events,
            self.config.router_url(),
        ));
        let listener = listener
            .start(handler)
            .map_err(|source| BootstrapError::Listener { source })?;

        info!(
            target: PROCESS_TARGET,
            endpoint = %self.config.listen(),
            "daemon ready"
        );
        Ok(RunningDaemon {
            listener,
            scheduler,
            local_addr,
        })
    }

    /// Serves until `shutdown` fires, then stops cleanly.
    ///
    /// # Errors
    ///
    /// Returns the first failure among startup, waiting and teardown.
    pub fn run(self, shutdown: &dyn ShutdownSignal) -> Result<(), BootstrapError> {
        let running = self.start()?;
        let waited = shutdown
            .wait()
            .map_err(|source| BootstrapError::Shutdown { source });
        let stopped = running.stop();
        waited.and(stopped)
    }
}

/// A daemon that is serving.
#[derive(Debug)]
pub struct RunningDaemon {
    listener: ListenerHandle,
    scheduler: SchedulerHandle,
    local_addr: Option<SocketAddr>,
}

impl RunningDaemon {
    /// TCP address being served; `None` on a Unix socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stops polling and accepting, removing the Unix socket.
    ///
    /// # Errors
    ///
    /// Returns an error if a background thread panicked.
    pub fn stop(self) -> Result<(), BootstrapError> {
        self.scheduler.shutdown();
        self.listener.shutdown();
        let polled = self
            .scheduler
            .join()
            .map_err(|source| BootstrapError::Poll { source });
        let listened = self
            .listener
            .join()
            .map_err(|source| BootstrapError::Listener { source });
        info!(target: PROCESS_TARGET, "shutdown sequence completed");
        polled.and(listened)
    }
}

/// Bootstraps the daemon with the supplied collaborators.
///
/// # Errors
///
/// Returns a [`BootstrapError`] naming the first step that failed.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    catalogue: &dyn ActionCatalogue,
    sessions: Arc<dyn SessionStore>,
) -> Result<Daemon, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    config
        .listen()
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;

    let mut registry = ActionRegistry::new();
    catalogue
        .register(&mut registry)
        .map_err(|source| BootstrapError::Registry { source })?;
    info!(
        target: PROCESS_TARGET,
        methods = registry.len(),
        "methods registered"
    );

    let policy = catalogue.error_policy(ErrorPolicy::from_config(&config));
    let router = Router::new(registry, sessions, policy, RouterSettings::from_config(&config));
    Ok(Daemon {
        jobs: catalogue.poll_jobs(),
        config,
        router,
        events: Arc::new(EventBroadcaster::new()),
        telemetry,
    })
}

/// Runs the daemon with the system configuration and the sample methods
/// until a termination signal arrives.
///
/// # Errors
///
/// Returns a [`BootstrapError`] when startup or shutdown fails.
pub fn run_daemon() -> Result<(), BootstrapError> {
    let daemon = bootstrap_with(
        &SystemConfigLoader,
        &SampleCatalogue,
        Arc::new(InMemorySessionStore::new()),
    )?;
    daemon.run(&SystemShutdownSignal)
}
