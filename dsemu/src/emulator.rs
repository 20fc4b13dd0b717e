//! Emulator lifecycle controller
//!
//! [`Emulator`] either attaches to an instance advertised in the
//! environment or spawns and owns a new one, waits until it answers its
//! health probe, publishes the connection for the client library and tears
//! everything down on release.

use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Instant};

use crate::config::EmulatorConfig;
use crate::env::{self, PublishMode, PublishedEnv};
use crate::error::{EmulatorError, EmulatorResult};
use crate::services::{CommandLauncher, HttpConnector};
use crate::state::{OwnershipMode, Readiness};
use crate::traits::{ControlConnector, ControlEndpoint, EmulatorProcess, ProcessLauncher};
use shared::{component_debug, component_info, component_warn, env_vars, ComponentId, ConnectionInfo};

/// Process ownership, decided once during acquisition
enum Ownership {
    Owned(Box<dyn EmulatorProcess>),
    Attached,
}

impl Ownership {
    fn mode(&self) -> OwnershipMode {
        match self {
            Ownership::Owned(_) => OwnershipMode::Owned,
            Ownership::Attached => OwnershipMode::Attached,
        }
    }
}

struct Acquisition {
    connection: ConnectionInfo,
    ownership: Ownership,
    readiness: Readiness,
    endpoint: Arc<dyn ControlEndpoint>,
    published: PublishedEnv,
    /// Shared with every handle so they stop working once released
    released: Arc<AtomicBool>,
}

enum Lifecycle {
    Idle,
    Acquired(Acquisition),
    /// Acquisition failed; anything it started has already been torn down
    Failed,
    Released,
}

/// Controller for a single emulator acquisition.
///
/// Controllers are single-use: `acquire` succeeds at most once and any
/// further call is a usage error. `release` is idempotent and runs
/// implicitly (best-effort, synchronous kill) if the controller is dropped
/// while still holding an owned process.
pub struct Emulator {
    config: EmulatorConfig,
    connector: Arc<dyn ControlConnector>,
    launcher: Arc<dyn ProcessLauncher>,
    state: Lifecycle,
}

impl Emulator {
    /// Create an idle controller that talks HTTP to the emulator
    pub fn new(config: EmulatorConfig) -> Self {
        let connector = Arc::new(HttpConnector::new(config.control_paths.clone()));
        Self::with_connector(config, connector)
    }

    /// Create an idle controller using `connector` for control traffic
    pub fn with_connector(config: EmulatorConfig, connector: Arc<dyn ControlConnector>) -> Self {
        Self::with_services(config, connector, Arc::new(CommandLauncher))
    }

    pub fn with_services(
        config: EmulatorConfig,
        connector: Arc<dyn ControlConnector>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            config,
            connector,
            launcher,
            state: Lifecycle::Idle,
        }
    }

    /// Create a controller and acquire an emulator in one step
    pub async fn start(config: EmulatorConfig) -> EmulatorResult<Self> {
        let mut emulator = Self::new(config);
        emulator.acquire().await?;
        Ok(emulator)
    }

    /// Acquire, run `body`, and release exactly once, whether `body`
    /// completes or panics. Panics are resumed after release.
    pub async fn scoped<F, Fut, T>(config: EmulatorConfig, body: F) -> EmulatorResult<T>
    where
        F: FnOnce(EmulatorHandle) -> Fut,
        Fut: Future<Output = T>,
    {
        Self::new(config).run(body).await
    }

    /// [`Emulator::scoped`] for an already constructed controller
    pub async fn run<F, Fut, T>(mut self, body: F) -> EmulatorResult<T>
    where
        F: FnOnce(EmulatorHandle) -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire().await?;
        let handle = self
            .handle()
            .ok_or_else(|| EmulatorError::usage("emulator not acquired"))?;

        let outcome = AssertUnwindSafe(async move { body(handle).await })
            .catch_unwind()
            .await;

        self.release().await;

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Attach to an advertised emulator or spawn a new one and wait until it
    /// is ready. On failure everything started so far is torn down before
    /// the error is returned.
    pub async fn acquire(&mut self) -> EmulatorResult<ConnectionInfo> {
        if !matches!(self.state, Lifecycle::Idle) {
            return Err(EmulatorError::usage(
                "acquire called more than once on the same emulator controller",
            ));
        }

        match self.establish().await {
            Ok(acquisition) => {
                let connection = acquisition.connection.clone();
                component_info!(
                    ComponentId::Controller,
                    "✅ Emulator {} ({})",
                    connection,
                    acquisition.ownership.mode()
                );
                self.state = Lifecycle::Acquired(acquisition);
                Ok(connection)
            }
            Err(e) => {
                self.state = Lifecycle::Failed;
                Err(e)
            }
        }
    }

    /// Tear down the acquisition. Owned processes are asked to shut down and
    /// then terminated; attached instances are left running. Published
    /// environment variables are restored either way. Idempotent.
    pub async fn release(&mut self) {
        match std::mem::replace(&mut self.state, Lifecycle::Released) {
            Lifecycle::Acquired(acquisition) => self.teardown(acquisition).await,
            Lifecycle::Released => {}
            Lifecycle::Idle => self.state = Lifecycle::Idle,
            Lifecycle::Failed => self.state = Lifecycle::Failed,
        }
    }

    /// Clear all emulator data. Only valid once the emulator is ready.
    pub async fn reset(&self) -> EmulatorResult<()> {
        match &self.state {
            Lifecycle::Acquired(acquisition) if acquisition.readiness == Readiness::Ready => {
                acquisition.endpoint.reset().await
            }
            _ => Err(EmulatorError::usage("reset requires an acquired, ready emulator")),
        }
    }

    /// Connection of the acquired emulator
    pub fn connection(&self) -> Option<&ConnectionInfo> {
        match &self.state {
            Lifecycle::Acquired(acquisition) => Some(&acquisition.connection),
            _ => None,
        }
    }

    pub fn ownership_mode(&self) -> Option<OwnershipMode> {
        match &self.state {
            Lifecycle::Acquired(acquisition) => Some(acquisition.ownership.mode()),
            _ => None,
        }
    }

    pub fn readiness(&self) -> Option<Readiness> {
        match &self.state {
            Lifecycle::Acquired(acquisition) => Some(acquisition.readiness),
            Lifecycle::Failed => Some(Readiness::Failed),
            Lifecycle::Idle | Lifecycle::Released => None,
        }
    }

    /// PID of the owned emulator process
    pub fn pid(&self) -> Option<u32> {
        match &self.state {
            Lifecycle::Acquired(Acquisition {
                ownership: Ownership::Owned(process),
                ..
            }) => Some(process.pid()),
            _ => None,
        }
    }

    /// Clonable handle for code running inside the acquisition
    pub fn handle(&self) -> Option<EmulatorHandle> {
        match &self.state {
            Lifecycle::Acquired(acquisition) => Some(EmulatorHandle {
                connection: acquisition.connection.clone(),
                mode: acquisition.ownership.mode(),
                endpoint: acquisition.endpoint.clone(),
                released: acquisition.released.clone(),
            }),
            _ => None,
        }
    }

    async fn establish(&self) -> EmulatorResult<Acquisition> {
        self.config.validate()?;

        if let Some(acquisition) = self.try_attach().await? {
            return Ok(acquisition);
        }

        self.launch().await
    }

    async fn try_attach(&self) -> EmulatorResult<Option<Acquisition>> {
        let Some(connection) = env::discover() else {
            return Ok(None);
        };

        let endpoint = self.connector.connect(&connection)?;
        if !endpoint.health().await {
            component_debug!(
                ComponentId::Controller,
                "Advertised emulator at {} is not reachable; starting a new one",
                connection.base_url()
            );
            return Ok(None);
        }

        component_debug!(ComponentId::Controller, "🔗 Reusing running emulator at {}", connection.base_url());
        let published = env::publish(&connection, PublishMode::KeepDiscovery);

        Ok(Some(Acquisition {
            connection,
            ownership: Ownership::Attached,
            readiness: Readiness::Ready,
            endpoint,
            published,
            released: Arc::new(AtomicBool::new(false)),
        }))
    }

    async fn launch(&self) -> EmulatorResult<Acquisition> {
        let connection = self.config.connection();
        let endpoint = self.connector.connect(&connection)?;

        // A probe succeeding against somebody else's process would make
        // readiness meaningless.
        if endpoint.health().await {
            return Err(EmulatorError::startup(format!(
                "an emulator not advertised via {} already answers at {}; advertise it to reuse it or configure another port",
                env_vars::DATASTORE_HOST,
                connection.base_url()
            )));
        }

        let mut process = self.launcher.spawn(&self.config)?;
        let mut readiness = Readiness::Starting;
        component_info!(
            ComponentId::Controller,
            "🚀 Starting emulator on {} (PID: {}, timeout {:?})",
            connection.host_port(),
            process.pid(),
            self.config.startup_timeout
        );

        if let Err(reason) = self.wait_until_ready(process.as_mut(), endpoint.as_ref()).await {
            advance(&mut readiness, Readiness::Failed);
            let diagnostics = process.collect_diagnostics().await;
            if let Some(warning) = process.terminate(self.config.shutdown_grace).await {
                component_warn!(ComponentId::Controller, "⚠️ {}", warning);
            }
            return Err(EmulatorError::startup_with_diagnostics(reason, diagnostics));
        }

        advance(&mut readiness, Readiness::Ready);
        let published = env::publish(&connection, PublishMode::Overwrite);

        Ok(Acquisition {
            connection,
            ownership: Ownership::Owned(process),
            readiness,
            endpoint,
            published,
            released: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Poll until the health probe succeeds, the process exits, or the
    /// startup timeout elapses
    async fn wait_until_ready(
        &self,
        process: &mut dyn EmulatorProcess,
        endpoint: &dyn ControlEndpoint,
    ) -> Result<(), String> {
        let started = Instant::now();
        let deadline = started + self.config.startup_timeout;

        loop {
            match process.try_exit_status() {
                Ok(Some(status)) => return Err(format!("emulator exited before becoming ready ({status})")),
                Ok(None) => {}
                Err(e) => return Err(format!("failed to check emulator status: {e}")),
            }

            if endpoint.health().await {
                component_debug!(ComponentId::Controller, "Emulator ready after {:?}", started.elapsed());
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(format!(
                    "confirm startup timed out after {:?}",
                    self.config.startup_timeout
                ));
            }

            sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    async fn teardown(&self, acquisition: Acquisition) {
        let Acquisition {
            connection,
            ownership,
            endpoint,
            mut published,
            released,
            ..
        } = acquisition;
        released.store(true, Ordering::SeqCst);

        match ownership {
            Ownership::Owned(mut process) => {
                if endpoint.health().await {
                    if let Err(e) = endpoint.shutdown().await {
                        component_debug!(ComponentId::Controller, "{}; falling back to signals", e);
                    }
                }

                let pid = process.pid();
                match process.terminate(self.config.shutdown_grace).await {
                    Some(warning) => component_warn!(ComponentId::Controller, "⚠️ {}", warning),
                    None => component_info!(
                        ComponentId::Controller,
                        "🛑 Emulator at {} stopped (PID: {})",
                        connection.base_url(),
                        pid
                    ),
                }
            }
            Ownership::Attached => {
                component_info!(
                    ComponentId::Controller,
                    "Leaving shared emulator at {} running",
                    connection.base_url()
                );
            }
        }

        published.restore();
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        if let Lifecycle::Acquired(acquisition) = &self.state {
            acquisition.released.store(true, Ordering::SeqCst);
            if let Ownership::Owned(process) = &acquisition.ownership {
                component_warn!(
                    ComponentId::Controller,
                    "🚨 Emulator controller dropped without release; killing emulator {}",
                    process.pid()
                );
            }
        }
    }
}

fn advance(readiness: &mut Readiness, next: Readiness) {
    debug_assert!(readiness.can_transition_to(next));
    component_debug!(ComponentId::Controller, "Readiness {} -> {}", readiness, next);
    *readiness = next;
}

/// Owned view of an acquired emulator for code running inside a scope
#[derive(Clone)]
pub struct EmulatorHandle {
    connection: ConnectionInfo,
    mode: OwnershipMode,
    endpoint: Arc<dyn ControlEndpoint>,
    released: Arc<AtomicBool>,
}

impl EmulatorHandle {
    pub fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }

    pub fn ownership_mode(&self) -> OwnershipMode {
        self.mode
    }

    /// Whether the acquisition this handle came from has been released
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Clear all emulator data. Fails with a usage error after release.
    pub async fn reset(&self) -> EmulatorResult<()> {
        if self.is_released() {
            return Err(EmulatorError::usage("reset called on a handle whose emulator was released"));
        }
        self.endpoint.reset().await
    }
}

impl std::fmt::Debug for EmulatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmulatorHandle")
            .field("connection", &self.connection)
            .field("mode", &self.mode)
            .finish()
    }
}
