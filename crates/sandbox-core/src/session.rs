//! One sandbox session and everything bound to it

use std::sync::Arc;

use sandbox_fs::{SandboxFiles, SandboxFs};
use sandbox_git::{
    AuthPrompt, CloneCoordinator, CloneResult, CredentialStore, DialoguerPrompt,
    FileCredentialStore, Git2Engine, Notifier, TracingNotifier, VcsEngine,
};
use sandbox_preview::{BroadcastHub, MemoryStorage, PreviewSyncBus, Storage, TabId};
use sandbox_shell::{CommandApi, PtyApi, ShellBridge};

use crate::{BridgeConfig, Result};

/// The remote sandbox's APIs.
#[derive(Clone)]
pub struct SandboxHandles {
    pub files: Arc<dyn SandboxFiles>,
    pub pty: Arc<dyn PtyApi>,
    pub commands: Arc<dyn CommandApi>,
}

/// Services a session consumes but does not own.
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn VcsEngine>,
    pub credentials: Arc<dyn CredentialStore>,
    pub prompt: Arc<dyn AuthPrompt>,
    pub notifier: Arc<dyn Notifier>,
    /// Shared by every tab of the session.
    pub hub: BroadcastHub,
    pub storage: Arc<dyn Storage>,
    pub tab_id: TabId,
}

impl Collaborators {
    /// libgit2 cloning, credentials in the user config directory, terminal
    /// prompts, and log-based notifications.
    pub fn interactive(hub: BroadcastHub) -> Result<Self> {
        Ok(Self {
            engine: Arc::new(Git2Engine::new()),
            credentials: Arc::new(FileCredentialStore::default_location()?),
            prompt: Arc::new(DialoguerPrompt),
            notifier: Arc::new(TracingNotifier),
            hub,
            storage: Arc::new(MemoryStorage::new()),
            tab_id: TabId::new(),
        })
    }
}

/// A running session: filesystem adapter, clone coordinator, preview bus
/// and shell bridge built from one [`BridgeConfig`].
pub struct SandboxSession {
    config: BridgeConfig,
    cloner: CloneCoordinator,
    bus: PreviewSyncBus,
    shell: ShellBridge,
}

impl SandboxSession {
    /// Build every component and start the preview bus listeners. Must run
    /// inside a tokio runtime.
    pub fn start(
        config: BridgeConfig,
        sandbox: SandboxHandles,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let fs = SandboxFs::new(sandbox.files, config.workdir.as_str());
        let cloner = CloneCoordinator::new(
            fs,
            collaborators.engine,
            collaborators.credentials,
            collaborators.prompt,
            collaborators.notifier,
            config.clone.clone(),
        );
        let bus = PreviewSyncBus::start(
            &collaborators.hub,
            config.preview.clone(),
            collaborators.storage,
            collaborators.tab_id,
        )?;
        let shell = ShellBridge::new(
            sandbox.pty,
            sandbox.commands,
            config.workdir.clone(),
            config.terminal.clone(),
        );

        tracing::info!(workdir = %config.workdir, tab_id = %bus.tab_id(), "Sandbox session started");
        Ok(Self {
            config,
            cloner,
            bus,
            shell,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn fs(&self) -> &SandboxFs {
        self.cloner.fs()
    }

    pub fn cloner(&self) -> &CloneCoordinator {
        &self.cloner
    }

    pub fn bus(&self) -> &PreviewSyncBus {
        &self.bus
    }

    pub fn shell(&self) -> &ShellBridge {
        &self.shell
    }

    /// Clone `url` into the working directory.
    pub async fn clone_repo(&self, url: &str) -> Result<CloneResult> {
        Ok(self.cloner.clone(url).await?)
    }

    /// Stop the preview bus and detach every terminal.
    pub async fn dispose(&self) {
        self.bus.dispose();
        self.shell.shutdown().await;
        tracing::info!(workdir = %self.config.workdir, "Sandbox session disposed");
    }
}
