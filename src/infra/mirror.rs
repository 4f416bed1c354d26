//! # Registry Mirror Module / 注册表镜像模块
//!
//! This module owns the one shared side resource of a run: a local
//! pull-through registry mirror. It is provisioned on the first acquisition,
//! reference-counted across every concurrent consumer, and torn down when the
//! last lease is released.
//!
//! When a shared directory is configured, provisioning is serialized across
//! processes with an exclusive file lock that is held only until the mirror
//! is populated.
//!
//! 此模块管理一次运行中唯一的共享附属资源：本地的拉取式注册表镜像。
//! 它在第一次获取时被创建，在所有并发使用者之间进行引用计数，
//! 并在最后一个租约释放时被销毁。
//!
//! 配置共享目录时，镜像的创建会通过排他文件锁在进程间串行化，
//! 该锁仅持有到镜像填充完成为止。

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::worker::ReleaseFn;
use crate::infra::fs::{expand_dir, write_mirror_config};
use crate::infra::lease::ProvisionLease;

/// Names the host directory used for cross-process mirror coordination.
pub const MIRROR_DIR_ENV: &str = "MATRIX_HARNESS_MIRROR_DIR";

/// A freshly started mirror and the action that stops it.
/// 新启动的镜像以及停止它的操作。
pub struct ProvisionedMirror {
    pub address: String,
    pub teardown: ReleaseFn,
}

impl fmt::Debug for ProvisionedMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionedMirror")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Starts the registry mirror server.
/// 启动注册表镜像服务器。
pub trait Provisioner: Send + Sync {
    /// `shared_dir` is the cross-process directory, if configured; a
    /// provisioner may keep its storage there so later processes reuse it.
    fn provision<'a>(&'a self, shared_dir: Option<&'a Path>)
        -> BoxFuture<'a, Result<ProvisionedMirror>>;
}

/// Copies one content-addressed artifact from its origin into the mirror.
/// 将一个内容寻址的制品从其来源复制到镜像中。
pub trait ArtifactCopier: Send + Sync {
    fn copy<'a>(&'a self, origin: &'a str, target: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// One bootstrap artifact: copied from `origin` to `<mirror>/<target>`.
/// 一个引导制品：从 `origin` 复制到 `<mirror>/<target>`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub target: String,
    pub origin: String,
}

impl Artifact {
    pub fn new(target: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            origin: origin.into(),
        }
    }
}

/// Docker Hub architecture namespace for the running CPU.
/// 当前 CPU 对应的 Docker Hub 架构命名空间。
pub fn docker_arch() -> &'static str {
    match env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64v8",
        "arm" => "arm32v7",
        "x86" => "i386",
        "powerpc64" => "ppc64le",
        other => other,
    }
}

/// The fixed set of images every mirror is populated with.
/// 每个镜像都会被填充的固定镜像集合。
pub fn default_artifacts() -> Vec<Artifact> {
    let arch = docker_arch();
    vec![
        Artifact::new(
            "library/busybox:latest",
            format!("docker.io/{arch}/busybox:latest"),
        ),
        Artifact::new(
            "library/alpine:latest",
            format!("docker.io/{arch}/alpine:latest"),
        ),
        Artifact::new("tonistiigi/copy:v0.1.4", "docker.io/tonistiigi/copy:v0.1.4"),
    ]
}

/// Where the mirror coordinates and what it is populated with.
/// 镜像在何处协调以及用什么内容填充。
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Cross-process coordination directory; `None` keeps coordination
    /// process-local.
    /// 跨进程协调目录；为 `None` 时仅在进程内协调。
    pub shared_dir: Option<PathBuf>,
    pub artifacts: Vec<Artifact>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            shared_dir: None,
            artifacts: default_artifacts(),
        }
    }
}

impl MirrorConfig {
    /// Reads `MATRIX_HARNESS_MIRROR_DIR`, expanding `~` and variables.
    /// 读取 `MATRIX_HARNESS_MIRROR_DIR`，并展开 `~` 和变量。
    pub fn from_env() -> Result<Self> {
        let shared_dir = match env::var(MIRROR_DIR_ENV) {
            Ok(raw) if !raw.trim().is_empty() => Some(expand_dir(raw.trim())?),
            _ => None,
        };
        Ok(Self {
            shared_dir,
            ..Self::default()
        })
    }

    pub fn with_shared_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shared_dir = Some(dir.into());
        self
    }

    pub fn with_artifacts(mut self, artifacts: Vec<Artifact>) -> Self {
        self.artifacts = artifacts;
        self
    }
}

struct ActiveMirror {
    address: String,
    config_dir: TempDir,
    teardown: ReleaseFn,
}

#[derive(Default)]
struct MirrorState {
    count: usize,
    active: Option<ActiveMirror>,
}

struct MirrorInner {
    provisioner: Arc<dyn Provisioner>,
    copier: Arc<dyn ArtifactCopier>,
    config: MirrorConfig,
    state: Mutex<MirrorState>,
}

/// Reference-counted owner of the registry mirror.
///
/// Cloning is cheap and every clone shares the same count. The count and the
/// provision/teardown actions are serialized by a single async mutex, so
/// acquisitions racing the first one wait for it instead of provisioning
/// twice.
///
/// 注册表镜像的引用计数所有者。
/// 克隆开销很小，所有克隆共享同一个计数。计数以及创建/销毁操作由同一个异步互斥锁串行化，
/// 因此与第一次获取竞争的获取会等待它完成，而不会重复创建。
#[derive(Clone)]
pub struct MirrorManager {
    inner: Arc<MirrorInner>,
}

impl fmt::Debug for MirrorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorManager")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl MirrorManager {
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        copier: Arc<dyn ArtifactCopier>,
        config: MirrorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(MirrorInner {
                provisioner,
                copier,
                config,
                state: Mutex::new(MirrorState::default()),
            }),
        }
    }

    /// Takes one reference on the mirror, provisioning it on the 0→1
    /// transition.
    ///
    /// If provisioning fails the count is left unchanged, anything already
    /// started is torn down and the file lock is dropped.
    ///
    /// 获取镜像的一个引用，在 0→1 转换时创建镜像。
    /// 如果创建失败，计数保持不变，已启动的内容会被销毁，文件锁会被释放。
    pub async fn acquire(&self) -> Result<MirrorLease> {
        let mut state = self.inner.state.lock().await;
        if state.count == 0 {
            let active = self.provision().await?;
            info!(address = %active.address, "registry mirror ready");
            state.active = Some(active);
        }
        state.count += 1;
        debug!(count = state.count, "mirror reference acquired");

        let active = state
            .active
            .as_ref()
            .context("Mirror reference held without an active mirror")?;
        Ok(MirrorLease {
            inner: Some(Arc::clone(&self.inner)),
            address: active.address.clone(),
            config_dir: active.config_dir.path().to_path_buf(),
        })
    }

    /// Current number of outstanding leases.
    pub async fn ref_count(&self) -> usize {
        self.inner.state.lock().await.count
    }

    async fn provision(&self) -> Result<ActiveMirror> {
        let config = &self.inner.config;
        let lease = match &config.shared_dir {
            Some(dir) => Some(ProvisionLease::acquire(dir).await?),
            None => None,
        };

        let ProvisionedMirror { address, teardown } = self
            .inner
            .provisioner
            .provision(config.shared_dir.as_deref())
            .await
            .context("Failed to start registry mirror")?;
        debug!(address = %address, "registry mirror started");

        let prepared = match self.populate(&address).await {
            Ok(()) => write_mirror_config(&address),
            Err(e) => Err(e),
        };
        let prepared = match (prepared, lease) {
            (Ok(dir), Some(lease)) => lease.release().map(|()| dir),
            (prepared, _) => prepared,
        };

        match prepared {
            Ok(config_dir) => Ok(ActiveMirror {
                address,
                config_dir,
                teardown,
            }),
            Err(e) => {
                if let Err(te) = teardown().await {
                    warn!(error = %format!("{te:#}"), "failed to tear down mirror after setup error");
                }
                Err(e)
            }
        }
    }

    /// Copies every bootstrap artifact; the first failure fails the whole
    /// population.
    /// 复制所有引导制品；第一次失败即导致整个填充失败。
    async fn populate(&self, address: &str) -> Result<()> {
        for artifact in &self.inner.config.artifacts {
            let target = format!("{}/{}", address, artifact.target);
            self.inner
                .copier
                .copy(&artifact.origin, &target)
                .await
                .with_context(|| format!("Failed to copy {} to {}", artifact.origin, target))?;
            info!(from = %artifact.origin, to = %target, "copied artifact to local mirror");
        }
        Ok(())
    }
}

impl MirrorInner {
    async fn release(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.count == 0 {
            warn!("mirror released more times than acquired");
            return Ok(());
        }
        state.count -= 1;
        debug!(count = state.count, "mirror reference released");
        if state.count > 0 {
            return Ok(());
        }

        match state.active.take() {
            Some(active) => {
                let result = (active.teardown)().await;
                drop(active.config_dir);
                info!(address = %active.address, "registry mirror torn down");
                result.context("Failed to tear down registry mirror")
            }
            None => Ok(()),
        }
    }
}

/// One reference on the mirror.
///
/// Call `release` exactly once. A lease dropped without being released
/// schedules its release on the current tokio runtime.
///
/// 镜像的一个引用。
/// 请恰好调用一次 `release`。未释放就被丢弃的租约会在当前 tokio 运行时上调度释放。
pub struct MirrorLease {
    inner: Option<Arc<MirrorInner>>,
    address: String,
    config_dir: PathBuf,
}

impl MirrorLease {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Directory holding the generated mirror registration file.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Drops this reference, tearing the mirror down if it was the last one.
    /// 释放此引用，如果是最后一个引用则销毁镜像。
    pub async fn release(mut self) -> Result<()> {
        match self.inner.take() {
            Some(inner) => inner.release().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for MirrorLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorLease")
            .field("address", &self.address)
            .field("released", &self.inner.is_none())
            .finish()
    }
}

impl Drop for MirrorLease {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = inner.release().await {
                        warn!(error = %format!("{e:#}"), "deferred mirror release failed");
                    }
                });
            }
            Err(_) => warn!("mirror lease dropped outside a tokio runtime; reference leaked"),
        }
    }
}
