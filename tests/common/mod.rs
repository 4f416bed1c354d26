// Shared fakes for integration tests
#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use futures::future::BoxFuture;
use matrix_harness::core::models::LeafLog;
use matrix_harness::infra::mirror::{
    Artifact, ArtifactCopier, MirrorConfig, MirrorManager, ProvisionedMirror, Provisioner,
};
use matrix_harness::{HarnessError, MatrixValue, ReleaseFn, Sandbox, SandboxConfig, Worker};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const MIRROR_ADDRESS: &str = "127.0.0.1:5000";

/// Counts provisioning and teardown side effects.
#[derive(Default)]
pub struct FakeProvisioner {
    pub provisions: AtomicUsize,
    pub teardowns: Arc<AtomicUsize>,
    pub fail_provision: AtomicBool,
    pub fail_teardown: Arc<AtomicBool>,
    pub shared_dirs: Mutex<Vec<Option<PathBuf>>>,
}

impl FakeProvisioner {
    pub fn provisions(&self) -> usize {
        self.provisions.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

impl Provisioner for FakeProvisioner {
    fn provision<'a>(
        &'a self,
        shared_dir: Option<&'a Path>,
    ) -> BoxFuture<'a, Result<ProvisionedMirror>> {
        Box::pin(async move {
            self.shared_dirs
                .lock()
                .unwrap()
                .push(shared_dir.map(Path::to_path_buf));
            if self.fail_provision.load(Ordering::SeqCst) {
                bail!("registry failed to start");
            }
            // Widen the window in which racing acquisitions could double-provision.
            tokio::task::yield_now().await;
            self.provisions.fetch_add(1, Ordering::SeqCst);

            let teardowns = Arc::clone(&self.teardowns);
            let fail = Arc::clone(&self.fail_teardown);
            let teardown: ReleaseFn = Box::new(move || {
                Box::pin(async move {
                    teardowns.fetch_add(1, Ordering::SeqCst);
                    if fail.load(Ordering::SeqCst) {
                        bail!("registry refused to stop");
                    }
                    Ok(())
                })
            });
            Ok(ProvisionedMirror {
                address: MIRROR_ADDRESS.to_string(),
                teardown,
            })
        })
    }
}

/// Records every copy; fails copies whose origin contains `fail_on`.
#[derive(Default)]
pub struct FakeCopier {
    pub copies: Mutex<Vec<(String, String)>>,
    pub fail_on: Mutex<Option<String>>,
}

impl FakeCopier {
    pub fn copies(&self) -> Vec<(String, String)> {
        self.copies.lock().unwrap().clone()
    }
}

impl ArtifactCopier for FakeCopier {
    fn copy<'a>(&'a self, origin: &'a str, target: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if let Some(pattern) = self.fail_on.lock().unwrap().as_deref() {
                if origin.contains(pattern) {
                    bail!("manifest unknown: {origin}");
                }
            }
            self.copies
                .lock()
                .unwrap()
                .push((origin.to_string(), target.to_string()));
            Ok(())
        })
    }
}

pub fn test_artifacts() -> Vec<Artifact> {
    vec![
        Artifact::new("library/busybox:latest", "docker.io/amd64/busybox:latest"),
        Artifact::new("library/alpine:latest", "docker.io/amd64/alpine:latest"),
    ]
}

pub fn mirror_with(
    provisioner: &Arc<FakeProvisioner>,
    copier: &Arc<FakeCopier>,
    config: MirrorConfig,
) -> MirrorManager {
    MirrorManager::new(
        Arc::clone(provisioner) as Arc<dyn Provisioner>,
        Arc::clone(copier) as Arc<dyn ArtifactCopier>,
        config,
    )
}

pub fn fake_mirror() -> (MirrorManager, Arc<FakeProvisioner>, Arc<FakeCopier>) {
    let provisioner = Arc::new(FakeProvisioner::default());
    let copier = Arc::new(FakeCopier::default());
    let manager = mirror_with(
        &provisioner,
        &copier,
        MirrorConfig::default().with_artifacts(test_artifacts()),
    );
    (manager, provisioner, copier)
}

pub struct FakeSandbox {
    pub mirror: String,
    pub matrix: MatrixValue,
    pub panic_logs: bool,
}

impl Sandbox for FakeSandbox {
    fn address(&self) -> &str {
        "unix:///run/fake/fake.sock"
    }

    fn print_logs(&self, log: &mut LeafLog) {
        if self.panic_logs {
            panic!("log collector crashed");
        }
        log.log(format!("fake daemon log, mirror={}", self.mirror));
    }

    fn cmd(&self, args: &[&str]) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("echo");
        cmd.args(args);
        cmd
    }

    fn new_registry(&self) -> BoxFuture<'_, Result<String>> {
        Box::pin(async { Ok("127.0.0.1:5001".to_string()) })
    }

    fn rootless(&self) -> bool {
        false
    }

    fn matrix(&self) -> &MatrixValue {
        &self.matrix
    }
}

/// A worker that can opt out of one (feature, choice) pair and can be told
/// to fail sandbox creation or release.
pub struct FakeWorker {
    pub name: String,
    pub unsupported: Option<(String, String)>,
    pub fail_new: bool,
    pub fail_release: bool,
    pub panic_new: bool,
    pub panic_logs: bool,
    pub panic_release: bool,
    pub created: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
    pub configs: Arc<Mutex<Vec<SandboxConfig>>>,
}

impl FakeWorker {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            unsupported: None,
            fail_new: false,
            fail_release: false,
            panic_new: false,
            panic_logs: false,
            panic_release: false,
            created: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
            configs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unsupported(mut self, feature: &str, choice: &str) -> Self {
        self.unsupported = Some((feature.to_string(), choice.to_string()));
        self
    }
}

impl Worker for FakeWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn new_sandbox(
        &self,
        config: SandboxConfig,
    ) -> BoxFuture<'_, Result<(Arc<dyn Sandbox>, ReleaseFn)>> {
        Box::pin(async move {
            self.configs.lock().unwrap().push(config.clone());
            if let Some((feature, choice)) = &self.unsupported {
                if config.matrix.choice(feature).map(|c| c.name.as_str()) == Some(choice.as_str())
                {
                    return Err(anyhow::Error::from(HarnessError::Requirements(format!(
                        "{} does not support {feature}={choice}",
                        self.name
                    )))
                    .context("building sandbox"));
                }
            }
            if self.fail_new {
                return Err(anyhow!("daemon did not start"));
            }
            if self.panic_new {
                panic!("worker {} crashed while starting", self.name);
            }

            self.created.fetch_add(1, Ordering::SeqCst);
            let sandbox: Arc<dyn Sandbox> = Arc::new(FakeSandbox {
                mirror: config.mirror.clone().unwrap_or_default(),
                matrix: config.matrix.clone(),
                panic_logs: self.panic_logs,
            });
            let released = Arc::clone(&self.released);
            let fail = self.fail_release;
            let panics = self.panic_release;
            let release: ReleaseFn = Box::new(move || {
                Box::pin(async move {
                    released.fetch_add(1, Ordering::SeqCst);
                    if panics {
                        panic!("sandbox cleanup crashed");
                    }
                    if fail {
                        bail!("failed to remove sandbox state");
                    }
                    Ok(())
                })
            });
            Ok((sandbox, release))
        })
    }
}
