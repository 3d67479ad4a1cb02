//! In-memory engine for tests and local development

use super::{ContainerSpec, SandboxEngine, SandboxId};
use crate::Result;
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// What a mock sandbox was asked to run
#[derive(Debug, Clone)]
pub struct MockProgram {
    pub image: String,
    pub command: Vec<String>,
    pub labels: HashMap<String, String>,
    /// Uploaded files keyed by absolute path
    pub files: BTreeMap<String, String>,
}

impl MockProgram {
    /// Content of the single uploaded file, if exactly one was uploaded
    pub fn source(&self) -> Option<&str> {
        if self.files.len() == 1 {
            self.files.values().next().map(String::as_str)
        } else {
            None
        }
    }
}

/// How a mock program behaves once started
#[derive(Debug, Clone)]
pub enum ProgramBehavior {
    /// Exit after `after` with the given code and combined output
    Exit {
        code: i64,
        output: String,
        after: Duration,
    },
    /// Run until killed
    Hang,
}

impl ProgramBehavior {
    pub fn exit(code: i64, output: impl Into<String>) -> Self {
        ProgramBehavior::Exit {
            code,
            output: output.into(),
            after: Duration::ZERO,
        }
    }
}

/// Engine operations that can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockStep {
    EnsureImage,
    Create,
    Upload,
    Start,
    Wait,
    Kill,
    Logs,
    Remove,
}

type Behavior = dyn Fn(&MockProgram) -> ProgramBehavior + Send + Sync;

struct MockContainer {
    program: MockProgram,
    behavior: Option<ProgramBehavior>,
    killed: Arc<Notify>,
    was_killed: bool,
}

/// Engine that never touches the host. Uploaded tar payloads are unpacked in
/// memory and the program's behaviour is decided by a caller-supplied closure.
pub struct MockEngine {
    behavior: Box<Behavior>,
    failures: Mutex<HashSet<MockStep>>,
    delays: Mutex<HashMap<MockStep, Duration>>,
    containers: Mutex<HashMap<String, MockContainer>>,
    specs: Mutex<Vec<ContainerSpec>>,
    next_id: AtomicU64,
    created: AtomicUsize,
    removes: AtomicUsize,
    kills: AtomicUsize,
}

impl MockEngine {
    pub fn new(behavior: impl Fn(&MockProgram) -> ProgramBehavior + Send + Sync + 'static) -> Self {
        Self {
            behavior: Box::new(behavior),
            failures: Mutex::new(HashSet::new()),
            delays: Mutex::new(HashMap::new()),
            containers: Mutex::new(HashMap::new()),
            specs: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            created: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
            kills: AtomicUsize::new(0),
        }
    }

    /// Programs print their own source and exit 0
    pub fn echo() -> Self {
        Self::new(|program| ProgramBehavior::exit(0, program.source().unwrap_or_default()))
    }

    /// Make every future call of `step` fail
    pub fn fail_at(self, step: MockStep) -> Self {
        self.lock_failures().insert(step);
        self
    }

    /// Make every future call of `step` take at least `delay`
    pub fn delay_at(self, step: MockStep, delay: Duration) -> Self {
        if let Ok(mut delays) = self.delays.lock() {
            delays.insert(step, delay);
        }
        self
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn remove_count(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    /// Sandboxes created and not yet removed
    pub fn live_count(&self) -> usize {
        self.lock_containers().len()
    }

    /// Specs of every sandbox created so far
    pub fn created_specs(&self) -> Vec<ContainerSpec> {
        self.specs.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Files uploaded into a live sandbox
    pub fn files(&self, id: &SandboxId) -> Option<BTreeMap<String, String>> {
        self.lock_containers()
            .get(&id.0)
            .map(|c| c.program.files.clone())
    }

    fn lock_failures(&self) -> std::sync::MutexGuard<'_, HashSet<MockStep>> {
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_containers(&self) -> std::sync::MutexGuard<'_, HashMap<String, MockContainer>> {
        self.containers.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn pause(&self, step: MockStep) {
        let delay = self.delays.lock().ok().and_then(|d| d.get(&step).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self, step: MockStep) -> Result<()> {
        if self.lock_failures().contains(&step) {
            bail!("mock engine: injected {:?} failure", step);
        }
        Ok(())
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::echo()
    }
}

fn unpack(dir: &str, archive: &[u8]) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    let mut archive = tar::Archive::new(archive);
    for entry in archive.entries().context("Malformed tar archive")? {
        let mut entry = entry.context("Malformed tar entry")?;
        let path = entry.path()?.to_string_lossy().into_owned();
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .with_context(|| format!("Entry {} is not UTF-8", path))?;
        files.insert(format!("{}/{}", dir.trim_end_matches('/'), path), content);
    }
    Ok(files)
}

#[async_trait]
impl SandboxEngine for MockEngine {
    async fn ensure_image(&self, _image: &str) -> Result<()> {
        self.check(MockStep::EnsureImage)
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<SandboxId> {
        self.pause(MockStep::Create).await;
        self.check(MockStep::Create)?;
        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let container = MockContainer {
            program: MockProgram {
                image: spec.image.clone(),
                command: spec.command.clone(),
                labels: spec.labels.clone(),
                files: BTreeMap::new(),
            },
            behavior: None,
            killed: Arc::new(Notify::new()),
            was_killed: false,
        };
        self.lock_containers().insert(id.clone(), container);
        if let Ok(mut specs) = self.specs.lock() {
            specs.push(spec.clone());
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(SandboxId(id))
    }

    async fn upload(&self, id: &SandboxId, dir: &str, archive: Bytes) -> Result<()> {
        self.check(MockStep::Upload)?;
        let files = unpack(dir, &archive)?;
        let mut containers = self.lock_containers();
        let container = containers
            .get_mut(&id.0)
            .ok_or_else(|| anyhow!("No such container: {}", id))?;
        container.program.files.extend(files);
        Ok(())
    }

    async fn start(&self, id: &SandboxId) -> Result<()> {
        self.check(MockStep::Start)?;
        let mut containers = self.lock_containers();
        let container = containers
            .get_mut(&id.0)
            .ok_or_else(|| anyhow!("No such container: {}", id))?;
        if container.behavior.is_some() {
            bail!("Container {} already started", id);
        }
        container.behavior = Some((self.behavior)(&container.program));
        Ok(())
    }

    async fn wait(&self, id: &SandboxId) -> Result<i64> {
        self.check(MockStep::Wait)?;
        let (behavior, killed) = {
            let containers = self.lock_containers();
            let container = containers
                .get(&id.0)
                .ok_or_else(|| anyhow!("No such container: {}", id))?;
            let behavior = container
                .behavior
                .clone()
                .ok_or_else(|| anyhow!("Container {} is not running", id))?;
            (behavior, container.killed.clone())
        };

        match behavior {
            ProgramBehavior::Exit { code, after, .. } => {
                tokio::select! {
                    _ = tokio::time::sleep(after) => Ok(code),
                    _ = killed.notified() => Ok(137),
                }
            }
            ProgramBehavior::Hang => {
                killed.notified().await;
                Ok(137)
            }
        }
    }

    async fn kill(&self, id: &SandboxId) -> Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.check(MockStep::Kill)?;
        let mut containers = self.lock_containers();
        let container = containers
            .get_mut(&id.0)
            .ok_or_else(|| anyhow!("No such container: {}", id))?;
        container.was_killed = true;
        container.killed.notify_one();
        Ok(())
    }

    async fn logs(&self, id: &SandboxId) -> Result<String> {
        self.check(MockStep::Logs)?;
        let containers = self.lock_containers();
        let container = containers
            .get(&id.0)
            .ok_or_else(|| anyhow!("No such container: {}", id))?;
        match &container.behavior {
            Some(ProgramBehavior::Exit { output, .. }) if !container.was_killed => {
                Ok(output.clone())
            }
            _ => Ok(String::new()),
        }
    }

    async fn remove(&self, id: &SandboxId) -> Result<()> {
        self.pause(MockStep::Remove).await;
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.check(MockStep::Remove)?;
        self.lock_containers()
            .remove(&id.0)
            .map(|_| ())
            .ok_or_else(|| anyhow!("No such container: {}", id))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
