#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use sprout_api::{ContainerRecord, CreateIntent};
use sprout_core::{ReconcilerConfig, Reconciler};
use sprout_kube::{OrchestrationError, Orchestrator, Workload, workload_name};
use sprout_store::{EventLog, GroupStatus, StateStore, StoreError, StreamEntry};

pub fn api_error(status: u16, reason: &str) -> OrchestrationError {
    OrchestrationError::Api {
        status,
        reason: reason.to_string(),
        message: format!("{reason} from fake platform"),
    }
}

pub fn unavailable() -> StoreError {
    StoreError::Redis(redis::RedisError::from(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    )))
}

pub fn fields(pairs: &[(&str, &str)]) -> Vec<(&'static str, String)> {
    pairs
        .iter()
        .map(|(k, v)| {
            let key: &'static str = match *k {
                "event_type" => "event_type",
                "container_id" => "container_id",
                "name" => "name",
                "image" => "image",
                "created_at" => "created_at",
                other => panic!("unexpected field {other}"),
            };
            (key, (*v).to_string())
        })
        .collect()
}

// ============================================================================
// Orchestrator
// ============================================================================

#[derive(Default)]
struct PlatformState {
    /// name -> (container id label, workload)
    workloads: BTreeMap<String, (Option<String>, Workload)>,
    fail_create: Option<(u16, String)>,
    fail_delete: HashSet<String>,
    fail_list: bool,
    unreachable: bool,
    creates: u32,
    deletes: Vec<String>,
    next_uid: u32,
}

#[derive(Default)]
pub struct FakeOrchestrator {
    state: Mutex<PlatformState>,
}

impl FakeOrchestrator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_creates_with(&self, status: u16, reason: &str) {
        self.state.lock().unwrap().fail_create = Some((status, reason.to_string()));
    }

    pub fn fail_delete_of(&self, name: &str) {
        self.state.lock().unwrap().fail_delete.insert(name.to_string());
    }

    pub fn fail_lists(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn set_unreachable(&self) {
        self.state.lock().unwrap().unreachable = true;
    }

    /// Workload carrying the container label
    pub fn insert_labelled(&self, name: &str, container_id: &str) {
        self.insert(name, Some(container_id.to_string()));
    }

    /// Workload that only matches by derived name
    pub fn insert_unlabelled(&self, name: &str) {
        self.insert(name, None);
    }

    fn insert(&self, name: &str, label: Option<String>) {
        let mut state = self.state.lock().unwrap();
        state.next_uid += 1;
        let workload = Workload {
            name: name.to_string(),
            uid: format!("uid-{}", state.next_uid),
            namespace: "sprout".to_string(),
            deletion_timestamp: None,
        };
        state.workloads.insert(name.to_string(), (label, workload));
    }

    pub fn workload_names(&self) -> Vec<String> {
        self.state.lock().unwrap().workloads.keys().cloned().collect()
    }

    pub fn create_calls(&self) -> u32 {
        self.state.lock().unwrap().creates
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deletes.clone()
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    fn namespace(&self) -> &str {
        "sprout"
    }

    async fn create_workload(&self, intent: &CreateIntent) -> sprout_kube::Result<Workload> {
        let name = workload_name(&intent.container_id);
        {
            let mut state = self.state.lock().unwrap();
            state.creates += 1;
            if let Some((status, reason)) = &state.fail_create {
                return Err(api_error(*status, reason));
            }
            if state.workloads.contains_key(&name) {
                return Err(api_error(409, "AlreadyExists"));
            }
        }
        self.insert_labelled(&name, &intent.container_id);
        let state = self.state.lock().unwrap();
        Ok(state.workloads[&name].1.clone())
    }

    async fn find_workloads_by_container_id(
        &self,
        container_id: &str,
    ) -> sprout_kube::Result<Vec<Workload>> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(api_error(500, "InternalError"));
        }
        Ok(state
            .workloads
            .values()
            .filter(|(label, _)| label.as_deref() == Some(container_id))
            .map(|(_, w)| w.clone())
            .collect())
    }

    async fn read_workload(&self, name: &str) -> sprout_kube::Result<Option<Workload>> {
        let state = self.state.lock().unwrap();
        Ok(state.workloads.get(name).map(|(_, w)| w.clone()))
    }

    async fn delete_workload(&self, name: &str, _grace: u32) -> sprout_kube::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_delete.contains(name) {
            return Err(api_error(500, "InternalError"));
        }
        state.deletes.push(name.to_string());
        state.workloads.remove(name);
        Ok(())
    }

    async fn ping(&self) -> sprout_kube::Result<()> {
        if self.state.lock().unwrap().unreachable {
            return Err(OrchestrationError::Config("unreachable".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// State store
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, ContainerRecord>>,
    fail_writes: AtomicBool,
    unreachable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, container_id: &str) -> Option<ContainerRecord> {
        self.records.lock().unwrap().get(container_id).cloned()
    }

    pub fn seed(&self, record: ContainerRecord) {
        self.records.lock().unwrap().insert(record.id.clone(), record);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, container_id: &str) -> sprout_store::Result<Option<ContainerRecord>> {
        Ok(self.record(container_id))
    }

    async fn upsert(&self, record: &ContainerRecord) -> sprout_store::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut records = self.records.lock().unwrap();

        let mut merged: HashMap<String, String> = records
            .get(&record.id)
            .map(|existing| {
                existing
                    .to_fields()
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect()
            })
            .unwrap_or_default();
        merged.extend(record.to_fields().into_iter().map(|(k, v)| (k.to_string(), v)));

        let merged = ContainerRecord::from_fields(&record.id, &merged).unwrap();
        records.insert(record.id.clone(), merged);
        Ok(())
    }

    async fn delete(&self, container_id: &str) -> sprout_store::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.records.lock().unwrap().remove(container_id);
        Ok(())
    }

    async fn ping(&self) -> sprout_store::Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

// ============================================================================
// Event log
// ============================================================================

#[derive(Default)]
struct LogState {
    entries: Vec<StreamEntry>,
    cursor: usize,
    redelivery: VecDeque<String>,
    pending: BTreeSet<String>,
    acked: Vec<String>,
    group_exists: bool,
    stream_exists: bool,
    next_seq: u64,
    read_script: VecDeque<bool>,
    always_fail_reads: bool,
    fail_appends: bool,
    fail_acks: bool,
    reads: u32,
}

#[derive(Default)]
pub struct MemoryLog {
    state: Mutex<LogState>,
}

impl MemoryLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Enqueue an entry as if produced by the API layer
    pub fn push(&self, fields: &[(&'static str, String)]) -> String {
        let mut state = self.state.lock().unwrap();
        Self::append_locked(&mut state, fields)
    }

    fn append_locked(state: &mut LogState, fields: &[(&'static str, String)]) -> String {
        state.next_seq += 1;
        let id = format!("1700000000000-{}", state.next_seq);
        state.entries.push(StreamEntry {
            id: id.clone(),
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        });
        state.stream_exists = true;
        id
    }

    /// Hand every pending entry back out, as a claim after timeout would
    pub fn redeliver_pending(&self) {
        let mut state = self.state.lock().unwrap();
        let pending: Vec<String> = state.pending.iter().cloned().collect();
        state.redelivery.extend(pending);
    }

    /// Scripted read results: `true` fails, `false` behaves normally
    pub fn script_reads(&self, script: &[bool]) {
        self.state.lock().unwrap().read_script.extend(script.iter().copied());
    }

    pub fn fail_all_reads(&self) {
        self.state.lock().unwrap().always_fail_reads = true;
    }

    pub fn fail_appends(&self) {
        self.state.lock().unwrap().fail_appends = true;
    }

    pub fn fail_acks(&self) {
        self.state.lock().unwrap().fail_acks = true;
    }

    pub fn acked(&self) -> Vec<String> {
        self.state.lock().unwrap().acked.clone()
    }

    pub fn pending(&self) -> Vec<String> {
        self.state.lock().unwrap().pending.iter().cloned().collect()
    }

    pub fn reads(&self) -> u32 {
        self.state.lock().unwrap().reads
    }

    /// Entries with `event_type=container_status_update`, as field maps
    pub fn status_updates(&self) -> Vec<HashMap<String, String>> {
        self.state
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| {
                e.fields.get("event_type").map(String::as_str) == Some("container_status_update")
            })
            .map(|e| e.fields.clone())
            .collect()
    }
}

#[async_trait]
impl EventLog for MemoryLog {
    fn stream(&self) -> &str {
        "container_events"
    }

    fn group(&self) -> &str {
        "keda-consumer"
    }

    async fn stream_length(&self) -> sprout_store::Result<Option<u64>> {
        let state = self.state.lock().unwrap();
        Ok(state.stream_exists.then(|| state.entries.len() as u64))
    }

    async fn ensure_group(&self) -> sprout_store::Result<GroupStatus> {
        let mut state = self.state.lock().unwrap();
        state.stream_exists = true;
        if state.group_exists {
            return Ok(GroupStatus::AlreadyExists);
        }
        state.group_exists = true;
        Ok(GroupStatus::Created)
    }

    async fn read_next(
        &self,
        _consumer: &str,
        _block: Duration,
    ) -> sprout_store::Result<Option<StreamEntry>> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;

        let fail = state
            .read_script
            .pop_front()
            .unwrap_or(state.always_fail_reads);
        if fail {
            return Err(unavailable());
        }

        if let Some(id) = state.redelivery.pop_front() {
            let entry = state.entries.iter().find(|e| e.id == id).cloned();
            return Ok(entry);
        }

        if state.cursor < state.entries.len() {
            let entry = state.entries[state.cursor].clone();
            state.cursor += 1;
            state.pending.insert(entry.id.clone());
            return Ok(Some(entry));
        }

        Ok(None)
    }

    async fn ack(&self, entry_id: &str) -> sprout_store::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_acks {
            return Err(unavailable());
        }
        state.pending.remove(entry_id);
        state.acked.push(entry_id.to_string());
        Ok(())
    }

    async fn append(&self, fields: &[(&'static str, String)]) -> sprout_store::Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.fail_appends {
            return Err(unavailable());
        }
        Ok(Self::append_locked(&mut state, fields))
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub struct Harness {
    pub platform: Arc<FakeOrchestrator>,
    pub store: Arc<MemoryStore>,
    pub log: Arc<MemoryLog>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            platform: FakeOrchestrator::new(),
            store: MemoryStore::new(),
            log: MemoryLog::new(),
        }
    }

    pub fn config() -> ReconcilerConfig {
        ReconcilerConfig {
            deletion_verify_delay_ms: 0,
            ..ReconcilerConfig::default()
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        self.reconciler_with(Self::config())
    }

    pub fn reconciler_with(&self, config: ReconcilerConfig) -> Reconciler {
        Reconciler::new(
            self.platform.clone(),
            self.store.clone(),
            self.log.clone(),
            config,
        )
    }
}
