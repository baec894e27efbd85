//! Partition naming, install/activate lifecycle and eviction.
//!
//! ### Lifecycle
//! `Idle → Installing → Installed → Active`, or `Installing → Redundant` when a
//! manifest fetch fails. A redundant install leaves whatever was current before
//! it (an adopted previous deployment, or nothing) serving. A skip-waiting
//! request received mid-install is remembered and activates on completion.
//!
//! ### Install atomicity
//! Manifest responses are staged in memory first; the store is only touched once
//! every fetch succeeded. If a write then fails, partitions created by the
//! attempt are removed again.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use stash_core::{AppConfig, CacheStore, CachedResponse, Error, PartitionRole, Request, RequestKey};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use url::Url;

use super::host::Host;
use crate::fetch::Network;

/// Worker lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Installing,
    Installed,
    Active,
    Redundant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Static partition that was populated.
    pub partition: String,
    /// Number of manifest entries written.
    pub entries: usize,
    /// The new worker may activate without waiting for old clients.
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateOutcome {
    /// Superseded partitions removed during cleanup.
    pub deleted: Vec<String>,
}

#[derive(Debug)]
struct LifecycleState {
    phase: Phase,
    current: HashMap<PartitionRole, String>,
    skip_waiting: bool,
}

/// Owns partition names and the install/activate/evict operations.
pub struct PartitionManager {
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    host: Arc<dyn Host>,
    origin: Url,
    manifest: Vec<String>,
    declared: HashMap<PartitionRole, String>,
    max_dynamic_entries: usize,
    state: RwLock<LifecycleState>,
}

impl PartitionManager {
    pub fn new(
        config: &AppConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>, host: Arc<dyn Host>,
    ) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let declared = PartitionRole::ALL
            .into_iter()
            .map(|role| (role, config.partition_name(role)))
            .collect();

        Ok(Self {
            store,
            network,
            host,
            origin,
            manifest: config.manifest.clone(),
            declared,
            max_dynamic_entries: config.max_dynamic_entries,
            state: RwLock::new(LifecycleState { phase: Phase::Idle, current: HashMap::new(), skip_waiting: false }),
        })
    }

    pub async fn phase(&self) -> Phase {
        self.state.read().await.phase
    }

    /// Name this engine declares for a role.
    pub fn declared(&self, role: PartitionRole) -> &str {
        self.declared.get(&role).map(String::as_str).unwrap_or_default()
    }

    /// Partition currently serving a role: the adopted or activated one, else the declared one.
    pub async fn partition_for(&self, role: PartitionRole) -> String {
        let state = self.state.read().await;
        state
            .current
            .get(&role)
            .cloned()
            .unwrap_or_else(|| self.declared(role).to_string())
    }

    /// Adopt partitions persisted by an earlier run.
    ///
    /// If the declared static partition exists the worker is already active and
    /// any superseded partitions left by an interrupted activation are removed.
    /// Otherwise the highest existing version of each role keeps serving until
    /// this worker installs and activates.
    pub async fn resume(&self) -> Result<Phase, Error> {
        let existing = self.store.partitions().await?;
        let mut state = self.state.write().await;

        if existing.iter().any(|name| name == self.declared(PartitionRole::Static)) {
            self.delete_undeclared().await?;
            state.current = self.declared.clone();
            state.phase = Phase::Active;
        } else {
            for role in PartitionRole::ALL {
                let newest = existing
                    .iter()
                    .filter_map(|name| match PartitionRole::parse_partition_name(name) {
                        Some((r, version)) if r == role => Some((version, name)),
                        _ => None,
                    })
                    .max_by_key(|(version, _)| *version);
                if let Some((_, name)) = newest {
                    state.current.insert(role, name.clone());
                }
            }
        }

        tracing::info!(phase = ?state.phase, current = ?state.current, "resumed partitions");
        Ok(state.phase)
    }

    /// Populate the declared static partition from the manifest.
    pub async fn install(&self) -> Result<InstallOutcome, Error> {
        {
            let mut state = self.state.write().await;
            if state.phase == Phase::Installing {
                return Err(Error::InvalidState("install already in progress".into()));
            }
            state.phase = Phase::Installing;
        }

        let partition = self.declared(PartitionRole::Static).to_string();
        let result = match self.stage().await {
            Ok(staged) => self.commit(staged).await,
            Err(err) => Err(err),
        };

        let activate_now = {
            let mut state = self.state.write().await;
            match &result {
                Ok(entries) => {
                    state.phase = Phase::Installed;
                    tracing::info!(%partition, entries, "install complete");
                }
                Err(err) => {
                    state.phase = Phase::Redundant;
                    tracing::warn!(%partition, error = %err, "install failed; previous partitions stay current");
                }
            }
            std::mem::take(&mut state.skip_waiting) && result.is_ok()
        };

        let entries = result?;
        if activate_now {
            if let Err(err) = self.activate().await {
                tracing::warn!(%partition, error = %err, "deferred skip waiting failed");
            }
        }
        Ok(InstallOutcome { partition, entries, skip_waiting: true })
    }

    /// Fetch every manifest entry concurrently; any failure aborts the rest.
    async fn stage(&self) -> Result<Vec<(RequestKey, CachedResponse)>, Error> {
        let mut tasks = JoinSet::new();
        for (index, path) in self.manifest.iter().enumerate() {
            let url = self
                .origin
                .join(path)
                .map_err(|e| Error::InstallFailure(format!("bad manifest entry {path}: {e}")))?;
            let network = Arc::clone(&self.network);
            tasks.spawn(async move {
                let request = Request::get(url);
                let result = network.fetch(&request).await;
                (index, request, result)
            });
        }

        let mut staged: Vec<Option<(RequestKey, CachedResponse)>> = vec![None; self.manifest.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, request, result) =
                joined.map_err(|e| Error::InstallFailure(format!("manifest fetch aborted: {e}")))?;
            let response = result.map_err(|e| Error::InstallFailure(format!("{}: {e}", request.url)))?;
            if !response.is_ok() {
                return Err(Error::InstallFailure(format!("{} returned {}", request.url, response.status)));
            }
            staged[index] = Some((request.key(), CachedResponse::from_response(&response)));
        }

        Ok(staged.into_iter().flatten().collect())
    }

    async fn commit(&self, staged: Vec<(RequestKey, CachedResponse)>) -> Result<usize, Error> {
        let entries = staged.len();
        let mut created = Vec::new();

        if let Err(err) = self.write_staged(staged, &mut created).await {
            for name in created {
                if let Err(e) = self.store.delete_partition(&name).await {
                    tracing::warn!(partition = %name, error = %e, "failed to discard partial install");
                }
            }
            return Err(Error::InstallFailure(format!("writing manifest entries: {err}")));
        }

        Ok(entries)
    }

    async fn write_staged(
        &self, staged: Vec<(RequestKey, CachedResponse)>, created: &mut Vec<String>,
    ) -> Result<(), Error> {
        let static_name = self.declared(PartitionRole::Static);
        for role in PartitionRole::ALL {
            let name = self.declared(role);
            if self.store.open(name).await? {
                created.push(name.to_string());
            }
        }
        for (key, entry) in staged {
            self.store.put(static_name, &key, entry).await?;
        }
        Ok(())
    }

    /// Delete every undeclared partition, promote the declared ones and claim clients.
    pub async fn activate(&self) -> Result<ActivateOutcome, Error> {
        let deleted = {
            let mut state = self.state.write().await;
            if state.phase != Phase::Installed {
                return Err(Error::InvalidState(format!("cannot activate from {:?}", state.phase)));
            }

            let deleted = self.delete_undeclared().await?;
            state.current = self.declared.clone();
            state.phase = Phase::Active;
            deleted
        };

        self.host.claim_clients().await?;
        tracing::info!(
            static_partition = self.declared(PartitionRole::Static),
            dynamic_partition = self.declared(PartitionRole::Dynamic),
            "activated"
        );

        Ok(ActivateOutcome { deleted })
    }

    /// Activate now if installed, or once the running install completes.
    pub async fn skip_waiting(&self) -> Result<Option<ActivateOutcome>, Error> {
        let phase = {
            let mut state = self.state.write().await;
            if state.phase == Phase::Installing {
                state.skip_waiting = true;
                tracing::debug!("skip waiting deferred until install completes");
                return Ok(None);
            }
            state.phase
        };

        match phase {
            Phase::Installed => self.activate().await.map(Some),
            phase => {
                tracing::debug!(?phase, "skip waiting ignored");
                Ok(None)
            }
        }
    }

    /// Remove every stored partition this worker does not declare.
    async fn delete_undeclared(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.store.partitions().await? {
            if self.declared.values().any(|declared| *declared == name) {
                continue;
            }
            if self.store.delete_partition(&name).await? {
                tracing::info!(partition = %name, "deleted superseded partition");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Trim the current dynamic partition to its cap, oldest-inserted first.
    pub async fn evict(&self) -> Result<usize, Error> {
        let partition = self.partition_for(PartitionRole::Dynamic).await;
        let keys = self.store.keys(&partition).await?;
        let excess = keys.len().saturating_sub(self.max_dynamic_entries);

        let mut removed = 0;
        for key in keys.iter().take(excess) {
            if self.store.delete(&partition, key).await? {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(%partition, removed, cap = self.max_dynamic_entries, "evicted oldest entries");
        }
        Ok(removed)
    }

    /// Delete every stored partition, all roles and versions.
    pub async fn clear_all(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.store.partitions().await? {
            if self.store.delete_partition(&name).await? {
                deleted.push(name);
            }
        }
        tracing::info!(count = deleted.len(), "cleared all partitions");
        Ok(deleted)
    }
}
