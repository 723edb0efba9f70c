//! Approval Ledger (C9): human-in-the-loop gating for state-changing
//! commands. Each pending approval pairs a `watch` channel (resolution
//! updates) with a `CancellationToken` (early abort of the wait, e.g. on
//! shutdown) so a waiter races "human replied" against "expiry fired"
//! through a single `tokio::select!` instead of polling.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use orch_core::error::{OrchestratorError, Result};
use orch_types::{Approval, ApprovalResolution};
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

struct LedgerEntry {
    approval: Approval,
    resolved_tx: watch::Sender<Option<ApprovalResolution>>,
    /// Held so the channel stays open for `subscribe()` callers even if the
    /// original waiter drops its receiver.
    _resolved_rx: watch::Receiver<Option<ApprovalResolution>>,
    expiry_token: CancellationToken,
}

#[derive(Clone)]
pub struct ApprovalLedger {
    entries: Arc<RwLock<HashMap<String, LedgerEntry>>>,
}

impl Default for ApprovalLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalLedger {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Opens a new pending approval with a monotonic uuid id.
    pub async fn open(
        &self,
        project: impl Into<String>,
        summary: impl Into<String>,
        payload: Value,
        ttl: Option<chrono::Duration>,
    ) -> Approval {
        let id = uuid::Uuid::new_v4().to_string();
        let expires_at = ttl.map(|d| Utc::now() + d);
        let approval = Approval::new(id.clone(), project.into(), summary.into(), payload, expires_at);

        let (tx, rx) = watch::channel(None);
        let entry = LedgerEntry {
            approval: approval.clone(),
            resolved_tx: tx,
            _resolved_rx: rx,
            expiry_token: CancellationToken::new(),
        };
        self.entries.write().await.insert(id, entry);
        approval
    }

    pub async fn get(&self, id: &str) -> Option<Approval> {
        self.entries.read().await.get(id).map(|e| e.approval.clone())
    }

    pub async fn list_pending(&self) -> Vec<Approval> {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.approval.is_pending())
            .map(|e| e.approval.clone())
            .collect()
    }

    /// Resolves a pending approval. Idempotent: resolving an already
    /// APPROVED or REJECTED approval is a no-op that returns the existing
    /// record; resolving a TIMED_OUT approval is an error.
    pub async fn resolve(
        &self,
        id: &str,
        resolution: ApprovalResolution,
        resolver: impl Into<String>,
        feedback: Option<String>,
    ) -> Result<Approval> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::ApprovalNotFound(id.to_string()))?;

        match entry.approval.resolution {
            ApprovalResolution::Pending => {
                entry.approval.resolution = resolution;
                entry.approval.resolver = Some(resolver.into());
                entry.approval.feedback = feedback;
                let _ = entry.resolved_tx.send(Some(resolution));
                entry.expiry_token.cancel();
                Ok(entry.approval.clone())
            }
            ApprovalResolution::Approved | ApprovalResolution::Rejected => Ok(entry.approval.clone()),
            ApprovalResolution::TimedOut => {
                Err(OrchestratorError::ApprovalExpired(id.to_string()))
            }
        }
    }

    /// Waits for `id` to resolve, whichever comes first: a human resolution,
    /// the approval's own expiry, or ledger shutdown (`shutdown()`).
    pub async fn wait_for_resolution(&self, id: &str) -> Result<ApprovalResolution> {
        let (mut resolved_rx, expires_at, expiry_token) = {
            let entries = self.entries.read().await;
            let entry = entries
                .get(id)
                .ok_or_else(|| OrchestratorError::ApprovalNotFound(id.to_string()))?;
            if let Some(resolution) = *entry.resolved_tx.borrow() {
                return Ok(resolution);
            }
            (
                entry.resolved_tx.subscribe(),
                entry.approval.expires_at,
                entry.expiry_token.clone(),
            )
        };

        let sleep_until_expiry = async {
            match expires_at {
                Some(at) => {
                    let now = Utc::now();
                    if at > now {
                        let std_duration = (at - now)
                            .to_std()
                            .unwrap_or(std::time::Duration::from_secs(0));
                        tokio::time::sleep(std_duration).await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = resolved_rx.changed() => {
                let resolution = resolved_rx.borrow().unwrap_or(ApprovalResolution::Pending);
                Ok(resolution)
            }
            _ = sleep_until_expiry => {
                self.expire(id).await
            }
            _ = expiry_token.cancelled() => {
                Err(OrchestratorError::ApprovalExpired(id.to_string()))
            }
        }
    }

    async fn expire(&self, id: &str) -> Result<ApprovalResolution> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(id) else {
            return Err(OrchestratorError::ApprovalNotFound(id.to_string()));
        };
        if entry.approval.resolution == ApprovalResolution::Pending {
            entry.approval.resolution = ApprovalResolution::TimedOut;
            let _ = entry.resolved_tx.send(Some(ApprovalResolution::TimedOut));
        }
        Ok(entry.approval.resolution)
    }

    /// Background sweep: marks every pending, past-expiry approval
    /// TIMED_OUT. Intended to run on a periodic tick in the orchestrator's
    /// loop rather than per-approval, catching approvals nobody is actively
    /// waiting on.
    pub async fn sweep_expired(&self) -> Vec<String> {
        let now = Utc::now();
        let mut expired_ids = Vec::new();
        let mut entries = self.entries.write().await;
        for (id, entry) in entries.iter_mut() {
            if entry.approval.is_expired(now) {
                entry.approval.resolution = ApprovalResolution::TimedOut;
                let _ = entry.resolved_tx.send(Some(ApprovalResolution::TimedOut));
                expired_ids.push(id.clone());
            }
        }
        expired_ids
    }

    /// Cancels every in-flight `wait_for_resolution` call, used when the
    /// orchestrator is shutting down and waiters should stop blocking.
    pub async fn shutdown(&self) {
        let entries = self.entries.read().await;
        for entry in entries.values() {
            entry.expiry_token.cancel();
        }
    }
}

pub fn default_ttl() -> ChronoDuration {
    ChronoDuration::seconds(3600)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn open_creates_a_pending_approval() {
        let ledger = ApprovalLedger::new();
        let approval = ledger.open("demo", "approve the plan", json!({}), None).await;
        assert!(approval.is_pending());
        assert_eq!(ledger.list_pending().await.len(), 1);
    }

    #[tokio::test]
    async fn resolve_updates_state_and_is_idempotent_for_approved() {
        let ledger = ApprovalLedger::new();
        let approval = ledger.open("demo", "approve the plan", json!({}), None).await;

        let resolved = ledger
            .resolve(&approval.id, ApprovalResolution::Approved, "alice", None)
            .await
            .unwrap();
        assert_eq!(resolved.resolution, ApprovalResolution::Approved);

        let second = ledger
            .resolve(&approval.id, ApprovalResolution::Rejected, "bob", None)
            .await
            .unwrap();
        assert_eq!(second.resolution, ApprovalResolution::Approved);
    }

    #[tokio::test]
    async fn resolving_a_timed_out_approval_errors() {
        let ledger = ApprovalLedger::new();
        let approval = ledger
            .open("demo", "approve the plan", json!({}), Some(ChronoDuration::milliseconds(1)))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        ledger.sweep_expired().await;

        let result = ledger
            .resolve(&approval.id, ApprovalResolution::Approved, "alice", None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn wait_for_resolution_returns_once_a_human_resolves_it() {
        let ledger = ApprovalLedger::new();
        let approval = ledger.open("demo", "approve the plan", json!({}), None).await;

        let ledger_clone = ledger.clone();
        let id = approval.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            ledger_clone
                .resolve(&id, ApprovalResolution::Approved, "alice", None)
                .await
                .unwrap();
        });

        let resolution = ledger.wait_for_resolution(&approval.id).await.unwrap();
        assert_eq!(resolution, ApprovalResolution::Approved);
    }

    #[tokio::test]
    async fn wait_for_resolution_times_out_on_expiry() {
        let ledger = ApprovalLedger::new();
        let approval = ledger
            .open("demo", "approve the plan", json!({}), Some(ChronoDuration::milliseconds(5)))
            .await;

        let resolution = ledger.wait_for_resolution(&approval.id).await.unwrap();
        assert_eq!(resolution, ApprovalResolution::TimedOut);
    }

    #[tokio::test]
    async fn sweep_expired_marks_past_due_approvals_and_reports_ids() {
        let ledger = ApprovalLedger::new();
        let approval = ledger
            .open("demo", "approve the plan", json!({}), Some(ChronoDuration::milliseconds(1)))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let expired = ledger.sweep_expired().await;
        assert_eq!(expired, vec![approval.id]);
    }
}
