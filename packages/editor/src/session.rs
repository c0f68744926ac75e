//! # Collaboration Session
//!
//! Tracks one client's unconfirmed steps against a central authority.
//!
//! Local steps are applied optimistically and kept until the authority
//! echoes them back. When remote steps arrive first, the unconfirmed steps
//! are undone, the remote steps applied, and the local steps mapped over
//! them and reapplied, all in one transaction, so every enforcer recomputes
//! from the merged document.

use crate::errors::EditorError;
use crate::meta;
use crate::state::EditorState;
use manuscript_model::{Step, Transaction};
use serde::Serialize;

/// Local step waiting for confirmation, with its inverse
#[derive(Debug, Clone)]
struct Unconfirmed {
    step: Step,
    inverse: Step,
}

/// Steps ready to be sent, as the authority expects them
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sendable {
    pub version: u64,
    pub steps: Vec<Step>,
    pub client_id: String,
}

#[derive(Debug, Clone)]
pub struct CollabSession {
    client_id: String,

    /// Number of steps confirmed by the authority
    version: u64,

    unconfirmed: Vec<Unconfirmed>,
}

impl CollabSession {
    pub fn new(client_id: impl Into<String>, version: u64) -> Self {
        Self {
            client_id: client_id.into(),
            version,
            unconfirmed: Vec::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn pending_count(&self) -> usize {
        self.unconfirmed.len()
    }

    /// Remember the steps of a locally applied transaction
    pub fn record_local(&mut self, tr: &Transaction) {
        self.unconfirmed.extend(
            tr.steps()
                .iter()
                .zip(tr.inverses())
                .map(|(step, inverse)| Unconfirmed {
                    step: step.clone(),
                    inverse: inverse.clone(),
                }),
        );
    }

    pub fn sendable(&self) -> Option<Sendable> {
        if self.unconfirmed.is_empty() {
            return None;
        }
        Some(Sendable {
            version: self.version,
            steps: self.unconfirmed.iter().map(|u| u.step.clone()).collect(),
            client_id: self.client_id.clone(),
        })
    }

    /// Take in steps accepted by the authority since our version.
    ///
    /// Leading steps carrying our client id confirm our own steps. Returns
    /// the transaction merging the remaining remote steps into `state`, or
    /// `None` when everything received was ours.
    pub fn receive(
        &mut self,
        state: &EditorState,
        steps: Vec<Step>,
        client_ids: &[String],
    ) -> Result<Option<Transaction>, EditorError> {
        let received = steps.len() as u64;
        let ours = client_ids
            .iter()
            .take_while(|id| **id == self.client_id)
            .count()
            .min(self.unconfirmed.len());
        self.version += received;
        self.unconfirmed = self.unconfirmed.split_off(ours);

        let remote: Vec<Step> = steps.into_iter().skip(ours).collect();
        if remote.is_empty() {
            tracing::debug!(confirmed = ours, version = self.version, "Own steps confirmed");
            return Ok(None);
        }

        let mut tr = state.tr();
        for pending in self.unconfirmed.iter().rev() {
            tr.step(pending.inverse.clone())?;
        }
        for step in remote {
            tr.step(step)?;
        }

        // Each local step maps over the undo of the steps after it, the
        // remote steps and the local steps already rebased
        let undone = self.unconfirmed.len();
        let mut rebased = Vec::with_capacity(undone);
        for (index, pending) in std::mem::take(&mut self.unconfirmed).into_iter().enumerate() {
            let mapping = tr.mapping().slice(undone - index);
            let Some(step) = pending.step.map(&mapping) else {
                tracing::debug!("Local step dropped by remote change");
                continue;
            };
            if tr.step(step.clone()).is_err() {
                tracing::warn!("Local step no longer applies after rebase; dropping it");
                continue;
            }
            let inverse = tr.inverses().last().cloned().unwrap_or_else(|| step.clone());
            rebased.push(Unconfirmed { step, inverse });
        }
        self.unconfirmed = rebased;

        tr.set_meta(meta::REMOTE, true);
        tr.set_add_to_history(false);
        tr.set_skip_tracking(true);
        tracing::debug!(
            version = self.version,
            pending = self.unconfirmed.len(),
            "Merged remote steps"
        );
        Ok(Some(tr))
    }
}
