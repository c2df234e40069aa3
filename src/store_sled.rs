//! `sled`-backed persistence, generalizing
//! `TradeContext::save_to_db` / `load_from_db` (`src/context.rs`) from a
//! single keyspace to the four entity stores this core depends on. This is
//! the one concrete "repository adapter" this crate ships, since the
//! teacher ships exactly this kind of adapter (`examples/sled.rs`) rather
//! than leaving persistence entirely unimplemented.

use crate::audit::ExecutionAudit;
use crate::ids::{RequestId, TokenId, VersionId};
use crate::request::ApprovalRequest;
use crate::state_machine::VersionStatus;
use crate::store::{AuditStore, RequestStore, VersionStore, VoteStore};
use crate::version::TokenVersion;
use crate::vote::ValidatorVote;

/// Entities are serde-only (they also travel as JSON in webhook payloads),
/// so rows are encoded with `serde_json` rather than hand-rolling
/// `minicbor::Encode`/`Decode` impls for `chrono::DateTime` and friends the
/// way a hand-rolled `TimeStamp` newtype would need
/// (`src/trade.rs`). `sled`'s keyspace-per-entity layout is otherwise
/// identical to `TradeContext::save_to_db`.
fn encode<T: serde::Serialize>(value: &T) -> anyhow::Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

pub struct SledVersionStore {
    tree: sled::Tree,
}

impl SledVersionStore {
    pub fn open(db: &sled::Db) -> anyhow::Result<Self> {
        Ok(Self {
            tree: db.open_tree("token_versions")?,
        })
    }
}

impl VersionStore for SledVersionStore {
    fn get(&self, id: &VersionId) -> anyhow::Result<Option<TokenVersion>> {
        match self.tree.get(id.as_str())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, version: &TokenVersion) -> anyhow::Result<()> {
        version.check_invariants();
        self.tree.insert(version.id.as_str(), encode(version)?)?;
        Ok(())
    }

    fn find_active_by_parent(&self, parent_token_id: &TokenId) -> anyhow::Result<Vec<TokenVersion>> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (_, bytes) = item?;
            let version: TokenVersion = decode(&bytes)?;
            if &version.parent_token_id == parent_token_id && version.status == VersionStatus::Active {
                out.push(version);
            }
        }
        Ok(out)
    }

    fn find_by_parent_and_number(
        &self,
        parent_token_id: &TokenId,
        version_number: u64,
    ) -> anyhow::Result<Option<TokenVersion>> {
        for item in self.tree.iter() {
            let (_, bytes) = item?;
            let version: TokenVersion = decode(&bytes)?;
            if &version.parent_token_id == parent_token_id && version.version_number == version_number {
                return Ok(Some(version));
            }
        }
        Ok(None)
    }

    fn find_children_active(&self, previous_version_id: &VersionId) -> anyhow::Result<Vec<TokenVersion>> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (_, bytes) = item?;
            let version: TokenVersion = decode(&bytes)?;
            if version.previous_version_id.as_ref() == Some(previous_version_id)
                && version.status == VersionStatus::Active
            {
                out.push(version);
            }
        }
        Ok(out)
    }
}

pub struct SledRequestStore {
    by_id: sled::Tree,
    by_version: sled::Tree,
}

impl SledRequestStore {
    pub fn open(db: &sled::Db) -> anyhow::Result<Self> {
        Ok(Self {
            by_id: db.open_tree("approval_requests")?,
            by_version: db.open_tree("approval_requests_by_version")?,
        })
    }
}

impl RequestStore for SledRequestStore {
    fn get(&self, id: &RequestId) -> anyhow::Result<Option<ApprovalRequest>> {
        match self.by_id.get(id.as_str())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, request: &ApprovalRequest) -> anyhow::Result<()> {
        self.by_id.insert(request.id.as_str(), encode(request)?)?;
        self.by_version
            .insert(request.token_version_id.as_str(), request.id.as_str())?;
        Ok(())
    }

    fn find_by_version(&self, version_id: &VersionId) -> anyhow::Result<Option<ApprovalRequest>> {
        match self.by_version.get(version_id.as_str())? {
            Some(bytes) => {
                let id = String::from_utf8(bytes.to_vec())?;
                self.get(&RequestId::from(id))
            }
            None => Ok(None),
        }
    }
}

pub struct SledVoteStore {
    tree: sled::Tree,
}

impl SledVoteStore {
    pub fn open(db: &sled::Db) -> anyhow::Result<Self> {
        Ok(Self {
            tree: db.open_tree("validator_votes")?,
        })
    }
}

impl VoteStore for SledVoteStore {
    fn append(&self, vote: &ValidatorVote) -> anyhow::Result<()> {
        let key = format!(
            "{}/{}",
            vote.approval_request_id.as_str(),
            vote.voted_at.timestamp_nanos_opt().unwrap_or_default()
        );
        self.tree.insert(key, encode(vote)?)?;
        Ok(())
    }

    fn list_for_request(&self, request_id: &RequestId) -> anyhow::Result<Vec<ValidatorVote>> {
        let prefix = format!("{}/", request_id.as_str());
        let mut out = Vec::new();
        for item in self.tree.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = item?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }
}

pub struct SledAuditStore {
    tree: sled::Tree,
}

impl SledAuditStore {
    pub fn open(db: &sled::Db) -> anyhow::Result<Self> {
        Ok(Self {
            tree: db.open_tree("approval_execution_audit")?,
        })
    }
}

impl AuditStore for SledAuditStore {
    fn append(&self, entry: &ExecutionAudit) -> anyhow::Result<()> {
        // Key by (version_id, execution_timestamp, audit_id) so iteration order
        // is the total order §3 requires without a read-modify-write race.
        let key = format!(
            "{}/{}/{}",
            entry.version_id.as_str(),
            entry.execution_timestamp.timestamp_nanos_opt().unwrap_or_default(),
            entry.audit_id.as_str()
        );
        self.tree.insert(key, encode(entry)?)?;
        Ok(())
    }

    fn list_for_version(&self, version_id: &VersionId) -> anyhow::Result<Vec<ExecutionAudit>> {
        let prefix = format!("{}/", version_id.as_str());
        let mut out = Vec::new();
        for item in self.tree.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = item?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }
}
