//! §4.7 CascadeRetirement — transitions a superseded prior version to
//! REPLACED once its successor is ACTIVE, unless lineage is ambiguous.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::error::TransitionError;
use crate::ids::VersionId;
use crate::state_machine::VersionStatus;
use crate::store::VersionStore;
use crate::transition::TransitionManager;

pub struct CascadeRetirement {
    versions: Arc<dyn VersionStore>,
    transitions: Arc<TransitionManager>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeOutcome {
    Retired,
    NoOpNotActive,
    NoOpAmbiguousLineage,
}

impl CascadeRetirement {
    pub fn new(versions: Arc<dyn VersionStore>, transitions: Arc<TransitionManager>) -> Self {
        Self { versions, transitions }
    }

    /// §4.7 steps 1-4.
    pub fn retire(
        &self,
        prior_version_id: &VersionId,
        new_version_id: &VersionId,
    ) -> Result<CascadeOutcome, TransitionError> {
        let Some(prior) = self.versions.get(prior_version_id).map_err(TransitionError::Store)? else {
            return Ok(CascadeOutcome::NoOpNotActive);
        };
        if prior.status != VersionStatus::Active {
            return Ok(CascadeOutcome::NoOpNotActive);
        }

        let active_children = self
            .versions
            .find_children_active(prior_version_id)
            .map_err(TransitionError::Store)?;
        if active_children.len() > 1 {
            tracing::warn!(
                prior_version_id = %prior_version_id,
                count = active_children.len(),
                "cascade retirement skipped: ambiguous lineage"
            );
            return Ok(CascadeOutcome::NoOpAmbiguousLineage);
        }

        let new_version_id = new_version_id.clone();
        self.transitions.execute(
            prior_version_id,
            VersionStatus::Active,
            VersionStatus::Replaced,
            None,
            json!({ "replaced_by": new_version_id.as_str() }),
            move |v| {
                v.replaced_at = Some(Utc::now());
                v.replaced_by_version_id = Some(new_version_id);
            },
        )?;

        Ok(CascadeOutcome::Retired)
    }
}
