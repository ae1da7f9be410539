//! Plan inspection for the consistency check.
//!
//! After a successful apply, a fresh plan must not propose any change. This
//! module parses the `resource_changes` section of `terraform show -json` and
//! separates changes into ignored and unexpected ones.

use serde::{Deserialize, Serialize};

use crate::error::TerraformError;

/// A single action terraform plans for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeAction {
    NoOp,
    Create,
    Read,
    Update,
    Delete,
}

/// A planned change for one resource address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub address: String,
    pub actions: Vec<ChangeAction>,
}

impl ResourceChange {
    pub fn new(address: impl Into<String>, actions: impl Into<Vec<ChangeAction>>) -> Self {
        Self {
            address: address.into(),
            actions: actions.into(),
        }
    }

    /// No-op and data source reads do not count as drift.
    pub fn is_benign(&self) -> bool {
        self.actions
            .iter()
            .all(|a| matches!(a, ChangeAction::NoOp | ChangeAction::Read))
    }

    pub fn creates(&self) -> bool {
        self.actions.contains(&ChangeAction::Create)
    }

    pub fn updates(&self) -> bool {
        self.actions.contains(&ChangeAction::Update)
    }

    /// Deletes, including the delete half of a replacement.
    pub fn destroys(&self) -> bool {
        self.actions.contains(&ChangeAction::Delete)
    }

    /// Compact action label, e.g. `delete,create` for a replacement.
    pub fn action_label(&self) -> String {
        self.actions
            .iter()
            .map(|a| match a {
                ChangeAction::NoOp => "no-op",
                ChangeAction::Create => "create",
                ChangeAction::Read => "read",
                ChangeAction::Update => "update",
                ChangeAction::Delete => "delete",
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Parsed plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanReport {
    pub changes: Vec<ResourceChange>,
}

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    resource_changes: Vec<RawResourceChange>,
}

#[derive(Deserialize)]
struct RawResourceChange {
    address: String,
    change: RawChange,
}

#[derive(Deserialize)]
struct RawChange {
    actions: Vec<ChangeAction>,
}

impl PlanReport {
    pub fn new(changes: Vec<ResourceChange>) -> Self {
        Self { changes }
    }

    /// Parses the output of `terraform show -json <planfile>`.
    pub fn from_show_json(json: &str) -> Result<Self, TerraformError> {
        let raw: RawPlan = serde_json::from_str(json).map_err(|e| TerraformError::Decode {
            command: "show".to_owned(),
            reason: e.to_string(),
        })?;
        let changes = raw
            .resource_changes
            .into_iter()
            .map(|rc| ResourceChange {
                address: rc.address,
                actions: rc.change.actions,
            })
            .collect();
        Ok(Self { changes })
    }

    /// Every non-benign change.
    pub fn pending(&self) -> impl Iterator<Item = &ResourceChange> {
        self.changes.iter().filter(|c| !c.is_benign())
    }

    pub fn has_changes(&self) -> bool {
        self.pending().next().is_some()
    }
}

/// Resource addresses whose planned changes are tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFilter {
    #[serde(default)]
    pub ignore_adds: Vec<String>,
    #[serde(default)]
    pub ignore_updates: Vec<String>,
    #[serde(default)]
    pub ignore_destroys: Vec<String>,
}

impl ChangeFilter {
    /// A change is ignored only if every kind of action it carries is ignored
    /// for its address.
    pub fn ignores(&self, change: &ResourceChange) -> bool {
        let listed = |list: &[String]| list.iter().any(|a| a == &change.address);
        (!change.creates() || listed(&self.ignore_adds))
            && (!change.updates() || listed(&self.ignore_updates))
            && (!change.destroys() || listed(&self.ignore_destroys))
    }

    /// Splits pending changes into `(unexpected, ignored)`.
    pub fn partition<'a>(
        &self,
        plan: &'a PlanReport,
    ) -> (Vec<&'a ResourceChange>, Vec<&'a ResourceChange>) {
        plan.pending().partition(|c| !self.ignores(c))
    }
}
