use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::model::{Cluster, Command};

/// A filter over catalog entities. All present fields must match (AND):
/// id and name match on containment, version and status match exactly,
/// and the candidate's tags must be a superset of the criterion's tags.
/// An empty criterion matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Criterion {
    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn matches_cluster(&self, cluster: &Cluster) -> bool {
        self.id.as_deref().is_none_or(|v| cluster.id.contains(v))
            && self
                .name
                .as_deref()
                .is_none_or(|v| cluster.name.contains(v))
            && self
                .version
                .as_deref()
                .is_none_or(|v| cluster.version == v)
            && self
                .status
                .as_deref()
                .is_none_or(|v| cluster.status.as_str().eq_ignore_ascii_case(v))
            && self.tags.iter().all(|t| cluster.tags.contains(t))
    }

    pub fn matches_command(&self, command: &Command) -> bool {
        self.id.as_deref().is_none_or(|v| command.id.contains(v))
            && self
                .name
                .as_deref()
                .is_none_or(|v| command.name.contains(v))
            && self
                .version
                .as_deref()
                .is_none_or(|v| command.version == v)
            && self
                .status
                .as_deref()
                .is_none_or(|v| command.status.as_str().eq_ignore_ascii_case(v))
            && self.tags.iter().all(|t| command.tags.contains(t))
    }
}
