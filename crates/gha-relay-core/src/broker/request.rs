//! Typed request events received from the Radicle CI broker.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The single event handled by one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    Push(PushEvent),
    Patch(PatchEvent),
}

impl RequestEvent {
    /// Radicle repository id the event belongs to.
    pub fn repo(&self) -> &str {
        match self {
            RequestEvent::Push(push) => &push.repository.id,
            RequestEvent::Patch(patch) => &patch.repository.id,
        }
    }

    /// Commit whose CI status is relayed.
    pub fn commit(&self) -> &str {
        match self {
            RequestEvent::Push(push) => &push.after,
            RequestEvent::Patch(patch) => &patch.patch.after,
        }
    }

    /// Review payload, when the event carries one.
    pub fn patch(&self) -> Option<&PatchEvent> {
        match self {
            RequestEvent::Push(_) => None,
            RequestEvent::Patch(patch) => Some(patch),
        }
    }

    /// Event name for logs and span fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestEvent::Push(_) => "push",
            RequestEvent::Patch(_) => "patch",
        }
    }
}

/// Commits pushed to a branch of a Radicle repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PushEvent {
    #[serde(default)]
    pub pusher: Identity,
    #[serde(default)]
    pub before: String,
    pub after: String,
    #[serde(default)]
    pub commits: Vec<String>,
    pub repository: Repository,
}

/// A patch opened or updated, carrying its latest revision.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatchEvent {
    #[serde(default)]
    pub action: String,
    pub patch: PatchDetails,
    pub repository: Repository,
}

impl PatchEvent {
    /// Revision that status comments attach to.
    pub fn latest_revision(&self) -> Option<&Revision> {
        self.patch.revisions.last()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatchDetails {
    pub id: String,
    #[serde(default)]
    pub author: Identity,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: PatchState,
    #[serde(default)]
    pub before: String,
    pub after: String,
    #[serde(default)]
    pub commits: Vec<String>,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub assignees: Vec<String>,
    /// Oldest first.
    #[serde(default)]
    pub revisions: Vec<Revision>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatchState {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub conflicts: Vec<PatchConflict>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatchConflict {
    pub revision_id: String,
    pub oid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Revision {
    pub id: String,
    #[serde(default)]
    pub author: Identity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub oid: String,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

impl Revision {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Repository {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub default_branch: String,
    #[serde(default)]
    pub delegates: Vec<String>,
}

/// A node identity (`did:key:...`) with its alias; used for pushers and authors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub alias: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch_event(revisions: Vec<Revision>) -> RequestEvent {
        RequestEvent::Patch(PatchEvent {
            action: "created".to_string(),
            patch: PatchDetails {
                id: "patch_id".to_string(),
                after: "c0ffee".to_string(),
                revisions,
                ..Default::default()
            },
            repository: Repository {
                id: "rad:z3gqc".to_string(),
                ..Default::default()
            },
        })
    }

    #[test]
    fn test_patch_event_accessors() {
        let event = patch_event(vec![]);
        assert_eq!(event.repo(), "rad:z3gqc");
        assert_eq!(event.commit(), "c0ffee");
        assert_eq!(event.kind(), "patch");
        assert!(event.patch().is_some());
    }

    #[test]
    fn test_latest_revision_is_last() {
        let first = Revision {
            id: "rev1".to_string(),
            timestamp: 1_700_000_000,
            ..Default::default()
        };
        let second = Revision {
            id: "rev2".to_string(),
            timestamp: 1_700_000_100,
            ..Default::default()
        };
        let event = patch_event(vec![first, second]);
        let latest = event.patch().and_then(PatchEvent::latest_revision).unwrap();
        assert_eq!(latest.id, "rev2");
        assert_eq!(latest.created_at().unwrap().timestamp(), 1_700_000_100);
    }

    #[test]
    fn test_push_event_has_no_patch() {
        let event = RequestEvent::Push(PushEvent {
            after: "abc".to_string(),
            repository: Repository {
                id: "R".to_string(),
                ..Default::default()
            },
            ..Default::default()
        });
        assert!(event.patch().is_none());
        assert_eq!(event.commit(), "abc");
    }
}
