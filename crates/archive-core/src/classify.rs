use std::fmt;
use std::str::FromStr;

use archive_types::{EventKind, is_placeholder_category};

/// What to do with an incoming event given what the store already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Insert,
    Update,
    Skip,
}

/// How rows that already exist are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilePolicy {
    /// Only placeholder rows are ever rewritten; resolved rows are frozen.
    #[default]
    Frozen,
    /// Any resolved incoming event overwrites the stored row. Placeholders
    /// still never overwrite a resolved row. Replays are no longer write-free.
    AlwaysUpdate,
}

impl fmt::Display for ReconcilePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Frozen => "frozen",
            Self::AlwaysUpdate => "always-update",
        })
    }
}

impl FromStr for ReconcilePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frozen" => Ok(Self::Frozen),
            "always-update" | "always_update" => Ok(Self::AlwaysUpdate),
            other => Err(format!(
                "unknown reconcile policy '{other}' (expected 'frozen' or 'always-update')"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EventClassifier {
    policy: ReconcilePolicy,
}

impl EventClassifier {
    pub fn new(policy: ReconcilePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// Decide INSERT / UPDATE / SKIP from the incoming kind and the stored
    /// row's category (`None` when no row exists). Pure.
    pub fn classify(&self, incoming: EventKind, stored_category: Option<&str>) -> Decision {
        let Some(stored) = stored_category else {
            return Decision::Insert;
        };

        let stored_placeholder = is_placeholder_category(stored);
        let incoming_placeholder = incoming.is_placeholder();

        match self.policy {
            ReconcilePolicy::Frozen => {
                if stored_placeholder && !incoming_placeholder {
                    Decision::Update
                } else {
                    Decision::Skip
                }
            }
            ReconcilePolicy::AlwaysUpdate => {
                if incoming_placeholder {
                    Decision::Skip
                } else {
                    Decision::Update
                }
            }
        }
    }
}
