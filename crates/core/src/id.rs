// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types used to correlate dispatches across log lines and records.

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `Display`, `From<String>`, `From<&str>`.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id! {
    /// Correlates a single router dispatch (and everything it fans out to)
    /// across log lines.
    pub struct WorkId;
}

define_id! {
    /// Correlates a council debate's three rounds across log lines.
    pub struct CouncilId;
}

define_id! {
    /// Correlates an approval decision with its audit log row.
    pub struct ApprovalId;
}

/// 1-based ordinal identifying a task within a single nightshift work state.
///
/// Ordinals are assigned at parse time regardless of any numbering the user
/// supplied in the task list text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct TaskId(pub u32);

impl TaskId {
    pub fn first() -> Self {
        TaskId(1)
    }

    pub fn next(self) -> Self {
        TaskId(self.0 + 1)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
