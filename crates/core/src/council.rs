// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Council debate record.

use crate::provider::ProviderResponse;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One round's outcome: a response per surviving provider, in presentation
/// order (unordered execution, deterministic per-role presentation).
pub type CouncilRound = Vec<ProviderResponse>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilRecord {
    pub topic: String,
    pub round1: CouncilRound,
    pub round2: CouncilRound,
    pub synthesis: ProviderResponse,
    #[serde(with = "duration_millis")]
    pub total_elapsed: Duration,
}

impl CouncilRecord {
    /// True when every round-1 provider errored (the
    /// record still carries topic and timing when all providers fail).
    pub fn all_failed(&self) -> bool {
        !self.round1.is_empty() && self.round1.iter().all(|r| r.is_error())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
