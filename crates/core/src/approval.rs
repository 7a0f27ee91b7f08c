// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Approval gate packet and audit record.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ApprovalFlags {
    pub experiment: bool,
    pub production_impact: bool,
    pub urgent: bool,
}

/// Input packet submitted at a phase boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalPacket {
    pub phase: String,
    pub context: String,
    pub flags: ApprovalFlags,
    pub implementation_summary: String,
    pub test_result: TestResult,
    pub error_report: Option<String>,
}

/// Decision record, written exactly once per decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub phase: String,
    pub context: String,
    pub flags: ApprovalFlags,
    pub implementation_summary: String,
    pub test_result: TestResult,
    pub error_report: Option<String>,
    pub approved: bool,
    pub reason: String,
    pub raw_response: String,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    pub timed_out: bool,
    pub had_error: bool,
}

impl ApprovalRecord {
    /// `approved` is false whenever `timed_out || had_error || raw parse
    /// failed`. Construction always goes through
    /// this constructor so the invariant cannot be violated by a caller
    /// setting `approved: true` alongside `timed_out`/`had_error`.
    pub fn new(
        packet: ApprovalPacket,
        approved: bool,
        reason: impl Into<String>,
        raw_response: impl Into<String>,
        elapsed: Duration,
        timed_out: bool,
        had_error: bool,
    ) -> Self {
        let approved = approved && !timed_out && !had_error;
        Self {
            phase: packet.phase,
            context: packet.context,
            flags: packet.flags,
            implementation_summary: packet.implementation_summary,
            test_result: packet.test_result,
            error_report: packet.error_report,
            approved,
            reason: reason.into(),
            raw_response: raw_response.into(),
            elapsed,
            timed_out,
            had_error,
        }
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
