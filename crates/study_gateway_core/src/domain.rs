//! crates/study_gateway_core/src/domain.rs
//!
//! Defines the core data structures exchanged between the study client and the
//! knowledge engine. The client-facing shapes are flat; the upstream shapes live
//! in `upstream.rs`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use utoipa::ToSchema;

//=========================================================================================
// Identity
//=========================================================================================

/// The authenticated user id carried by a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectId(String);

impl SubjectId {
    /// Builds a subject id, rejecting blank values.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//=========================================================================================
// Review Grades
//=========================================================================================

/// The ordinal outcome of a review, from "repeat" up to "easy".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    Repeat = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

/// Grades strictly above this one count as a successful recall.
pub const SUCCESS_THRESHOLD: Grade = Grade::Repeat;

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::Repeat, Grade::Hard, Grade::Good, Grade::Easy];

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self > SUCCESS_THRESHOLD
    }
}

impl TryFrom<i64> for Grade {
    type Error = i64;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Grade::Repeat),
            2 => Ok(Grade::Hard),
            3 => Ok(Grade::Good),
            4 => Ok(Grade::Easy),
            other => Err(other),
        }
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

impl<'de> Deserialize<'de> for Grade {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Grade::try_from(raw).map_err(|value| {
            serde::de::Error::custom(format!("grade must be 1, 2, 3 or 4, got {value}"))
        })
    }
}

//=========================================================================================
// Review Submission
//=========================================================================================

/// A validated review coming from the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSubmission {
    pub node_id: String,
    pub grade: Grade,
    pub response_time_seconds: Option<f64>,
}

/// The review body the knowledge engine expects.
///
/// `success` is always derived from `grade` by the gateway. `grade` travels
/// along as advisory context only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamReviewPayload {
    pub student_id: String,
    pub success: bool,
    pub response_time_seconds: f64,
    pub grade: Grade,
}

//=========================================================================================
// Client-Facing Study Plan
//=========================================================================================

/// A single study item with no nested sub-objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FlatStudyItem {
    /// Unique within the enclosing plan.
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    /// Difficulty as reported upstream, usually within 0.0 to 1.0.
    pub difficulty: f64,
    pub question: String,
    pub options: Vec<String>,
    /// Always a valid index into `options`, or 0 when there are none.
    pub correct_index: usize,
    pub explanation: String,
}

/// The normalized study plan returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StudyPlanResponse {
    pub id: String,
    pub student_id: String,
    /// RFC 3339 timestamp, passed through verbatim when the engine provides one.
    pub created_at: String,
    pub study_items: Vec<FlatStudyItem>,
    pub estimated_duration_minutes: u32,
    pub focus_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_seconds: Option<u64>,
}
