//! crates/study_gateway_core/src/adapter.rs
//!
//! Converts between the knowledge engine's payloads and the client contract.
//!
//! Generation direction: `flatten` turns whatever plan shape the engine sent
//! into a `StudyPlanResponse` with one `FlatStudyItem` per upstream item.
//! Review direction: `to_upstream_review` builds the engine's review body from
//! a validated client submission.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{
    FlatStudyItem, ReviewSubmission, StudyPlanResponse, SubjectId, UpstreamReviewPayload,
};
use crate::upstream::{Flashcard, KnowledgeNode, PlanMeta, PlanShape, UpstreamItem};

pub const DEFAULT_ITEM_TYPE: &str = "flashcard";
pub const DEFAULT_FOCUS_LEVEL: &str = "review";
pub const FLASHCARDS_TOPIC: &str = "Flashcards";
/// Minutes assumed for an item that does not state its own estimate.
pub const DEFAULT_ITEM_MINUTES: u32 = 1;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdaptError {
    #[error("upstream plan is not a JSON object")]
    NotAnObject,
    #[error("upstream field `{field}` has an unexpected shape: {reason}")]
    Shape { field: &'static str, reason: String },
}

//=========================================================================================
// Generation Direction
//=========================================================================================

/// Normalizes an upstream plan into the client contract.
///
/// A plan with no items is a valid, empty plan. Running `flatten` on its own
/// serialized output yields the same plan.
pub fn flatten(
    raw: Value,
    subject: &SubjectId,
    now: DateTime<Utc>,
) -> Result<StudyPlanResponse, AdaptError> {
    let Value::Object(plan) = raw else {
        return Err(AdaptError::NotAnObject);
    };

    let meta = plan_meta(&plan)?;
    let shape = PlanShape::detect(&plan)?;

    let created_at = non_blank(meta.created_at)
        .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true));
    let plan_id = non_blank(meta.id).unwrap_or_else(|| derived_plan_id(subject, &created_at, &plan));
    let mut builder = ItemBuilder::new(&plan_id);

    match shape {
        PlanShape::Sessions(sessions) => {
            for session in sessions {
                let topic = session.topic.as_deref();
                for item in session.items {
                    builder.push_item(item, topic);
                }
            }
        }
        PlanShape::Flashcards(cards) => {
            for card in cards {
                builder.push_flashcard(card);
            }
        }
        PlanShape::Flat(items) => {
            for item in items {
                builder.push_item(item, None);
            }
        }
        PlanShape::KnowledgeNodes(nodes) => {
            for node in nodes {
                builder.push_knowledge_node(node);
            }
        }
        PlanShape::Empty => {}
    }

    let estimated_duration_minutes = meta
        .estimated_duration_minutes
        .filter(|minutes| minutes.is_finite() && *minutes >= 0.0)
        .map(|minutes| minutes.round().min(u32::MAX as f64) as u32)
        .unwrap_or(builder.estimated_minutes);

    Ok(StudyPlanResponse {
        id: plan_id.clone(),
        student_id: non_blank(meta.student_id).unwrap_or_else(|| subject.to_string()),
        created_at,
        study_items: builder.items,
        estimated_duration_minutes,
        focus_level: non_blank(meta.focus_level)
            .unwrap_or_else(|| DEFAULT_FOCUS_LEVEL.to_string()),
        plan_type: non_blank(meta.plan_type),
        time_limit_seconds: meta.time_limit_seconds,
    })
}

/// Name-based id for plans the engine left unnamed, so the same payload for
/// the same subject and time always gets the same id.
fn derived_plan_id(subject: &SubjectId, created_at: &str, plan: &Map<String, Value>) -> String {
    let mut name = format!("{subject}\n{created_at}\n").into_bytes();
    name.extend(serde_json::to_vec(plan).unwrap_or_default());
    Uuid::new_v5(&Uuid::NAMESPACE_OID, &name).to_string()
}

// Only the metadata keys are copied, so the item lists are not cloned twice.
fn plan_meta(plan: &Map<String, Value>) -> Result<PlanMeta, AdaptError> {
    let fields: Map<String, Value> = PlanMeta::FIELDS
        .iter()
        .filter_map(|key| plan.get(*key).map(|value| (key.to_string(), value.clone())))
        .collect();
    PlanMeta::deserialize(Value::Object(fields)).map_err(|e| AdaptError::Shape {
        field: "plan",
        reason: e.to_string(),
    })
}

/// Accumulates flat items while keeping ids unique and summing time estimates.
struct ItemBuilder<'a> {
    plan_id: &'a str,
    items: Vec<FlatStudyItem>,
    seen_ids: HashSet<String>,
    estimated_minutes: u32,
}

impl<'a> ItemBuilder<'a> {
    fn new(plan_id: &'a str) -> Self {
        Self {
            plan_id,
            items: Vec::new(),
            seen_ids: HashSet::new(),
            estimated_minutes: 0,
        }
    }

    fn push_item(&mut self, item: UpstreamItem, topic: Option<&str>) {
        let content = item.content.unwrap_or_default();
        let options = item.options.or(content.options).unwrap_or_default();
        let correct_index = valid_index(item.correct_index.or(content.correct_index), &options);

        let title = non_blank(item.title)
            .or_else(|| topic.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string))
            .or_else(|| non_blank(item.topic_roi))
            .unwrap_or_default();

        self.push(
            item.id,
            item.estimated_time_minutes,
            FlatStudyItem {
                id: String::new(),
                title,
                item_type: non_blank(item.item_type)
                    .unwrap_or_else(|| DEFAULT_ITEM_TYPE.to_string()),
                difficulty: finite_or_zero(item.difficulty),
                question: item.question.or(content.front).unwrap_or_default(),
                options,
                correct_index,
                explanation: non_blank(item.explanation)
                    .or(content.back)
                    .unwrap_or_default(),
            },
        );
    }

    fn push_flashcard(&mut self, card: Flashcard) {
        let correct_index = valid_index(card.correta_index, &card.opcoes);
        self.push(
            card.id,
            None,
            FlatStudyItem {
                id: String::new(),
                title: FLASHCARDS_TOPIC.to_string(),
                item_type: DEFAULT_ITEM_TYPE.to_string(),
                difficulty: finite_or_zero(card.dificuldade),
                question: card.pergunta,
                options: card.opcoes,
                correct_index,
                explanation: card.explicacao.unwrap_or_default(),
            },
        );
    }

    fn push_knowledge_node(&mut self, node: KnowledgeNode) {
        let title = node.title.unwrap_or_default();
        self.push(
            Some(node.id),
            None,
            FlatStudyItem {
                id: String::new(),
                question: title.clone(),
                title,
                item_type: DEFAULT_ITEM_TYPE.to_string(),
                difficulty: finite_or_zero(node.difficulty),
                options: Vec::new(),
                correct_index: 0,
                explanation: node.context.unwrap_or_default(),
            },
        );
    }

    fn push(&mut self, upstream_id: Option<String>, minutes: Option<u32>, mut item: FlatStudyItem) {
        let position = self.items.len() + 1;
        let base = non_blank(upstream_id).unwrap_or_else(|| format!("{}-{position}", self.plan_id));
        item.id = self.unique_id(base);
        self.estimated_minutes = self
            .estimated_minutes
            .saturating_add(minutes.unwrap_or(DEFAULT_ITEM_MINUTES));
        self.items.push(item);
    }

    fn unique_id(&mut self, base: String) -> String {
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.seen_ids.contains(&candidate) {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        self.seen_ids.insert(candidate.clone());
        candidate
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn valid_index(index: Option<i64>, options: &[String]) -> usize {
    index
        .and_then(|i| usize::try_from(i).ok())
        .filter(|i| *i < options.len())
        .unwrap_or(0)
}

//=========================================================================================
// Review Direction
//=========================================================================================

/// Builds the engine's review body. `success` is recomputed from the grade and
/// the response time is floored at zero.
pub fn to_upstream_review(
    subject: &SubjectId,
    submission: &ReviewSubmission,
) -> UpstreamReviewPayload {
    let response_time_seconds = submission
        .response_time_seconds
        .filter(|secs| secs.is_finite())
        .map(|secs| secs.max(0.0))
        .unwrap_or(0.0);

    UpstreamReviewPayload {
        student_id: subject.to_string(),
        success: submission.grade.is_success(),
        response_time_seconds,
        grade: submission.grade,
    }
}
