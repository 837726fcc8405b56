//! crates/study_gateway_core/src/upstream.rs
//!
//! The knowledge engine's plan representations. The engine has answered with
//! several shapes over time (nested sessions, localized flashcards, already-flat
//! items, bare knowledge nodes); `PlanShape` resolves which one is present once,
//! so nothing downstream has to probe fields.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::adapter::AdaptError;

pub const SESSIONS_KEY: &str = "sessions";
pub const FLASHCARDS_KEY: &str = "flashcards";
pub const STUDY_ITEMS_KEY: &str = "study_items";
pub const KNOWLEDGE_NODES_KEY: &str = "knowledge_nodes";

//=========================================================================================
// Upstream Records
//=========================================================================================

/// Plan-level metadata. Every field is optional; defaults are applied by the adapter.
#[derive(Debug, Default, Deserialize)]
pub struct PlanMeta {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub student_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub estimated_duration_minutes: Option<f64>,
    #[serde(default)]
    pub focus_level: Option<String>,
    #[serde(default)]
    pub plan_type: Option<String>,
    #[serde(default)]
    pub time_limit_seconds: Option<u64>,
}

impl PlanMeta {
    pub const FIELDS: [&'static str; 7] = [
        "id",
        "student_id",
        "created_at",
        "estimated_duration_minutes",
        "focus_level",
        "plan_type",
        "time_limit_seconds",
    ];
}

#[derive(Debug, Deserialize)]
pub struct UpstreamSession {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub items: Vec<UpstreamItem>,
}

/// The nested question body of an upstream item.
#[derive(Debug, Default, Deserialize)]
pub struct ItemContent {
    #[serde(default)]
    pub front: Option<String>,
    #[serde(default)]
    pub back: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub correct_index: Option<i64>,
}

/// A study item as the engine sends it. Flat fields, when present, win over
/// the nested `content`, which is what lets the adapter re-read its own output.
#[derive(Debug, Default, Deserialize)]
pub struct UpstreamItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub difficulty: Option<f64>,
    #[serde(default)]
    pub content: Option<ItemContent>,
    #[serde(default)]
    pub topic_roi: Option<String>,
    #[serde(default)]
    pub estimated_time_minutes: Option<u32>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub correct_index: Option<i64>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// A flashcard as produced by the engine's generators, with localized field names.
#[derive(Debug, Deserialize)]
pub struct Flashcard {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    pub pergunta: String,
    #[serde(default)]
    pub opcoes: Vec<String>,
    #[serde(default)]
    pub correta_index: Option<i64>,
    #[serde(default)]
    pub explicacao: Option<String>,
    #[serde(default)]
    pub dificuldade: Option<f64>,
}

/// The engine's older plan DTO, which only listed knowledge nodes.
#[derive(Debug, Deserialize)]
pub struct KnowledgeNode {
    #[serde(deserialize_with = "required_lenient_string")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub difficulty: Option<f64>,
}

//=========================================================================================
// Shape Detection
//=========================================================================================

/// Which representation an upstream plan uses, resolved once at the adapter boundary.
#[derive(Debug)]
pub enum PlanShape {
    Sessions(Vec<UpstreamSession>),
    Flashcards(Vec<Flashcard>),
    Flat(Vec<UpstreamItem>),
    KnowledgeNodes(Vec<KnowledgeNode>),
    Empty,
}

impl PlanShape {
    /// Picks the first non-empty item list in priority order: sessions,
    /// flashcards, flat study items, knowledge nodes.
    ///
    /// Missing, `null` and empty lists fall through to the next candidate. A
    /// discriminator holding anything other than an array is a shape error.
    pub fn detect(plan: &Map<String, Value>) -> Result<Self, AdaptError> {
        if let Some(list) = non_empty_list(plan, SESSIONS_KEY)? {
            return decode(SESSIONS_KEY, list).map(Self::Sessions);
        }
        if let Some(list) = non_empty_list(plan, FLASHCARDS_KEY)? {
            return decode(FLASHCARDS_KEY, list).map(Self::Flashcards);
        }
        if let Some(list) = non_empty_list(plan, STUDY_ITEMS_KEY)? {
            return decode(STUDY_ITEMS_KEY, list).map(Self::Flat);
        }
        if let Some(list) = non_empty_list(plan, KNOWLEDGE_NODES_KEY)? {
            return decode(KNOWLEDGE_NODES_KEY, list).map(Self::KnowledgeNodes);
        }
        Ok(Self::Empty)
    }
}

fn non_empty_list<'a>(
    plan: &'a Map<String, Value>,
    key: &'static str,
) -> Result<Option<&'a Value>, AdaptError> {
    match plan.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) if items.is_empty() => Ok(None),
        Some(list @ Value::Array(_)) => Ok(Some(list)),
        Some(_) => Err(AdaptError::Shape {
            field: key,
            reason: "expected an array".to_string(),
        }),
    }
}

fn decode<T: DeserializeOwned>(key: &'static str, list: &Value) -> Result<Vec<T>, AdaptError> {
    Vec::<T>::deserialize(list).map_err(|e| AdaptError::Shape {
        field: key,
        reason: e.to_string(),
    })
}

//=========================================================================================
// Lenient Field Decoding
//=========================================================================================

// Ids arrive as UUID strings from the Python engine but as integers from fixtures.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

fn required_lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    lenient_string(deserializer)?.ok_or_else(|| serde::de::Error::custom("id must not be null"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("fixture must be an object"),
        }
    }

    #[test]
    fn sessions_win_over_other_lists() {
        let plan = object(json!({
            "sessions": [{"topic": "Algebra", "items": []}],
            "flashcards": [{"pergunta": "?"}],
        }));
        assert!(matches!(PlanShape::detect(&plan), Ok(PlanShape::Sessions(s)) if s.len() == 1));
    }

    #[test]
    fn empty_sessions_fall_through_to_flashcards() {
        let plan = object(json!({
            "sessions": [],
            "flashcards": [{"pergunta": "2+2?", "opcoes": ["3", "4"], "correta_index": 1}],
        }));
        assert!(matches!(PlanShape::detect(&plan), Ok(PlanShape::Flashcards(f)) if f.len() == 1));
    }

    #[test]
    fn no_lists_is_an_empty_plan() {
        let plan = object(json!({"id": "p1", "sessions": null}));
        assert!(matches!(PlanShape::detect(&plan), Ok(PlanShape::Empty)));
    }

    #[test]
    fn non_array_discriminator_is_a_shape_error() {
        let plan = object(json!({"sessions": "soon"}));
        let err = PlanShape::detect(&plan).unwrap_err();
        assert!(matches!(err, AdaptError::Shape { field: SESSIONS_KEY, .. }));
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let plan = object(json!({"study_items": [{"id": 42, "question": "q"}]}));
        match PlanShape::detect(&plan).unwrap() {
            PlanShape::Flat(items) => assert_eq!(items[0].id.as_deref(), Some("42")),
            other => panic!("unexpected shape {other:?}"),
        }
    }
}
