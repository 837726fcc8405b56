pub mod adapter;
pub mod domain;
pub mod ports;
pub mod upstream;

pub use adapter::{flatten, to_upstream_review, AdaptError};
pub use domain::{
    FlatStudyItem, Grade, ReviewSubmission, StudyPlanResponse, SubjectId, UpstreamReviewPayload,
};
pub use ports::{KnowledgeEngine, PortResult, UpstreamError};
pub use upstream::PlanShape;
