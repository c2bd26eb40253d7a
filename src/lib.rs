pub mod clock;
pub mod credits;
pub mod csv;
pub mod engine;
pub mod model;
pub mod notify;
pub mod query;
pub mod seed;
pub mod validate;

pub use credits::Credits;
pub use engine::{Engine, EngineError, SharedEngine};
pub use model::{
    Decision, Project, ProjectId, RedemptionId, RedemptionRequest, RedemptionType, Status, User,
    UserId,
};
