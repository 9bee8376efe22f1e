pub mod intents;
pub mod selection;
pub mod states;

pub use intents::{AvailabilityIntent, RootIntent};
pub use selection::{CandidateGroup, CandidateSkill};
pub use states::{ConversationMode, ConversationState, SkillFlow};
