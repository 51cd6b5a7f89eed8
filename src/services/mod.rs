pub mod candidates;
pub mod predicate;
pub mod ranking;
pub mod recommendations;
pub mod session;

pub use ranking::Ranker;
pub use recommendations::{
    BrowseRequest, RecommendationRequest, RecommendationService, RecommendationSettings,
};
pub use session::{SessionResolver, TrustedHeaderResolver, UserInfoResolver};
