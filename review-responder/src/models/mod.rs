mod requests;
mod review;
mod session;
mod token;

pub use requests::*;
pub use review::{Review, ReviewFailure, ProcessStage, ProcessSummary};
pub use session::PendingAuthorization;
pub use token::{AccessGrant, TokenPair};
