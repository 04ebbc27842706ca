use thiserror::Error;

use crate::ecs::TripStatus;

/// Guard violations at the dispatch call boundary. None of these change state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("a destination is required before estimating")]
    MissingDestination,
    #[error("no ride option is selected")]
    NoOptionSelected,
    #[error("unknown ride option '{0}'")]
    UnknownOption(String),
    #[error("cannot {action} while the trip is {status:?}")]
    InvalidTransition {
        action: &'static str,
        status: TripStatus,
    },
    #[error("a cancellation reason is required once a driver is assigned")]
    ReasonRequired,
    #[error("an incoming request is already pending")]
    IncomingRequestPending,
    #[error("unknown incoming request {0}")]
    UnknownIncomingRequest(u64),
    #[error("the dispatch session has been shut down")]
    SessionClosed,
}
