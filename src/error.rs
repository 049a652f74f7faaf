use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("booking cancelled: {0}")]
    Cancelled(String),

    #[error("driver {0} has no passenger assigned")]
    NoPassengerAssigned(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookingRejected {
    #[error("unknown region: {0}")]
    UnknownRegion(String),

    #[error("region {0} is shutting down")]
    RegionShutdown(String),

    #[error("dispatch is shutting down")]
    DispatchShutdown,
}
