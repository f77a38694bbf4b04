//! Error types and result types for store and query operations.
//!
//! Every fallible operation in this crate returns [`StoreResult<T>`]. Collaborator
//! failures are surfaced as-is: nothing here retries or recovers partially.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when working with a store.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The backend could not be constructed or could not reach the database.
    #[error("Connection error: {0}")]
    Connection(String),
    /// An identity string was malformed, or an operation that needs a persisted
    /// identity was given a zero one.
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
    /// No record matched the lookup.
    /// The first argument is the identity, the second is the collection name.
    #[error("Record {0} not found in collection {1}")]
    NotFound(String, String),
    /// A write to the backend failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
    /// A predicate or index descriptor named an empty field.
    #[error("Invalid field name: {0:?}")]
    InvalidField(String),
    /// An argument was outside the range an operation accepts.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Serialization/deserialization error when converting records (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A read against the underlying backend failed.
    #[error("Backend error: {0}")]
    Backend(String),
    /// Store configuration was missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// A specialized `Result` type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
