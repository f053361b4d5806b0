//! Network construction and state errors.

use hn_aml::AmlError;
use hn_core::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Pipe '{pipe}' refers to non-existent node {node}")]
    UnknownNode { pipe: String, node: NodeId },

    #[error("'{element}' refers to non-existent pattern '{pattern}'")]
    UnknownPattern { element: String, pattern: String },

    #[error("Unknown {kind}: {name}")]
    UnknownElement { kind: &'static str, name: String },

    #[error("Invalid geometry for '{element}': {what}")]
    InvalidGeometry { element: String, what: &'static str },

    #[error("Network has no reservoir or tank to fix heads")]
    NoFixedHead,

    #[error("Invalid time options: {what}")]
    InvalidTimeOptions { what: &'static str },

    #[error("Model is missing {what}")]
    MissingFromModel { what: String },

    #[error("Model error: {0}")]
    Model(#[from] AmlError),
}

pub type NetworkResult<T> = Result<T, NetworkError>;
