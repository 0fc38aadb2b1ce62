use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilterError>;

#[derive(Error, Debug)]
pub enum FilterError {
    /// Store or network failure. Propagated immediately, never retried
    /// here; retry policy belongs to the caller or the connector.
    #[error("Store connector error: {0}")]
    Connector(String),

    /// Invalid sizing or window parameters, raised at construction before
    /// any store interaction.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// One of several concurrent bucket operations failed while others may
    /// have succeeded. Carries the first encountered error; applied writes
    /// on the buckets that did succeed are not undone.
    #[error("Partial batch failure: {0}")]
    PartialBatch(#[source] Box<FilterError>),
}
