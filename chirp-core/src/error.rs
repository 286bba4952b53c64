use chirp_types::Table;
use thiserror::Error;

pub type EtlResult<T> = Result<T, EtlError>;

/// Failures of the import pipeline, one variant per stage.
#[derive(Debug, Error)]
pub enum EtlError {
    /// The search collaborator failed or stayed rate-limited past the allowed waits
    #[error("collection failed: {0}")]
    Collection(String),

    /// A derived foreign key has no row in its parent table
    #[error("no {table} row for {key:?}")]
    Lookup { table: Table, key: String },

    /// The store rejected an append; tables appended earlier stay committed
    #[error("failed to load {table}: {message}")]
    Load { table: Table, message: String },

    #[error("flat file error: {0}")]
    FlatFile(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EtlError {
    pub fn lookup(table: Table, key: impl Into<String>) -> Self {
        EtlError::Lookup {
            table,
            key: key.into(),
        }
    }

    pub fn load(table: Table, err: anyhow::Error) -> Self {
        EtlError::Load {
            table,
            message: format!("{:#}", err),
        }
    }
}
