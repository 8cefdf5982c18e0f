use chrono::NaiveDate;

/// Failures callers need to tell apart. Each variant names the pipeline stage
/// and the key (user/date or relation batch) it failed on.
#[derive(Debug, thiserror::Error)]
pub enum PawError {
    #[error("encode stage failed for {user} {date}: {source}")]
    Encode {
        user: String,
        date: NaiveDate,
        #[source]
        source: serde_json::Error,
    },

    #[error("decode stage failed for {user} {date}: stored snapshot needs manual repair: {source}")]
    Decode {
        user: String,
        date: NaiveDate,
        #[source]
        source: serde_json::Error,
    },

    #[error("load stage failed for relation '{relation}' ({rows} rows): {source}")]
    Load {
        relation: &'static str,
        rows: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("foreign key enforcement is not active on this connection; refusing to write '{relation}'")]
    ForeignKeysDisabled { relation: &'static str },

    #[error("report stage failed for {user}: no weight measurement stored")]
    MissingWeight { user: String },
}
