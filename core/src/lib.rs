pub mod config;
pub mod error;
pub mod index;
pub mod query;
pub mod scorer;
pub mod source;
pub mod tokenizer;

pub use config::EngineConfig;
pub use error::{IngestError, SearchError};
pub use index::{CorpusIndex, IndexBuilder, IndexStats, IngestOutcome, IngestReport, SkippedDocument};
pub use query::{CancellationFlag, QueryExecutor, ScoredDoc};
pub use source::{DirectorySource, DocumentSource, MemorySource, SourceDocument};
