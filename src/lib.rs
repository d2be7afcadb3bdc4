pub mod error;
pub mod load;
pub mod pipeline;
pub mod process;
pub mod settings;
pub mod source;

pub use error::IngestError;
pub use pipeline::{run_pipeline, LoadState, SourceReport};
pub use process::{RecordSet, Value};
pub use source::{SourceDescriptor, SourceManifest, Strategy};
