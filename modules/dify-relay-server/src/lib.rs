pub mod callback;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod routes;
pub mod runner;

pub use callback::{CallbackEnvelope, CallbackNotifier};
pub use error::{RelayError, Result};
pub use pipeline::{substitute_inputs, FileBinding, Pipeline, WorkflowJob, WorkflowOutcome};
pub use registry::AsyncRegistry;
pub use resolver::{FileResolver, FileSource, HttpFileResolver, ResolvedFile};
pub use routes::{build_router, AppState};
pub use runner::AsyncRunner;
