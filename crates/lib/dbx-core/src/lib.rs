//! Core tool dispatch for dbx-mcp.
//!
//! This crate owns the tool contract and registry, argument validation, the
//! failure taxonomy applied to every call, the protocol-independent dispatcher,
//! the completion poller used by asynchronous remote operations, and the
//! result formatter. Remote systems are reached only through the capability
//! traits in [`capability`].

pub mod capability;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod normalize;
pub mod poll;
pub mod pool;
pub mod registry;
pub mod tool;
pub mod validate;

pub use capability::{
    ClientSource,
    FixedClient,
    FunctionCatalog,
    GenieApi,
    Probe,
    SqlExecutor,
    SqlParameter,
    SqlStatement,
    StatementOutcome,
    VectorSearchApi,
    WorkspaceApi,
};
pub use dispatch::Dispatcher;
pub use error::{FieldIssue, Redactor, RetryClass, ToolError, ToolErrorKind, ValidationError};
pub use format::{NO_RESULTS_MESSAGE, format_json, format_table};
pub use normalize::Normalizer;
pub use poll::{CompletionPoller, CompletionSource, JobStatus, Observation, PollPolicy};
pub use pool::{BuildClientFn, ClientPool, ClientPoolConfig};
pub use registry::{ToolGroup, ToolRegistry, build_registry};
pub use tool::{ContentBlock, Tool, ToolContext, ToolResult, ToolSpec, ValidatedArguments};
pub use validate::ValidationMode;
