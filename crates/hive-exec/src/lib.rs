mod error;
pub use error::{ExecError, ExecResult};

pub mod script;
pub use script::{EnvValue, ExecutionScript, ScriptHandle, WORKING_DIRECTORY_VAR, shell_quote};
