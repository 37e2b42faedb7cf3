mod audit;
mod process;
mod workspace;

pub use audit::{AttachResourceInput, AuditStore, RecordStartInput, RecordTerminalInput};
pub use process::{ProcessOutput, ProcessRunner, ToolCommand};
pub use workspace::WorkspaceMaterializer;
