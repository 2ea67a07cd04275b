pub mod error;
pub mod hook;
pub mod ports;
pub mod types;

pub use error::{BrowserErrorKind, FsStoreErrorKind, RailyardError, RunError};
pub use hook::{Hook, HookContext, HookError};
pub use ports::{BrowserDriver, Clock, Compiler, FileReader, Logger};
pub use types::{
    FileAction, FileMeta, FileRequest, FileSlot, ModuleFile, ModuleGraph, Parameters, TestEntry,
    TestFile, UniqPolicy, WorkerLimit, WorkerState,
};
