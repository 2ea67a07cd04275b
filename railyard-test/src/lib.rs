//! Shared test fixtures (spec §3.4): a manually-advanced clock, a
//! recording logger, and scripted doubles for the two host-supplied
//! ports (`BrowserDriver`, `Compiler`). Every other crate's integration
//! tests build on these instead of hand-rolling their own doubles.

pub mod browser;
pub mod clock;
pub mod compiler;
pub mod logger;

pub use browser::{RecordedCall, ScriptedBrowserDriver};
pub use clock::FakeClock;
pub use compiler::ScriptedCompiler;
pub use logger::{Level, Recorded, RecordingLogger};
