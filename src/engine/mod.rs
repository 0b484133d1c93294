//! The automation engine
//!
//! [`AutomationEngine`] owns the main loop. It pulls work from the
//! [`ButtonScanner`], clicks each eligible control, hands the modal to
//! [`ModalWorkflow`], and scrolls for more once a batch is done. Transient
//! failures are counted by the [`ConnectionSupervisor`], which replaces the
//! [`Session`] when they pile up.

pub mod run;
pub mod scanner;
pub mod session;
pub mod supervisor;
pub mod terms;
pub mod workflow;

pub use run::{AutomationEngine, CancelFlag, RunReport, RunState, RunStatus};
pub use scanner::{ButtonScanner, ScanResult};
pub use session::{Session, SessionProvider};
pub use supervisor::{ConnectionSupervisor, ReconnectFailed, ReconnectPolicy};
pub use terms::{AmbiguityPolicy, Disambiguator, PreferExact, RejectAmbiguous, TermMatch};
pub use workflow::{ItemError, ModalReport, ModalWorkflow, Step, WorkflowContext};
