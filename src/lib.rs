pub mod checkpoint;
pub mod config;
pub mod distributor;
pub mod error;
pub mod export;
pub mod io;
pub mod oracle;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod space;

pub mod prelude {
    pub use crate::checkpoint::{CheckpointRecord, CheckpointStore, SpaceKey};
    pub use crate::config::{OracleConfig, OracleKind, RunConfig};
    pub use crate::distributor::{CancelToken, DistributorConfig, ResumePoint, WorkDistributor};
    pub use crate::error::{CrackError, Result};
    pub use crate::oracle::{CommandOracle, DigestOracle, Oracle, Verdict};
    pub use crate::orchestrator::{Orchestrator, SearchOutcome, Strategy};
    pub use crate::progress::{BarObserver, ProgressObserver, Silent};
    pub use crate::space::{CandidateSpace, PasswordSpace};
}
