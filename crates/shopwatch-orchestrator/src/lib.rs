//! Orchestration: deciding which shops are due and dispatching the work.
//!
//! One run is a pipeline of three stages over the port traits in
//! `shopwatch-core`:
//!
//! 1. [`eligibility`] pulls due shops out of the index, never-run first,
//!    then completed in ascending age order.
//! 2. [`dispatcher`] fans the eligible domains out to the operation's
//!    queue in fixed-size batches, folding partial failures into the
//!    result instead of aborting.
//! 3. [`controller`] wires the two together, applies request defaults,
//!    and produces the invocation summary.

pub mod controller;
pub mod dispatcher;
pub mod eligibility;
pub mod error;

pub use controller::OrchestrationController;
pub use dispatcher::{BatchDispatcher, DispatchSummary};
pub use eligibility::{EligibilityCursor, EligibleShop, find_eligible};
pub use error::{OrchestrateError, OrchestrateResult};
