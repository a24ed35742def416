// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # outcore
//!
//! The output-value reconciliation core of a declarative infrastructure engine.
//!
//! ## Overview
//!
//! Output values move through three walks:
//!
//! - **plan** computes one change per output and records it in a change set;
//! - **apply** commits each planned change, re-evaluating values that were
//!   unknown at plan time and checking them against the plan;
//! - **refresh** resynchronizes stored values outside the plan/apply protocol.
//!
//! Values may be partially unknown during planning. Every change is kept
//! both in the change set (what will happen) and, collapsed, in the value
//! store (what later evaluation sees).
//!
//! ## Modules
//!
//! - [`value`]: Dynamic values and the compatibility checker
//! - [`addrs`]: Output addresses
//! - [`diagnostics`]: Warnings and errors reported by nodes
//! - [`state`]: The shared value store
//! - [`plans`]: Planned changes and the change set
//! - [`eval`]: Evaluation context and the evaluator seam
//! - [`planner`]: The plan, apply, and refresh nodes
//! - [`walker`]: Concurrent execution of one phase
//! - [`config`]: Scenario files for the CLI
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! prior_state:
//!   - address: output.count
//!     value: 5
//! outputs:
//!   - address: output.count
//!     plan: !unknown number
//!     apply: 7
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod addrs;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod eval;
pub mod planner;
pub mod plans;
pub mod state;
pub mod value;
pub mod walker;

// ============================================================================
// Re-exports
// ============================================================================

pub use addrs::{AbsOutputAddr, ModuleInstance, OutputAddr};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, ScenarioConfig};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{OutcoreError, Result};
pub use eval::{EvalContext, Evaluator, Expression, StaticEvaluator};
pub use planner::{ApplyOutput, OutputDecl, OutputNode, PlanOutput, RefreshOutput};
pub use plans::{Action, ChangeSet, OutputChange, OutputChangeSrc};
pub use state::{OutputValue, StateSnapshot, SyncState};
pub use value::{assert_compatible, Value, ValueType};
pub use walker::{Phase, WalkResult, Walker};
