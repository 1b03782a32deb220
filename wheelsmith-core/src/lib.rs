//! wheelsmith-core: portable wheels from a row of interpreters
//!
//! One build run walks a fixed recipe, top to bottom, and stops at the first
//! command that fails:
//!
//! 1. **Toolchain**: fetch the installer, install the configured channel into
//!    the user's home, put its bin directory on the lookup path.
//! 2. **Pin**: make one exact dated build the default toolchain.
//! 3. **Build**: for each interpreter installation, with its `bin/` on the
//!    lookup path for that iteration only, install the packaging dependencies
//!    (one of them pinned) and run the project's build entry point.
//! 4. **Repair**: hand every wheel in the output directory to the repair tool,
//!    which writes a portable copy next to it.
//!
//! ## A sample run
//!
//! ```rust,no_run
//! use wheelsmith_core::config::BuildPlan;
//! use wheelsmith_core::pipeline::BuildSession;
//! use wheelsmith_core::runner::SystemRunner;
//! use wheelsmith_core::toolchain::HttpFetch;
//!
//! let plan = BuildPlan::default();
//! plan.validate()?;
//!
//! let mut session = BuildSession::new(&plan, SystemRunner, HttpFetch::default());
//! let report = session.run()?;
//!
//! for artifact in report.portable_artifacts() {
//!     println!("{}", artifact.path.display());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Seams
//!
//! - [`runner::CommandRunner`]: every external process goes through it, so a
//!   dry run is just a [`runner::RecordingRunner`].
//! - [`toolchain::InstallerFetch`]: where the installer script comes from.
//! - [`discovery::ArtifactDiscovery`]: which files count as wheels.
//!
//! The process environment is never modified; the lookup path lives in the
//! session ([`search_path::SearchPath`]) and is passed to each command.

pub mod config;
pub mod discovery;
pub mod error;
pub mod interpreter;
pub mod output;
pub mod pipeline;
pub mod runner;
pub mod search_path;
pub mod toolchain;
pub mod wheel;
