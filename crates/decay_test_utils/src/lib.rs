//! Decay Test Utilities
//!
//! In-memory collaborators for exercising the audit pipeline without a
//! network:
//!
//! - [`InMemorySource`]: a file or page tree implementing both
//!   `DocumentSource` and `ChangeSetTarget`, with failure injection and a
//!   record of every marking call
//! - [`RecordingMailer`]: keeps sent reports, can reject chosen recipients
//! - [`fixtures`]: a fixed clock and record builders
//!
//! # Usage
//!
//! ```rust,ignore
//! use decay_test_utils::{fixtures, Doc, InMemorySource};
//!
//! let source = InMemorySource::files("memory")
//!     .dir("docs")
//!     .file("docs/a.md", Doc::with_history(Some(fixtures::changed_days_ago(90))).owner("a@x.io"));
//! ```

pub mod fixtures;
pub mod mailer;
pub mod source;

pub use mailer::RecordingMailer;
pub use source::{Doc, InMemorySource, RecordedEdit, ROOT};
