//! Candidate configuration checks.
//!
//! A rendered file is checked in a scratch directory before it may replace
//! the live file. Services with their own checker (`testparm`, `nginx -t`)
//! are checked by running it; the others by a built-in parser.

mod check;
mod exports;
mod key_value;

pub use check::Validator;
pub use exports::check_exports;
pub use key_value::check_key_value;
