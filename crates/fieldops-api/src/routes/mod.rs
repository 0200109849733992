//! # API Route Modules
//!
//! Route modules for the field service API surface:
//!
//! - `requests` — Service request lifecycle: creation, reads, the
//!   generic state/technician update, and the dedicated assign and
//!   reopen operations, plus the per-request audit history.

pub mod requests;
