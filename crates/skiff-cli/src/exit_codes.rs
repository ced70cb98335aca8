//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Package error - invalid definition or layout
pub const PACKAGE_ERROR: i32 = 2;

/// Import error - a component import chain could not be resolved
pub const IMPORT_ERROR: i32 = 3;

/// Integrity error - checksums or signature did not verify
pub const INTEGRITY_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Remote error - registry, HTTP or cluster unreachable or refusing
pub const REMOTE_ERROR: i32 = 6;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
