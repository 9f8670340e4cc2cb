//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - the configuration failed schema validation
pub const VALIDATION_ERROR: i32 = 2;

/// Render error - reference resolution or descriptor building failed
pub const RENDER_ERROR: i32 = 3;

/// Apply error - the orchestrator rejected a resource, release degraded
pub const APPLY_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// The named release (or version) does not exist
pub const NOT_FOUND: i32 = 6;

/// Another operation on the release is in flight
pub const BUSY: i32 = 7;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
