//! Process exit codes.
//!
//! Request and cache failures exit with `ApiError::exit_code`:
//! 1 invalid input or config, 3 remote rejected, 5 transport, 6 bad
//! response, 7 store. The codes below cover the rest.

pub const SUCCESS: i32 = 0;
pub const INTERNAL_ERROR: i32 = 2; // I/O or setup failure outside the client
