//! CLI command implementations

pub mod link;
pub mod reduce;
pub mod watch;

use paystatus_lib::CompletionPolicy;

/// Completion policy selected by the `--lenient` flag.
pub fn completion_policy(lenient: bool) -> CompletionPolicy {
    if lenient {
        CompletionPolicy::StatusCodeOnly
    } else {
        CompletionPolicy::RequireConfirmedAmount
    }
}
