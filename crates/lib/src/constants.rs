//! Constants used throughout the Trellis library.
//!
//! This module provides central definitions for the path syntax, the
//! bootstrap tree, and engine-wide limits.

/// Delimiter separating the segments of a fully qualified node path.
pub const PATH_DELIMITER: char = ':';

/// Root-level container nodes guaranteed to exist after bootstrap.
pub const BASE_NODES: [&str; 6] = [
    ":Devices",
    ":Users",
    ":Enterprise",
    ":Keys",
    ":Global",
    ":Local",
];

/// Path of the node carrying the local identity values.
pub const LOCAL_PATH: &str = ":Local";

/// Path of the container holding per-user nodes.
pub const USERS_PATH: &str = ":Users";

/// Path of the container holding per-device nodes.
pub const DEVICES_PATH: &str = ":Devices";

/// Key of the identity value naming the current user.
pub const CURRENT_USER: &str = "currentUser";

/// Key of the identity value naming the current device.
pub const CURRENT_DEVICE: &str = "currentDevice";

/// Locale tag every localized string map must carry.
pub const DEFAULT_LOCALE: &str = "en";

/// Upper bound on the number of child nodes a single cascading
/// `update`/`add_or_update` call may visit.
pub const MAX_CASCADE_NODES: usize = 10_000;
