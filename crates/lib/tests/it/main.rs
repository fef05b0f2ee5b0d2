/*! Integration tests for Trellis.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - node: Tests for the Node data model and materialization
 * - value: Tests for localized NodeValue handling
 * - search: Tests for SearchCriteria evaluation through the engine
 * - codec: Tests for the binary wire format round-trips
 * - mapper: Tests for the in-memory StorageMapper implementation
 * - controller: Tests for the Controller orchestration contracts
 * - events: Tests for change notification and listener dispatch
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("trellis=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod codec;
mod controller;
mod events;
mod helpers;
mod search;
mod value;
