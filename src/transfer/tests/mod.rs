//! Transfer behavior tests, driven through the scripted fetcher
//!
//! - `single` - retries, resumption and lifecycle of one transfer
//! - `bundle` - counting, pooling and completion of bundles
//! - `chain` - listener registration and event routing across the tree
