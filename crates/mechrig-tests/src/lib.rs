//! MechRig Test Infrastructure
//!
//! Scene generators and determinism checks shared by the property tests.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mechrig-tests
//! ```
//!
//! ## Determinism Testing
//!
//! ```rust
//! use mechrig_tests::determinism::verify_build_determinism;
//! use mechrig_tests::fixtures;
//!
//! let result = verify_build_determinism(&fixtures::chain(3), None, 3).unwrap();
//! result.assert_deterministic();
//! ```

pub mod determinism;
pub mod fixtures;
