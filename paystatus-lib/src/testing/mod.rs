//! Testing utilities for status channel consumers.
//!
//! [`MockConnector`] stands in for the websocket connector: each connection
//! attempt is recorded and either refused or handed a [`MockServer`] handle
//! that the test uses to push frames or close the connection.
//!
//! # Usage
//!
//! ```rust
//! use paystatus_lib::testing::{MockConnector, MockPlan};
//!
//! let connector = MockConnector::new();
//! connector.push_plan(MockPlan::Refuse);
//! assert_eq!(connector.attempts(), 0);
//! ```

mod mock_transport;

pub use mock_transport::{MockChannel, MockConnector, MockPlan, MockServer};
