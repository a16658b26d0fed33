//! Message dispatch: the orchestration core
//!
//! [`dispatcher::Dispatcher`] drives one send operation end to end;
//! [`generation::GenerationCoordinator`] enforces the at-most-one-active-
//! generation invariant and owns cancellation;
//! [`stream_consumer`] and [`poller`] integrate streamed and consensus
//! results into the session store.

pub mod dispatcher;
pub mod generation;
pub mod poller;
pub mod stream_consumer;
