pub mod battery;
pub mod control;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use session::{connect_and_run, run_session, ExitReason, SessionOptions};
