//! One module per subcommand.

mod demo;
mod policy;
mod simulate;

pub use demo::run_demo;
pub use policy::run_policy;
pub use simulate::{run_simulate, SimulateOptions};
