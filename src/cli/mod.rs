//! # CLI Module
//!
//! Command-line entry points for the `brrtcontainer` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Deploy the configured application units and serve them until SIGINT or
//! SIGTERM:
//!
//! ```bash
//! brrtcontainer serve --config container.yaml
//! brrtcontainer serve --port 9000 --webapp /docs=./site --webapp /=./root.zip
//! ```
//!
//! Bind/port precedence: flags, then `BRRTC_BIND`/`BRRTC_PORT`, then the
//! config file, then `0.0.0.0:8080`.
//!
//! ### `modules`
//!
//! Resolve a module by name across ordered store roots, or list them all:
//!
//! ```bash
//! brrtcontainer modules --root ./lib --root ./vendor.zip acme.core
//! ```

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{build_container, run, run_cli, Cli, Commands};
