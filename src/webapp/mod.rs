//! # Web Application Module
//!
//! Application units and the startup machinery around them.
//!
//! - [`WebApplication`]: context path, named [`Handler`]s mapped by
//!   servlet-style patterns, attributes, optional root
//!   [`Resource`](crate::resource::Resource) and
//!   [`ModuleLoader`](crate::module::ModuleLoader), async support flag
//! - [`Initializer`]: startup hooks, run once in registration order
//! - [`ExtensionRegistry`]: explicit, ordered list of [`Extension`]s that
//!   configure each unit before deployment; failures degrade the unit instead
//!   of aborting startup
//! - Built-in extensions: [`TempDirExtension`] (`tempdir`) and
//!   [`ResourcesExtension`] (`resources`)
//!
//! ```rust
//! use brrtcontainer::exchange::prelude::*;
//! use brrtcontainer::exchange::Exchange;
//! use brrtcontainer::webapp::WebApplication;
//! use std::fmt::Write;
//!
//! let mut app = WebApplication::new("/shop");
//! app.mount("/hello", |ex: &Exchange| -> anyhow::Result<()> {
//!     ex.set_content_type("text/plain")?;
//!     write!(ex.writer()?, "hello")?;
//!     Ok(())
//! })
//! .unwrap();
//! assert_eq!(app.route("/hello").unwrap().servlet_path, "/hello");
//! ```

mod application;
mod extension;
mod mapping;
mod resources;
mod tempdir;

pub use application::{validate_context_path, Handler, Initializer, WebApplication};
pub use extension::{Extension, ExtensionRegistry};
pub use mapping::{Pattern, RouteMatch};
pub use resources::{ResourceHandler, ResourcesExtension, WELCOME_FILE};
pub use tempdir::{TempDirExtension, TempDirInitializer, TEMPDIR_ATTRIBUTE};
