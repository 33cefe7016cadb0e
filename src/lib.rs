//! Channel transport for moving containers and virtual machines between hosts.
//!
//! ```no_run
//! use migratenet::migration::{CommandProbe, MigrationSource, SourceArgs};
//! use migratenet::MigrationConfig;
//!
//! # async fn demo(instance: Box<dyn migratenet::migration::Instance>) -> migratenet::Result<()> {
//! let config = MigrationConfig::from_env();
//! let probe = CommandProbe::from_config(&config);
//! let args = SourceArgs::new(instance).with_stateful(true);
//! let mut source = MigrationSource::new(args, &config, &probe)?;
//!
//! // Publish `source.secrets()` to the peer and feed inbound connections to
//! // `source.acceptor()` from the API layer, then:
//! source.run(None).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod migration;

pub use config::MigrationConfig;
pub use errors::{DriverError, MigrationError, Result};
