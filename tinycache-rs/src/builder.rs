//! Provides a builder which can be used to set up and initialize the
//! framework.
//!
//! This creates and wires the central parts of a peer. As some of them are
//! optional (most notably during tests, which bring their own logging and
//! signal handling), a builder permits to selectively enable or disable them.
//!
//! # Example
//! Setting up the framework with all features enabled:
//! ```no_run
//! # use tinycache::builder::Builder;
//! #[tokio::main]
//! async fn main() {
//!     let platform = Builder::new().enable_all().build().await;
//!
//!     // Create groups, install an HttpPool and serve here...
//! }
//! ```
use std::sync::Arc;

use crate::group::GroupRegistry;
use crate::platform::Platform;
use crate::{init_logging, TINYCACHE_VERSION};

/// Initializes the framework by creating and initializing all core
/// components.
#[derive(Default)]
pub struct Builder {
    setup_logging: bool,
    enable_signals: bool,
    setup_groups: bool,
}

impl Builder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Builder {
            setup_logging: false,
            enable_signals: false,
            setup_groups: false,
        }
    }

    /// Enables all features.
    pub fn enable_all(mut self) -> Self {
        self.setup_logging = true;
        self.enable_signals = true;
        self.setup_groups = true;

        self
    }

    /// Enables the automatic setup of the logging system.
    ///
    /// Using this, we properly initialize **simplelog** to log to stdout. As
    /// peers are intended to run in containers, this is all that is needed
    /// for proper logging.
    pub fn enable_logging(mut self) -> Self {
        self.setup_logging = true;
        self
    }

    /// Disables the automatic setup of the logging system after
    /// [enable_all()](Builder::enable_all) has been used.
    pub fn disable_logging(mut self) -> Self {
        self.setup_logging = false;
        self
    }

    /// Installs a signal listener which terminates the framework once
    /// **CTRL-C** or **SIGHUP** is received.
    ///
    /// For more details see: [signals](crate::signals)
    pub fn enable_signals(mut self) -> Self {
        self.enable_signals = true;
        self
    }

    /// Disables installing the signal listener after
    /// [enable_all()](Builder::enable_all) has been used.
    pub fn disable_signals(mut self) -> Self {
        self.enable_signals = false;
        self
    }

    /// Creates and installs a [GroupRegistry](crate::group::GroupRegistry).
    pub fn enable_groups(mut self) -> Self {
        self.setup_groups = true;
        self
    }

    /// Disables setting up a **GroupRegistry** after
    /// [enable_all()](Builder::enable_all) has been used.
    pub fn disable_groups(mut self) -> Self {
        self.setup_groups = false;
        self
    }

    /// Builds the [Platform](crate::platform::Platform) with all the enabled
    /// components being registered.
    pub async fn build(self) -> Arc<Platform> {
        let platform = Platform::new();

        if self.setup_logging {
            init_logging();
        }

        log::info!(
            "tinycache (v {}) running on {} core(s) in {} CPU(s)",
            TINYCACHE_VERSION,
            num_cpus::get(),
            num_cpus::get_physical()
        );

        if self.enable_signals {
            crate::signals::install(platform.clone());
        }

        if self.setup_groups {
            let _ = GroupRegistry::install(&platform);
        }

        platform
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::Builder;
    use crate::group::GroupRegistry;

    #[test]
    fn the_builder_registers_the_enabled_components() {
        crate::testing::test_async(async {
            let platform = Builder::new().enable_groups().build().await;
            assert_eq!(platform.find::<GroupRegistry>().is_some(), true);

            let platform = Builder::new().build().await;
            assert_eq!(platform.find::<GroupRegistry>().is_none(), true);
        });
    }
}
