//! Tinycache is a distributed read-through cache for immutable byte blobs.
//!
//! # Introduction
//! A **tinycache** cluster is a fixed group of peers, each of which keeps a
//! size constrained LRU partition of the overall key space in memory. Keys are
//! assigned to peers deterministically via consistent hashing over a ring of
//! virtual nodes. Therefore every peer can compute the owner of a key locally,
//! without any coordination traffic.
//!
//! A lookup which misses the local partition is routed to the owning peer via
//! a minimal HTTP wire protocol. Only the owner itself consults the actual
//! source of truth (the [Getter](group::Getter) supplied by the application)
//! and populates its partition. This keeps each value cached on exactly one
//! peer and turns the cluster memory into one large, shared cache.
//!
//! Concurrent lookups for the same key on the same peer are coalesced, so that
//! even under a thundering herd the origin is consulted at most once per key
//! and in-flight request ([single_flight]).
//!
//! # Modules
//! * **lru**: A size constrained LRU cache which tracks the allocated bytes of
//!   its keys and values and evicts the least recently used entries once a
//!   given budget is exceeded.
//! * **ring**: The consistent hash ring which distributes keys across peers
//!   using virtual nodes to smooth out the distribution.
//! * **single_flight**: Deduplicates concurrent calls for the same key so that
//!   one underlying load serves all waiting callers.
//! * **group**: A named cache namespace which combines the local shard, the
//!   peer topology and the origin into the complete lookup path.
//! * **http**: The HTTP surface - both the server which answers peer requests
//!   and the client used to fetch values from remote peers.
//!
//! # Example
//! A minimal peer which serves a single namespace:
//!
//! ```no_run
//! use std::sync::Arc;
//! use tinycache::builder::Builder;
//! use tinycache::group::{GetterFn, GroupRegistry};
//! use tinycache::http::HttpPool;
//!
//! #[tokio::main]
//! async fn main() {
//!     let platform = Builder::new().enable_all().build().await;
//!
//!     let registry = platform.require::<GroupRegistry>();
//!     let group = registry.create_group(
//!         "scores",
//!         2 << 10,
//!         Arc::new(GetterFn(|key: String| async move {
//!             anyhow::Ok(format!("value of {}", key).into_bytes())
//!         })),
//!     );
//!
//!     let pool = HttpPool::install(&platform, "http://localhost:9001");
//!     pool.set_peers(&["http://localhost:9001".to_owned()]);
//!     group.register_peers(pool.clone());
//!
//!     pool.serve(platform, 9001).await.unwrap();
//! }
//! ```
#![warn(missing_docs)]
#![warn(clippy::all)]

use simplelog::{format_description, ConfigBuilder, LevelFilter, SimpleLogger};
use std::sync::Once;

pub mod builder;
pub mod config;
pub mod error;
pub mod fmt;
pub mod group;
pub mod http;
pub mod lru;
pub mod platform;
pub mod ports;
pub mod ring;
pub mod shard;
pub mod signals;
pub mod single_flight;
pub mod view;

pub use error::CacheError;
pub use view::ByteView;

/// Contains the version of the tinycache library.
pub const TINYCACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes the logging system.
///
/// Note that most probably the simplest way is to use a
/// [Builder](builder::Builder) to set up the framework, which will also set up
/// logging if enabled.
pub fn init_logging() {
    static INIT_LOGGING: Once = Once::new();

    // Guarded by a Once as the integration tests would otherwise initialize
    // the logging system several times...
    INIT_LOGGING.call_once(|| {
        if let Err(error) = SimpleLogger::init(
            LevelFilter::Debug,
            ConfigBuilder::new()
                .set_time_format_custom(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
                ))
                .set_thread_level(LevelFilter::Trace)
                .set_target_level(LevelFilter::Error)
                .set_location_level(LevelFilter::Trace)
                .build(),
        ) {
            panic!("Failed to initialize logging system: {}", error);
        }
    });
}

/// Provides a simple macro to execute an async lambda within `tokio::spawn`.
///
/// Note that this also applies std::mem::drop on the returned handle to make
/// clippy happy.
///
/// # Example
/// ```rust
/// # #[macro_use] extern crate tinycache;
/// # #[tokio::main]
/// # async fn main() {
/// spawn!(async move {
///     // perform some async stuff here...
/// });
/// # }
#[macro_export]
macro_rules! spawn {
    ($e:expr) => {{
        std::mem::drop(tokio::spawn($e));
    }};
}

#[cfg(test)]
mod testing {
    /// Executes async code within a single threaded tokio runtime.
    pub fn test_async<F: std::future::Future>(future: F) {
        use tokio::runtime;

        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let _ = rt.block_on(future);
    }

    lazy_static::lazy_static! {
        /// Provides a global lock which has to be acquired if a test operates
        /// on shared resources - in our case the localhost ports on which the
        /// HTTP integration tests start their servers. Using this lock, all
        /// other tests still execute in parallel and only the socket bound
        /// tests are serialized.
        pub static ref SHARED_TEST_RESOURCES: std::sync::Mutex<()> = std::sync::Mutex::new(());
    }
}
