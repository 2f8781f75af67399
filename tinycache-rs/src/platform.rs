//! Provides a tiny DI like container which keeps the central components of a
//! peer in a single place.
//!
//! The platform is more or less a simple map which keeps all central
//! components as **Arc<T>** around - most notably the
//! [GroupRegistry](crate::group::GroupRegistry). It also owns the central
//! **is_running** flag which is toggled to *false* once
//! [Platform::terminate](Platform::terminate) is invoked. Long running tasks
//! (the HTTP servers, the signal handler) either poll this flag or await
//! [Platform::terminated](Platform::terminated) to shut down gracefully.
//!
//! In common cases [Platform::require](Platform::require) is a good way of
//! fetching a component which is known to be there. Once a shutdown has been
//! initiated, the internal map is cleared (so that all Drop handlers run).
//! Therefore code which might execute after
//! [Platform::terminate](Platform::terminate) should use
//! [Platform::find](Platform::find) and gracefully handle the **None** case.
//!
//! # Examples
//!
//! ```
//! # use std::sync::Arc;
//! # use tinycache::platform::Platform;
//! struct Service {
//!     value: i32,
//! }
//!
//! let platform = Platform::new();
//!
//! platform.register::<Service>(Arc::new(Service { value: 42 }));
//! assert_eq!(platform.require::<Service>().value, 42);
//!
//! // By default the platform is running...
//! assert_eq!(platform.is_running(), true);
//!
//! // Once terminated, all components are released so that their Drop
//! // handlers run...
//! platform.terminate();
//! assert_eq!(platform.find::<Service>().is_none(), true);
//! assert_eq!(platform.is_running(), false);
//! ```
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Provides a container to keep all central components in a single place.
pub struct Platform {
    services: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    is_running: AtomicBool,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl Platform {
    /// Creates a new platform instance.
    pub fn new() -> Arc<Self> {
        let (shutdown, _) = tokio::sync::watch::channel(false);
        Arc::new(Platform {
            services: Mutex::new(HashMap::new()),
            is_running: AtomicBool::new(true),
            shutdown,
        })
    }

    /// Registers a new component.
    pub fn register<T>(&self, service: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        let _ = self
            .services
            .lock()
            .unwrap()
            .insert(TypeId::of::<T>(), service);
    }

    /// Tries to resolve a previously registered component.
    ///
    /// If one knows for certain that a component is present,
    /// [Platform::require](Platform::require) can be used.
    pub fn find<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let services = self.services.lock().unwrap();
        services
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.clone().downcast::<T>().ok())
    }

    /// Resolves a previously registered component.
    ///
    /// # Panics
    /// Panics if the requested component isn't available. Note that once a
    /// shutdown has been initiated, all components are evicted, therefore this
    /// might panic even if it worked before
    /// [Platform::terminate](Platform::terminate) was invoked.
    pub fn require<T>(&self) -> Arc<T>
    where
        T: Any + Send + Sync,
    {
        if self.is_running() {
            match self.find::<T>() {
                Some(service) => service,
                None => panic!(
                    "A required component ({}) was not available in the platform registry!",
                    std::any::type_name::<T>()
                ),
            }
        } else {
            panic!(
                "A required component ({}) has been requested but the system is already shutting down!",
                std::any::type_name::<T>()
            )
        }
    }

    /// Determines if the platform is still running or if
    /// [Platform::terminate](Platform::terminate) has already been called.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Waits until [Platform::terminate](Platform::terminate) is invoked.
    ///
    /// This is handed to the HTTP servers as graceful shutdown signal so that
    /// they stop accepting connections once the peer goes down.
    pub async fn terminated(&self) {
        let mut rx = self.shutdown.subscribe();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Terminates the platform.
    ///
    /// This will immediately release all components (so that their Drop
    /// handlers run eventually), toggle the
    /// [is_running()](Platform::is_running) flag to **false** and wake
    /// everyone blocking on [terminated()](Platform::terminated).
    pub fn terminate(&self) {
        self.services.lock().unwrap().clear();
        self.is_running.store(false, Ordering::Release);
        let _ = self.shutdown.send(true);
    }
}
