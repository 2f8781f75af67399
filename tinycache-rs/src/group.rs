//! Provides the cache namespace which ties shard, peers and origin together.
//!
//! A [Group](Group) is a named cache with its own byte budget, its own origin
//! of truth (the [Getter](Getter)) and, optionally, a peer topology. Looking
//! up a key walks the complete miss path:
//!
//! 1. the local [Shard](crate::shard::Shard) (fast path),
//! 2. the remote peer owning the key (if a
//!    [PeerPicker](crate::ports::PeerPicker) is installed),
//! 3. the origin, which populates the local shard.
//!
//! Steps 2 and 3 run under a per-key
//! [SingleFlight](crate::single_flight::SingleFlight), so a burst of misses
//! for the same key causes exactly one load.
//!
//! Values fetched from a remote peer are deliberately NOT stored locally:
//! every value should live on exactly one peer, otherwise the cluster would
//! degenerate into N copies of the same hot set.
//!
//! All groups of a process live in the [GroupRegistry](GroupRegistry), which
//! the HTTP surface consults by name.
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;

use crate::error::CacheError;
use crate::fmt::format_size;
use crate::platform::Platform;
use crate::ports::PeerPicker;
use crate::shard::Shard;
use crate::single_flight::SingleFlight;
use crate::view::ByteView;

/// The origin of truth for values which are not cached anywhere.
///
/// This is the one capability an application has to supply. It is only ever
/// consulted by the peer owning a key, and at most once per in-flight key.
#[async_trait]
pub trait Getter: Send + Sync {
    /// Loads the value for the given key from the underlying data source.
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>>;
}

/// Adapts a plain async function into a [Getter](Getter).
///
/// # Examples
/// ```
/// # use tinycache::group::GetterFn;
/// let getter = GetterFn(|key: String| async move { anyhow::Ok(key.into_bytes()) });
/// ```
pub struct GetterFn<F>(pub F);

#[async_trait]
impl<F, Fut> Getter for GetterFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send,
{
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        (self.0)(key.to_owned()).await
    }
}

/// A named cache namespace.
///
/// Groups are created via
/// [GroupRegistry::create_group](GroupRegistry::create_group) and are
/// immutable afterwards, except for the peer picker which is installed
/// exactly once during topology setup.
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    shard: Arc<Shard>,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    loader: SingleFlight,
}

impl Group {
    /// Returns the name of this group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Installs the peer picker which routes keys to their owning peers.
    ///
    /// # Panics
    /// Panics if a picker has already been installed - re-registering peers
    /// is a wiring bug, not a runtime condition.
    pub fn register_peers(&self, picker: Arc<dyn PeerPicker>) {
        if self.peers.set(picker).is_err() {
            panic!(
                "register_peers has been called more than once for group '{}'!",
                self.name
            );
        }
    }

    /// Looks up the value for the given key.
    ///
    /// A local hit is served directly. On a miss, the key is either fetched
    /// from the peer owning it or loaded from the origin (which populates the
    /// local shard) - coalesced per key, so concurrent misses share one load.
    pub async fn get(&self, key: &str) -> Result<ByteView, CacheError> {
        if key.is_empty() {
            return Err(CacheError::KeyRequired);
        }

        if let Some(view) = self.shard.get(key) {
            log::debug!("[{}] hit for '{}'", self.name, key);
            return Ok(view);
        }

        self.load(key).await
    }

    /// Executes the miss path for the given key under the single-flight
    /// gate.
    async fn load(&self, key: &str) -> Result<ByteView, CacheError> {
        let name = self.name.clone();
        let getter = self.getter.clone();
        let shard = self.shard.clone();
        let picker = self.peers.get().cloned();
        let flight_key = key.to_owned();

        self.loader
            .run(key, move || async move {
                if let Some(picker) = picker {
                    if let Some(peer) = picker.pick_peer(&flight_key) {
                        match peer.fetch(&name, &flight_key).await {
                            Ok(bytes) => {
                                log::debug!(
                                    "[{}] served '{}' from the owning peer",
                                    name,
                                    flight_key
                                );
                                // Not populated locally: the value is cached
                                // on the owning peer.
                                return Ok(ByteView::from(bytes));
                            }
                            Err(error) => {
                                let error = CacheError::PeerFetch(error.to_string());
                                log::warn!(
                                    "[{}] {} for '{}', falling back to the origin",
                                    name,
                                    error,
                                    flight_key
                                );
                            }
                        }
                    }
                }

                match getter.get(&flight_key).await {
                    Ok(bytes) => {
                        let view = ByteView::from(bytes);
                        shard.add(&flight_key, view.clone());
                        log::debug!("[{}] loaded '{}' from the origin", name, flight_key);
                        Ok(view)
                    }
                    Err(error) => Err(CacheError::Origin(error.to_string())),
                }
            })
            .await
    }
}

/// Keeps all groups of this process, addressable by name.
///
/// The registry is installed into the [Platform](crate::platform::Platform)
/// during startup, so the HTTP surface can resolve the group named in a peer
/// request without any direct wiring.
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    /// Creates a registry and installs it into the given platform.
    pub fn install(platform: &Arc<Platform>) -> Arc<Self> {
        let registry = Arc::new(GroupRegistry {
            groups: RwLock::new(HashMap::new()),
        });
        platform.register::<GroupRegistry>(registry.clone());

        registry
    }

    /// Creates a group with the given name, byte budget and origin.
    ///
    /// Groups are expected to be created once during startup. Re-using a name
    /// replaces the previous group (which keeps serving callers still holding
    /// it) - this is logged, as it usually indicates a wiring mistake.
    pub fn create_group(
        &self,
        name: &str,
        cache_bytes: usize,
        getter: Arc<dyn Getter>,
    ) -> Arc<Group> {
        let group = Arc::new(Group {
            name: name.to_owned(),
            getter,
            shard: Arc::new(Shard::new(cache_bytes)),
            peers: OnceLock::new(),
            loader: SingleFlight::new(),
        });

        let previous = self
            .groups
            .write()
            .unwrap()
            .insert(name.to_owned(), group.clone());
        if previous.is_some() {
            log::warn!("Replacing the already registered group '{}'...", name);
        } else if cache_bytes == 0 {
            log::info!("Created group '{}' with an unbounded budget.", name);
        } else {
            log::info!(
                "Created group '{}' with a budget of {}.",
                name,
                format_size(cache_bytes)
            );
        }

        group
    }

    /// Resolves a group by name.
    pub fn find(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().unwrap().get(name).cloned()
    }
}
