//! Contains the HTTP surface of a peer.
//!
//! Every peer exposes its partition under a common base path:
//!
//! ```text
//! GET /_tinycache/{group}/{key}
//! ```
//!
//! where both segments are percent-encoded. A successful lookup is answered
//! with `200 OK` and the raw value bytes as `application/octet-stream`;
//! malformed paths yield `400`, unknown groups `404` and origin failures
//! `500` with the error message as body.
//!
//! The [HttpPool](HttpPool) combines three things: the server side of this
//! wire contract, the consistent hash [ring](crate::ring) spanning the
//! configured peers, and one [HttpFetcher](HttpFetcher) client per remote
//! peer. It therefore is the canonical
//! [PeerPicker](crate::ports::PeerPicker) handed to a group via
//! [register_peers](crate::group::Group::register_peers).
//!
//! Note that the pool references groups only by name through the
//! [GroupRegistry](crate::group::GroupRegistry) while groups reference the
//! pool through the picker capability - the indirection keeps the two free of
//! reference cycles.
//!
//! Besides the peer protocol, a process may expose a small frontend endpoint
//! (`GET /api?key=...`) for clients which do not speak the peer protocol; see
//! [serve_api](serve_api).
use std::borrow::Cow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Client, Request, Response, Server, StatusCode, Uri};

use crate::error::CacheError;
use crate::group::{Group, GroupRegistry};
use crate::platform::Platform;
use crate::ports::{PeerFetcher, PeerPicker};
use crate::ring::HashRing;
use crate::view::ByteView;

/// The path prefix under which every peer serves its partition.
pub const DEFAULT_BASE_PATH: &str = "/_tinycache/";

/// The number of virtual nodes each peer occupies on the hash ring.
pub const DEFAULT_REPLICAS: usize = 50;

/// Fetches values from one remote peer via the wire contract above.
pub struct HttpFetcher {
    base_url: String,
}

impl HttpFetcher {
    /// Returns the base URL (peer address plus base path) this fetcher talks
    /// to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the request URL for the given group and key, escaping both
    /// segments.
    fn url_for(&self, group: &str, key: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(group),
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl PeerFetcher for HttpFetcher {
    async fn fetch(&self, group: &str, key: &str) -> anyhow::Result<Vec<u8>> {
        let uri = Uri::from_str(&self.url_for(group, key)).context("Invalid peer url")?;

        let response = Client::new()
            .get(uri)
            .await
            .context("Failed to reach the peer")?;
        if response.status() != StatusCode::OK {
            return Err(anyhow::anyhow!("server returned: {}", response.status()));
        }

        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .context("Failed to read the peer response")?;

        Ok(bytes.to_vec())
    }
}

/// The ring and the fetcher per peer, rebuilt as one unit whenever the peer
/// set is configured.
struct RoutingTable {
    ring: HashRing,
    fetchers: HashMap<String, Arc<HttpFetcher>>,
}

/// Serves this peer's partition over HTTP and routes keys to their owners.
pub struct HttpPool {
    self_url: String,
    base_path: String,
    registry: Arc<GroupRegistry>,
    routes: ArcSwapOption<RoutingTable>,
}

impl HttpPool {
    /// Creates a pool for the peer reachable under **self_url** (e.g.
    /// `http://localhost:9001`) and installs it into the given platform.
    ///
    /// The pool starts without any topology - keys are served locally until
    /// [set_peers](HttpPool::set_peers) is called.
    pub fn install(platform: &Arc<Platform>, self_url: impl AsRef<str>) -> Arc<Self> {
        let pool = Arc::new(HttpPool {
            self_url: self_url.as_ref().to_owned(),
            base_path: DEFAULT_BASE_PATH.to_owned(),
            registry: platform.require::<GroupRegistry>(),
            routes: ArcSwapOption::empty(),
        });
        platform.register::<HttpPool>(pool.clone());

        pool
    }

    /// Configures the set of peers this pool routes to.
    ///
    /// The hash ring and the per-peer fetchers are rebuilt into a single
    /// routing table which is swapped in atomically, so concurrent lookups
    /// either see the old or the new topology, never a mix.
    pub fn set_peers(&self, peers: &[String]) {
        let mut ring = HashRing::new(DEFAULT_REPLICAS);
        ring.add(peers);

        let mut fetchers = HashMap::new();
        for peer in peers {
            let _ = fetchers.insert(
                peer.clone(),
                Arc::new(HttpFetcher {
                    base_url: format!("{}{}", peer, self.base_path),
                }),
            );
        }

        self.routes
            .store(Some(Arc::new(RoutingTable { ring, fetchers })));
        log::info!(
            "[{}] installed a topology of {} peer(s).",
            self.self_url,
            peers.len()
        );
    }

    /// Answers one request against the peer wire contract.
    async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let path = req.uri().path().to_owned();
        log::debug!("[{}] {} {}", self.self_url, req.method(), path);

        let suffix = match path.strip_prefix(self.base_path.as_str()) {
            Some(suffix) => suffix,
            None => return bad_request(&path),
        };

        // Exactly one separator between the (encoded) group and key...
        let parts: Vec<&str> = suffix.split('/').collect();
        if parts.len() != 2 {
            return bad_request(&path);
        }

        let group_name = match urlencoding::decode(parts[0]) {
            Ok(name) => name,
            Err(_) => return bad_request(&path),
        };
        let key = match urlencoding::decode(parts[1]) {
            Ok(key) => key,
            Err(_) => return bad_request(&path),
        };

        let group = match self.registry.find(group_name.as_ref()) {
            Some(group) => group,
            None => {
                return plain_response(
                    StatusCode::NOT_FOUND,
                    CacheError::UnknownGroup(group_name.into_owned()).to_string(),
                )
            }
        };

        match group.get(key.as_ref()).await {
            Ok(view) => value_response(view),
            Err(error) => plain_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        }
    }

    /// Serves the peer wire contract on the given port until the platform
    /// terminates.
    pub async fn serve(self: Arc<Self>, platform: Arc<Platform>, port: u16) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let pool = self.clone();
        let make_service = make_service_fn(move |_conn| {
            let pool = pool.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let pool = pool.clone();
                    async move { Ok::<_, Infallible>(pool.handle(req).await) }
                }))
            }
        });

        let server = Server::try_bind(&addr)
            .with_context(|| format!("Cannot open peer endpoint on {}", addr))?
            .serve(make_service);
        log::info!("[{}] peer endpoint listening on {}...", self.self_url, addr);

        server
            .with_graceful_shutdown(async move { platform.terminated().await })
            .await
            .context("The peer endpoint failed")?;
        log::info!("[{}] peer endpoint closed.", self.self_url);

        Ok(())
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>> {
        let routes = self.routes.load_full()?;
        let peer = routes.ring.get(key)?;
        if peer == self.self_url {
            return None;
        }

        log::debug!("[{}] picked peer {} for '{}'", self.self_url, peer, key);
        routes
            .fetchers
            .get(peer)
            .map(|fetcher| fetcher.clone() as Arc<dyn PeerFetcher>)
    }
}

/// Serves the frontend endpoint `GET /api?key=...` for the given group until
/// the platform terminates.
pub async fn serve_api(
    platform: Arc<Platform>,
    group: Arc<Group>,
    port: u16,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let api_group = group.clone();
    let make_service = make_service_fn(move |_conn| {
        let group = api_group.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let group = group.clone();
                async move { Ok::<_, Infallible>(handle_api(group, req).await) }
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Cannot open api endpoint on {}", addr))?
        .serve(make_service);
    log::info!("[{}] api endpoint listening on {}...", group.name(), addr);

    server
        .with_graceful_shutdown(async move { platform.terminated().await })
        .await
        .context("The api endpoint failed")?;
    log::info!("[{}] api endpoint closed.", group.name());

    Ok(())
}

/// Answers one frontend request by looking the key up in the given group.
async fn handle_api(group: Arc<Group>, req: Request<Body>) -> Response<Body> {
    if req.uri().path() != "/api" {
        return plain_response(StatusCode::NOT_FOUND, "not found".to_owned());
    }

    // A missing key parameter falls through as an empty key and is rejected
    // by the group itself.
    let key = query_parameter(req.uri().query(), "key").unwrap_or_default();

    match group.get(&key).await {
        Ok(view) => value_response(view),
        Err(error) => plain_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    }
}

/// Extracts a single query parameter, percent-decoded once.
fn query_parameter(query: Option<&str>, name: &str) -> Option<String> {
    for pair in query?.split('&') {
        let mut parts = pair.splitn(2, '=');
        if parts.next() == Some(name) {
            let value = parts.next().unwrap_or("");
            return urlencoding::decode(value).ok().map(Cow::into_owned);
        }
    }

    None
}

fn value_response(view: ByteView) -> Response<Body> {
    let mut response = Response::new(Body::from(view.as_bytes()));
    let _ = response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));

    response
}

fn plain_response(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    response
}

fn bad_request(path: &str) -> Response<Body> {
    plain_response(
        StatusCode::BAD_REQUEST,
        CacheError::MalformedRequest(path.to_owned()).to_string(),
    )
}
