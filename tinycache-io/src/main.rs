use std::panic::{set_hook, take_hook};
use std::sync::Arc;

use tinycache::builder::Builder;
use tinycache::config::Config;
use tinycache::group::{GetterFn, Group, GroupRegistry};
use tinycache::http::{serve_api, HttpPool};
use tinycache::spawn;

/// Creates the demo namespace backed by a tiny in-memory score table.
///
/// This stands in for the slow system of record a real deployment would
/// consult - a database, a blob store or a computation.
fn create_scores_group(registry: &GroupRegistry, cache_bytes: usize) -> Arc<Group> {
    registry.create_group(
        "scores",
        cache_bytes,
        Arc::new(GetterFn(|key: String| async move {
            log::info!("[SlowDB] searching key {}", key);
            match key.as_str() {
                "Tom" => Ok(b"630".to_vec()),
                "Jack" => Ok(b"589".to_vec()),
                "Sam" => Ok(b"567".to_vec()),
                _ => Err(anyhow::anyhow!("{} not exist", key)),
            }
        })),
    )
}

#[tokio::main]
async fn main() {
    // Installs a panic handler which crashes the whole process instead of
    // trying to survive with a missing tokio background thread. Having a
    // panic in a tokio thread is quite ugly, as the peer seems to be healthy
    // from the outside but won't answer any requests.
    //
    // Therefore we crash the whole process on purpose and hope for an
    // external watchdog like docker-compose to create a new container which
    // is in a sane and consistent state.
    let original_panic_handler = take_hook();
    set_hook(Box::new(move |panic_info| {
        original_panic_handler(panic_info);
        eprintln!("PROGRAM ALARM: A panic occurred in a thread. Crashing the whole process to enable a clean restart...");
        std::process::exit(-1);
    }));

    let config_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("Usage: tinycache-io <config>");
            std::process::exit(1);
        }
    };

    // Build a platform and enable all features...
    let platform = Builder::new().enable_all().build().await;

    let config = match Config::load(&config_path).await {
        Ok(config) => config,
        Err(error) => {
            log::error!("{:#}", error);
            std::process::exit(1);
        }
    };
    let cache_bytes = match config.cache_bytes() {
        Ok(cache_bytes) => cache_bytes,
        Err(error) => {
            log::error!("{:#}", error);
            std::process::exit(1);
        }
    };

    // Create the demo namespace...
    let registry = platform.require::<GroupRegistry>();
    let group = create_scores_group(&registry, cache_bytes);

    // ...wire it to the other peers of the cluster...
    let pool = HttpPool::install(&platform, config.self_url());
    pool.set_peers(&config.effective_peers());
    group.register_peers(pool.clone());

    // ...optionally expose the frontend endpoint...
    if let Some(api_port) = config.api_port {
        let api_platform = platform.clone();
        let api_group = group.clone();
        spawn!(async move {
            if let Err(error) = serve_api(api_platform, api_group, api_port).await {
                log::error!("{:#}", error);
                std::process::exit(1);
            }
        });
    }

    // ...and serve our partition until terminated.
    if let Err(error) = pool.serve(platform, config.peer_port).await {
        log::error!("{:#}", error);
        std::process::exit(1);
    }
}
