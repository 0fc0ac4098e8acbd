// src/pipeline/sync.rs

//! Stop-catalog synchronization pipeline.
//!
//! Authenticates and fetches the catalog, then walks it in order, resolving
//! each stop through the geocode cache and upserting the derived place row.
//! Durable writes are committed every `commit_every` stops and once more on
//! the way out, on every exit path, so an interrupt or a mid-run failure
//! never loses finished work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::Result;
use crate::models::{Config, PlaceRecord, StopRecord};
use crate::services::client::ApiClient;
use crate::services::geocode::{GeocodeCache, NominatimGeocoder};
use crate::storage::PlaceStore;

/// What a finished (or interrupted) run did.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub processed: usize,
    pub with_coords: usize,
    pub tombstoned: usize,
    pub interrupted: bool,
}

/// Install a Ctrl-C listener and hand back the flag it raises.
///
/// The flag is observed between stops, never mid-request, so an in-flight
/// lookup always completes and lands in the cache before the run winds down.
pub fn interrupt_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler = Arc::clone(&flag);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl+C received, finishing the current stop before committing");
            handler.store(true, Ordering::SeqCst);
        }
    });
    flag
}

/// Run the full synchronization job.
pub async fn run_sync(config: Arc<Config>, interrupt: Arc<AtomicBool>) -> Result<SyncOutcome> {
    let mut client = ApiClient::new(Arc::clone(&config))?;
    client.authenticate().await?;

    let stops = client.fetch_stops("").await?;
    log::info!("Catalog lists {} stops", stops.len());

    let geocoder = NominatimGeocoder::new(&config.geocoder)?;
    let mut cache = GeocodeCache::open(
        &config.storage.locations_path(),
        Box::new(geocoder),
        Duration::from_secs(config.geocoder.cooldown_secs),
    )?;
    let mut places = PlaceStore::open(&config.storage.places_path())?;

    let outcome = sync_catalog(&config, &stops, &mut cache, &mut places, &interrupt).await?;

    log::info!("Sync finished");
    log::info!("    processed: {} of {}", outcome.processed, stops.len());
    log::info!("    with coordinates: {}", outcome.with_coords);
    log::info!("    tombstoned: {}", outcome.tombstoned);
    log::info!(
        "    commits: {} places / {} locations",
        places.commit_count(),
        cache.commit_count()
    );

    Ok(outcome)
}

/// Resolve and upsert every stop, with the commit-on-exit guarantee.
///
/// The processing loop's result is captured so both stores commit before any
/// error (or an interrupt) propagates. Everything resolved up to that point
/// is durable and will be a cache hit on the next run.
pub async fn sync_catalog(
    config: &Config,
    stops: &[StopRecord],
    cache: &mut GeocodeCache,
    places: &mut PlaceStore,
    interrupt: &AtomicBool,
) -> Result<SyncOutcome> {
    let outcome = process_stops(config, stops, cache, places, interrupt).await;

    places.commit()?;
    cache.commit()?;

    outcome
}

async fn process_stops(
    config: &Config,
    stops: &[StopRecord],
    cache: &mut GeocodeCache,
    places: &mut PlaceStore,
    interrupt: &AtomicBool,
) -> Result<SyncOutcome> {
    let mut outcome = SyncOutcome::default();

    for stop in stops {
        if interrupt.load(Ordering::SeqCst) {
            log::info!(
                "Interrupted after {} of {} stops",
                outcome.processed,
                stops.len()
            );
            outcome.interrupted = true;
            break;
        }

        let query = format!("{}{}", stop.name, config.geocoder.query_suffix);
        let resolved = cache.resolve(stop.id, &query, true).await?;
        if resolved.found {
            outcome.with_coords += 1;
        } else {
            outcome.tombstoned += 1;
        }

        places.upsert(&PlaceRecord::derive(stop, &resolved))?;
        outcome.processed += 1;

        if outcome.processed % config.sync.commit_every == 0 {
            places.commit()?;
            cache.commit()?;
        }

        if outcome.processed % config.sync.progress_every == 0 {
            let rate = 100.0 * outcome.with_coords as f64 / outcome.processed as f64;
            log::info!(
                "{}/{} stops processed ({rate:.1}% with coordinates)",
                outcome.processed,
                stops.len()
            );
        }
    }

    Ok(outcome)
}
