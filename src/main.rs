use std::{io, sync::Arc};

use actix::Actor;
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

mod balance;
mod config;
mod ledger;
mod notify;
mod profile;
mod routes;
mod schemas;
mod store;
mod telemetry;

use config::Config;
use ledger::{LedgerKeeper, Recalculate};
use notify::LogNotifier;
use profile::{ProfileSource, RandomUserProfiles};

#[actix_web::main]
async fn main() -> io::Result<()> {
    telemetry::init();

    let config = Config::from_env().map_err(|err| {
        tracing::error!(%err, "invalid configuration");
        io::Error::new(io::ErrorKind::InvalidInput, err)
    })?;
    let store = store::open(&config.store).await.map_err(|err| {
        tracing::error!(%err, "could not open the ledger store");
        io::Error::other(err)
    })?;

    let keeper = LedgerKeeper::new(store, Arc::new(LogNotifier)).start();
    // Files edited by hand or left behind by an older build may hold stale balances.
    let participants = keeper
        .send(Recalculate)
        .await
        .map_err(io::Error::other)?
        .map_err(|err| {
            tracing::error!(%err, "could not recompute balances");
            io::Error::other(err)
        })?;
    tracing::info!(participants = participants.len(), "balances recomputed");

    let profiles: Arc<dyn ProfileSource> =
        Arc::new(RandomUserProfiles::new(config.profile_url.clone()));

    tracing::info!(host = %config.host, port = config.port, "listening");
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(keeper.clone()))
            .app_data(web::Data::from(profiles.clone()))
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
