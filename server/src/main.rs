use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::feedback::FeedbackDrain;
use actix_web::{App, HttpServer, web};
use clap::Parser;
use common::{PushClient, StartMode, feedback_channel};
use log::*;
use std::io;

mod api;
mod config;
mod decode;
mod dispatch;
mod error;
mod feedback;
mod handlers;
#[cfg(test)]
mod testing;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    let config = Config::parse();

    let registry = apns::default_registry();
    info!("Registered client modes: {:?}", registry.list_modes());

    let mode = StartMode::from(config.start_mode);
    let factory = registry
        .get_factory(mode)
        .ok_or_else(|| io::Error::other(format!("no push client registered for {mode:?}")))?;

    let apns_config = serde_json::to_value(config.apns_config()).map_err(io::Error::other)?;
    let (feedback_tx, feedback_rx) = feedback_channel(config.feedback_capacity);
    let client = factory
        .create(apns_config, feedback_tx)
        .map_err(io::Error::other)?;

    let dispatcher = web::Data::new(Dispatcher::new(client.clone(), config.expired_seconds));
    let drain = web::Data::new(FeedbackDrain::new(
        client.clone(),
        feedback_rx,
        config.feedback_recv_timeout(),
    ));
    let client_data: web::Data<dyn PushClient> = web::Data::from(client.clone());

    info!(
        "{:?} APNS HTTPSERVER IS STARTING ON {} ....",
        mode, config.bind_addr
    );
    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(dispatcher.clone())
            .app_data(drain.clone())
            .app_data(client_data.clone())
            .app_data(handlers::form_config())
            .app_data(handlers::query_config())
            .configure(handlers::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;

    client.shutdown().await;
    info!("APNS HTTP SERVER SHUTDOWN SUCC ....");
    Ok(())
}
