use actix_web::{middleware, web, App, HttpServer};
use folderdb::{StorageConfig, Store};
use folderdb_server::{handlers, AppState, ServerConfig, MAX_BODY_BYTES};
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init();
    log::info!("Starting FolderDB server");

    let storage = StorageConfig::load(None).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let server = ServerConfig::from_env();

    let store = Store::open(storage).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    log::info!("Serving data from: {}", store.root().display());

    let state = web::Data::new(AppState { store });

    log::info!("Listening on {}:{}", server.host, server.port);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
            .app_data(web::JsonConfig::default().limit(MAX_BODY_BYTES))
            .configure(handlers::configure)
    })
    .bind((server.host.as_str(), server.port))?
    .run()
    .await
}
