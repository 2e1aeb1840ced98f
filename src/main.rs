use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::{bail, Context, Result};
use codeview::config::ServerConfig;
use codeview::file_system::load_snapshot;
use codeview::handlers;
use codeview::models::AppState;
use log::{info, warn};
use rustls::ServerConfig as TlsConfig;
use rustls_pemfile::{certs, pkcs8_private_keys};
use std::fs::File as FsFile;
use std::io::BufReader;
use std::path::Path;

fn load_tls_config(cert_path: &str, key_path: &str) -> Result<TlsConfig> {
    let cert_file = &mut BufReader::new(
        FsFile::open(cert_path).with_context(|| format!("Failed to open {}", cert_path))?,
    );
    let key_file = &mut BufReader::new(
        FsFile::open(key_path).with_context(|| format!("Failed to open {}", key_path))?,
    );
    let cert_chain = certs(cert_file)
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid certificate file")?;
    let mut keys = pkcs8_private_keys(key_file)
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid key file")?;
    if keys.is_empty() {
        bail!("No private keys found in key file");
    }

    TlsConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, keys.remove(0).into())
        .context("Failed to build TLS configuration")
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    // Override the log level with RUST_LOG, e.g. `RUST_LOG=debug`.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env()?;
    let snapshot_path = config.snapshot_path.clone();
    let snapshot = tokio::task::spawn_blocking(move || load_snapshot(&snapshot_path))
        .await
        .context("Snapshot loader panicked")??;
    let state = web::Data::new(
        AppState::new(snapshot, config.explorer.clone())?.with_session_limit(config.max_sessions),
    );

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Server running at http://{}", addr);

    let mut http_server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    });

    match (&config.cert_path, &config.key_path) {
        (Some(cert_path), Some(key_path))
            if Path::new(cert_path).exists() && Path::new(key_path).exists() =>
        {
            info!("Attempting to start HTTPS server...");
            let tls = load_tls_config(cert_path, key_path)?;
            info!("Successfully configured TLS. Binding to https://{}", addr);
            http_server = http_server.bind_rustls_0_23(&addr, tls)?;
        }
        (Some(_), Some(_)) => {
            warn!("CERT_PATH or KEY_PATH points to a non-existent file. Starting without HTTPS.");
            http_server = http_server.bind(&addr)?;
        }
        _ => {
            info!("No CERT_PATH or KEY_PATH found in env. Starting plain HTTP server.");
            http_server = http_server.bind(&addr)?;
        }
    }

    http_server.run().await?;
    Ok(())
}
