//! Shramik Sahayak - legal aid backend for migrant workers.
//!
//! Serves the app API (documents, chats, translation, directory, profile) and,
//! unless deployed functions are configured, the three remote functions.

mod advisors;
mod api;
mod auth;
mod chat;
mod config;
mod error;
mod functions;
mod gateway;
mod locale;
mod ocr;
mod pipeline;
mod remote;
mod schema;
mod services;
mod store;
mod translation;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use auth::JwtVerifier;
use config::Settings;
use ocr::{OcrExtractor, PdfiumRasterizer};
use remote::FunctionsClient;
use services::Services;
use store::memory::MemoryStore;
use store::supabase::SupabaseClient;
use store::Stores;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "shramik_sahayak=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let client = reqwest::Client::new();

    let stores = match &settings.supabase {
        Some(supabase) => {
            info!("Using Supabase at {}", supabase.url);
            Stores::shared(Arc::new(SupabaseClient::new(client.clone(), supabase)))
        }
        None => {
            warn!("SUPABASE_URL not set, keeping data in memory");
            let store = match &settings.contacts_file {
                Some(path) => MemoryStore::new().with_contacts_file(std::path::Path::new(path))?,
                None => MemoryStore::new(),
            };
            Stores::shared(Arc::new(store))
        }
    };

    // Deployed functions replace the in-process ones
    let (services, hosted) = match &settings.functions_url {
        Some(url) => {
            info!("Using remote functions at {}", url);
            let remote = Arc::new(FunctionsClient::new(
                client.clone(),
                url.clone(),
                settings.supabase.as_ref().map(|s| s.service_role_key.clone()),
            ));
            let services = Services {
                analyzer: remote.clone(),
                chat: remote.clone(),
                translator: remote,
            };
            (services, None)
        }
        None => {
            let services = functions::local_services(client.clone(), &settings, stores.chats.clone())?;
            info!("Hosting functions under /functions/v1");
            (services.clone(), Some(services))
        }
    };

    let engine = ocr::build_engine(&settings.ocr, client.clone())?;
    let rasterizer = Arc::new(PdfiumRasterizer::new(settings.ocr.pdfium_lib_path.clone()));
    let extractor = OcrExtractor::from_settings(engine, rasterizer, &settings.ocr);

    let auth = match &settings.jwt_secret {
        Some(secret) => Some(Arc::new(JwtVerifier::hs256(secret))),
        None => {
            warn!("SUPABASE_JWT_SECRET not set, the app API will reject every request");
            None
        }
    };

    let state = AppState {
        stores,
        services,
        extractor,
        auth,
    };
    let app = api::app(state, hosted);

    // Run server
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!("Server listening on http://{}", settings.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
