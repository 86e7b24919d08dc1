//! Dogs and the food they eat, over HTTP.
//!
//!
//!
//! # Resources
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | /dog | list dogs |
//! | GET | /dog/{id} | one dog |
//! | POST | /dog | create a dog |
//! | PUT | /dog/{id} | update a dog |
//! | DELETE | /dog/{id} | delete a dog |
//! | GET | /food | list food |
//! | GET | /food/{id} | one food item |
//! | POST | /food | create a food item, body must name its `dog` |
//! | PUT | /food/{id} | update a food item |
//! | DELETE | /food/{id} | delete a food item |
//!
//! Everything can be mounted under a prefix with `API_PREFIX=/api/v1`.
//!
//!
//!
//! # Responses
//!
//! Every body is a JSON envelope, see [`envelope`].
//!
//! - 200: read, update, delete
//! - 201: create
//! - 400: malformed id
//! - 404: no such record
//! - 500: everything else, field validation included
//!
//!
//!
//! # Listing
//!
//! Filter, sort and page with query parameters, see [`query`].
//!
//! ```sh
//! curl 'localhost:5001/dog?breed=Labrador,Beagle&minAge=2&maxAge=10&sortBy=-age&page=2&limit=5'
//! curl 'localhost:5001/food?foodtype=wet&minCost=10&excludeFields=dog'
//! ```
//!
//!
//!
//! # Notes
//!
//! ## Dog ↔ Food
//! A food item points at its dog and the dog keeps a list of its food ids.
//! Only creating a food item keeps both sides in step. Deleting either side
//! leaves the other pointing at nothing, and readers simply skip what they
//! cannot find.
//!
//! ## Storage
//! Redis by default, in-memory with `STORE_BACKEND=memory`. See [`database`]
//! and [`store`].
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 RUST_LOG=info cargo run
//! ```
//!
//! Run without Redis.
//! ```sh
//! STORE_BACKEND=memory RUST_LOG=info cargo run
//! ```
//!
//! Extra query logging.
//! ```sh
//! RUST_LOG=kennel=debug cargo run --features verbose
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::get,
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod dogs;
pub mod envelope;
pub mod error;
pub mod foods;
pub mod id;
pub mod messages;
pub mod models;
pub mod query;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

use config::Config;
use routes::{
    create_dog_handler, create_food_handler, delete_dog_handler, delete_food_handler,
    get_dog_handler, get_food_handler, index_handler, list_dogs_handler, list_foods_handler,
    update_dog_handler, update_food_handler,
};
use state::AppState;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config).await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route("/", get(index_handler))
        .route("/dog", get(list_dogs_handler).post(create_dog_handler))
        .route(
            "/dog/{id}",
            get(get_dog_handler)
                .put(update_dog_handler)
                .delete(delete_dog_handler),
        )
        .route("/food", get(list_foods_handler).post(create_food_handler))
        .route(
            "/food/{id}",
            get(get_food_handler)
                .put(update_food_handler)
                .delete(delete_food_handler),
        );

    let prefix = state.config.api_prefix.clone();
    let api = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&prefix, api)
    };

    api.layer(cors).with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
