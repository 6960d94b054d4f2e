//! Flight data toolkit: fetch live aircraft positions from public ADS-B
//! feeds, aggregate them into routes, and render route and track maps as
//! PNG images.

pub mod adsbx;
pub mod callsign;
pub mod config;
pub mod error;
pub mod geo;
pub mod opensky;
pub mod render;
pub mod routes;
pub mod track;
pub mod types;

pub use error::{FlightmapError, Result};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set up logging for the command-line tools. `RUST_LOG` wins when set;
/// otherwise `verbose` switches the crate between debug and info.
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "flightmap=debug"
    } else {
        "flightmap=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
