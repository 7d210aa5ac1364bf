use std::sync::Arc;

use paddock::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Prints the starting grid instead of spawning real cars.
struct GridPrinter {
    vehicles: Arc<[VehicleOption]>,
}

/// One line per racer, in grid order: `P1 Ayrton (Roadster)`.
fn lineup<'a>(
    vehicles: &[VehicleOption],
    racers: impl IntoIterator<Item = (&'a str, usize)>,
) -> Vec<String> {
    racers
        .into_iter()
        .enumerate()
        .map(|(position, (name, vehicle_index))| {
            let vehicle = vehicles.get(vehicle_index).map_or("?", |v| v.name.as_str());
            format!("P{} {name} ({vehicle})", position + 1)
        })
        .collect()
}

impl SpawnCollaborator for GridPrinter {
    fn begin_gameplay(&self, records: &[HandoffRecord], scene_id: &str) {
        tracing::info!(scene_id, racers = records.len(), "race starting");
        let racers = records.iter().map(|r| (r.name(), r.vehicle_index()));
        for line in lineup(&self.vehicles, racers) {
            tracing::info!("  {line}");
        }
    }
}

/// Logs scene changes.
struct SceneLog;

impl SceneTransport for SceneLog {
    fn change_scene(&self, scene_id: &str) {
        tracing::info!(scene_id, "loading scene");
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Usage: grid-lobby [paddock.toml]
    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(path)?,
        None => {
            let mut config = ServerConfig::default();
            config.apply_env_overrides();
            config
        }
    };

    let printer = GridPrinter {
        vehicles: config.lobby.vehicles.clone().into(),
    };

    let server = PaddockServer::builder()
        .config(config)
        .collaborators(Collaborators::new(printer, SceneLog))
        .build()
        .await?;

    tracing::info!(addr = %server.local_addr()?, "grid lobby listening");
    server.run().await?;
    Ok(())
}
