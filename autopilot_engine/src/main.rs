use anyhow::Context;
use autopilot_engine::{
    TripSession, config::MapsConfig, resolver::RouteResolver, session::format_duration,
};
use autopilot_lib::{coordinate::Coordinate, travel_mode::TravelMode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Drive a simulated trip from the command line:
//   autopilot_engine <origin_lat> <origin_lng> <dest_lat> <dest_lng> [mode]
// Requires MAPBOX_ACCESS_TOKEN in the environment.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 4 {
        anyhow::bail!("usage: autopilot_engine <origin_lat> <origin_lng> <dest_lat> <dest_lng> [mode]");
    }
    let origin_lat: f64 = args[0].parse().context("origin latitude")?;
    let origin_lng: f64 = args[1].parse().context("origin longitude")?;
    let dest_lat: f64 = args[2].parse().context("destination latitude")?;
    let dest_lng: f64 = args[3].parse().context("destination longitude")?;
    let mode = match args.get(4) {
        Some(name) => name
            .parse::<TravelMode>()
            .map_err(|err| anyhow::anyhow!("{err}: {name}"))?,
        None => TravelMode::Walk,
    };

    let session = TripSession::new(
        RouteResolver::new(MapsConfig::from_env()),
        Coordinate::new(origin_lat, origin_lng),
    );
    session.set_travel_mode(mode).await;
    session.schedule_trip(dest_lat, dest_lng).await?;

    let distance = session.distance_km().await.unwrap_or(0.0);
    match session.travel_time().await {
        Some(time) => tracing::info!("{distance:.2} km, about {}", format_duration(time)),
        None => tracing::info!("{distance:.2} km, teleporting"),
    }

    let mut updates = session.subscribe();
    session.start().await;
    loop {
        let update = updates.recv().await?;
        println!("{:.6},{:.6}", update.position.lat, update.position.lng);
        if update.finished {
            break;
        }
    }

    tracing::info!("destination reached");
    Ok(())
}
