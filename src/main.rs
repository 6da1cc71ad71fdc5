//! Circuit Racer Sync Demo
//!
//! Races simulated cars between in-process peers connected by a channel
//! mesh. Each peer runs its own session and driver, exactly as separate
//! devices would.

use std::f32::consts::PI;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use circuit_racer::{
    VERSION, TICK_RATE,
    core::{angle::normalize_bearing, rng::DeterministicRng, vec2::Vec2},
    race::{level::LevelType, state::PlayerId},
    network::{
        driver::{DriverHandle, RaceDriver},
        observer::RaceEvent,
        session::{RaceSession, SessionConfig},
        transport::ChannelMesh,
    },
};

/// Number of racing peers.
const PEERS: usize = 3;

/// Distance of the racing line from the track centre.
const TRACK_RADIUS: f32 = 120.0;

/// How a peer's race ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Won,
    Lost,
    MatchEnded,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Circuit Racer Sync v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    demo_race(LevelType::Easy).await
}

/// Run one race between `PEERS` simulated cars.
async fn demo_race(level: LevelType) -> anyhow::Result<()> {
    info!("=== Starting Demo Race ({:?}) ===", level);

    let center = Vec2::new(400.0, 300.0);
    let config = SessionConfig::for_level(level, center);
    info!("{} laps, {:?} on the clock", config.laps, config.time_limit);

    let players: Vec<PlayerId> = (0..PEERS).map(|_| PlayerId::random()).collect();
    let mesh = ChannelMesh::connect(&players);

    let mut drivers = Vec::with_capacity(PEERS);
    let mut cars = Vec::with_capacity(PEERS);

    for (car, (transport, inbound)) in mesh.into_iter().enumerate() {
        let local_id = transport.local_player().clone();
        let remote_players = transport.remote_players();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let session = RaceSession::new(
            local_id.clone(),
            config.clone(),
            Box::new(DeterministicRng::from_entropy()),
            transport,
            events_tx,
        );
        info!("Player {} drew token {}", local_id.short(), session.local_token());

        let (driver, handle) = RaceDriver::new(session, inbound);
        drivers.push((handle.clone(), tokio::spawn(driver.run())));

        // Slightly different speeds so someone wins
        let speed = 0.06 + car as f32 * 0.004;
        handle.match_started(remote_players).await?;
        cars.push(tokio::spawn(drive_car(local_id, handle, events_rx, center, speed)));
    }

    let mut outcomes = Vec::with_capacity(PEERS);
    for car in cars {
        outcomes.push(car.await?);
    }

    for (handle, task) in drivers {
        handle.shutdown().await?;
        let session = task.await?;
        let laps: Vec<String> = session
            .lap_counters()
            .iter()
            .map(|(id, remaining)| format!("{}={}", id.short(), remaining))
            .collect();
        info!(
            "Player {} finished {:?}, order digest {}, remaining laps [{}]",
            session.local_id().short(),
            session.state(),
            hex::encode(&session.order().digest()[..8]),
            laps.join(", ")
        );
    }

    info!("=== Race Results ===");
    for (id, outcome) in &outcomes {
        info!("Player {}: {:?}", id.short(), outcome);
    }

    let winners = outcomes.iter().filter(|(_, o)| *o == Outcome::Won).count();
    if winners == 1 {
        info!("Exactly one winner");
    } else {
        warn!("{} winners", winners);
    }

    Ok(())
}

/// Drive a car around the track once the session assigns it an index.
async fn drive_car(
    local_id: PlayerId,
    handle: DriverHandle,
    mut events: mpsc::UnboundedReceiver<RaceEvent>,
    center: Vec2,
    speed: f32,
) -> (PlayerId, Outcome) {
    let mut frame = interval(Duration::from_micros(1_000_000 / TICK_RATE as u64));
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Just short of the start/finish line
    let mut bearing: f32 = -0.05;
    let mut racing = false;
    let mut peer_updates = 0u64;

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(RaceEvent::AssignedPlayerIndex(index)) => {
                    info!("Player {} races as car {}", local_id.short(), index);
                    racing = true;
                }
                Some(RaceEvent::PeerPositionUpdate { .. }) => peer_updates += 1,
                Some(RaceEvent::GameOver { won: true }) => break Outcome::Won,
                Some(RaceEvent::GameOver { won: false }) => break Outcome::Lost,
                Some(RaceEvent::MatchEnded) | None => break Outcome::MatchEnded,
            },
            _ = frame.tick(), if racing => {
                let previous = Vec2::from_bearing(center, TRACK_RADIUS, bearing);
                bearing += speed;
                let position = Vec2::from_bearing(center, TRACK_RADIUS, bearing);
                let step = position - previous;

                let sent = async {
                    handle.steer(step.x, step.y, normalize_bearing(bearing + PI / 2.0)).await?;
                    handle.update_position(position).await
                };
                if sent.await.is_err() {
                    break Outcome::MatchEnded;
                }
            }
        }
    };

    info!("Player {} saw {} peer updates", local_id.short(), peer_updates);
    (local_id, outcome)
}
