//! # Lobby Example
//!
//! Joins (or creates) a room on a running game server and prints every game
//! push until Ctrl-C. The session opens over long-polling and upgrades to
//! WebSocket when the server allows it.
//!
//! ## Running
//!
//! ```sh
//! SHADOW_SIGNAL_URL=http://localhost:4001 cargo run --example lobby -- [ROOM] [NAME]
//! ```
//!
//! Without a running server the example prints a single hint and keeps
//! waiting quietly; further operations inside the suppression window do not
//! touch the network.

use shadow_signal_client::{ConnectionEvent, ConnectionManager, RoomCode, ServerEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let room = args.next();
    let name = args.next().unwrap_or_else(|| "Rustacean".to_string());

    let manager = ConnectionManager::from_env();
    let channel = manager.channel();
    let mut events = manager.take_events().ok_or("events already taken")?;

    channel.on_server_event(|event| match event {
        ServerEvent::PlayerJoined(room) => {
            let names: Vec<_> = room.players.iter().map(|p| p.name.as_str()).collect();
            tracing::info!(room = %room.code, "players: {}", names.join(", "));
        }
        ServerEvent::GameStarted(room) | ServerEvent::SpeakerChanged(room) => {
            let speaker = room.speaker().map_or("-", |p| p.name.as_str());
            tracing::info!(room = %room.code, status = ?room.status, "speaker: {speaker}");
        }
        ServerEvent::TimerTick(left) => tracing::info!("{left}s left"),
        ServerEvent::VoteSubmitted(room) => {
            tracing::info!(room = %room.code, alive = room.alive_players().count(), "vote in");
        }
    })?;

    let join_channel = channel.clone();
    let join = move |code: RoomCode| {
        let ack_code = code.clone();
        let result = join_channel.join_room(&code, &name, move |ack| match ack.rejection() {
            None => tracing::info!(room = %ack_code, "joined"),
            Some(reason) => tracing::warn!(room = %ack_code, "join failed: {reason}"),
        });
        if let Err(e) = result {
            tracing::error!("join-room not sent: {e}");
        }
    };

    match room {
        Some(code) => join(RoomCode::new(&code)),
        None => channel.create_room(move |ack| match ack.room_code() {
            Some(code) => join(RoomCode::new(code)),
            None => tracing::warn!(
                "create-room failed: {}",
                ack.rejection().unwrap_or("no room returned")
            ),
        })?,
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(ConnectionEvent::Connected { sid }) => tracing::info!("connected ({sid})"),
                Some(ConnectionEvent::Disconnected { reason }) => tracing::info!("disconnected: {reason}"),
                Some(_) => {}
                None => break,
            },
        }
    }

    manager.shutdown().await;
    Ok(())
}
