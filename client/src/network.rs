use crate::bot::{AutoPlayer, BotAction};
use crate::config::ClientConfig;
use crate::input::InputSampler;
use crate::session::{ClientEvent, ClientSession};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, SyncError, PROTOCOL_VERSION};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// A shot the server has not taken up yet
struct PendingShot {
    sequence: u32,
    player_id: u8,
    packet: Packet,
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    config: ClientConfig,
    session: ClientSession,

    samplers: HashMap<u8, InputSampler>,
    bot: AutoPlayer,
    pending_shot: Option<PendingShot>,

    epoch: Instant,
    last_heard: Instant,
}

impl Client {
    pub async fn new(config: ClientConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = config.server.parse()?;
        let now = Instant::now();

        Ok(Client {
            socket,
            server_addr,
            bot: AutoPlayer::new(config.seed),
            config,
            session: ClientSession::new(),
            samplers: HashMap::new(),
            pending_shot: None,
            epoch: now,
            last_heard: now,
        })
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Client clock in milliseconds since start
    fn timestamp(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server with {} player(s)...", self.config.players);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            player_count: self.config.players,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.config.fake_ping > 0 {
            sleep(Duration::from_millis(self.config.fake_ping / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn handle_packet(&mut self, packet: Packet) -> Result<(), Box<dyn std::error::Error>> {
        let events = self.session.handle_packet(packet)?;

        for event in events {
            match event {
                ClientEvent::Connected { client_id } => {
                    self.send_packet(&Packet::ClientReady { client_id }).await?;
                }
                ClientEvent::TurnChanged(turn) => {
                    debug!("Turn {:?}", turn);
                    self.bot.reset();
                    for sampler in self.samplers.values_mut() {
                        sampler.release_all();
                    }
                }
                ClientEvent::Score {
                    client_id,
                    player_id,
                    hole,
                    strokes,
                    total,
                } => {
                    info!(
                        "Client {} player {}: {} stroke(s) on hole {}, {} total",
                        client_id,
                        player_id,
                        strokes,
                        hole + 1,
                        total
                    );
                }
                ClientEvent::WarnTime(seconds) => {
                    if self.session.acting_player().is_some() {
                        warn!("{} seconds left to play", seconds);
                    }
                }
                ClientEvent::TurnTimedOut(player) => {
                    info!(
                        "Client {} player {} ran out of time",
                        player.client_id, player.player_id
                    );
                }
                ClientEvent::MaxStrokes(player) => {
                    info!(
                        "Client {} player {} reached the stroke limit",
                        player.client_id, player.player_id
                    );
                }
                ClientEvent::GameOver => info!("Round complete"),
                ClientEvent::HoleChanged(_) | ClientEvent::PlayerLeft(_) => {}
            }
        }

        Ok(())
    }

    /// Samples and sends input for the local player holding the turn
    async fn input_tick(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let (Some(client_id), Some(player_id)) =
            (self.session.client_id(), self.session.acting_player())
        else {
            return Ok(());
        };
        let Some(sequence) = self.session.turn().sequence() else {
            return Ok(());
        };
        if self
            .pending_shot
            .as_ref()
            .map_or(false, |shot| shot.sequence == sequence)
        {
            return Ok(());
        }

        let Some(state) = self
            .session
            .game()
            .local_actor_for(player_id)
            .map(|actor| *actor.state())
        else {
            return Ok(());
        };

        let pin = self.session.pin();
        let timestamp = self.timestamp();
        let sampler = self.samplers.entry(player_id).or_default();

        match self.bot.next_action(&state, pin) {
            BotAction::Control(event) => sampler.handle_event(event),
            BotAction::Shoot(shot) => {
                sampler.release_all();
                info!(
                    "Player {} shoots from ({:.1}, {:.1})",
                    player_id, state.position[0], state.position[2]
                );
                let packet = Packet::InputUpdate {
                    client_id,
                    player_id,
                    shot,
                };
                self.send_packet(&packet).await?;
                self.pending_shot = Some(PendingShot {
                    sequence,
                    player_id,
                    packet,
                });
                return Ok(());
            }
            BotAction::Wait => {}
        }

        let input = sampler.sample(timestamp);
        self.session.game_mut().record_input(player_id, input);
        self.session.game_mut().predict_step();

        let packet = Packet::PlayerInput {
            client_id,
            player_id,
            input,
        };
        self.send_packet(&packet).await
    }

    /// Runs until the round ends or the connection is lost
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut input_interval = interval(self.config.input_interval());
        let mut ready_interval = interval(self.config.ready_retry());
        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);

        let mut buffer = [0u8; 2048];

        while !self.session.is_game_over() {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.config.fake_ping > 0 {
                                sleep(Duration::from_millis(self.config.fake_ping / 2)).await;
                            }

                            self.last_heard = Instant::now();
                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => self.handle_packet(packet).await?,
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = input_interval.tick() => {
                    if let Err(e) = self.input_tick().await {
                        error!("Error sending input: {}", e);
                    }
                },

                _ = ready_interval.tick() => {
                    // repeat until the server shows it has us
                    match self.session.client_id() {
                        None => self.connect().await?,
                        Some(client_id) if !self.session.is_acknowledged() => {
                            self.send_packet(&Packet::ClientReady { client_id }).await?;
                        }
                        Some(_) => {}
                    }

                    if let Some(shot) = &self.pending_shot {
                        if self.session.awaiting_acceptance(shot.sequence, shot.player_id) {
                            debug!("Resending shot for turn {}", shot.sequence);
                            self.send_packet(&shot.packet).await?;
                        }
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.last_heard.elapsed() > self.config.connection_timeout() {
                        let err = SyncError::ConnectionLost(format!(
                            "no packets from {} in {}s",
                            self.server_addr, self.config.connection_timeout
                        ));
                        error!("{}", err);
                        return Err(Box::new(err));
                    }

                    let packet = Packet::Heartbeat { timestamp: self.timestamp() };
                    self.send_packet(&packet).await?;
                },
            }
        }

        let _ = self.send_packet(&Packet::Disconnect).await;

        Ok(())
    }
}
