//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::session::{MatchSession, Outgoing};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, MAX_LOCAL_PLAYERS, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Time to keep running after the round ends so the final scores go out
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet },
}

/// Main server coordinating networking and the match
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    session: MatchSession,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let addr = config.bind_address();
        let socket = Arc::new(UdpSocket::bind(&addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                Duration::from_secs(config.client_timeout),
            ))),
            session: MatchSession::new(config.turn_config(), Instant::now()),
            tick_duration: config.tick_duration(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    async fn deliver(&self, outgoing: Vec<Outgoing>) {
        for message in outgoing {
            match message {
                Outgoing::Broadcast(packet) => self.broadcast_packet(packet),
                Outgoing::Send { client_id, packet } => {
                    let addr = {
                        let clients = self.clients.read().await;
                        clients.get(client_id).map(|client| client.addr)
                    };
                    match addr {
                        Some(addr) => self.send_packet(packet, addr),
                        None => debug!("Client {} gone, dropping {:?}", client_id, packet),
                    }
                }
            }
        }
    }

    /// The client id a packet may act for, if the sender is who it claims
    async fn sender(&self, addr: SocketAddr, claimed_id: Option<u32>) -> Option<u32> {
        let clients = self.clients.read().await;
        match claimed_id {
            Some(claimed) => clients.verify_sender(addr, claimed),
            None => clients.find_client_by_addr(addr),
        }
    }

    async fn handle_connect(&mut self, addr: SocketAddr, client_version: u32, player_count: u8) {
        info!(
            "Client connecting from {} (version: {}, players: {})",
            addr, client_version, player_count
        );

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: format!(
                        "Protocol version {} not supported, server speaks {}",
                        client_version, PROTOCOL_VERSION
                    ),
                },
                addr,
            );
            return;
        }

        // a repeat from a known address means our reply was lost
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };
        if let Some(existing_id) = existing_client_id {
            debug!("Client {} at {} connected again", existing_id, addr);
            self.send_packet(
                Packet::Connected {
                    client_id: existing_id,
                },
                addr,
            );
            return;
        }

        if self.session.is_started() {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Match already in progress".to_string(),
                },
                addr,
            );
            return;
        }

        let player_count = player_count.clamp(1, MAX_LOCAL_PLAYERS);
        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr, player_count)
        };

        match client_id {
            Some(client_id) => {
                self.send_packet(Packet::Connected { client_id }, addr);
                let out = self
                    .session
                    .add_client(client_id, player_count, Instant::now());
                self.deliver(out).await;
            }
            None => self.send_packet(
                Packet::Disconnected {
                    reason: "Server full".to_string(),
                },
                addr,
            ),
        }
    }

    /// Removes a client everywhere and notifies the rest
    async fn drop_client(&mut self, client_id: u32) {
        {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id);
        }
        let out = self.session.remove_client(client_id, Instant::now());
        self.deliver(out).await;
    }

    /// Processes incoming packets and updates game state
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        {
            let mut clients = self.clients.write().await;
            clients.touch(addr);
        }

        let claimed_id = match &packet {
            Packet::Connect {
                client_version,
                player_count,
            } => {
                self.handle_connect(addr, *client_version, *player_count)
                    .await;
                return;
            }
            Packet::ClientReady { client_id }
            | Packet::PlayerInput { client_id, .. }
            | Packet::InputUpdate { client_id, .. }
            | Packet::SkipTurn { client_id } => Some(*client_id),
            Packet::Heartbeat { .. } | Packet::Disconnect => None,
            _ => {
                warn!("Unexpected packet type from client at {}", addr);
                return;
            }
        };

        let Some(client_id) = self.sender(addr, claimed_id).await else {
            debug!("Ignoring {:?} from unverified sender {}", packet, addr);
            return;
        };

        if packet == Packet::Disconnect {
            self.drop_client(client_id).await;
            return;
        }

        let out = self
            .session
            .handle_packet(client_id, packet, Instant::now());
        self.deliver(out).await;
    }

    /// Main server loop coordinating all operations
    ///
    /// Returns once the round is complete and the final packets had time to
    /// leave.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        let mut last_tick = Instant::now();
        let mut finished_at: Option<Instant> = None;

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            warn!("Client {} timed out", client_id);
                            let out = self.session.remove_client(client_id, Instant::now());
                            self.deliver(out).await;
                        },
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    let out = self.session.tick(dt, now);
                    self.deliver(out).await;

                    if self.session.is_finished() {
                        let ended = *finished_at.get_or_insert(now);
                        if now.duration_since(ended) >= SHUTDOWN_GRACE {
                            info!("Round over, shutting down");
                            break;
                        }
                    }

                    if self.session.game().tick % 600 == 0 {
                        let client_count = {
                            let clients = self.clients.read().await;
                            clients.len()
                        };
                        if client_count > 0 {
                            debug!(
                                "Tick {}: {} clients, turn {:?}",
                                self.session.game().tick,
                                client_count,
                                self.session.turn().state()
                            );
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tokio_test::assert_ok;

    fn test_config() -> ServerConfig {
        ServerConfig::parse_from(["server", "--port", "0"])
    }

    async fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buffer = [0u8; 2048];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .expect("timed out waiting for packet")
            .unwrap();
        deserialize(&buffer[..len]).unwrap()
    }

    #[tokio::test]
    async fn test_connect_handshake() {
        let mut server = assert_ok!(Server::new(&test_config()).await);
        let server_addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            player_count: 1,
        };
        socket
            .send_to(&serialize(&connect).unwrap(), server_addr)
            .await
            .unwrap();

        assert_eq!(recv_packet(&socket).await, Packet::Connected { client_id: 1 });
    }

    #[tokio::test]
    async fn test_repeated_connect_keeps_id() {
        let mut server = assert_ok!(Server::new(&test_config()).await);
        let server_addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = serialize(&Packet::Connect {
            client_version: PROTOCOL_VERSION,
            player_count: 2,
        })
        .unwrap();

        socket.send_to(&connect, server_addr).await.unwrap();
        assert_eq!(recv_packet(&socket).await, Packet::Connected { client_id: 1 });

        socket.send_to(&connect, server_addr).await.unwrap();
        assert_eq!(recv_packet(&socket).await, Packet::Connected { client_id: 1 });
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let mut server = assert_ok!(Server::new(&test_config()).await);
        let server_addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = Packet::Connect {
            client_version: PROTOCOL_VERSION + 1,
            player_count: 1,
        };
        socket
            .send_to(&serialize(&connect).unwrap(), server_addr)
            .await
            .unwrap();

        match recv_packet(&socket).await {
            Packet::Disconnected { reason } => assert!(reason.contains("not supported")),
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_channel_communication() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();

        assert!(tx
            .send(ServerMessage::PacketReceived {
                packet: Packet::Disconnect,
                addr,
            })
            .is_ok());

        match rx.try_recv().unwrap() {
            ServerMessage::PacketReceived { packet, addr: a } => {
                assert_eq!(packet, Packet::Disconnect);
                assert_eq!(a, addr);
            }
            other => panic!("Unexpected message {:?}", other),
        }
    }
}
