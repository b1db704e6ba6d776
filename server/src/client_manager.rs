//! Connected client bookkeeping for the match server
//!
//! This module tracks who is connected and where to reach them:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Sender validation so one address cannot act for another client id
//! - Capacity limits and the local player count each client brings
//!
//! Game state for a client's players lives in the match session; the client
//! manager only knows about connections.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Local players sharing this connection
    pub player_count: u8,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, player_count: u8) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            player_count,
        }
    }

    /// Returns true if nothing has been heard from the client within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Client IDs start from 1 and are never reused within a server run, so a
/// late packet from a dropped client cannot be mistaken for a new one.
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, player_count: u8) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!(
            "Client {} connected from {} with {} player(s)",
            client_id, addr, player_count
        );
        self.clients
            .insert(client_id, Client::new(client_id, addr, player_count));

        Some(client_id)
    }

    /// Removes a client, returning true if it was still connected
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Resolves the sender of a packet that names `claimed_id`
    ///
    /// Returns the id only when the address matches the connection that was
    /// assigned that id.
    pub fn verify_sender(&self, addr: SocketAddr, claimed_id: u32) -> Option<u32> {
        self.clients
            .get(&claimed_id)
            .filter(|client| client.addr == addr)
            .map(|client| client.id)
    }

    /// Records activity from the client at `addr`
    pub fn touch(&mut self, addr: SocketAddr) -> Option<u32> {
        let client = self.clients.values_mut().find(|client| client.addr == addr)?;
        client.last_seen = Instant::now();
        Some(client.id)
    }

    /// Checks for and removes timed-out clients, returning their ids
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(self.timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// All client ids with their addresses, for broadcasting
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
