use crate::handshake::compute_digest;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub const TEST_NONCE: &str = "00112233445566778899aabbccddeeff";

/// How late `Behavior::SlowPings` answers each ping
pub const SLOW_PING_DELAY: Duration = Duration::from_millis(90);

/// How the mock ingest responds to a client
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Behavior {
    /// Accepts the stream and acknowledges every ping
    Accept,

    /// Accepts the stream but never answers pings
    IgnorePings,

    /// Accepts the stream, then drops the connection on the first ping
    CloseOnPing,

    /// Rejects the `CONNECT` command as if the key was wrong
    RejectConnect,

    /// Authenticates the channel but rejects the stream description
    RejectStream,

    /// Accepts the stream but answers every ping `SLOW_PING_DELAY` late
    SlowPings,

    /// Answers the `HMAC` command with garbage
    MalformedNonce,

    /// Starts answering the `HMAC` command, then sends one byte at a time and never ends
    /// the line
    TrickleNonce,
}

#[derive(Default)]
struct Observations {
    commands: Vec<String>,
    connection_ended: bool,
}

/// Single connection ingest server running on a background thread
pub struct MockIngest {
    address: SocketAddr,
    media_socket: UdpSocket,
    observations: Arc<Mutex<Observations>>,
    handle: Option<JoinHandle<()>>,
}

impl MockIngest {
    pub fn start(behavior: Behavior, channel_id: u64, key: &str) -> MockIngest {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let media_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        media_socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let media_port = media_socket.local_addr().unwrap().port();
        let observations = Arc::new(Mutex::new(Observations::default()));
        let thread_observations = observations.clone();
        let key = key.to_string();

        let handle = thread::spawn(move || {
            let (socket, _) = match listener.accept() {
                Ok(connection) => connection,
                Err(_) => return,
            };

            serve(socket, behavior, channel_id, &key, media_port, &thread_observations);
            thread_observations.lock().unwrap().connection_ended = true;
        });

        MockIngest {
            address,
            media_socket,
            observations,
            handle: Some(handle),
        }
    }

    /// Location string to hand to `set_ingest_location`
    pub fn location(&self) -> String {
        self.address.to_string()
    }

    pub fn media_address(&self) -> SocketAddr {
        self.media_socket.local_addr().unwrap()
    }

    /// Blocks until a media packet arrives, for at most two seconds
    pub fn receive_media(&self) -> Vec<u8> {
        let mut buffer = [0_u8; 2048];
        let (count, _) = self.media_socket.recv_from(&mut buffer).unwrap();
        buffer[..count].to_vec()
    }

    pub fn commands(&self) -> Vec<String> {
        self.observations.lock().unwrap().commands.clone()
    }

    pub fn count_of(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| c.as_str() == command).count()
    }

    pub fn ping_count(&self) -> usize {
        self.commands().iter().filter(|c| c.starts_with("PING ")).count()
    }

    /// Waits until the control connection has ended
    pub fn wait_for_close(&self, timeout: Duration) -> bool {
        wait_until(timeout, || self.observations.lock().unwrap().connection_ended)
    }
}

impl Drop for MockIngest {
    fn drop(&mut self) {
        // Unblock a listener that never got a client
        let _ = TcpStream::connect(self.address);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }

        thread::sleep(Duration::from_millis(10));
    }

    condition()
}

fn serve(
    socket: TcpStream,
    behavior: Behavior,
    channel_id: u64,
    key: &str,
    media_port: u16,
    observations: &Mutex<Observations>,
) {
    let mut writer = socket.try_clone().unwrap();
    let mut reader = BufReader::new(socket);
    let nonce = hex::decode(TEST_NONCE).unwrap();
    let expected_digest = compute_digest(key, &nonce).unwrap();
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => (),
        }

        let command = line.trim().to_string();
        if command.is_empty() {
            continue;
        }

        observations.lock().unwrap().commands.push(command.clone());

        let reply = if command == "HMAC" {
            match behavior {
                Behavior::MalformedNonce => Some("200 zz-not-hex".to_string()),
                Behavior::TrickleNonce => {
                    trickle(&mut writer);
                    return;
                }

                _ => Some(format!("200 {}", TEST_NONCE)),
            }
        } else if command.starts_with("CONNECT ") {
            let expected = format!("CONNECT {} ${}", channel_id, expected_digest);
            if behavior == Behavior::RejectConnect || command != expected {
                Some("401 bad stream key".to_string())
            } else {
                Some("200".to_string())
            }
        } else if command == "." {
            match behavior {
                Behavior::RejectStream => Some("403 unsupported stream".to_string()),
                _ => Some(format!("200 hi. Use UDP port {}", media_port)),
            }
        } else if command.starts_with("PING ") {
            match behavior {
                Behavior::IgnorePings => None,
                Behavior::CloseOnPing => return,
                Behavior::SlowPings => {
                    thread::sleep(SLOW_PING_DELAY);
                    Some("201".to_string())
                }

                _ => Some("201".to_string()),
            }
        } else {
            None
        };

        if let Some(reply) = reply {
            if writer.write_all(format!("{}\n", reply).as_bytes()).is_err() {
                return;
            }
        }
    }
}

fn trickle(writer: &mut TcpStream) {
    if writer.write_all(b"200 ").is_err() {
        return;
    }

    for _ in 0..200 {
        thread::sleep(Duration::from_millis(30));
        if writer.write_all(b"a").is_err() {
            return;
        }
    }
}
