use clap::{Parser, Subcommand};
use rand::Rng;
use rml_ftl::handshake::compute_digest;
use rml_ftl::{
    AudioCodec, AudioComponent, FtlStreamConfig, StreamEvent, VideoCodec, VideoComponent,
};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Tests FTL stream activation as either a client or a mock ingest")]
struct Args {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Activates a stream against an ingest, holds it open, then deactivates it
    Client {
        /// Ingest hostname or address, optionally with a port
        ingest: String,

        #[arg(long)]
        channel_id: u64,

        #[arg(long)]
        key: String,

        /// How long to keep the stream active
        #[arg(long, default_value_t = 30)]
        seconds: u64,

        #[arg(long, default_value_t = 1280)]
        width: u32,

        #[arg(long, default_value_t = 720)]
        height: u32,
    },

    /// Runs a permissive ingest that accepts every stream whose key matches
    Server {
        #[arg(long, default_value_t = 8084)]
        port: u16,

        #[arg(long)]
        key: String,

        /// UDP port announced to clients for media
        #[arg(long, default_value_t = 8082)]
        media_port: u16,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.mode {
        Mode::Client {
            ingest,
            channel_id,
            key,
            seconds,
            width,
            height,
        } => {
            if let Err(error) = act_as_client(&ingest, channel_id, &key, seconds, width, height) {
                error!(status = ?error.status(), "{}", error);
                process::exit(1);
            }
        }

        Mode::Server {
            port,
            key,
            media_port,
        } => act_as_server(port, &key, media_port),
    }
}

fn act_as_client(
    ingest: &str,
    channel_id: u64,
    key: &str,
    seconds: u64,
    width: u32,
    height: u32,
) -> Result<(), rml_ftl::FtlError> {
    rml_ftl::init()?;

    let mut slot = None;
    rml_ftl::create_stream_with_config(&mut slot, FtlStreamConfig::new())?;
    let stream = slot.as_mut().ok_or(rml_ftl::FtlError::AlreadyDestroyed)?;
    let events = stream.events();

    stream.set_ingest_location(ingest)?;
    stream.set_credentials(channel_id, key)?;
    stream.attach_audio_component(AudioComponent::new(AudioCodec::Opus, 0, 0))?;
    stream.attach_video_component(VideoComponent::new(VideoCodec::Vp8, 0, 0, width, height))?;
    stream.activate()?;

    info!(
        media_destination = ?stream.media_destination(),
        "Stream active, holding for {} seconds",
        seconds
    );

    for _ in 0..seconds {
        thread::sleep(Duration::from_secs(1));
        for event in events.try_iter() {
            if let StreamEvent::KeepaliveFailed { error } = event {
                warn!("Stream lost: {}", error);
            }
        }
    }

    match stream.deactivate() {
        Ok(()) => info!("Stream deactivated"),
        Err(error) => warn!("Deactivation reported: {}", error),
    }

    rml_ftl::destroy_stream(&mut slot)
}

fn act_as_server(port: u16, key: &str, media_port: u16) {
    let listener = match TcpListener::bind(("0.0.0.0", port)) {
        Ok(listener) => listener,
        Err(error) => {
            error!("Failed to listen on port {}: {}", port, error);
            process::exit(1);
        }
    };

    info!("Listening on port {}", port);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(error) => {
                warn!("Failed to accept connection: {}", error);
                continue;
            }
        };

        let key = key.to_string();
        thread::spawn(move || {
            let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_default();
            info!(peer = %peer, "Incoming connection");
            if let Err(error) = serve_client(stream, &key, media_port) {
                warn!(peer = %peer, "Connection ended with error: {}", error);
            }

            info!(peer = %peer, "Connection closed");
        });
    }
}

fn serve_client(stream: TcpStream, key: &str, media_port: u16) -> std::io::Result<()> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut nonce = [0_u8; 16];
    rand::thread_rng().fill(&mut nonce[..]);
    let mut authenticated = false;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }

        let command = line.trim();
        if command.is_empty() {
            continue;
        }

        info!("Received: {}", command);
        let reply = if command == "HMAC" {
            Some(format!("200 {}", hex::encode(nonce)))
        } else if let Some(arguments) = command.strip_prefix("CONNECT ") {
            let digest = arguments.split('$').nth(1).unwrap_or("");
            if compute_digest(key, &nonce).as_deref() == Some(digest) {
                authenticated = true;
                Some("200".to_string())
            } else {
                Some("401 invalid stream key".to_string())
            }
        } else if command == "." {
            if authenticated {
                Some(format!("200 hi. Use UDP port {}", media_port))
            } else {
                Some("401 not authenticated".to_string())
            }
        } else if command.starts_with("PING ") {
            Some("201".to_string())
        } else if command == "DISCONNECT" {
            return Ok(());
        } else {
            None
        };

        if let Some(reply) = reply {
            writer.write_all(format!("{}\n", reply).as_bytes())?;
        }
    }
}
