use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

/// Splits an ingest location into a host and port.  The location may be a bare hostname or
/// address, `host:port`, or `[v6 address]:port`.
pub fn split_host_port(location: &str, default_port: u16) -> (&str, u16) {
    let location = location.trim();
    if location.starts_with('[') {
        if let Some(end) = location.find(']') {
            let host = &location[1..end];
            let port = location[end + 1..]
                .trim_start_matches(':')
                .parse()
                .unwrap_or(default_port);

            return (host, port);
        }
    }

    match location.rfind(':') {
        // More than one colon means a bare IPv6 address without a port
        Some(index) if !location[..index].contains(':') => match location[index + 1..].parse() {
            Ok(port) => (&location[..index], port),
            Err(_) => (location, default_port),
        },
        _ => (location, default_port),
    }
}

/// Resolves an ingest location into the list of addresses to try, in resolver order
pub fn resolve(location: &str, default_port: u16) -> Result<Vec<SocketAddr>, io::Error> {
    let (host, port) = split_host_port(location, default_port);
    let addresses: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    if addresses.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "no addresses returned for host",
        ));
    }

    Ok(addresses)
}
