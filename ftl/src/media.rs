//! The media side of an active stream.  Callers hand over complete RTP packets for an
//! attached component; they are passed through the installed [`PacketProtector`] and sent
//! over UDP to the port ingest assigned during the handshake.

use crate::components::MediaKind;
use byteorder::{BigEndian, ReadBytesExt};
use std::error::Error;
use std::io;
use std::net::{SocketAddr, UdpSocket};

/// Length of a fixed RTP header, the shortest packet that can be sent
pub const RTP_HEADER_SIZE: usize = 12;

/// Transform applied to every outgoing media packet.  This is where a secure transport
/// (e.g. SRTP) plugs in.
pub trait PacketProtector: Send {
    fn protect(
        &mut self,
        kind: MediaKind,
        packet: &[u8],
    ) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>>;
}

/// Reads the SSRC out of an RTP header, if the packet is long enough to have one
pub fn rtp_ssrc(packet: &[u8]) -> Option<u32> {
    if packet.len() < RTP_HEADER_SIZE {
        return None;
    }

    (&packet[8..12]).read_u32::<BigEndian>().ok()
}

pub(crate) struct MediaSink {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl MediaSink {
    pub fn open(destination: SocketAddr) -> Result<MediaSink, io::Error> {
        let bind_address = match destination {
            SocketAddr::V4(_) => "0.0.0.0:0",
            SocketAddr::V6(_) => "[::]:0",
        };

        let socket = UdpSocket::bind(bind_address)?;
        socket.connect(destination)?;

        Ok(MediaSink {
            socket,
            destination,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn send(&self, packet: &[u8]) -> Result<usize, io::Error> {
        self.socket.send(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssrc_is_read_from_rtp_header() {
        let mut packet = vec![0x80, 96, 0, 1, 0, 0, 0, 0];
        packet.extend_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        packet.extend_from_slice(b"payload");

        assert_eq!(rtp_ssrc(&packet), Some(0x1234_5678));
    }

    #[test]
    fn short_packets_have_no_ssrc() {
        assert_eq!(rtp_ssrc(&[0x80, 96, 0, 1]), None);
    }

    #[test]
    fn sink_delivers_to_destination() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let sink = MediaSink::open(receiver.local_addr().unwrap()).unwrap();

        sink.send(b"hello").unwrap();

        let mut buffer = [0_u8; 16];
        let (count, _) = receiver.recv_from(&mut buffer).unwrap();
        assert_eq!(&buffer[..count], b"hello");
    }
}
