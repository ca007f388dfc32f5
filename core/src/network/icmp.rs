//! ICMP echo over raw transport channels. Opening the channel needs root.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::{Duration, Instant};

use pnet::packet::Packet;
use pnet::packet::icmp::{self, IcmpCode, IcmpPacket, IcmpTypes, MutableIcmpPacket};
use pnet::packet::icmpv6::{Icmpv6Code, Icmpv6Types, MutableIcmpv6Packet};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::transport::{
    self, TransportChannelType, TransportProtocol, TransportReceiver, TransportSender,
};
use portstream_common::PingResult;
use tracing::debug;

const TRANSPORT_BUFFER_SIZE: usize = 4096;
const ICMP_HEADER_LEN: usize = 4;
const ECHO_PAYLOAD: &[u8; 8] = b"pstream!";
const CHANNEL_TYPE_ICMP: TransportChannelType =
    TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp));
const CHANNEL_TYPE_ICMPV6: TransportChannelType =
    TransportChannelType::Layer4(TransportProtocol::Ipv6(IpNextHeaderProtocols::Icmpv6));

/// Sends one echo request and waits for the matching reply.
///
/// Blocking, run it off the async executor.
pub fn ping(addr: IpAddr, wait: Duration) -> PingResult {
    let token: [u8; 4] = rand::random();
    let outcome = match addr {
        IpAddr::V4(ipv4_addr) => ping_v4(ipv4_addr, token, wait),
        IpAddr::V6(ipv6_addr) => ping_v6(ipv6_addr, token, wait),
    };
    match outcome {
        Ok(true) => PingResult::ReceivedReply,
        Ok(false) => PingResult::Timeout,
        Err(e) => {
            debug!("ping {addr} failed: {e}");
            PingResult::IoError
        }
    }
}

fn echo_body(token: [u8; 4]) -> Vec<u8> {
    let mut body = token.to_vec();
    body.extend_from_slice(ECHO_PAYLOAD);
    body
}

fn ping_v4(addr: Ipv4Addr, token: [u8; 4], wait: Duration) -> io::Result<bool> {
    let (mut tx, mut rx) = open_channel(CHANNEL_TYPE_ICMP)?;

    let body = echo_body(token);
    let mut buffer = vec![0u8; ICMP_HEADER_LEN + body.len()];
    let mut request = MutableIcmpPacket::new(&mut buffer).ok_or_else(packet_too_small)?;
    request.set_icmp_type(IcmpTypes::EchoRequest);
    request.set_icmp_code(IcmpCode::new(0));
    request.set_payload(&body);
    let checksum = icmp::checksum(&IcmpPacket::new(request.packet()).ok_or_else(packet_too_small)?);
    request.set_checksum(checksum);
    tx.send_to(request, IpAddr::V4(addr))?;

    let deadline = Instant::now() + wait;
    let mut replies = transport::icmp_packet_iter(&mut rx);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        match replies.next_with_timeout(remaining)? {
            None => return Ok(false),
            Some((reply, source)) => {
                if source == IpAddr::V4(addr)
                    && reply.get_icmp_type() == IcmpTypes::EchoReply
                    && reply.payload().starts_with(&token)
                {
                    return Ok(true);
                }
            }
        }
    }
}

fn ping_v6(addr: Ipv6Addr, token: [u8; 4], wait: Duration) -> io::Result<bool> {
    let (mut tx, mut rx) = open_channel(CHANNEL_TYPE_ICMPV6)?;

    // The kernel fills in the ICMPv6 checksum on raw sockets
    let body = echo_body(token);
    let mut buffer = vec![0u8; ICMP_HEADER_LEN + body.len()];
    let mut request = MutableIcmpv6Packet::new(&mut buffer).ok_or_else(packet_too_small)?;
    request.set_icmpv6_type(Icmpv6Types::EchoRequest);
    request.set_icmpv6_code(Icmpv6Code::new(0));
    request.set_payload(&body);
    tx.send_to(request, IpAddr::V6(addr))?;

    let deadline = Instant::now() + wait;
    let mut replies = transport::icmpv6_packet_iter(&mut rx);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        match replies.next_with_timeout(remaining)? {
            None => return Ok(false),
            Some((reply, source)) => {
                if source == IpAddr::V6(addr)
                    && reply.get_icmpv6_type() == Icmpv6Types::EchoReply
                    && reply.payload().starts_with(&token)
                {
                    return Ok(true);
                }
            }
        }
    }
}

fn open_channel(
    channel_type: TransportChannelType,
) -> io::Result<(TransportSender, TransportReceiver)> {
    transport::transport_channel(TRANSPORT_BUFFER_SIZE, channel_type)
}

fn packet_too_small() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "icmp buffer too small")
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
