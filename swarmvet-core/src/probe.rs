//! TCP/UDP connectivity probes
//!
//! A probe never fails with a query error: the probe itself always answers,
//! and the answer ("reachable" yes/no) is evaluated like any other observed
//! field. UDP reachability is a heuristic: a silent peer counts as open, an
//! ICMP port-unreachable surfaced on recv counts as closed.

use std::time::Duration;
use swarmvet_common::{Entity, FieldValue, ObservedState};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::debug;

use crate::desired::{ProbeProtocol, ProbeRule};

/// Run a connectivity probe and report the result as observed state.
pub async fn run(entity: &Entity, rule: &ProbeRule, limit: Duration) -> ObservedState {
    let reachable = match rule.protocol {
        ProbeProtocol::Tcp => tcp_reachable(&rule.host, rule.port, limit).await,
        ProbeProtocol::Udp => udp_reachable(&rule.host, rule.port, limit).await,
    };

    debug!(
        probe = %entity.id,
        host = %rule.host,
        port = rule.port,
        protocol = %rule.protocol,
        reachable = reachable,
        "connectivity probe"
    );

    let answer = if reachable { "yes" } else { "no" };
    ObservedState::new(entity.clone())
        .with_field("reachable", FieldValue::Str(answer.to_string()))
        .with_field("protocol", FieldValue::Str(rule.protocol.to_string()))
}

async fn tcp_reachable(host: &str, port: u16, limit: Duration) -> bool {
    matches!(
        timeout(limit, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

async fn udp_reachable(host: &str, port: u16, limit: Duration) -> bool {
    let attempt = async {
        let socket = UdpSocket::bind("0.0.0.0:0").await.ok()?;
        socket.connect((host, port)).await.ok()?;
        socket.send(&[0u8]).await.ok()?;

        let mut buf = [0u8; 16];
        match socket.recv(&mut buf).await {
            Ok(_) => Some(true),
            // ICMP port unreachable from a previous send lands here
            Err(_) => Some(false),
        }
    };

    match timeout(limit, attempt).await {
        Ok(Some(reachable)) => reachable,
        Ok(None) => false,
        // No reply and no ICMP error within the window: assume open
        Err(_) => true,
    }
}
