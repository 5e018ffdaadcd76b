use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Find the address other machines on the LAN can reach us at.
///
/// Connecting a UDP socket sends nothing, but makes the OS pick the outbound
/// interface, whose address we then read back. Falls back to loopback when
/// the host has no route (e.g. no network at all).
pub fn local_ip() -> IpAddr {
    let discover = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(10, 255, 255, 255), 1))?;
        Ok(socket.local_addr()?.ip())
    };

    match discover() {
        Ok(ip) if !ip.is_unspecified() => ip,
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(e) => {
            tracing::warn!(error = %e, "Could not detect LAN address, falling back to loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
