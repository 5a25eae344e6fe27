//! Client IP extraction from proxy headers
//!
//! Sources are tried in trust order: the CDN-asserted header, then the
//! reverse-proxy header, then the forwarded-for chain, finally the socket
//! peer address. A value that does not parse as an IP falls through to the
//! next source.

use axum::http::HeaderMap;
use ipnet::{Ipv4Net, Ipv6Net};
use std::net::IpAddr;
use std::sync::LazyLock;

static PRIVATE_V4: LazyLock<Vec<Ipv4Net>> = LazyLock::new(|| {
    ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "169.254.0.0/16"]
        .iter()
        .map(|net| net.parse().expect("hardcoded CIDR"))
        .collect()
});

static PRIVATE_V6: LazyLock<Vec<Ipv6Net>> = LazyLock::new(|| {
    ["fc00::/7", "fe80::/10"]
        .iter()
        .map(|net| net.parse().expect("hardcoded CIDR"))
        .collect()
});

/// Resolve the client address for a beacon retrieval.
pub fn extract_client_ip(headers: &HeaderMap, socket_addr: IpAddr) -> IpAddr {
    // Cloudflare and similar CDNs assert the connecting client directly
    if let Some(ip) = header_ip(headers, "cf-connecting-ip") {
        return ip;
    }

    // X-Real-IP as set by nginx/apache real_ip configurations
    if let Some(ip) = header_ip(headers, "x-real-ip") {
        return ip;
    }

    if let Some(ip) = extract_from_x_forwarded_for(headers) {
        return ip;
    }

    // Direct connection or no usable proxy headers
    socket_addr
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<IpAddr>().ok())
}

/// Walk X-Forwarded-For right to left and take the first public address.
/// Proxies append to the chain, so the right side is the least spoofable.
fn extract_from_x_forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    xff.rsplit(',')
        .filter_map(|part| part.trim().parse::<IpAddr>().ok())
        .find(|ip| !is_private(ip) && !ip.is_loopback() && !ip.is_multicast())
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => PRIVATE_V4.iter().any(|net| net.contains(v4)),
        IpAddr::V6(v6) => PRIVATE_V6.iter().any(|net| net.contains(v6)),
    }
}
