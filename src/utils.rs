use std::net::IpAddr;

use axum::http::HeaderMap;

/// Resolve the caller address used as the client part of rate-limit keys.
///
/// By default this is the direct peer address. With `trust_forwarded` set
/// (gateway behind a proxy that overwrites the headers), the first entry of
/// X-Forwarded-For wins, then X-Real-IP, then the peer.
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trust_forwarded: bool,
) -> String {
    if trust_forwarded && let Some(ip) = forwarded_ip(headers) {
        return ip.to_string();
    }

    direct_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded_for) = headers.get("x-forwarded-for")
        && let Ok(forwarded_str) = forwarded_for.to_str()
        && let Some(first) = forwarded_str.split(',').next()
        && let Ok(ip) = first.trim().parse::<IpAddr>()
    {
        return Some(ip);
    }

    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(real_ip_str) = real_ip.to_str()
        && let Ok(ip) = real_ip_str.trim().parse::<IpAddr>()
    {
        return Some(ip);
    }

    None
}
