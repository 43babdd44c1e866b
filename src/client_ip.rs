use axum::http::HeaderMap;
use std::net::SocketAddr;

const UNKNOWN_CLIENT: &str = "unknown";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn first_in_chain(value: &str) -> Option<&str> {
    value
        .split(',')
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolves the caller IP. Proxy headers are consulted first when trusted,
/// then the socket peer, then the shared `unknown` bucket.
pub fn get_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = header(headers, "cf-connecting-ip") {
            return ip.to_string();
        }
        if let Some(ip) = header(headers, "x-forwarded-for").and_then(first_in_chain) {
            return ip.to_string();
        }
        if let Some(ip) = header(headers, "x-real-ip") {
            return ip.to_string();
        }
        if let Some(ip) = header(headers, "x-vercel-forwarded-for").and_then(first_in_chain) {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string()).unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn prefers_cloudflare_header() {
        let h = headers(&[("cf-connecting-ip", "1.1.1.1"), ("x-forwarded-for", "2.2.2.2")]);
        assert_eq!(get_client_ip(&h, None, true), "1.1.1.1");
    }

    #[test]
    fn takes_first_forwarded_hop() {
        let h = headers(&[("x-forwarded-for", " 3.3.3.3 , 10.0.0.1")]);
        assert_eq!(get_client_ip(&h, None, true), "3.3.3.3");
    }

    #[test]
    fn ignores_headers_when_untrusted() {
        let h = headers(&[("x-real-ip", "4.4.4.4")]);
        let peer: SocketAddr = "192.168.1.9:5555".parse().unwrap();
        assert_eq!(get_client_ip(&h, Some(peer), false), "192.168.1.9");
        assert_eq!(get_client_ip(&h, None, false), "unknown");
    }

    #[test]
    fn falls_back_to_vercel_then_peer() {
        let h = headers(&[("x-vercel-forwarded-for", "5.5.5.5, 6.6.6.6")]);
        assert_eq!(get_client_ip(&h, None, true), "5.5.5.5");
        assert_eq!(get_client_ip(&HeaderMap::new(), None, true), "unknown");
    }
}
