// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSRF filter for webhook targets.
//!
//! The daemon itself lives on localhost, so a webhook pointed back at
//! loopback or at link-local metadata endpoints is a confused-deputy
//! hazard. The filter is syntactic: it never resolves names.

use std::net::{Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

use pd_core::{ApiError, ErrorKind};

fn blocked(reason: impl Into<String>) -> ApiError {
    ApiError::new(ErrorKind::SsrfBlocked, reason.into())
}

/// Validate a webhook target URL.
pub fn check_url(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw)
        .map_err(|e| ApiError::validation(format!("invalid url {:?}: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::validation(format!(
            "unsupported scheme {:?}",
            url.scheme()
        )));
    }
    match url.host() {
        None => Err(ApiError::validation("url has no host")),
        Some(Host::Domain(name)) => {
            check_hostname(name)?;
            Ok(url)
        }
        Some(Host::Ipv4(ip)) => {
            check_ipv4(ip)?;
            Ok(url)
        }
        Some(Host::Ipv6(ip)) => {
            check_ipv6(ip)?;
            Ok(url)
        }
    }
}

fn check_hostname(name: &str) -> Result<(), ApiError> {
    let lower = name.to_ascii_lowercase();
    let lower = lower.trim_end_matches('.');
    if lower == "localhost"
        || lower.ends_with(".localhost")
        || lower.ends_with(".local")
        || lower.ends_with(".internal")
    {
        return Err(blocked(format!("host {:?} is not routable", name)));
    }
    Ok(())
}

fn check_ipv4(ip: Ipv4Addr) -> Result<(), ApiError> {
    let octets = ip.octets();
    let cgn = octets[0] == 100 && (64..=127).contains(&octets[1]);
    if ip.is_loopback()
        || ip.is_link_local()
        || ip.is_private()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || cgn
    {
        return Err(blocked(format!("address {} is not routable", ip)));
    }
    Ok(())
}

fn check_ipv6(ip: Ipv6Addr) -> Result<(), ApiError> {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return check_ipv4(mapped);
    }
    let segments = ip.segments();
    let link_local = (segments[0] & 0xffc0) == 0xfe80;
    let unique_local = (segments[0] & 0xfe00) == 0xfc00;
    if ip.is_loopback() || ip.is_multicast() || ip.is_unspecified() || link_local || unique_local {
        return Err(blocked(format!("address {} is not routable", ip)));
    }
    Ok(())
}

#[cfg(test)]
#[path = "ssrf_tests.rs"]
mod tests;
