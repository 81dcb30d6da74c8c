//! Process configuration read from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::Url;

use crate::list_view::DEFAULT_PAGE_SIZE;

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub backend_url: Url,
    pub bind: IpAddr,
    pub http_port: u16,
    pub backend_timeout: Duration,
    pub page_size: u64,
    /// Add `Secure` to the session cookie.
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = lookup("BACKEND_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("BACKEND_URL is required"))?;
        let backend_url = Url::parse(raw.trim()).with_context(|| format!("BACKEND_URL '{}' is not a valid URL", raw))?;

        let bind = match lookup("RESRV_BIND") {
            Some(v) => v.trim().parse().with_context(|| format!("RESRV_BIND '{}' is not an IP address", v))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let http_port = parse_or(&lookup, "RESRV_HTTP_PORT", DEFAULT_HTTP_PORT)?;
        let timeout_ms = parse_or(&lookup, "RESRV_BACKEND_TIMEOUT_MS", DEFAULT_BACKEND_TIMEOUT_MS)?;
        let page_size = parse_or(&lookup, "RESRV_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(anyhow!("RESRV_PAGE_SIZE must be positive"));
        }
        let cookie_secure = match lookup("RESRV_COOKIE_SECURE").as_deref().map(str::trim) {
            None | Some("") => false,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            Some(v) => return Err(anyhow!("RESRV_COOKIE_SECURE '{}' is not a boolean", v)),
        };

        Ok(Self {
            backend_url,
            bind,
            http_port,
            backend_timeout: Duration::from_millis(timeout_ms),
            page_size,
            cookie_secure,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.http_port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => v.trim().parse().with_context(|| format!("{} '{}' is invalid", name, v)),
        _ => Ok(default),
    }
}
