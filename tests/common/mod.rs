//! Shared utilities for integration tests.

use std::net::Ipv4Addr;
use std::sync::Arc;

use dispatch_engine::config::{DispatchConfig, Isolation};
use dispatch_engine::transport::PlainTransport;
use dispatch_engine::{Application, Driver, Engine, ServerHandle};

/// Dispatch settings with the given isolation mode.
#[allow(dead_code)]
pub fn isolation(isolation: Isolation) -> DispatchConfig {
    DispatchConfig {
        isolation,
        ..DispatchConfig::default()
    }
}

/// Start a plain-text driver for `app` on an ephemeral loopback port.
pub async fn start_driver(app: Application, config: DispatchConfig) -> (Driver, ServerHandle) {
    let driver = Driver::new(Engine::new(Arc::new(app), &config), PlainTransport).with_max_connections(64);
    let handle = driver.start(Ipv4Addr::LOCALHOST.into(), 0).await.unwrap();
    (driver, handle)
}

/// Non-pooled client without transparent decompression.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
