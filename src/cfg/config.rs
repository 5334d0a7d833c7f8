// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Route-dispatch service: id, listeners, sessions, writer pool.
    pub service: ServiceConfig,
    /// Redis/MySQL endpoints and the read-through/write-behind tuning.
    pub sync: SyncConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServiceConfig {
    #[serde(rename = "ServiceId")]
    pub service_id: u32,
    #[serde(rename = "Listeners")]
    pub listeners: Listeners,
    #[serde(rename = "Session")]
    pub session: SessionConfig,
    #[serde(rename = "WriterPool")]
    pub writer_pool: WriterPoolConfigDto,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Listeners {
    #[serde(default, rename = "Tcp")]
    pub tcp: Option<HostPort>,
    #[serde(default, rename = "Udp")]
    pub udp: Option<HostPort>,
    #[serde(default, rename = "Websocket")]
    pub websocket: Option<HostPort>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct HostPort {
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port")]
    pub port: u16,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SessionConfig {
    #[serde(rename = "ExpireAfter", with = "serde_millis")]
    pub expire_duration: Duration,
    #[serde(rename = "CheckEvery", with = "serde_millis")]
    pub check_interval: Duration,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct WriterPoolConfigDto {
    #[serde(rename = "Workers")]
    pub worker_count: usize,
    #[serde(rename = "QueueSize")]
    pub queue_size: usize,
    #[serde(rename = "DropWhenFull", default)]
    pub drop_when_full: bool,
    #[serde(rename = "Compress", default)]
    pub compress: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SyncConfig {
    #[serde(rename = "RedisUrl")]
    pub redis_url: String,
    #[serde(rename = "MysqlUrl")]
    pub mysql_url: String,
    #[serde(rename = "DataPrefix")]
    pub data_prefix: String,
    #[serde(rename = "LockPrefix")]
    pub lock_prefix: String,
    #[serde(rename = "DirtySetKey")]
    pub dirty_set_key: String,
    #[serde(rename = "Lease")]
    pub lease: LeaseConfigDto,
    #[serde(rename = "Flush")]
    pub flush: FlushConfigDto,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LeaseConfigDto {
    #[serde(rename = "MaxTryDuration", with = "serde_millis")]
    pub max_try_duration: Duration,
    #[serde(rename = "RetryInterval", with = "serde_millis")]
    pub retry_interval: Duration,
    #[serde(rename = "LeaseTtl", with = "serde_millis")]
    pub lease_ttl: Duration,
    #[serde(rename = "RenewInterval", with = "serde_millis")]
    pub renew_interval: Duration,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FlushConfigDto {
    #[serde(rename = "FlushInterval", with = "serde_millis")]
    pub flush_interval: Duration,
    #[serde(rename = "Batch")]
    pub batch: isize,
    #[serde(rename = "ExpireTime", with = "serde_millis")]
    pub expire_time: Duration,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants; there is nothing to derive/normalize today, but
    /// the hook stays so future fields can gain defaults without callers
    /// needing to change.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            self.service.listeners.tcp.is_some()
                || self.service.listeners.udp.is_some()
                || self.service.listeners.websocket.is_some(),
            "at least one of Listeners.Tcp/Udp/Websocket must be set"
        );
        ensure!(self.service.writer_pool.worker_count >= 1, "WriterPool.Workers must be >= 1");
        ensure!(self.service.writer_pool.queue_size >= 1, "WriterPool.QueueSize must be >= 1");
        ensure!(!self.sync.redis_url.is_empty(), "Sync.RedisUrl must not be empty");
        ensure!(!self.sync.mysql_url.is_empty(), "Sync.MysqlUrl must not be empty");
        ensure!(self.sync.flush.batch >= 1, "Sync.Flush.Batch must be >= 1");
        Ok(())
    }
}

impl From<&SessionConfig> for crate::session::ManagerConfig {
    fn from(c: &SessionConfig) -> Self {
        Self { expire_duration: c.expire_duration, check_interval: c.check_interval }
    }
}

impl From<&WriterPoolConfigDto> for crate::service::WriterPoolConfig {
    fn from(c: &WriterPoolConfigDto) -> Self {
        Self {
            worker_count: c.worker_count,
            queue_size: c.queue_size,
            drop_when_full: c.drop_when_full,
            compress: c.compress,
        }
    }
}

impl From<&LeaseConfigDto> for crate::sync::LeaseConfig {
    fn from(c: &LeaseConfigDto) -> Self {
        Self {
            max_try_duration: c.max_try_duration,
            retry_interval: c.retry_interval,
            lease_ttl: c.lease_ttl,
            renew_interval: c.renew_interval,
        }
    }
}

impl From<&FlushConfigDto> for crate::sync::FlushConfig {
    fn from(c: &FlushConfigDto) -> Self {
        Self { flush_interval: c.flush_interval, batch: c.batch, expire_time: c.expire_time }
    }
}

/// Serde helper representing `Duration` as a count of milliseconds, finer
/// grained than `serde_secs` needs for timers in the sub-second range
/// (session sweeps, lease renewals).
mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
