// SPDX-License-Identifier: Apache-2.0

//! Parsing of the dotted-name stats dictionary an endpoint exports.

use crate::error::EndpointError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shardpool_model::EpochStat;
use std::collections::HashMap;

/// One atomic stats snapshot from an endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointStats {
    /// Ghost-cache sampling points, parallel to the ghost counters.
    pub ghost_ticks: Vec<u64>,
    /// The raw counters, with `timestamp` left unset (the poller stamps
    /// it with its own monotonic clock).
    pub stat: EpochStat,
}

impl EndpointStats {
    /// Parse the wire dictionary (`ghost.ticks`, `ghost.hit_cnt`,
    /// `db_rcu_consump_if_miss`, ...) into a typed snapshot.
    pub fn from_dotted(map: &HashMap<String, Value>) -> Result<Self, EndpointError> {
        let ghost_ticks = take_u64_vec(map, "ghost.ticks")?;
        let stat = EpochStat {
            timestamp: None,
            duration: None,
            ghost_hit_cnt: take_u64_vec(map, "ghost.hit_cnt")?,
            ghost_miss_cnt: take_u64_vec(map, "ghost.miss_cnt")?,
            req_cnt: take_u64(map, "req_cnt")?,
            hit_cnt: take_u64(map, "hit_cnt")?,
            miss_cnt: take_u64(map, "miss_cnt")?,
            db_rcu_consump_if_miss: take_u64(map, "db_rcu_consump_if_miss")?,
            net_bw_consump_if_miss: take_u64(map, "net_bw_consump_if_miss")?,
            net_bw_consump_if_hit: take_u64(map, "net_bw_consump_if_hit")?,
            db_rcu_consump: take_f64(map, "db_rcu_consump")?,
            db_wcu_consump: take_f64(map, "db_wcu_consump")?,
            net_bw_consump: take_f64(map, "net_bw_consump")?,
        };
        Ok(Self { ghost_ticks, stat })
    }
}

fn get<'a>(map: &'a HashMap<String, Value>, name: &str) -> Result<&'a Value, EndpointError> {
    map.get(name).ok_or_else(|| EndpointError::MissingStat {
        name: name.to_string(),
    })
}

fn bad(name: &str, v: &Value) -> EndpointError {
    EndpointError::BadStatValue {
        name: name.to_string(),
        value: v.to_string(),
    }
}

fn take_u64(map: &HashMap<String, Value>, name: &str) -> Result<u64, EndpointError> {
    let v = get(map, name)?;
    match v {
        Value::Number(n) => n.as_u64().ok_or_else(|| bad(name, v)),
        // RESP transports often hand numbers back as strings
        Value::String(s) => s.parse().map_err(|_| bad(name, v)),
        _ => Err(bad(name, v)),
    }
}

fn take_f64(map: &HashMap<String, Value>, name: &str) -> Result<f64, EndpointError> {
    let v = get(map, name)?;
    match v {
        Value::Number(n) => n.as_f64().ok_or_else(|| bad(name, v)),
        Value::String(s) => s.parse().map_err(|_| bad(name, v)),
        _ => Err(bad(name, v)),
    }
}

fn take_u64_vec(map: &HashMap<String, Value>, name: &str) -> Result<Vec<u64>, EndpointError> {
    let v = get(map, name)?;
    let Value::Array(items) = v else {
        return Err(bad(name, v));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Number(n) => n.as_u64().ok_or_else(|| bad(name, v)),
            Value::String(s) => s.parse().map_err(|_| bad(name, v)),
            _ => Err(bad(name, v)),
        })
        .collect()
}
