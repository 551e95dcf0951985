//! IPC protocol definitions (JSON lines)

use crate::event::MonitorEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Ping,
    GetStatus,
    GetStats,
    GetActivity {
        #[serde(default)]
        params: LimitParams,
    },
    ListProcesses,
    GetConfig,
    GetEvents {
        #[serde(default)]
        params: LimitParams,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitParams {
    pub limit: Option<u32>,
}

impl LimitParams {
    pub fn limit_or(&self, default: u32) -> u32 {
        self.limit.unwrap_or(default)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Response { id: Option<String>, data: serde_json::Value },
    Event { data: MonitorEvent },
}

impl Response {
    pub fn data(data: serde_json::Value) -> Self {
        Response::Response { id: None, data }
    }

    pub fn error<S: ToString>(message: S) -> Self {
        Response::Response { id: None, data: serde_json::json!({ "error": message.to_string() }) }
    }
}
