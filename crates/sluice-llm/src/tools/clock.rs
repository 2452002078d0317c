//! Current date and time tool

use anyhow::{Error, anyhow};
use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use serde_json::{Value, json};

use super::AgentTool;

pub struct CurrentTime;

#[async_trait]
impl AgentTool for CurrentTime {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Returns the current date and time, optionally at a UTC offset in hours"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "utc_offset_hours": {
                    "type": "integer",
                    "description": "Offset from UTC in hours, between -12 and 14"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, Error> {
        let hours = match params.get("utc_offset_hours") {
            None | Some(Value::Null) => 0,
            Some(value) => value
                .as_i64()
                .ok_or_else(|| anyhow!("'utc_offset_hours' must be an integer"))?,
        };
        if !(-12..=14).contains(&hours) {
            return Err(anyhow!("'utc_offset_hours' out of range: {}", hours));
        }
        let offset = FixedOffset::east_opt(hours as i32 * 3600)
            .ok_or_else(|| anyhow!("invalid offset {}", hours))?;
        let now = Utc::now().with_timezone(&offset);
        Ok(json!({
            "datetime": now.to_rfc3339(),
            "weekday": now.format("%A").to_string(),
        }))
    }
}
