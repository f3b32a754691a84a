// Время

use chrono::Utc;

/// Текущее время в секундах (Unix timestamp)
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}
