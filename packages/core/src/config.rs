//! Централизованная конфигурация для Whisper Core
//!
//! Все пороги, размеры и таймауты определены здесь. Компоненты получают
//! `Config` явно через конструктор; `Config::global()` даёт только значения
//! по умолчанию для вспомогательных функций валидации.

use std::sync::OnceLock;
use std::time::Duration;

/// Глобальная конфигурация по умолчанию
static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

/// Основная структура конфигурации
#[derive(Debug, Clone)]
pub struct Config {
    // ============================================
    // КРИПТОГРАФИЧЕСКИЕ ПАРАМЕТРЫ
    // ============================================

    /// Длина nonce для ChaCha20Poly1305 (в байтах)
    pub chacha_nonce_length: usize,

    /// Размер публичного ключа X25519 / Ed25519 (в байтах)
    pub public_key_size: usize,

    /// Размер Ed25519 подписи (в байтах)
    pub signature_size: usize,

    /// ID классического криптографического набора (Classic Suite)
    pub classic_suite_id: u16,

    // ============================================
    // ONE-TIME PREKEYS
    // ============================================

    /// Сколько one-time prekeys генерируется за один раз
    pub one_time_prekeys_to_upload: usize,

    /// Если на сервере осталось меньше ключей, пул пополняется
    pub one_time_prekey_threshold: u32,

    // ============================================
    // DOUBLE RATCHET ПАРАМЕТРЫ
    // ============================================

    /// Максимальное количество пропущенных сообщений (DoS защита)
    pub max_skipped_messages: u32,

    /// Максимальный возраст пропущенных ключей сообщений (в секундах)
    /// По умолчанию: 7 дней
    pub max_skipped_message_age_seconds: i64,

    // ============================================
    // ЗАПРОСЫ
    // ============================================

    /// Сколько повторных отправок допускается после первой попытки
    pub request_retries: u32,

    /// Таймаут ожидания ответа на одну попытку (в миллисекундах)
    pub request_timeout_ms: u64,

    /// Завершать запрос ошибкой `NotConnected`, если транспорт не подключён
    /// в момент постановки в очередь (иначе запрос ждёт переподключения)
    pub fail_fast_when_offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Криптография
            chacha_nonce_length: 12,
            public_key_size: 32,
            signature_size: 64,
            classic_suite_id: 1,

            // One-time prekeys
            one_time_prekeys_to_upload: 20,
            one_time_prekey_threshold: 5,

            // Double Ratchet
            max_skipped_messages: 1000,
            max_skipped_message_age_seconds: 7 * 24 * 60 * 60, // 7 days

            // Запросы
            request_retries: 3,
            request_timeout_ms: 20_000,
            fail_fast_when_offline: false,
        }
    }
}

impl Config {
    /// Создать конфигурацию из переменных окружения
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(parsed) = env_parse("WHISPER_ONE_TIME_PREKEYS_TO_UPLOAD") {
            config.one_time_prekeys_to_upload = parsed;
        }

        if let Some(parsed) = env_parse("WHISPER_ONE_TIME_PREKEY_THRESHOLD") {
            config.one_time_prekey_threshold = parsed;
        }

        if let Some(parsed) = env_parse("WHISPER_REQUEST_RETRIES") {
            config.request_retries = parsed;
        }

        if let Some(parsed) = env_parse("WHISPER_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parsed;
        }

        if let Some(parsed) = env_parse("MAX_SKIPPED_MESSAGES") {
            config.max_skipped_messages = parsed;
        }

        config
    }

    /// Таймаут одной попытки запроса
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Получить глобальный экземпляр конфигурации
    ///
    /// Автоматически инициализирует конфигурацию со значениями по умолчанию при первом вызове
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::default)
    }

    /// Инициализировать глобальную конфигурацию с кастомным экземпляром
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_with(config: Config) -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(config)
            .map_err(|_| "Config already initialized")
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.parse().ok())
}
