use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SHELL_PORT: u16 = 3002;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3001";
pub const DEFAULT_RENDERER_URL: &str = "http://localhost:3000";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_BACKEND_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS: u64 = 3;

pub const CURRENT_MAP_FILE: &str = "currentMap.json";
pub const SETTINGS_FILE: &str = "settings.json";
pub const MAPS_IMAGES_DIR: &str = "maps_images";
pub const MUSIC_DIR: &str = "music";

/// Panoramic background when the displayed map has no panoramic image.
pub const NEUTRAL_BACKGROUND_COLOR: &str = "#F0F0F0";
pub const SSE_KEEPALIVE_SECS: u64 = 15;

pub fn shell_port() -> u16 {
    std::env::var("SHELL_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SHELL_PORT)
}

pub fn backend_url() -> String {
    non_empty_var("BACKEND_URL")
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
}

pub fn renderer_url() -> String {
    non_empty_var("RENDERER_URL")
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_RENDERER_URL.to_string())
}

pub fn data_dir() -> PathBuf {
    non_empty_var("TABLERO_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

pub fn backend_http_timeout() -> Duration {
    std::env::var("BACKEND_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_BACKEND_HTTP_TIMEOUT_SECS))
}

pub fn backend_connect_timeout() -> Duration {
    std::env::var("BACKEND_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS))
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        temp_env::with_vars_unset(
            [
                "SHELL_PORT",
                "BACKEND_URL",
                "TABLERO_DATA_DIR",
                "BACKEND_HTTP_TIMEOUT_SECS",
            ],
            || {
                assert_eq!(shell_port(), DEFAULT_SHELL_PORT);
                assert_eq!(backend_url(), DEFAULT_BACKEND_URL);
                assert_eq!(data_dir(), PathBuf::from(DEFAULT_DATA_DIR));
                assert_eq!(
                    backend_http_timeout(),
                    Duration::from_secs(DEFAULT_BACKEND_HTTP_TIMEOUT_SECS)
                );
            },
        );
    }

    #[test]
    fn invalid_values_fall_back() {
        temp_env::with_vars(
            [
                ("SHELL_PORT", Some("0")),
                ("BACKEND_HTTP_TIMEOUT_SECS", Some("soon")),
                ("BACKEND_URL", Some("   ")),
            ],
            || {
                assert_eq!(shell_port(), DEFAULT_SHELL_PORT);
                assert_eq!(
                    backend_http_timeout(),
                    Duration::from_secs(DEFAULT_BACKEND_HTTP_TIMEOUT_SECS)
                );
                assert_eq!(backend_url(), DEFAULT_BACKEND_URL);
            },
        );
    }

    #[test]
    fn urls_lose_trailing_slash() {
        temp_env::with_vars(
            [
                ("BACKEND_URL", Some("http://127.0.0.1:9000/")),
                ("RENDERER_URL", Some("http://127.0.0.1:8080/")),
            ],
            || {
                assert_eq!(backend_url(), "http://127.0.0.1:9000");
                assert_eq!(renderer_url(), "http://127.0.0.1:8080");
            },
        );
    }
}
