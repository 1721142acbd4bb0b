use std::env;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub engine_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("CHESS_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            engine_path: env::var("CHESS_ENGINE_PATH")
                .unwrap_or_else(|_| "stockfish".to_string()),
        }
    }
}
