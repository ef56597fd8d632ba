use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat Service Args ---
    /// Root URL of the chat service. Streams are posted to {base}/api/chat/stream,
    /// history is read from {base}/api/chat/history/{session_id}.
    #[arg(long, env = "CHAT_BASE_URL", default_value = "http://127.0.0.1:8000")]
    pub base_url: String,

    /// Display name sent with every message.
    #[arg(long, env = "CHAT_USER_NAME", default_value = "John Doe")]
    pub user_name: String,

    /// Phone number sent with every message.
    #[arg(long, env = "CHAT_PHONE", default_value = "1234567890")]
    pub phone: String,

    // --- Session Store Args ---
    /// Where the session list is kept (file, redis, memory)
    #[arg(long, env = "SESSION_STORE_TYPE", default_value = "file")]
    pub store_type: String,

    /// JSON file used by the file store.
    #[arg(long, env = "SESSION_STORE_PATH", default_value = ".brainware/sessions.json")]
    pub store_path: String,

    /// Key the session list is saved under.
    #[arg(long, env = "SESSION_STORE_KEY", default_value = "bw_sessions")]
    pub store_key: String,

    /// Redis endpoint used by the redis store (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "SESSION_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    // --- General App Args ---
    /// Number of characters of the first message used as a session title.
    #[arg(long, env = "SESSION_TITLE_LENGTH", default_value = "30")]
    pub title_length: usize,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
