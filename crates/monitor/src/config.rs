/// Monitor configuration loaded from the environment and CLI.
///
/// Defaults suit a locally running generation backend.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Base channel URL (default: `ws://localhost:8000/api/v1`).
    pub base_url: String,
    /// Job to monitor; first CLI argument, falling back to env.
    pub job_id: Option<String>,
}

impl MonitorConfig {
    /// Load configuration from CLI arguments and environment variables.
    ///
    /// | Source         | Default                        |
    /// |----------------|--------------------------------|
    /// | `LUMEN_WS_URL` | `ws://localhost:8000/api/v1`   |
    /// | `LUMEN_JOB_ID` | first CLI argument, else unset |
    pub fn from_env() -> Self {
        let base_url = std::env::var("LUMEN_WS_URL")
            .unwrap_or_else(|_| "ws://localhost:8000/api/v1".into());

        let job_id = std::env::args()
            .nth(1)
            .or_else(|| std::env::var("LUMEN_JOB_ID").ok())
            .filter(|s| !s.is_empty());

        Self { base_url, job_id }
    }
}
