use dew_settings::SettingsError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
