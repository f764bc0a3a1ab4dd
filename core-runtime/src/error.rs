use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to start {component}: {source}")]
    Startup {
        component: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn startup(component: impl Into<String>, source: std::io::Error) -> Self {
        Self::Startup {
            component: component.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
