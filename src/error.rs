#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum AptSearchError {
    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    #[error("API error from {api}: {message}")]
    Api { api: String, message: String },

    #[error("API JSON error from {api}: {source}")]
    ApiJson {
        api: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "Sign-in required: {action} needs a session token.\n\nTo set:\n  export {env_var}=<token>"
    )]
    AuthRequired { action: String, env_var: String },

    #[error("Search controller is no longer running")]
    ControllerClosed,

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AptSearchError {
    pub(crate) fn auth_required(action: &str) -> Self {
        Self::AuthRequired {
            action: action.to_string(),
            env_var: crate::sources::TOKEN_ENV.to_string(),
        }
    }
}
