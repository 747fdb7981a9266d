use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] selection_types::TypesError),

    #[error("action catalog error: {0}")]
    Action(#[from] selection_actions::ActionError),

    #[error("voting error: {0}")]
    Voting(#[from] selection_voting::VotingError),

    #[error("WebSocket server error: {0}")]
    WebSocket(#[from] selection_websocket::WsError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("node not started")]
    NotStarted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
