use thiserror::Error;

/// Erros comuns do listing-radar
#[derive(Error, Debug)]
pub enum Error {
    /// Erro de comunicação com o node da chain
    #[error("Erro de RPC: {0}")]
    RpcError(String),

    /// Erro de decodificação de dados
    #[error("Erro de decodificação: {0}")]
    DecodeError(String),

    /// Erro de codificação de dados
    #[error("Erro de codificação: {0}")]
    EncodeError(String),

    /// Erro de validação
    #[error("Erro de validação: {0}")]
    ValidationError(String),

    /// Erro de timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Recurso não encontrado
    #[error("Não encontrado: {0}")]
    NotFound(String),

    /// Falha ao ler ou gravar estado persistido
    #[error("Erro de armazenamento: {0}")]
    StorageError(String),

    /// Configuração inválida
    #[error("Erro de configuração: {0}")]
    ConfigError(String),

    /// Erro genérico
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::DecodeError(err.to_string())
    }
}

/// Tipo de resultado usado em toda a biblioteca
pub type Result<T> = std::result::Result<T, Error>;
