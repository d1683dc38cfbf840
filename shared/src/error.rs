use thiserror::Error;

/// Conditions the process cannot recover from in place. They are carried up
/// to the supervisor, which terminates the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fatal {
    #[error("None of the {providers} configured RPC providers is healthy")]
    NoHealthyProvider { providers: usize },
    #[error("Job {job} skipped {skipped} ticks in a row")]
    SchedulerHung { job: String, skipped: u32 },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MainError {
    #[error("RPC error")]
    RpcError,
    #[error("Can't read or write crawl state in database")]
    Database,
    #[error("Can't dispatch messages to the queue")]
    Dispatch,
    #[error("Fatal error: {0}")]
    Fatal(#[from] Fatal),
}

impl MainError {
    pub fn fatal(&self) -> Option<&Fatal> {
        match self {
            MainError::Fatal(fatal) => Some(fatal),
            _ => None,
        }
    }
}

pub trait AsRpcError<T> {
    fn into_rpc_error(self) -> Result<T, MainError>;
}

impl<T> AsRpcError<T> for anyhow::Result<T> {
    #[inline]
    fn into_rpc_error(self) -> Result<T, MainError> {
        self.map_err(|reason| {
            tracing::error!(?reason, "RPC error");
            MainError::RpcError
        })
    }
}

pub trait AsDbError<T> {
    fn into_db_error(self) -> Result<T, MainError>;
}

impl<T> AsDbError<T> for anyhow::Result<T> {
    #[inline]
    fn into_db_error(self) -> Result<T, MainError> {
        self.map_err(|reason| {
            tracing::error!(?reason, "Database error");
            MainError::Database
        })
    }
}

pub trait AsDispatchError<T> {
    fn into_dispatch_error(self) -> Result<T, MainError>;
}

impl<T> AsDispatchError<T> for anyhow::Result<T> {
    #[inline]
    fn into_dispatch_error(self) -> Result<T, MainError> {
        self.map_err(|reason| {
            tracing::error!(?reason, "{}", MainError::Dispatch);
            MainError::Dispatch
        })
    }
}

pub trait ContextDbInteractError<T> {
    fn context_db_interact_error(self) -> anyhow::Result<T>;
}

impl<T, E> ContextDbInteractError<T> for Result<T, E> {
    fn context_db_interact_error(self) -> anyhow::Result<T> {
        self.map_err(|_| anyhow::anyhow!("Failed to interact with db"))
    }
}
