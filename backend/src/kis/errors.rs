use thiserror::Error;

#[derive(Error, Debug)]
pub enum KisError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request rejected: rt_cd={code} msg_cd={msg_code} msg={message}")]
    Rejected {
        code: String,
        msg_code: String,
        message: String,
    },

    #[error("response carried no output payload")]
    MissingOutput,

    #[error("invalid numeric field {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}
