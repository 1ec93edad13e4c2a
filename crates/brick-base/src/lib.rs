//! Shared building blocks for the brick crates: the HWC byte tensor that
//! carries frames between crates, and the process-wide log backends.

pub mod logging;
pub mod tensor;

pub use logging::{
    init_file_logger, init_stdout_logger, max_level_from_env, parse_level, FileLogger,
    StdoutLogger, LOG_LEVEL_ENV,
};
pub use tensor::{Tensor, TensorError};

// Re-export log crate so downstream crates can use brick_base::log::*
pub use log;
