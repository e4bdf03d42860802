//! RMI device error types

use rmi_transport::TransportError;
use thiserror::Error;

/// Errors from RMI device operations
#[derive(Error, Debug)]
pub enum RmiError {
    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Function missing from the scanned function table
    #[error("Function 0x{0:02X} not found")]
    FunctionNotFound(u8),
}
