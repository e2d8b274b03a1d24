//! # Exit Codes
//!
//! A processing step either commits or aborts with a numbered exit code.
//! The contract-specific codes (100..=102) are the only ones the manager
//! raises on purpose; the rest are ledger-level failures surfaced when a
//! payload is malformed or the account cannot afford a send.

use custody_protocol::CellError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a processing step aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum ExitCode {
    /// A value did not fit the field it was stored into.
    #[error("integer out of range (exit code 5)")]
    IntegerOutOfRange,

    /// An outbound payload did not fit into its cell.
    #[error("cell overflow (exit code 8)")]
    CellOverflow,

    /// The request body was truncated or carried a malformed field.
    #[error("cell underflow (exit code 9)")]
    CellUnderflow,

    /// The account's native balance cannot cover a requested transfer.
    #[error("not enough balance (exit code 37)")]
    NotEnoughBalance,

    /// An address argument lives outside the basechain.
    #[error("wrong workchain (exit code 100)")]
    WrongWorkchain,

    /// The sender is not the stored owner.
    #[error("unauthorized owner request (exit code 101)")]
    UnauthorizedOwnerRequest,

    /// Attached value does not cover the sends the operation must make.
    #[error("not enough TON attached (exit code 102)")]
    NotEnoughTon,

    /// The opcode is not one the manager understands.
    #[error("unknown opcode (exit code 65535)")]
    UnknownOp,
}

impl ExitCode {
    /// The numeric code reported to the ledger.
    pub const fn code(self) -> u32 {
        match self {
            ExitCode::IntegerOutOfRange => 5,
            ExitCode::CellOverflow => 8,
            ExitCode::CellUnderflow => 9,
            ExitCode::NotEnoughBalance => 37,
            ExitCode::WrongWorkchain => 100,
            ExitCode::UnauthorizedOwnerRequest => 101,
            ExitCode::NotEnoughTon => 102,
            ExitCode::UnknownOp => 0xffff,
        }
    }

    /// Looks a numeric code back up.
    pub fn from_code(code: u32) -> Option<Self> {
        [
            ExitCode::IntegerOutOfRange,
            ExitCode::CellOverflow,
            ExitCode::CellUnderflow,
            ExitCode::NotEnoughBalance,
            ExitCode::WrongWorkchain,
            ExitCode::UnauthorizedOwnerRequest,
            ExitCode::NotEnoughTon,
            ExitCode::UnknownOp,
        ]
        .into_iter()
        .find(|c| c.code() == code)
    }

    /// Whether the manager raises this code itself, as opposed to the ledger.
    pub fn is_contract_error(self) -> bool {
        (100..=102).contains(&self.code())
    }
}

impl From<CellError> for ExitCode {
    fn from(err: CellError) -> Self {
        match err {
            CellError::ValueOutOfRange { .. } => ExitCode::IntegerOutOfRange,
            CellError::BitOverflow { .. }
            | CellError::RefOverflow
            | CellError::DepthOverflow(_) => ExitCode::CellOverflow,
            CellError::Underflow { .. }
            | CellError::RefUnderflow
            | CellError::InvalidAddress(_)
            | CellError::UnsupportedExotic
            | CellError::TrailingData { .. } => ExitCode::CellUnderflow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_codes() {
        assert_eq!(ExitCode::WrongWorkchain.code(), 100);
        assert_eq!(ExitCode::UnauthorizedOwnerRequest.code(), 101);
        assert_eq!(ExitCode::NotEnoughTon.code(), 102);
        assert_eq!(ExitCode::CellUnderflow.code(), 9);
        assert_eq!(ExitCode::NotEnoughBalance.code(), 37);
        assert_eq!(ExitCode::UnknownOp.code(), 0xffff);
    }

    #[test]
    fn codes_round_trip() {
        for code in [5, 8, 9, 37, 100, 101, 102, 0xffff] {
            assert_eq!(ExitCode::from_code(code).map(ExitCode::code), Some(code));
        }
        assert_eq!(ExitCode::from_code(0), None);
    }

    #[test]
    fn only_manager_codes_are_contract_errors() {
        assert!(ExitCode::UnauthorizedOwnerRequest.is_contract_error());
        assert!(!ExitCode::CellUnderflow.is_contract_error());
        assert!(!ExitCode::NotEnoughBalance.is_contract_error());
    }

    #[test]
    fn cell_errors_map_to_ledger_codes() {
        assert_eq!(ExitCode::from(CellError::RefUnderflow), ExitCode::CellUnderflow);
        assert_eq!(
            ExitCode::from(CellError::InvalidAddress("external".into())),
            ExitCode::CellUnderflow
        );
        assert_eq!(ExitCode::from(CellError::RefOverflow), ExitCode::CellOverflow);
    }
}
