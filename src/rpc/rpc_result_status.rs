use crate::constants::RPC_SUCCESS_STATUS;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RpcResultStatus {
    Success,
    /// Any other status. The response body is the error payload.
    Fail(u16),
}

impl RpcResultStatus {
    #[inline]
    pub fn from_status(status: u16) -> Self {
        if status == RPC_SUCCESS_STATUS {
            RpcResultStatus::Success
        } else {
            RpcResultStatus::Fail(status)
        }
    }

    #[inline]
    pub fn value(self) -> u16 {
        match self {
            RpcResultStatus::Success => RPC_SUCCESS_STATUS,
            RpcResultStatus::Fail(status) => status,
        }
    }

    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, RpcResultStatus::Success)
    }
}

impl From<u16> for RpcResultStatus {
    #[inline]
    fn from(status: u16) -> Self {
        Self::from_status(status)
    }
}
