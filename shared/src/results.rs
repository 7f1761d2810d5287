//! Result codes exposed to the game client.
//!
//! The numeric values are part of the client's expectations and must not be
//! renumbered. Both enums serialize as their explicit discriminant byte, not
//! as a serde variant index, so the wire carries exactly these values.

use serde::{Deserialize, Serialize};

/// Outcome codes for the login tier's password exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum LoginResult {
    Success = 0x00,
    FailBanned = 0x03,
    FailUnknownAccount = 0x04,
    FailIncorrectPassword = 0x05,
    FailAlreadyOnline = 0x06,
    FailDbBusy = 0x08,
    FailSuspended = 0x0C,
}

impl From<LoginResult> for u8 {
    fn from(value: LoginResult) -> u8 {
        value as u8
    }
}

impl TryFrom<u8> for LoginResult {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Success),
            0x03 => Ok(Self::FailBanned),
            0x04 => Ok(Self::FailUnknownAccount),
            0x05 => Ok(Self::FailIncorrectPassword),
            0x06 => Ok(Self::FailAlreadyOnline),
            0x08 => Ok(Self::FailDbBusy),
            0x0C => Ok(Self::FailSuspended),
            other => Err(format!("unknown login result code {:#04x}", other)),
        }
    }
}

/// Outcome codes for the gateway tier's session authentication and
/// character operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ResponseCode {
    AuthOk = 0x0C,
    AuthFailed = 0x0D,
    AuthReject = 0x0E,
    AuthBadServerProof = 0x0F,
    AuthUnavailable = 0x10,
    AuthSystemError = 0x11,
    AuthUnknownAccount = 0x15,
    AuthWaitQueue = 0x1B,
    AuthBanned = 0x1C,
    AuthAlreadyOnline = 0x1D,
    CharCreateSuccess = 0x2E,
    CharCreateFailed = 0x2F,
    CharDeleteSuccess = 0x39,
    CharDeleteFailed = 0x3A,
}

impl From<ResponseCode> for u8 {
    fn from(value: ResponseCode) -> u8 {
        value as u8
    }
}

impl TryFrom<u8> for ResponseCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0C => Ok(Self::AuthOk),
            0x0D => Ok(Self::AuthFailed),
            0x0E => Ok(Self::AuthReject),
            0x0F => Ok(Self::AuthBadServerProof),
            0x10 => Ok(Self::AuthUnavailable),
            0x11 => Ok(Self::AuthSystemError),
            0x15 => Ok(Self::AuthUnknownAccount),
            0x1B => Ok(Self::AuthWaitQueue),
            0x1C => Ok(Self::AuthBanned),
            0x1D => Ok(Self::AuthAlreadyOnline),
            0x2E => Ok(Self::CharCreateSuccess),
            0x2F => Ok(Self::CharCreateFailed),
            0x39 => Ok(Self::CharDeleteSuccess),
            0x3A => Ok(Self::CharDeleteFailed),
            other => Err(format!("unknown response code {:#04x}", other)),
        }
    }
}
