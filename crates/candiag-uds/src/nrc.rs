//! UDS Negative Response Codes (NRC)

use std::fmt;

use serde::{Serialize, Serializer};

macro_rules! negative_response_codes {
    ($($(#[$meta:meta])* $variant:ident = $code:literal => $name:literal,)*) => {
        /// UDS Negative Response Codes (NRC)
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NegativeResponseCode {
            $($(#[$meta])* $variant,)*
            /// Reserved or manufacturer specific code
            Unknown(u8),
        }

        /// Code to name table
        pub const NRC_TABLE: &[(u8, &str)] = &[$(($code, $name),)*];

        impl From<u8> for NegativeResponseCode {
            fn from(value: u8) -> Self {
                match value {
                    $($code => Self::$variant,)*
                    other => Self::Unknown(other),
                }
            }
        }

        impl From<NegativeResponseCode> for u8 {
            fn from(nrc: NegativeResponseCode) -> Self {
                match nrc {
                    $(NegativeResponseCode::$variant => $code,)*
                    NegativeResponseCode::Unknown(code) => code,
                }
            }
        }

        impl NegativeResponseCode {
            /// ISO 14229 name of the code
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                    Self::Unknown(_) => "unknown",
                }
            }
        }
    };
}

negative_response_codes! {
    GeneralReject = 0x10 => "generalReject",
    ServiceNotSupported = 0x11 => "serviceNotSupported",
    SubFunctionNotSupported = 0x12 => "subFunctionNotSupported",
    IncorrectMessageLengthOrFormat = 0x13 => "incorrectMessageLengthOrInvalidFormat",
    ResponseTooLong = 0x14 => "responseTooLong",
    BusyRepeatRequest = 0x21 => "busyRepeatRequest",
    ConditionsNotCorrect = 0x22 => "conditionsNotCorrect",
    RequestSequenceError = 0x24 => "requestSequenceError",
    NoResponseFromSubnet = 0x25 => "noResponseFromSubnetComponent",
    FailurePreventsExecution = 0x26 => "failurePreventsExecutionOfRequestedAction",
    RequestOutOfRange = 0x31 => "requestOutOfRange",
    SecurityAccessDenied = 0x33 => "securityAccessDenied",
    InvalidKey = 0x35 => "invalidKey",
    ExceededNumberOfAttempts = 0x36 => "exceedNumberOfAttempts",
    RequiredTimeDelayNotExpired = 0x37 => "requiredTimeDelayNotExpired",
    UploadDownloadNotAccepted = 0x70 => "uploadDownloadNotAccepted",
    TransferDataSuspended = 0x71 => "transferDataSuspended",
    GeneralProgrammingFailure = 0x72 => "generalProgrammingFailure",
    WrongBlockSequenceCounter = 0x73 => "wrongBlockSequenceCounter",
    /// Request received, final response follows after P2*
    ResponsePending = 0x78 => "requestCorrectlyReceivedResponsePending",
    SubFunctionNotSupportedInActiveSession = 0x7E => "subFunctionNotSupportedInActiveSession",
    ServiceNotSupportedInActiveSession = 0x7F => "serviceNotSupportedInActiveSession",
    RpmTooHigh = 0x81 => "rpmTooHigh",
    RpmTooLow = 0x82 => "rpmTooLow",
    EngineRunning = 0x83 => "engineIsRunning",
    EngineNotRunning = 0x84 => "engineIsNotRunning",
    EngineRunTimeTooLow = 0x85 => "engineRunTimeTooLow",
    TemperatureTooHigh = 0x86 => "temperatureTooHigh",
    TemperatureTooLow = 0x87 => "temperatureTooLow",
    VehicleSpeedTooHigh = 0x88 => "vehicleSpeedTooHigh",
    VehicleSpeedTooLow = 0x89 => "vehicleSpeedTooLow",
    ThrottleTooHigh = 0x8A => "throttlePedalTooHigh",
    ThrottleTooLow = 0x8B => "throttlePedalTooLow",
    TransmissionNotInNeutral = 0x8C => "transmissionRangeNotInNeutral",
    TransmissionNotInGear = 0x8D => "transmissionRangeNotInGear",
    BrakeSwitchNotClosed = 0x8F => "brakeSwitchesNotClosed",
    ShifterNotInPark = 0x90 => "shifterLeverNotInPark",
    TorqueConverterClutchLocked = 0x91 => "torqueConverterClutchLocked",
    VoltageTooHigh = 0x92 => "voltageTooHigh",
    VoltageTooLow = 0x93 => "voltageTooLow",
}

impl NegativeResponseCode {
    pub fn code(&self) -> u8 {
        u8::from(*self)
    }

    /// Look up a code by its ISO 14229 name
    pub fn from_name(name: &str) -> Option<Self> {
        NRC_TABLE
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(code, _)| Self::from(*code))
    }
}

impl fmt::Display for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::UpperHex for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.code(), f)
    }
}

impl Serialize for NegativeResponseCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}
