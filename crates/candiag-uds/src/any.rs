//! Decoding of arbitrary captured UDS traffic by SID

use serde::Serialize;

use crate::error::UdsError;
use crate::services::*;

macro_rules! service_catalog {
    ($($variant:ident => $request:ty, $response:ty;)*) => {
        /// Any catalogued request
        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        #[serde(tag = "service", content = "request")]
        pub enum AnyRequest {
            $($variant($request),)*
        }

        /// Any catalogued positive response
        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        #[serde(tag = "service", content = "response")]
        pub enum AnyResponse {
            $($variant($response),)*
        }

        impl AnyRequest {
            pub fn sid(&self) -> u8 {
                match self {
                    $(Self::$variant(_) => <$request as Request>::SID,)*
                }
            }

            pub fn encode(&self) -> Vec<u8> {
                match self {
                    $(Self::$variant(req) => req.encode(),)*
                }
            }

            /// Decode a full request message by its first byte
            pub fn decode(data: &[u8]) -> Result<Self, UdsError> {
                let Some(&sid) = data.first() else {
                    return Err(UdsError::InvalidRequest("empty request".to_string()));
                };
                $(
                    if sid == <$request as Request>::SID {
                        return <$request as Request>::decode(data).map(Self::$variant);
                    }
                )*
                Err(UdsError::UnknownService(sid))
            }
        }

        impl AnyResponse {
            pub fn sid(&self) -> u8 {
                match self {
                    $(Self::$variant(_) => <$response as Response>::SID,)*
                }
            }

            /// Decode a full response message
            ///
            /// Negative responses surface as errors, like the typed decoders.
            pub fn decode(data: &[u8]) -> Result<Self, UdsError> {
                let Some(&first) = data.first() else {
                    return Err(UdsError::InvalidResponse("empty response".to_string()));
                };
                let sid = if first == NEGATIVE_RESPONSE_SID {
                    match data.get(1) {
                        Some(&sid) => sid,
                        None => return Err(UdsError::InvalidResponse(
                            "Negative response too short".to_string(),
                        )),
                    }
                } else {
                    first.wrapping_sub(POSITIVE_RESPONSE_OFFSET)
                };
                $(
                    if sid == <$response as Response>::SID {
                        return <$response as Response>::decode(data).map(Self::$variant);
                    }
                )*
                Err(UdsError::UnknownService(sid))
            }
        }
    };
}

service_catalog! {
    DiagnosticSessionControl => DiagnosticSessionControl, DiagnosticSessionControlResponse;
    EcuReset => EcuReset, EcuResetResponse;
    ClearDiagnosticInformation => ClearDiagnosticInformation, ClearDiagnosticInformationResponse;
    ReadDtcInformation => ReadDtcInformation, ReadDtcInformationResponse;
    ReadDataByIdentifier => ReadDataByIdentifier, ReadDataByIdentifierResponse;
    ReadMemoryByAddress => ReadMemoryByAddress, ReadMemoryByAddressResponse;
    ReadScalingDataByIdentifier => ReadScalingDataByIdentifier, ReadScalingDataByIdentifierResponse;
    SecurityAccess => SecurityAccess, SecurityAccessResponse;
    CommunicationControl => CommunicationControl, CommunicationControlResponse;
    ReadDataByPeriodicIdentifier => ReadDataByPeriodicIdentifier, ReadDataByPeriodicIdentifierResponse;
    DynamicallyDefineDataIdentifier => DynamicallyDefineDataIdentifier, DynamicallyDefineDataIdentifierResponse;
    WriteDataByIdentifier => WriteDataByIdentifier, WriteDataByIdentifierResponse;
    InputOutputControlByIdentifier => InputOutputControlByIdentifier, InputOutputControlByIdentifierResponse;
    RoutineControl => RoutineControl, RoutineControlResponse;
    RequestDownload => RequestDownload, RequestDownloadResponse;
    RequestUpload => RequestUpload, RequestUploadResponse;
    TransferData => TransferData, TransferDataResponse;
    RequestTransferExit => RequestTransferExit, RequestTransferExitResponse;
    WriteMemoryByAddress => WriteMemoryByAddress, WriteMemoryByAddressResponse;
    TesterPresent => TesterPresent, TesterPresentResponse;
    AccessTimingParameter => AccessTimingParameter, AccessTimingParameterResponse;
    SecuredDataTransmission => SecuredDataTransmission, SecuredDataTransmissionResponse;
    ControlDtcSetting => ControlDtcSetting, ControlDtcSettingResponse;
    ResponseOnEvent => ResponseOnEvent, ResponseOnEventResponse;
    LinkControl => LinkControl, LinkControlResponse;
}

pub fn decode_request(data: &[u8]) -> Result<AnyRequest, UdsError> {
    AnyRequest::decode(data)
}

pub fn decode_response(data: &[u8]) -> Result<AnyResponse, UdsError> {
    AnyResponse::decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nrc::NegativeResponseCode;

    #[test]
    fn test_decode_request_by_sid() {
        let req = decode_request(&[0x22, 0xF1, 0x90]).unwrap();
        assert_eq!(req.sid(), 0x22);
        assert_eq!(req, AnyRequest::ReadDataByIdentifier(ReadDataByIdentifier::new(0xF190)));
        assert_eq!(req.encode(), vec![0x22, 0xF1, 0x90]);
    }

    #[test]
    fn test_decode_response_by_sid() {
        let resp = decode_response(&[0x7E, 0x00]).unwrap();
        assert_eq!(resp.sid(), 0x3E);
        assert!(matches!(resp, AnyResponse::TesterPresent(_)));
    }

    #[test]
    fn test_decode_negative_response() {
        assert_eq!(
            decode_response(&[0x7F, 0x27, 0x35]),
            Err(UdsError::NegativeResponse {
                service_id: 0x27,
                nrc: NegativeResponseCode::InvalidKey
            })
        );
    }

    #[test]
    fn test_unknown_service() {
        assert_eq!(decode_request(&[0xBA]), Err(UdsError::UnknownService(0xBA)));
        assert_eq!(decode_response(&[0xFA]), Err(UdsError::UnknownService(0xBA)));
        assert!(decode_request(&[]).is_err());
    }

    #[test]
    fn test_serializes_with_service_tag() {
        let resp = decode_response(&[0x6E, 0xBE, 0xEF]).unwrap();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["service"], "WriteDataByIdentifier");
        assert_eq!(json["response"]["data_identifier"], 0xBEEF);
    }
}
