//! Clients that answer from a recorded response.
//!
//! Used by the `llmshim replay` command and by tests to run recorded
//! request/response pairs through the instrumentation without a network.

use bytes::Bytes;

use crate::bedrock::{BedrockRuntime, InvokeModelRequest, InvokeModelResponse};
use crate::body::{PayloadPart, StreamingBody};
use crate::error::{Error, Result};
use crate::sagemaker::{InvokeEndpointRequest, InvokeEndpointResponse, SageMakerRuntime};

/// A client that returns the same recorded response to every call
#[derive(Debug, Clone)]
pub struct ReplayClient {
    response: Bytes,
    content_type: Option<String>,
    failure: Option<String>,
}

impl ReplayClient {
    /// Replay `response` as a JSON body
    pub fn new(response: impl Into<Bytes>) -> Self {
        Self {
            response: response.into(),
            content_type: Some("application/json".to_string()),
            failure: None,
        }
    }

    /// Report a different response media type
    #[must_use]
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Fail every call with a client error
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(Error::client(message.clone())),
            None => Ok(()),
        }
    }

    /// One stream part per non-empty line of the recording, newline kept
    fn parts(&self) -> std::vec::IntoIter<Result<PayloadPart>> {
        self.response
            .split_inclusive(|b| *b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .map(|line| Ok(PayloadPart::new(self.response.slice_ref(line))))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl BedrockRuntime for ReplayClient {
    type Error = Error;
    type Stream = std::vec::IntoIter<Result<PayloadPart>>;

    fn invoke_model(&self, _request: InvokeModelRequest) -> Result<InvokeModelResponse> {
        self.check()?;
        Ok(InvokeModelResponse {
            body: StreamingBody::from_bytes(self.response.clone()),
            content_type: self.content_type.clone(),
        })
    }

    fn invoke_model_with_response_stream(&self, _request: InvokeModelRequest) -> Result<Self::Stream> {
        self.check()?;
        Ok(self.parts())
    }
}

impl SageMakerRuntime for ReplayClient {
    type Error = Error;
    type Stream = std::vec::IntoIter<Result<PayloadPart>>;

    fn invoke_endpoint(&self, _request: InvokeEndpointRequest) -> Result<InvokeEndpointResponse> {
        self.check()?;
        Ok(InvokeEndpointResponse {
            body: StreamingBody::from_bytes(self.response.clone()),
            content_type: self.content_type.clone(),
            invoked_production_variant: Some("AllTraffic".to_string()),
        })
    }

    fn invoke_endpoint_with_response_stream(
        &self,
        _request: InvokeEndpointRequest,
    ) -> Result<Self::Stream> {
        self.check()?;
        Ok(self.parts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_split_on_lines() {
        let client = ReplayClient::new("{\"a\":1}\n\n{\"b\":2}\n");
        let parts: Vec<_> = client.parts().map(|p| p.unwrap().bytes).collect();
        assert_eq!(parts, vec![Bytes::from_static(b"{\"a\":1}\n"), Bytes::from_static(b"{\"b\":2}\n")]);
    }

    #[test]
    fn test_failing_client() {
        let client = ReplayClient::new("{}").failing("ThrottlingException");
        let err = client
            .invoke_model(InvokeModelRequest::new("cohere.command-text-v14", "{}"))
            .unwrap_err();
        assert!(err.to_string().contains("ThrottlingException"));
    }
}
