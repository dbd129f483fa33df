use async_trait::async_trait;
use futures_util::StreamExt;

use paychat_logging::{log_request, log_request_to_file, log_response, log_response_to_file, log_stream_chunk};

use super::{error_from_response, ByteStream, ChatTransport, TransportRequest};
use crate::auth::with_bearer;
use crate::config::{endpoint, CHAT_STREAM_PATH};
use crate::error::Result;

/// `POST {base}/chat/stream` over reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    verbose: bool,
    log_to_file: bool,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            url: endpoint(base_url, CHAT_STREAM_PATH),
            client,
            verbose: false,
            log_to_file: false,
        }
    }

    /// Print requests, error responses and raw chunks to the console
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Keep a copy of every request under ~/.paychat/logs
    pub fn log_to_file(mut self, enabled: bool) -> Self {
        self.log_to_file = enabled;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: TransportRequest) -> Result<ByteStream> {
        let token = request.bearer.as_deref();
        log_request(&self.url, &request.body, token, self.verbose);
        if self.log_to_file {
            if let Err(e) = log_request_to_file(&self.url, &request.body, &request.model, token) {
                log::warn!("Could not write request log: {:#}", e);
            }
        }

        let builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(request.body);
        let response = with_bearer(builder, token).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            log_response(&status, &error_body, self.verbose);
            if self.log_to_file {
                if let Err(e) = log_response_to_file(&status, &error_body, &request.model) {
                    log::warn!("Could not write response log: {:#}", e);
                }
            }
            return Err(error_from_response(status.as_u16(), &error_body, "Stream failed"));
        }

        let verbose = self.verbose;
        let mut chunk_counter = 0usize;
        let stream = response.bytes_stream().map(move |chunk| {
            chunk_counter += 1;
            if let Ok(bytes) = &chunk {
                log_stream_chunk(chunk_counter, &String::from_utf8_lossy(bytes), verbose);
            }
            chunk.map_err(Into::into)
        });

        Ok(Box::pin(stream))
    }
}
