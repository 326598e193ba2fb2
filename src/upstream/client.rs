//! SIEG "cofre" HTTP 客户端

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Serialize;
use std::time::Duration;

use crate::config::SiegConfig;
use crate::error::UpstreamError;
use crate::models::DateRange;

/// 上游错误响应体最多保留的字符数 (仅用于日志)
const MAX_ERROR_BODY: usize = 512;

/// 批量下载请求体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchDownloadRequest<'a> {
    cnpj: &'a str,
    data_inicio: String,
    data_fim: String,
    tipo: &'static str,
}

/// DANFE 渲染结果, body 以流的方式转发
pub struct Rendering {
    pub content_type: Option<String>,
    pub body: BoxStream<'static, Result<Bytes, UpstreamError>>,
}

/// 无状态客户端, 凭证在构造时注入
#[derive(Debug, Clone)]
pub struct SiegClient {
    client: Client,
    base_url: Url,
    token: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl SiegClient {
    pub fn new(config: &SiegConfig) -> Result<Self, UpstreamError> {
        let mut base_url = Url::parse(config.base_url.trim())
            .map_err(|e| UpstreamError::Config(format!("invalid base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::Config(format!(
                "base_url cannot be a base: {}",
                config.base_url
            )));
        }
        // 去掉末尾 '/', 便于拼接路径段
        if let Ok(mut segments) = base_url.path_segments_mut() {
            segments.pop_if_empty();
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| UpstreamError::Config(format!("failed to create client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        })
    }

    /// 批量下载 XML (POST, 不重试)
    pub async fn fetch_batch(
        &self,
        cnpj: &str,
        periodo: &DateRange,
    ) -> Result<Vec<String>, UpstreamError> {
        let url = self.endpoint(&["cofre", "download-lote"]);
        let body = BatchDownloadRequest {
            cnpj,
            data_inicio: periodo.inicio.format("%Y-%m-%d").to_string(),
            data_fim: periodo.fim.format("%Y-%m-%d").to_string(),
            tipo: "NFE",
        };

        tracing::debug!(%url, data_inicio = %body.data_inicio, data_fim = %body.data_fim, "SIEG batch download");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response, None).await?;

        let text = response.text().await?;
        let xmls: Vec<String> = serde_json::from_str(&text)
            .map_err(|e| UpstreamError::Decode(format!("batch is not a JSON array of strings: {e}")))?;

        tracing::info!("SIEG returned {} documents", xmls.len());
        Ok(xmls)
    }

    /// 下载单张 NF-e XML
    pub async fn fetch_one(&self, chave: &str) -> Result<String, UpstreamError> {
        let url = self.endpoint(&["cofre", "download", chave]);
        let response = self.get_with_retry(url, chave).await?;
        Ok(response.text().await?)
    }

    /// 下载 DANFE (PDF)
    pub async fn fetch_rendering(&self, chave: &str) -> Result<Rendering, UpstreamError> {
        let url = self.endpoint(&["cofre", "danfe", chave]);
        let response = self.get_with_retry(url, chave).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes_stream().map_err(UpstreamError::from).boxed();

        Ok(Rendering { content_type, body })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    /// GET 幂等, 对网络错误/429/5xx 做指数退避重试
    async fn get_with_retry(&self, url: Url, chave: &str) -> Result<Response, UpstreamError> {
        let mut attempt: u32 = 0;
        loop {
            let result = match self
                .client
                .get(url.clone())
                .bearer_auth(&self.token)
                .send()
                .await
            {
                Ok(response) => check_status(response, Some(chave)).await,
                Err(e) => Err(UpstreamError::from(e)),
            };

            match result {
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.retry_backoff.saturating_mul(1 << attempt.min(16));
                    attempt += 1;
                    tracing::warn!(
                        %url,
                        attempt,
                        error = %err,
                        "SIEG GET failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

/// 非 2xx 转为 UpstreamError; 404 且有 chave 时为 NotFound
async fn check_status(response: Response, chave: Option<&str>) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if let (StatusCode::NOT_FOUND, Some(chave)) = (status, chave) {
        return Err(UpstreamError::NotFound {
            chave: chave.to_string(),
        });
    }

    let mut body = response.text().await.unwrap_or_default();
    if let Some((idx, _)) = body.char_indices().nth(MAX_ERROR_BODY) {
        body.truncate(idx);
    }
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn config(base_url: &str) -> SiegConfig {
        let mut config = AppConfig::default().sieg;
        config.base_url = base_url.to_string();
        config.token = "token".to_string();
        config
    }

    #[test]
    fn builds_endpoints_under_base_path() {
        let client = SiegClient::new(&config("https://api.sieg.com/api/v1/")).unwrap();
        let url = client.endpoint(&["cofre", "download", "3525"]);
        assert_eq!(url.as_str(), "https://api.sieg.com/api/v1/cofre/download/3525");
    }

    #[test]
    fn path_segments_are_escaped() {
        let client = SiegClient::new(&config("https://api.sieg.com/api/v1")).unwrap();
        let url = client.endpoint(&["cofre", "danfe", "../admin"]);
        assert!(url.as_str().ends_with("/cofre/danfe/..%2Fadmin"));
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            SiegClient::new(&config("not a url")),
            Err(UpstreamError::Config(_))
        ));
        assert!(matches!(
            SiegClient::new(&config("mailto:someone@example.com")),
            Err(UpstreamError::Config(_))
        ));
    }
}
