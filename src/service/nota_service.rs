use rayon::prelude::*;

use crate::error::{GatewayError, Result};
use crate::models::{FiscalDocument, SearchCriteria, SimulatorInput, TaxId};
use crate::service::normalizer::normalize;
use crate::upstream::{Rendering, SiegClient};

/// 网关服务: 查询、鉴权、投影
pub struct NotaService {
    client: SiegClient,
}

impl NotaService {
    pub fn new(client: SiegClient) -> Self {
        Self { client }
    }

    /// 批量查询 + 过滤
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<FiscalDocument>> {
        let xmls = self
            .client
            .fetch_batch(&criteria.cnpj_cliente, &criteria.periodo)
            .await?;
        let total = xmls.len();

        // XML 解析为 CPU 密集型, 放到阻塞线程池
        let notas = tokio::task::spawn_blocking(move || normalize_batch(&xmls))
            .await
            .map_err(|e| GatewayError::Internal(format!("normalization task failed: {e}")))?;

        let filtered = criteria.apply(notas);
        // 税号不进日志
        tracing::info!("Search: {} fetched, {} returned", total, filtered.len());
        Ok(filtered)
    }

    /// 下载并校验调用方是否为该 NF-e 的发行方或接收方
    pub async fn fetch_authorized(&self, chave: &str, cnpj_cliente: &str) -> Result<FiscalDocument> {
        let xml = self.client.fetch_one(chave).await?;
        let nota = normalize(&xml)?;

        let caller = TaxId::new(cnpj_cliente);
        if !nota.is_party(&caller) {
            tracing::warn!("Caller is not a party of document {}", chave);
            return Err(GatewayError::Forbidden);
        }
        Ok(nota)
    }

    /// 单张 NF-e -> 模拟器输入
    pub async fn simulator_input(&self, chave: &str, cnpj_cliente: &str) -> Result<SimulatorInput> {
        let nota = self.fetch_authorized(chave, cnpj_cliente).await?;
        Ok(SimulatorInput::from(&nota))
    }

    /// 鉴权后再请求 DANFE
    pub async fn rendering(&self, chave: &str, cnpj_cliente: &str) -> Result<Rendering> {
        self.fetch_authorized(chave, cnpj_cliente).await?;
        Ok(self.client.fetch_rendering(chave).await?)
    }
}

/// 单个文档解析失败只跳过该文档, 不影响整批; 保持上游顺序
fn normalize_batch(xmls: &[String]) -> Vec<FiscalDocument> {
    xmls.par_iter()
        .enumerate()
        .filter_map(|(idx, xml)| match normalize(xml) {
            Ok(nota) => Some(nota),
            Err(e) => {
                tracing::warn!("Skipping malformed document #{} in batch: {}", idx, e);
                None
            }
        })
        .collect()
}
