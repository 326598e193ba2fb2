use bigdecimal::BigDecimal;
use serde::Serialize;

use super::money;
use super::nota::{FiscalDocument, RecipientCategory};

/// 模拟器输入 (由 FiscalDocument 投影, 不持久化)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatorInput {
    #[serde(rename = "valorVenda", serialize_with = "money::serialize")]
    pub valor_venda: BigDecimal,
    #[serde(rename = "aliquotaICMS", serialize_with = "money::serialize")]
    pub aliquota_icms: BigDecimal,
    #[serde(rename = "aliquotaPIS", serialize_with = "money::serialize")]
    pub aliquota_pis: BigDecimal,
    #[serde(rename = "aliquotaCOFINS", serialize_with = "money::serialize")]
    pub aliquota_cofins: BigDecimal,
    #[serde(serialize_with = "money::serialize")]
    pub ipi: BigDecimal,
    #[serde(serialize_with = "money::serialize")]
    pub frete: BigDecimal,
    #[serde(rename = "ufOrigem")]
    pub uf_origem: String,
    #[serde(rename = "ufDestino")]
    pub uf_destino: String,
    pub destinatario: RecipientCategory,
}

impl From<&FiscalDocument> for SimulatorInput {
    fn from(doc: &FiscalDocument) -> Self {
        Self {
            valor_venda: doc.valor_total.clone(),
            aliquota_icms: doc.icms.aliquota.clone(),
            aliquota_pis: doc.pis.aliquota.clone(),
            aliquota_cofins: doc.cofins.aliquota.clone(),
            ipi: doc.ipi.valor.clone(),
            frete: doc.frete.clone(),
            uf_origem: doc.emitente.uf.clone(),
            uf_destino: doc.destinatario.uf.clone(),
            destinatario: doc.destinatario.tipo,
        }
    }
}
