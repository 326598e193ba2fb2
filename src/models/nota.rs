use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::money;
use super::tax_id::TaxId;

/// 规范化后的 NF-e (构造后不可变)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalDocument {
    pub chave: String,
    pub numero: String,
    pub serie: String,
    pub data_emissao: Option<NaiveDate>,
    #[serde(serialize_with = "money::serialize")]
    pub valor_total: BigDecimal,
    pub emitente: Issuer,
    pub destinatario: Recipient,
    pub produtos: Vec<LineItem>,
    pub icms: TaxRate,
    pub pis: TaxRate,
    pub cofins: TaxRate,
    pub ipi: TaxAmount,
    #[serde(serialize_with = "money::serialize")]
    pub frete: BigDecimal,
}

/// 发行方 (emitente)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issuer {
    pub nome: String,
    pub cnpj: String,
    pub uf: String,
}

/// 接收方 (destinatário)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipient {
    pub nome: String,
    pub cnpj: String,
    pub uf: String,
    pub tipo: RecipientCategory,
}

/// 接收方类别, 决定模拟器使用的税务规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientCategory {
    /// 自然人 (CPF)
    Pf,
    /// 企业, 用于转售
    PjRevenda,
    /// 企业, 最终消费者
    PjConsumidor,
}

/// 商品明细
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub codigo: String,
    pub descricao: String,
    #[serde(serialize_with = "money::serialize")]
    pub quantidade: BigDecimal,
    #[serde(serialize_with = "money::serialize")]
    pub valor_unitario: BigDecimal,
    #[serde(serialize_with = "money::serialize")]
    pub valor_total: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxRate {
    #[serde(serialize_with = "money::serialize")]
    pub aliquota: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxAmount {
    #[serde(serialize_with = "money::serialize")]
    pub valor: BigDecimal,
}

impl FiscalDocument {
    /// 调用方税号是否与发行方或接收方一致 (仅比较数字)
    pub fn is_party(&self, caller: &TaxId) -> bool {
        TaxId::new(&self.emitente.cnpj) == *caller || TaxId::new(&self.destinatario.cnpj) == *caller
    }

    pub fn matches_number(&self, needle: &str) -> bool {
        self.numero.contains(needle)
    }

    /// 描述不区分大小写, 编码区分大小写
    pub fn matches_product(&self, needle: &str) -> bool {
        let lowered = needle.to_lowercase();
        self.produtos.iter().any(|p| {
            p.descricao.to_lowercase().contains(&lowered) || p.codigo.contains(needle)
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn product_filter_is_case_insensitive_on_description() {
        let doc = document("12345", "1", "2", vec![item("PROD001", "Produto A")]);
        assert!(doc.matches_product("produto a"));
        assert!(doc.matches_product("PRODUTO"));
        assert!(!doc.matches_product("produto b"));
    }

    #[test]
    fn product_filter_is_verbatim_on_code() {
        let doc = document("12345", "1", "2", vec![item("ABC-9", "Parafuso")]);
        assert!(doc.matches_product("ABC"));
        assert!(doc.matches_product("C-9"));
        // 编码区分大小写
        assert!(!doc.matches_product("abc"));
    }

    #[test]
    fn caller_must_be_issuer_or_recipient() {
        let doc = document("1", "11.111.111/1111-11", "22222222222222", vec![]);
        assert!(doc.is_party(&TaxId::new("11111111111111")));
        assert!(doc.is_party(&TaxId::new("22.222.222/2222-22")));
        assert!(!doc.is_party(&TaxId::new("99999999999999")));
    }

    #[test]
    fn serializes_with_wire_names() {
        let doc = document("1", "1", "2", vec![item("P", "D")]);
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("dataEmissao").is_some());
        assert!(json.get("valorTotal").is_some());
        assert_eq!(json["destinatario"]["tipo"], "pj_revenda");
        assert!(json["produtos"][0].get("valorUnitario").is_some());
        assert!(json["icms"].get("aliquota").is_some());
        assert!(json["ipi"].get("valor").is_some());
        // 金额为数字而非字符串
        assert!(json["valorTotal"].is_number());
        assert_eq!(json["valorTotal"].as_f64(), Some(1500.0));
        assert_eq!(json["icms"]["aliquota"].as_f64(), Some(18.0));
        assert_eq!(json["produtos"][0]["quantidade"].as_f64(), Some(10.0));
    }
}
