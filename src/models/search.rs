use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::nota::FiscalDocument;
use super::tax_id::TaxId;
use crate::error::GatewayError;

/// 默认查询起始日
pub const DEFAULT_START_DATE: (i32, u32, u32) = (2024, 1, 1);

/// 请求体: POST /buscar-notas
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub cnpj_cliente: Option<String>,
    pub numero_nota: Option<String>,
    pub produto: Option<String>,
    pub data_inicio: Option<String>,
    pub data_fim: Option<String>,
}

/// 响应体
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub notas: Vec<FiscalDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub inicio: NaiveDate,
    pub fim: NaiveDate,
}

/// 校验后的查询条件
#[derive(Debug, Clone)]
pub struct SearchCriteria {
    /// 原样转发给上游
    pub cnpj_cliente: String,
    pub numero_nota: Option<String>,
    pub produto: Option<String>,
    pub periodo: DateRange,
}

impl SearchCriteria {
    /// `today` 作为结束日默认值传入
    pub fn from_request(req: SearchRequest, today: NaiveDate) -> Result<Self, GatewayError> {
        let cnpj_cliente = required_tax_id(req.cnpj_cliente)?;

        let (y, m, d) = DEFAULT_START_DATE;
        let inicio = match non_blank(req.data_inicio) {
            Some(raw) => parse_date("dataInicio", &raw)?,
            None => NaiveDate::from_ymd_opt(y, m, d)
                .ok_or_else(|| GatewayError::Internal("invalid default start date".to_string()))?,
        };
        let fim = match non_blank(req.data_fim) {
            Some(raw) => parse_date("dataFim", &raw)?,
            None => today,
        };
        if inicio > fim {
            return Err(GatewayError::validation(
                "dataInicio deve ser anterior ou igual a dataFim",
            ));
        }

        Ok(Self {
            cnpj_cliente,
            numero_nota: non_blank(req.numero_nota),
            produto: non_blank(req.produto),
            periodo: DateRange { inicio, fim },
        })
    }

    /// 条件之间为"与"关系; 未提供的条件不过滤
    pub fn apply(&self, notas: Vec<FiscalDocument>) -> Vec<FiscalDocument> {
        let mut filtered = notas;
        if let Some(numero) = &self.numero_nota {
            filtered.retain(|n| n.matches_number(numero));
        }
        if let Some(produto) = &self.produto {
            filtered.retain(|n| n.matches_product(produto));
        }
        filtered
    }
}

/// cnpjCliente 缺失或为空时返回 400
pub fn required_tax_id(raw: Option<String>) -> Result<String, GatewayError> {
    match non_blank(raw) {
        Some(value) if !TaxId::new(&value).is_empty() => Ok(value),
        _ => Err(GatewayError::validation("CNPJ do cliente é obrigatório")),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, GatewayError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        GatewayError::validation(format!("{} inválida, use o formato AAAA-MM-DD", field))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::nota::fixtures::{document, item};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    fn request(cnpj: &str) -> SearchRequest {
        SearchRequest {
            cnpj_cliente: Some(cnpj.to_string()),
            ..Default::default()
        }
    }

    fn batch() -> Vec<FiscalDocument> {
        vec![
            document("12345", "1", "2", vec![item("PROD001", "Produto A")]),
            document("12399", "1", "2", vec![item("PROD002", "Produto B")]),
            document("55555", "1", "2", vec![item("XYZ", "Produto A")]),
        ]
    }

    #[test]
    fn missing_tax_id_is_rejected() {
        for cnpj in [None, Some(""), Some("   "), Some("./-")] {
            let req = SearchRequest {
                cnpj_cliente: cnpj.map(str::to_string),
                ..Default::default()
            };
            let err = SearchCriteria::from_request(req, today()).unwrap_err();
            assert!(matches!(err, GatewayError::Validation(_)));
        }
    }

    #[test]
    fn date_range_defaults() {
        let criteria = SearchCriteria::from_request(request("00000000000000"), today()).unwrap();
        assert_eq!(criteria.periodo.inicio, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(criteria.periodo.fim, today());
    }

    #[test]
    fn bad_or_inverted_dates_are_rejected() {
        let mut req = request("00000000000000");
        req.data_inicio = Some("15/01/2025".to_string());
        assert!(SearchCriteria::from_request(req, today()).is_err());

        let mut req = request("00000000000000");
        req.data_inicio = Some("2025-03-01".to_string());
        req.data_fim = Some("2025-02-01".to_string());
        assert!(SearchCriteria::from_request(req, today()).is_err());
    }

    #[test]
    fn no_filters_keep_everything() {
        let criteria = SearchCriteria::from_request(request("0"), today()).unwrap();
        assert_eq!(criteria.apply(batch()).len(), 3);
    }

    #[test]
    fn empty_filters_are_ignored() {
        let mut req = request("0");
        req.numero_nota = Some(String::new());
        req.produto = Some("  ".to_string());
        let criteria = SearchCriteria::from_request(req, today()).unwrap();
        assert_eq!(criteria.apply(batch()).len(), 3);
    }

    #[test]
    fn filters_are_conjunctive() {
        let mut req = request("0");
        req.numero_nota = Some("123".to_string());
        req.produto = Some("produto a".to_string());
        let criteria = SearchCriteria::from_request(req, today()).unwrap();

        let result = criteria.apply(batch());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].numero, "12345");
    }

    #[test]
    fn product_filter_matches_code_or_description() {
        let mut req = request("0");
        req.produto = Some("XYZ".to_string());
        let criteria = SearchCriteria::from_request(req, today()).unwrap();
        let result = criteria.apply(batch());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].numero, "55555");
    }
}
