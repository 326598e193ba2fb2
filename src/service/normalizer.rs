//! NF-e XML -> FiscalDocument
//!
//! 事件流解析 (quick-xml), 维护元素路径栈, 按路径收集字段后统一校验。
//! 纯函数, 无 I/O。

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::str::FromStr;

use crate::error::NormalizeError;
use crate::models::{
    FiscalDocument, Issuer, LineItem, Recipient, RecipientCategory, TaxAmount, TaxRate,
};

/// ICMS 默认税率 19%
pub fn default_icms_rate() -> BigDecimal {
    BigDecimal::from(19)
}

/// PIS 默认税率 1.65%
pub fn default_pis_rate() -> BigDecimal {
    BigDecimal::new(165.into(), 2)
}

/// COFINS 默认税率 7.6%
pub fn default_cofins_rate() -> BigDecimal {
    BigDecimal::new(76.into(), 1)
}

#[derive(Debug, Default)]
struct PartyDraft {
    cnpj: Option<String>,
    cpf: Option<String>,
    nome: Option<String>,
    uf: Option<String>,
}

impl PartyDraft {
    fn tax_id(&self) -> Option<&String> {
        self.cnpj.as_ref().or(self.cpf.as_ref())
    }
}

#[derive(Debug, Default)]
struct ItemDraft {
    codigo: Option<String>,
    descricao: Option<String>,
    quantidade: Option<String>,
    valor_unitario: Option<String>,
    valor_total: Option<String>,
}

/// 解析过程中收集的原始字段
#[derive(Debug, Default)]
struct Draft {
    inf_nfe_id: Option<String>,
    ch_nfe: Option<String>,
    numero: Option<String>,
    serie: Option<String>,
    emissao: Option<String>,
    ind_final: Option<String>,
    v_nf: Option<String>,
    v_frete: Option<String>,
    v_ipi: Option<String>,
    p_icms: Option<String>,
    p_pis: Option<String>,
    p_cofins: Option<String>,
    emit: PartyDraft,
    dest: PartyDraft,
    items: Vec<ItemDraft>,
}

/// 规范化单个 NF-e 文档
pub fn normalize(raw: &str) -> Result<FiscalDocument, NormalizeError> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut draft = Draft::default();

    loop {
        match reader.read_event().map_err(xml)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "infNFe" => draft.inf_nfe_id = attribute(&e, "Id")?,
                    "det" => draft.items.push(ItemDraft::default()),
                    _ => {}
                }
                path.push(name);
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(xml)?;
                draft.capture(&path, text.trim());
            }
            Event::CData(c) => {
                let bytes = c.into_inner();
                let text = std::str::from_utf8(&bytes).map_err(xml)?;
                draft.capture(&path, text.trim());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    draft.build()
}

impl Draft {
    fn capture(&mut self, path: &[String], text: &str) {
        if text.is_empty() {
            return;
        }
        let Some(leaf) = path.last() else {
            return;
        };
        let parent = path
            .len()
            .checked_sub(2)
            .map(|i| path[i].as_str())
            .unwrap_or("");
        let within = |ancestor: &str| path.iter().any(|p| p == ancestor);
        let first_item = self.items.len() == 1 && within("det");
        let value = Some(text.to_string());

        match (parent, leaf.as_str()) {
            ("infProt", "chNFe") => self.ch_nfe = value,
            ("ide", "nNF") => self.numero = value,
            ("ide", "serie") => self.serie = value,
            ("ide", "dhEmi") => self.emissao = value,
            ("ide", "dEmi") if self.emissao.is_none() => self.emissao = value,
            ("ide", "indFinal") => self.ind_final = value,
            ("ICMSTot", "vNF") => self.v_nf = value,
            ("ICMSTot", "vFrete") => self.v_frete = value,
            ("ICMSTot", "vIPI") => self.v_ipi = value,
            ("emit", "CNPJ") => self.emit.cnpj = value,
            ("emit", "CPF") => self.emit.cpf = value,
            ("emit", "xNome") => self.emit.nome = value,
            ("enderEmit", "UF") => self.emit.uf = value,
            ("dest", "CNPJ") => self.dest.cnpj = value,
            ("dest", "CPF") => self.dest.cpf = value,
            ("dest", "xNome") => self.dest.nome = value,
            ("enderDest", "UF") => self.dest.uf = value,
            ("prod", field) => {
                if let Some(item) = self.items.last_mut() {
                    match field {
                        "cProd" => item.codigo = value,
                        "xProd" => item.descricao = value,
                        "qCom" => item.quantidade = value,
                        "vUnCom" => item.valor_unitario = value,
                        "vProd" => item.valor_total = value,
                        _ => {}
                    }
                }
            }
            // 税率只取第一个明细; 第一个明细缺失时用默认值, 不取后续明细
            (_, "pICMS") if first_item && within("ICMS") => self.p_icms = value,
            (_, "pPIS") if first_item && within("PIS") => self.p_pis = value,
            (_, "pCOFINS") if first_item && within("COFINS") => self.p_cofins = value,
            _ => {}
        }
    }

    fn build(self) -> Result<FiscalDocument, NormalizeError> {
        let chave = self
            .inf_nfe_id
            .map(|id| id.strip_prefix("NFe").map(str::to_string).unwrap_or(id))
            .filter(|c| !c.is_empty())
            .or(self.ch_nfe)
            .ok_or(NormalizeError::MissingField("chave"))?;

        let valor_total = decimal("vNF", self.v_nf.as_deref())?
            .ok_or(NormalizeError::MissingField("vNF"))?;

        let emit_cnpj = self
            .emit
            .tax_id()
            .cloned()
            .ok_or(NormalizeError::MissingField("emit/CNPJ"))?;
        let dest_cnpj = self
            .dest
            .tax_id()
            .cloned()
            .ok_or(NormalizeError::MissingField("dest/CNPJ"))?;

        let tipo = if self.dest.cnpj.is_none() {
            RecipientCategory::Pf
        } else if self.ind_final.as_deref() == Some("1") {
            RecipientCategory::PjConsumidor
        } else {
            RecipientCategory::PjRevenda
        };

        let data_emissao = self
            .emissao
            .as_deref()
            .map(|raw| date("dhEmi", raw))
            .transpose()?;

        let produtos = self
            .items
            .into_iter()
            .map(|item| {
                Ok(LineItem {
                    codigo: item.codigo.unwrap_or_default(),
                    descricao: item.descricao.unwrap_or_default(),
                    quantidade: decimal_or_zero("qCom", item.quantidade.as_deref())?,
                    valor_unitario: decimal_or_zero("vUnCom", item.valor_unitario.as_deref())?,
                    valor_total: decimal_or_zero("vProd", item.valor_total.as_deref())?,
                })
            })
            .collect::<Result<Vec<_>, NormalizeError>>()?;

        Ok(FiscalDocument {
            chave,
            numero: self.numero.unwrap_or_default(),
            serie: self.serie.unwrap_or_default(),
            data_emissao,
            valor_total,
            emitente: Issuer {
                nome: self.emit.nome.unwrap_or_default(),
                cnpj: emit_cnpj,
                uf: self.emit.uf.unwrap_or_default(),
            },
            destinatario: Recipient {
                nome: self.dest.nome.unwrap_or_default(),
                cnpj: dest_cnpj,
                uf: self.dest.uf.unwrap_or_default(),
                tipo,
            },
            produtos,
            icms: TaxRate {
                aliquota: decimal("pICMS", self.p_icms.as_deref())?
                    .unwrap_or_else(default_icms_rate),
            },
            pis: TaxRate {
                aliquota: decimal("pPIS", self.p_pis.as_deref())?
                    .unwrap_or_else(default_pis_rate),
            },
            cofins: TaxRate {
                aliquota: decimal("pCOFINS", self.p_cofins.as_deref())?
                    .unwrap_or_else(default_cofins_rate),
            },
            ipi: TaxAmount {
                valor: decimal_or_zero("vIPI", self.v_ipi.as_deref())?,
            },
            frete: decimal_or_zero("vFrete", self.v_frete.as_deref())?,
        })
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, NormalizeError> {
    match e.try_get_attribute(name).map_err(xml)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml)?.into_owned())),
        None => Ok(None),
    }
}

fn decimal(field: &'static str, raw: Option<&str>) -> Result<Option<BigDecimal>, NormalizeError> {
    raw.map(|value| {
        BigDecimal::from_str(value).map_err(|_| NormalizeError::InvalidNumber {
            field,
            value: value.to_string(),
        })
    })
    .transpose()
}

fn decimal_or_zero(field: &'static str, raw: Option<&str>) -> Result<BigDecimal, NormalizeError> {
    Ok(decimal(field, raw)?.unwrap_or_else(|| BigDecimal::from(0)))
}

/// dhEmi 为带时区的时间戳, dEmi 为纯日期; 只取日期部分
fn date(field: &'static str, raw: &str) -> Result<NaiveDate, NormalizeError> {
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(|| NormalizeError::InvalidDate {
            field,
            value: raw.to_string(),
        })
}

fn xml<E: std::fmt::Display>(e: E) -> NormalizeError {
    NormalizeError::Xml(e.to_string())
}


#[cfg(test)]
mod tests {
    use super::sample::nfe_xml;
    use super::*;

    const FULL_TAXES: &str = r#"
        <ICMS><ICMS00><orig>0</orig><CST>00</CST><pICMS>18.00</pICMS></ICMS00></ICMS>
        <IPI><IPITrib><vIPI>0.00</vIPI></IPITrib></IPI>
        <PIS><PISAliq><pPIS>0.65</pPIS></PISAliq></PIS>
        <COFINS><COFINSAliq><pCOFINS>3.00</pCOFINS></COFINSAliq></COFINS>"#;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn parses_full_document() {
        let xml = nfe_xml(
            "12345",
            "00000000000000",
            "11.111.111/1111-11",
            FULL_TAXES,
            "<vFrete>50.00</vFrete><vIPI>12.50</vIPI>",
        );
        let doc = normalize(&xml).unwrap();

        assert_eq!(doc.chave.len(), 44);
        assert!(!doc.chave.starts_with("NFe"));
        assert_eq!(doc.numero, "12345");
        assert_eq!(doc.serie, "1");
        assert_eq!(doc.data_emissao, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(doc.valor_total, dec("1550"));
        assert_eq!(doc.emitente.nome, "Empresa X & Cia");
        assert_eq!(doc.emitente.uf, "SP");
        assert_eq!(doc.destinatario.cnpj, "11.111.111/1111-11");
        assert_eq!(doc.destinatario.uf, "RJ");
        assert_eq!(doc.destinatario.tipo, RecipientCategory::PjRevenda);
        assert_eq!(doc.produtos.len(), 1);
        assert_eq!(doc.produtos[0].codigo, "PROD001");
        assert_eq!(doc.produtos[0].quantidade, dec("10"));
        assert_eq!(doc.icms.aliquota, dec("18"));
        assert_eq!(doc.pis.aliquota, dec("0.65"));
        assert_eq!(doc.cofins.aliquota, dec("3"));
        assert_eq!(doc.ipi.valor, dec("12.5"));
        assert_eq!(doc.frete, dec("50"));
    }

    #[test]
    fn absent_tax_fields_get_defaults() {
        let xml = nfe_xml("1", "00000000000000", "11111111111111", "", "");
        let doc = normalize(&xml).unwrap();

        assert_eq!(doc.icms.aliquota, dec("19"));
        assert_eq!(doc.pis.aliquota, dec("1.65"));
        assert_eq!(doc.cofins.aliquota, dec("7.6"));
        assert_eq!(doc.ipi.valor, dec("0"));
        assert_eq!(doc.frete, dec("0"));
    }

    #[test]
    fn present_zero_values_are_not_replaced() {
        let taxes = "<ICMS><ICMS40><CST>40</CST><pICMS>0</pICMS></ICMS40></ICMS>";
        let xml = nfe_xml("1", "00000000000000", "11111111111111", taxes, "");
        let doc = normalize(&xml).unwrap();
        assert_eq!(doc.icms.aliquota, dec("0"));
        assert_eq!(doc.pis.aliquota, dec("1.65"));
    }

    #[test]
    fn rates_come_from_first_item_only() {
        // 第一个明细 ICMS40 无 pICMS, 第二个明细 12%
        let taxes = "<ICMS><ICMS40><CST>40</CST></ICMS40></ICMS>";
        let second = r#"<det nItem="2">
        <prod><cProd>PROD002</cProd><xProd>Produto B</xProd><vProd>10.00</vProd></prod>
        <imposto>
          <ICMS><ICMS00><pICMS>12.00</pICMS></ICMS00></ICMS>
          <PIS><PISAliq><pPIS>0.65</pPIS></PISAliq></PIS>
        </imposto>
      </det>
      <total>"#;
        let xml = nfe_xml("1", "00000000000000", "11111111111111", taxes, "")
            .replacen("<total>", second, 1);
        let doc = normalize(&xml).unwrap();

        assert_eq!(doc.produtos.len(), 2);
        assert_eq!(doc.produtos[1].codigo, "PROD002");
        assert_eq!(doc.icms.aliquota, default_icms_rate());
        assert_eq!(doc.pis.aliquota, default_pis_rate());
        assert_eq!(doc.cofins.aliquota, default_cofins_rate());
    }

    #[test]
    fn missing_total_is_malformed() {
        let xml = nfe_xml("1", "0", "1", "", "").replace("<vNF>1550.00</vNF>", "");
        assert_eq!(normalize(&xml), Err(NormalizeError::MissingField("vNF")));
    }

    #[test]
    fn missing_recipient_tax_id_is_malformed() {
        let xml = nfe_xml("1", "0", "1", "", "").replace("<CNPJ>1</CNPJ>", "");
        assert_eq!(normalize(&xml), Err(NormalizeError::MissingField("dest/CNPJ")));
    }

    #[test]
    fn unparsable_number_is_malformed() {
        let xml = nfe_xml("1", "0", "1", "", "<vFrete>cinquenta</vFrete>");
        assert!(matches!(
            normalize(&xml),
            Err(NormalizeError::InvalidNumber { field: "vFrete", .. })
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(normalize("not xml at all").is_err());
        assert!(normalize("<NFe><infNFe></NFe>").is_err());
    }

    #[test]
    fn cpf_recipient_is_natural_person() {
        let xml = nfe_xml("1", "0", "1", "", "")
            .replace("<CNPJ>1</CNPJ>", "<CPF>123.456.789-09</CPF>");
        let doc = normalize(&xml).unwrap();
        assert_eq!(doc.destinatario.tipo, RecipientCategory::Pf);
        assert_eq!(doc.destinatario.cnpj, "123.456.789-09");
    }

    #[test]
    fn final_consumer_company() {
        let xml = nfe_xml("1", "0", "1", "", "")
            .replace("<indFinal>0</indFinal>", "<indFinal>1</indFinal>");
        let doc = normalize(&xml).unwrap();
        assert_eq!(doc.destinatario.tipo, RecipientCategory::PjConsumidor);
    }

    #[test]
    fn key_falls_back_to_protocol() {
        let xml = r#"<nfeProc>
            <NFe><infNFe>
              <emit><CNPJ>0</CNPJ></emit><dest><CNPJ>1</CNPJ></dest>
              <total><ICMSTot><vNF>10</vNF></ICMSTot></total>
            </infNFe></NFe>
            <protNFe><infProt><chNFe>35250111111111111111550010000000011123456780</chNFe></infProt></protNFe>
          </nfeProc>"#;
        let doc = normalize(xml).unwrap();
        assert_eq!(doc.chave, "35250111111111111111550010000000011123456780");
        assert!(doc.produtos.is_empty());
        assert_eq!(doc.data_emissao, None);
    }
}
