/// NF-e 44 位访问密钥 (chave de acesso)
///
/// 布局: cUF(2) AAMM(4) CNPJ(14) mod(2) serie(3) nNF(9) tpEmis(1) cNF(8) cDV(1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaveAcesso {
    digits: String,
}

const CHAVE_LEN: usize = 44;

impl ChaveAcesso {
    /// 解析并校验长度与模 11 校验位; 允许 "NFe" 前缀
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let raw = raw.strip_prefix("NFe").unwrap_or(raw);
        if raw.len() != CHAVE_LEN || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let expected = check_digit(&raw[..CHAVE_LEN - 1]);
        let actual = raw.as_bytes()[CHAVE_LEN - 1] - b'0';
        if expected != actual {
            return None;
        }

        Some(Self {
            digits: raw.to_string(),
        })
    }

    /// nNF, 保留前导零
    pub fn numero(&self) -> &str {
        &self.digits[25..34]
    }

    /// DANFE 下载文件名
    pub fn pdf_filename(&self) -> String {
        format!("NF-{}.pdf", self.numero())
    }
}

/// 无法解析密钥时使用的文件名
pub const FALLBACK_PDF_FILENAME: &str = "NF-documento.pdf";

pub fn pdf_filename_for(chave: &str) -> String {
    ChaveAcesso::parse(chave)
        .map(|c| c.pdf_filename())
        .unwrap_or_else(|| FALLBACK_PDF_FILENAME.to_string())
}

/// 模 11, 权重 2..9 从右向左循环
fn check_digit(body: &str) -> u8 {
    let sum: u32 = body
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * (2 + (i as u32 % 8)))
        .sum();
    match sum % 11 {
        0 | 1 => 0,
        r => (11 - r) as u8,
    }
}

#[cfg(test)]
pub(crate) fn with_check_digit(body43: &str) -> String {
    format!("{}{}", body43, check_digit(body43))
}
