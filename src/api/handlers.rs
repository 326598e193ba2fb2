use crate::error::{ApiError, GatewayError, ResultExt};
use crate::models::{pdf_filename_for, search, SearchCriteria, SearchRequest, SearchResponse, SimulatorInput};
use crate::service::NotaService;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Local;
use serde::Deserialize;
use std::sync::Arc;

const SEARCH_ERROR: &str = "Erro ao buscar notas na SIEG";
const NOTA_ERROR: &str = "Erro ao buscar nota na SIEG";
const PDF_ERROR: &str = "Erro ao gerar PDF da nota";

/// 查询参数: ?cnpjCliente=...
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClienteQuery {
    pub cnpj_cliente: Option<String>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 批量查询接口
pub async fn buscar_notas(
    State(service): State<Arc<NotaService>>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let req = search_request(body).or_respond(SEARCH_ERROR)?;
    let today = Local::now().date_naive();
    let criteria = SearchCriteria::from_request(req, today).or_respond(SEARCH_ERROR)?;
    let notas = service.search(&criteria).await.or_respond(SEARCH_ERROR)?;
    Ok(Json(SearchResponse { notas }))
}

/// 缺少 Content-Type 时按空请求体处理; 其余解析失败统一为 400, 不回显请求内容
fn search_request(
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<SearchRequest, GatewayError> {
    match body {
        Ok(Json(req)) => Ok(req),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(SearchRequest::default()),
        Err(rejection) => {
            tracing::debug!(status = rejection.status().as_u16(), "rejected search body");
            Err(GatewayError::validation("Corpo da requisição inválido"))
        }
    }
}

/// 单张 NF-e 明细 (模拟器输入)
pub async fn detalhe_nota(
    State(service): State<Arc<NotaService>>,
    Path(chave): Path<String>,
    Query(query): Query<ClienteQuery>,
) -> Result<Json<SimulatorInput>, ApiError> {
    let cnpj = search::required_tax_id(query.cnpj_cliente).or_respond(NOTA_ERROR)?;
    let input = service.simulator_input(&chave, &cnpj).await.or_respond(NOTA_ERROR)?;
    Ok(Json(input))
}

/// DANFE PDF, 流式转发
pub async fn pdf_nota(
    State(service): State<Arc<NotaService>>,
    Path(chave): Path<String>,
    Query(query): Query<ClienteQuery>,
) -> Result<Response, ApiError> {
    let cnpj = search::required_tax_id(query.cnpj_cliente).or_respond(PDF_ERROR)?;
    let rendering = service.rendering(&chave, &cnpj).await.or_respond(PDF_ERROR)?;

    if let Some(upstream_type) = rendering.content_type.as_deref() {
        if !upstream_type.starts_with("application/pdf") {
            tracing::warn!("SIEG returned {} for DANFE {}", upstream_type, chave);
        }
    }

    let disposition = format!("inline; filename=\"{}\"", pdf_filename_for(&chave));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(rendering.body),
    )
        .into_response())
}
