use crate::api::{ApiResponse, FeedbackQuery, PushForm, text_json};
use crate::dispatch::Dispatcher;
use crate::error::GatewayError;
use crate::feedback::FeedbackDrain;
use actix_web::error::InternalError;
use actix_web::{HttpRequest, HttpResponse, get, web};
use common::PushClient;
use log::*;

#[get("/apns/stat")]
async fn stat(client: web::Data<dyn PushClient>) -> HttpResponse {
    text_json(&client.monitor())
}

async fn push(
    form: web::Form<Vec<(String, String)>>,
    dispatcher: web::Data<Dispatcher>,
) -> HttpResponse {
    let form = PushForm::from_pairs(form.into_inner());
    dispatcher.dispatch(&form).await.to_http()
}

async fn feedback(
    query: web::Query<FeedbackQuery>,
    drain: web::Data<FeedbackDrain>,
) -> HttpResponse {
    let response = match drain.drain(&query.limit).await {
        Ok(packet) => ApiResponse::with_body(packet),
        Err(e) => {
            warn!("handle_feedback|FAIL|{}", e);
            e.into()
        }
    };
    response.to_http()
}

async fn invalid_proto(req: HttpRequest) -> HttpResponse {
    let err = GatewayError::InvalidProto(format!(
        "unsupported {} method invoke on {}",
        req.method(),
        req.path()
    ));
    ApiResponse::from(err).to_http()
}

/// 表单解析失败也返回统一响应体
pub fn form_config() -> web::FormConfig {
    web::FormConfig::default().error_handler(|err, _req| {
        let resp = ApiResponse::from(GatewayError::InvalidProto(format!(
            "malformed form body: {err}"
        )));
        InternalError::from_response(err, resp.to_http()).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let resp = ApiResponse::from(GatewayError::InvalidProto(format!(
            "malformed query string: {err}"
        )));
        InternalError::from_response(err, resp.to_http()).into()
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/apns/push")
            .route(web::post().to(push))
            .default_service(web::to(invalid_proto)),
    )
    .service(
        web::resource("/apns/feedback")
            .route(web::get().to(feedback))
            .default_service(web::to(invalid_proto)),
    )
    .service(stat);
}
